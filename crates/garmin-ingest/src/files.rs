//! Input file discovery

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::Result;

/// List files under `root` with one of the given extensions, ordered by
/// name. With `newer_than` set, only files modified after that point
/// are returned (latest/incremental mode).
pub fn list_files(
    root: &Path,
    extensions: &[&str],
    newer_than: Option<DateTime<Utc>>,
) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();

    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
            .unwrap_or(false);
        if !matches {
            continue;
        }

        if let Some(cutoff) = newer_than {
            let modified: DateTime<Utc> = entry.metadata()?.modified()?.into();
            if modified <= cutoff {
                continue;
            }
        }

        out.push(path);
    }

    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn test_extension_filter_and_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["2.tcx", "1.json", "3.TCX", "notes.txt", "4.fit"] {
            File::create(dir.path().join(name)).unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.tcx")).unwrap();

        let found = list_files(dir.path(), &["tcx"], None).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["2.tcx", "3.TCX"]);

        let found = list_files(dir.path(), &["fit", "tcx", "json"], None).unwrap();
        assert_eq!(found.len(), 4);
    }

    #[test]
    fn test_newer_than_cutoff() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("1.json")).unwrap();

        let future = Utc::now() + chrono::Duration::hours(1);
        assert!(list_files(dir.path(), &["json"], Some(future)).unwrap().is_empty());

        let past = Utc::now() - chrono::Duration::hours(1);
        assert_eq!(list_files(dir.path(), &["json"], Some(past)).unwrap().len(), 1);
    }
}
