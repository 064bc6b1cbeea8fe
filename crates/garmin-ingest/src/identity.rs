//! Natural-key resolution for devices, files, and activities
//!
//! Guarantees the device and file rows a record refers to exist before
//! any activity row is merged, and derives activity identity from file
//! names on the interchange path.

use std::path::Path;

use crate::error::{IngestError, Result};
use crate::extract::Extraction;
use crate::store::{EntityKind, GarminStore};

pub use crate::store::UNKNOWN_DEVICE_SERIAL;

/// Normalized file name (basename) used as the file's natural key
pub fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
        .ok_or_else(|| IngestError::identity(format!("no file name in {}", path.display())))
}

/// Derive the activity identifier from the file's basename, up to the
/// first period. `123456789.tcx` -> `123456789`; anything non-numeric
/// is an identity error.
pub fn activity_id_from_path(path: &Path) -> Result<i64> {
    let name = file_name(path)?;
    let stem = name.split('.').next().unwrap_or("");
    stem.parse().map_err(|_| {
        IngestError::identity(format!("activity id is not numeric in file name {}", name))
    })
}

/// Infer a manufacturer from an interchange-format creator string
pub fn manufacturer_from_creator(creator: Option<&str>) -> &'static str {
    match creator {
        Some(c) if c.contains("Garmin") => "Garmin",
        Some(c) if c.contains("Microsoft") => "Microsoft",
        _ => "Unknown",
    }
}

/// Make sure the device and file rows an extraction refers to exist.
/// Device first: the file row carries its serial as a foreign key.
pub fn ensure_identities(store: &GarminStore, extraction: &Extraction) -> Result<()> {
    if let Some(device) = &extraction.device {
        store.ensure_device(device)?;
    }
    store.ensure_file(&extraction.file)?;
    for info in &extraction.device_info {
        store.merge(EntityKind::DeviceInfo, info)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_id_from_path() {
        assert_eq!(
            activity_id_from_path(Path::new("/data/123456789.tcx")).unwrap(),
            123456789
        );
        // Only the basename up to the first period counts
        assert_eq!(
            activity_id_from_path(Path::new("42.summary.json")).unwrap(),
            42
        );
    }

    #[test]
    fn test_non_numeric_basename_is_identity_error() {
        let err = activity_id_from_path(Path::new("/data/abc.tcx")).unwrap_err();
        assert!(matches!(err, IngestError::Identity(_)));
    }

    #[test]
    fn test_manufacturer_from_creator() {
        assert_eq!(
            manufacturer_from_creator(Some("Garmin Forerunner 230")),
            "Garmin"
        );
        assert_eq!(manufacturer_from_creator(Some("Microsoft Band")), "Microsoft");
        assert_eq!(manufacturer_from_creator(Some("Polar V800")), "Unknown");
        assert_eq!(manufacturer_from_creator(None), "Unknown");
    }
}
