//! Batch driver: discover input files and feed each through extraction,
//! identity resolution, sport dispatch, and the storage merge
//!
//! One corrupt file never stops the batch: every per-file failure is
//! logged and counted, and processing moves on. Re-running a batch is
//! safe because every merge is a null-safe natural-key upsert.

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::error::{IngestError, Result};
use crate::extract::fit::FitDecoder;
use crate::extract::{self, Extraction};
use crate::fields::ZeroPolicy;
use crate::files;
use crate::identity;
use crate::sport;
use crate::store::{EntityKind, GarminStore};
use crate::units::UnitSystem;

const EXTENSIONS: &[&str] = &["fit", "tcx", "json"];

/// Per-invocation settings threaded through every component call
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestContext {
    pub units: UnitSystem,
    pub zero_policy: ZeroPolicy,
}

/// What to ingest
#[derive(Debug, Clone)]
pub enum Selection {
    /// A single explicit file
    File(PathBuf),
    /// All matching files in a directory; with `latest`, only files
    /// newer than the most recent activity already in storage
    Directory { root: PathBuf, latest: bool },
}

/// Counters reported at the end of a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub processed: u32,
    pub skipped: u32,
}

/// Drives one ingestion batch against a store
pub struct BatchDriver<'a> {
    store: &'a GarminStore,
    ctx: IngestContext,
    decoder: Option<Box<dyn FitDecoder>>,
}

impl<'a> BatchDriver<'a> {
    pub fn new(store: &'a GarminStore, ctx: IngestContext) -> Self {
        Self {
            store,
            ctx,
            decoder: None,
        }
    }

    /// Attach a binary-format decoder; without one, track files are
    /// skipped as unparseable.
    pub fn with_decoder(mut self, decoder: Box<dyn FitDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Run the batch for the given selection
    pub fn run(&self, selection: &Selection) -> Result<BatchStats> {
        let candidates = self.discover(selection)?;
        info!(files = candidates.len(), "starting batch");

        let mut stats = BatchStats::default();
        for path in &candidates {
            match self.ingest_file(path) {
                Ok(()) => {
                    debug!(file = %path.display(), "ingested");
                    stats.processed += 1;
                }
                Err(IngestError::Identity(msg)) => {
                    error!(file = %path.display(), "skipping file: {}", msg);
                    stats.skipped += 1;
                }
                Err(e) => {
                    warn!(file = %path.display(), "skipping file: {}", e);
                    stats.skipped += 1;
                }
            }
        }

        info!(processed = stats.processed, skipped = stats.skipped, "batch complete");
        Ok(stats)
    }

    fn discover(&self, selection: &Selection) -> Result<Vec<PathBuf>> {
        match selection {
            Selection::File(path) => Ok(vec![path.clone()]),
            Selection::Directory { root, latest } => {
                let newer_than = if *latest {
                    self.store.latest_timestamp(EntityKind::Activity)?
                } else {
                    None
                };
                files::list_files(root, EXTENSIONS, newer_than)
            }
        }
    }

    /// Ingest one file: extract, resolve identities, merge base rows,
    /// then dispatch the specialization. Base before specialization, so
    /// a dispatch failure can never leave an orphaned specialization.
    fn ingest_file(&self, path: &Path) -> Result<()> {
        let extraction = self.extract(path)?;

        identity::ensure_identities(self.store, &extraction)?;

        for activity in &extraction.activities {
            self.store.merge(EntityKind::Activity, activity)?;
        }

        if let Some(dispatch) = &extraction.dispatch {
            let records = sport::dispatch(
                &dispatch.sub_sport,
                dispatch.activity_id,
                dispatch.summary.as_ref(),
                self.ctx.units,
            );
            for (kind, fields) in records {
                self.store.merge(kind, &fields)?;
            }
        }

        Ok(())
    }

    fn extract(&self, path: &Path) -> Result<Extraction> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("fit") => match &self.decoder {
                Some(decoder) => extract::fit::extract(path, decoder.as_ref()),
                None => Err(IngestError::parse(format!(
                    "no track-format decoder configured for {}",
                    path.display()
                ))),
            },
            Some("tcx") => extract::tcx::extract(path, self.ctx.units, self.ctx.zero_policy),
            Some("json") => extract::summary::extract(path),
            _ => Err(IngestError::parse(format!(
                "unsupported file type: {}",
                path.display()
            ))),
        }
    }
}
