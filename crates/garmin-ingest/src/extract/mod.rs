//! Field extractors, one per source format
//!
//! Each extractor turns one raw file into canonical field mappings:
//! a device mapping, a file mapping, zero or more activity-base
//! mappings, and at most one sport dispatch request. Extractors fail
//! with a per-file error that the batch driver logs and skips; a field
//! a source does not report is left out of the mapping, never errored.

pub mod fit;
pub mod summary;
pub mod tcx;

use serde_json::Value;

use crate::fields::FieldMap;

/// Everything one source file contributes to storage
#[derive(Debug, Default)]
pub struct Extraction {
    /// Device identity mapping, when the source names its device
    pub device: Option<FieldMap>,
    /// File identity mapping; always present
    pub file: FieldMap,
    /// Per-file device status records (track format only)
    pub device_info: Vec<FieldMap>,
    /// Activity-base mappings, in merge order
    pub activities: Vec<FieldMap>,
    /// Specialization dispatch request, when the source reports a sub-sport
    pub dispatch: Option<SportDispatch>,
}

/// Input to the sport dispatcher, carried out of the summary extractor
#[derive(Debug)]
pub struct SportDispatch {
    pub activity_id: i64,
    pub sub_sport: String,
    pub summary: Option<Value>,
}
