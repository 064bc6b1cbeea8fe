//! Storage layer for normalized Garmin data
//!
//! Entities are plain data holders; all merge/query behavior lives on
//! [`GarminStore`]. The pipeline only ever asks for natural-key creation
//! or a null-safe field merge, so re-running an import converges to the
//! same stored state instead of duplicating rows.

mod sqlite;

pub use sqlite::GarminStore;

use chrono::{DateTime, Utc};

/// The serial number recorded for files whose device cannot be identified
pub const UNKNOWN_DEVICE_SERIAL: i64 = 9_999_999_999;

/// Every table the ingestion pipeline can merge into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Device,
    DeviceInfo,
    File,
    Activity,
    RunActivity,
    WalkActivity,
    PaddleActivity,
    CycleActivity,
    EllipticalActivity,
    WeightSample,
    StressSample,
}

impl EntityKind {
    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Device => "devices",
            EntityKind::DeviceInfo => "device_info",
            EntityKind::File => "files",
            EntityKind::Activity => "activities",
            EntityKind::RunActivity => "run_activities",
            EntityKind::WalkActivity => "walk_activities",
            EntityKind::PaddleActivity => "paddle_activities",
            EntityKind::CycleActivity => "cycle_activities",
            EntityKind::EllipticalActivity => "elliptical_activities",
            EntityKind::WeightSample => "weight",
            EntityKind::StressSample => "stress",
        }
    }

    /// Natural-key column the merge upserts on
    pub fn key_column(self) -> &'static str {
        match self {
            EntityKind::Device => "serial_number",
            EntityKind::File => "name",
            EntityKind::DeviceInfo | EntityKind::WeightSample | EntityKind::StressSample => {
                "timestamp"
            }
            _ => "activity_id",
        }
    }
}

/// A recognized recording device
#[derive(Debug, Clone)]
pub struct Device {
    pub serial_number: i64,
    pub timestamp: Option<DateTime<Utc>>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub hardware_version: Option<String>,
}

/// An ingested source file
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub name: String,
    pub kind: String,
    pub serial_number: Option<i64>,
}

/// Base activity row shared by all sports
#[derive(Debug, Clone, Default)]
pub struct Activity {
    pub activity_id: i64,
    pub name: Option<String>,
    pub description: Option<String>,
    pub kind: Option<String>,
    pub sport: Option<String>,
    pub sub_sport: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub stop_time: Option<DateTime<Utc>>,
    pub elapsed_time: Option<String>,
    pub moving_time: Option<String>,
    pub laps: Option<i64>,
    pub start_lat: Option<f64>,
    pub start_long: Option<f64>,
    pub stop_lat: Option<f64>,
    pub stop_long: Option<f64>,
    pub distance: Option<f64>,
    pub avg_hr: Option<f64>,
    pub max_hr: Option<f64>,
    pub calories: Option<f64>,
    pub avg_speed: Option<f64>,
    pub avg_moving_speed: Option<f64>,
    pub max_speed: Option<f64>,
    pub avg_cadence: Option<f64>,
    pub max_cadence: Option<f64>,
    pub ascent: Option<f64>,
    pub descent: Option<f64>,
    pub min_temperature: Option<f64>,
    pub max_temperature: Option<f64>,
    pub avg_temperature: Option<f64>,
    pub training_effect: Option<f64>,
    pub anaerobic_training_effect: Option<f64>,
}

/// Aggregates over a time-series sample table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleStats {
    pub avg: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}
