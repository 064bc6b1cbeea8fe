//! Extractor for the vendor JSON activity-summary format
//!
//! Summary documents nest every measurement two levels deep
//! (`summary[field][subfield]`), and any key path can be absent. A miss
//! is "unknown", logged at debug verbosity, never an error.

use std::path::Path;

use chrono::{DateTime, NaiveTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::extract::{Extraction, SportDispatch};
use crate::fields::{put, FieldMap};
use crate::identity;
use crate::units::secs_to_time;

/// Pace value the vendor uses for "no pace recorded"
const UNKNOWN_PACE: &str = "--:--";

/// Top-level activity document
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityEnvelope {
    activity_id: i64,
    #[serde(default)]
    activity_name: Option<String>,
    #[serde(default)]
    activity_description: Option<String>,
    #[serde(default)]
    activity_type: Option<ActivityType>,
    #[serde(default)]
    event_type: Option<EventType>,
    #[serde(default)]
    activity_summary: Option<Value>,
}

/// Activity type key with its parent sport key
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityType {
    key: String,
    #[serde(default)]
    parent: Option<Box<ActivityType>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventType {
    #[serde(default)]
    display: Option<String>,
}

/// Look up `summary[field][subfield]`, treating an absent path as unknown
pub fn json_value<'a>(summary: &'a Value, field: &str, subfield: &str) -> Option<&'a Value> {
    let found = summary.get(field).and_then(|v| v.get(subfield));
    if found.is_none() {
        debug!(field, subfield, "summary field not found");
    }
    found
}

/// Numeric lookup; the vendor emits both JSON numbers and numeric strings
pub fn json_float(summary: &Value, field: &str, subfield: &str) -> Option<f64> {
    let v = json_value(summary, field, subfield)?;
    v.as_f64()
        .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
}

pub fn json_str(summary: &Value, field: &str, subfield: &str) -> Option<String> {
    json_value(summary, field, subfield)?
        .as_str()
        .map(|s| s.to_string())
}

/// Parse a vendor "MM:SS" pace display into a time-of-day encoding.
///
/// `Ok(None)` is the explicit unknown-pace sentinel; a malformed string
/// is a parse failure, which callers downgrade to unknown with a log.
pub fn pace_to_time(pace: &str) -> Result<Option<NaiveTime>> {
    if pace == UNKNOWN_PACE {
        return Ok(None);
    }
    let (minutes, seconds) = pace
        .split_once(':')
        .ok_or_else(|| IngestError::parse(format!("malformed pace: {}", pace)))?;
    let minutes: u32 = minutes
        .parse()
        .map_err(|_| IngestError::parse(format!("malformed pace: {}", pace)))?;
    let seconds: u32 = seconds
        .parse()
        .map_err(|_| IngestError::parse(format!("malformed pace: {}", pace)))?;

    NaiveTime::from_hms_opt(minutes / 60, minutes % 60, seconds)
        .map(Some)
        .ok_or_else(|| IngestError::parse(format!("pace out of range: {}", pace)))
}

fn json_timestamp(summary: &Value, field: &str) -> Option<DateTime<Utc>> {
    json_str(summary, field, "value")
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Extract one JSON activity-summary file
pub fn extract(path: &Path) -> Result<Extraction> {
    let data = std::fs::read_to_string(path)?;
    let envelope: ActivityEnvelope = serde_json::from_str(&data)
        .map_err(|e| IngestError::parse(format!("{}: {}", path.display(), e)))?;

    let mut extraction = Extraction::default();

    extraction.file.insert("name", identity::file_name(path)?.into());
    extraction.file.insert("type", "json".into());

    let activity_id = envelope.activity_id;
    let sub_sport = envelope.activity_type.as_ref().map(|t| t.key.clone());
    let sport = envelope
        .activity_type
        .as_ref()
        .and_then(|t| t.parent.as_ref())
        .map(|p| p.key.clone());

    let mut activity = FieldMap::new();
    activity.insert("activity_id", activity_id.into());
    put(&mut activity, "name", envelope.activity_name.map(Into::into));
    put(
        &mut activity,
        "description",
        envelope.activity_description.map(Into::into),
    );
    put(
        &mut activity,
        "type",
        envelope.event_type.and_then(|e| e.display).map(Into::into),
    );
    put(&mut activity, "sport", sport.map(Into::into));
    put(
        &mut activity,
        "sub_sport",
        sub_sport.clone().map(Into::into),
    );

    if let Some(summary) = &envelope.activity_summary {
        put(
            &mut activity,
            "start_time",
            json_timestamp(summary, "BeginTimestamp").map(Into::into),
        );
        put(
            &mut activity,
            "stop_time",
            json_timestamp(summary, "EndTimestamp").map(Into::into),
        );
        put(
            &mut activity,
            "elapsed_time",
            secs_to_time(json_float(summary, "SumElapsedDuration", "value")).map(Into::into),
        );
        put(
            &mut activity,
            "moving_time",
            secs_to_time(json_float(summary, "SumMovingDuration", "value")).map(Into::into),
        );

        let floats = [
            ("start_lat", "BeginLatitude"),
            ("start_long", "BeginLongitude"),
            ("stop_lat", "EndLatitude"),
            ("stop_long", "EndLongitude"),
            ("distance", "SumDistance"),
            ("avg_hr", "WeightedMeanHeartRate"),
            ("max_hr", "MaxHeartRate"),
            ("calories", "SumEnergy"),
            ("avg_speed", "WeightedMeanSpeed"),
            ("avg_moving_speed", "WeightedMeanMovingSpeed"),
            ("max_speed", "MaxSpeed"),
            ("ascent", "GainElevation"),
            ("descent", "LossElevation"),
            ("max_temperature", "MaxAirTemperature"),
            ("min_temperature", "MinAirTemperature"),
            ("avg_temperature", "WeightedMeanAirTemperature"),
            ("training_effect", "SumTrainingEffect"),
            ("anaerobic_training_effect", "SumAnaerobicTrainingEffect"),
        ];
        for (column, field) in floats {
            put(
                &mut activity,
                column,
                json_float(summary, field, "value").map(Into::into),
            );
        }
    }

    extraction.activities.push(activity);

    if let Some(sub_sport) = sub_sport {
        extraction.dispatch = Some(SportDispatch {
            activity_id,
            sub_sport,
            summary: envelope.activity_summary,
        });
    }

    Ok(extraction)
}
