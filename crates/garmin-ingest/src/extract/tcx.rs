//! Extractor for the XML interchange format (TCX)
//!
//! The interchange format reports distances in meters and cannot
//! distinguish an unmeasured quantity from a zero reading, so the
//! extracted mapping passes through the configured [`ZeroPolicy`]
//! before it is merged.

use std::path::Path;

use chrono::{DateTime, Utc};
use roxmltree::{Document, Node};

use crate::error::{IngestError, Result};
use crate::extract::Extraction;
use crate::fields::{apply_zero_policy, put, FieldMap, ZeroPolicy};
use crate::identity;
use crate::store::UNKNOWN_DEVICE_SERIAL;
use crate::units::{meters_to_feet, meters_to_miles, UnitSystem};

fn named_child<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
}

fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    named_child(node, name).and_then(|c| c.text())
}

fn child_float(node: Node, name: &str) -> Option<f64> {
    child_text(node, name).and_then(|t| t.trim().parse().ok())
}

fn parse_time(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

struct Trackpoint {
    time: Option<DateTime<Utc>>,
    lat: Option<f64>,
    long: Option<f64>,
    altitude: Option<f64>,
    heart_rate: Option<f64>,
    cadence: Option<f64>,
}

fn read_trackpoint(node: Node) -> Trackpoint {
    let position = named_child(node, "Position");
    Trackpoint {
        time: child_text(node, "Time").and_then(parse_time),
        lat: position.and_then(|p| child_float(p, "LatitudeDegrees")),
        long: position.and_then(|p| child_float(p, "LongitudeDegrees")),
        altitude: child_float(node, "AltitudeMeters"),
        heart_rate: named_child(node, "HeartRateBpm").and_then(|h| child_float(h, "Value")),
        cadence: child_float(node, "Cadence"),
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

/// Extract one interchange-format file
pub fn extract(path: &Path, units: UnitSystem, zero_policy: ZeroPolicy) -> Result<Extraction> {
    // Activity identity is derived from the file name, not the content
    let activity_id = identity::activity_id_from_path(path)?;

    let data = std::fs::read_to_string(path)?;
    let doc = Document::parse(&data)
        .map_err(|e| IngestError::parse(format!("{}: {}", path.display(), e)))?;

    let laps: Vec<Node> = doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "Lap")
        .collect();
    let trackpoints: Vec<Trackpoint> = doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "Trackpoint")
        .map(read_trackpoint)
        .collect();

    let start_time = laps
        .first()
        .and_then(|lap| lap.attribute("StartTime"))
        .and_then(parse_time)
        .or_else(|| trackpoints.first().and_then(|tp| tp.time))
        .ok_or_else(|| IngestError::parse(format!("{}: no start time", path.display())))?;
    let stop_time = trackpoints
        .iter()
        .rev()
        .find_map(|tp| tp.time)
        .ok_or_else(|| IngestError::parse(format!("{}: no trackpoint times", path.display())))?;

    let creator = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "Creator");
    let product = creator.and_then(|c| child_text(c, "Name"));
    let serial_number = creator
        .and_then(|c| child_text(c, "UnitId"))
        .and_then(|t| t.trim().parse::<i64>().ok())
        .filter(|serial| *serial != 0)
        .unwrap_or(UNKNOWN_DEVICE_SERIAL);
    let manufacturer = identity::manufacturer_from_creator(product);

    let distance_m: f64 = laps.iter().filter_map(|l| child_float(*l, "DistanceMeters")).sum();
    let calories: f64 = laps.iter().filter_map(|l| child_float(*l, "Calories")).sum();

    let mut ascent_m = 0.0;
    let mut descent_m = 0.0;
    let altitudes: Vec<f64> = trackpoints.iter().filter_map(|tp| tp.altitude).collect();
    for pair in altitudes.windows(2) {
        let delta = pair[1] - pair[0];
        if delta > 0.0 {
            ascent_m += delta;
        } else {
            descent_m -= delta;
        }
    }

    let heart_rates: Vec<f64> = trackpoints.iter().filter_map(|tp| tp.heart_rate).collect();
    let cadences: Vec<f64> = trackpoints.iter().filter_map(|tp| tp.cadence).collect();

    // The source reports meters; statute output gets miles and feet,
    // metric output a meters-to-kilometer scaling.
    let (distance, ascent, descent) = if units == UnitSystem::Statute {
        (
            meters_to_miles(Some(distance_m)),
            meters_to_feet(Some(ascent_m)),
            meters_to_feet(Some(descent_m)),
        )
    } else {
        (
            Some(distance_m / 1000.0),
            Some(ascent_m / 1000.0),
            Some(descent_m / 1000.0),
        )
    };

    let mut extraction = Extraction::default();

    let mut device = FieldMap::new();
    device.insert("serial_number", serial_number.into());
    device.insert("timestamp", start_time.into());
    device.insert("manufacturer", manufacturer.into());
    put(&mut device, "product", product.map(Into::into));
    extraction.device = Some(device);

    extraction.file.insert("name", identity::file_name(path)?.into());
    extraction.file.insert("type", "tcx".into());
    extraction.file.insert("serial_number", serial_number.into());

    let mut activity = FieldMap::new();
    activity.insert("activity_id", activity_id.into());
    activity.insert("start_time", start_time.into());
    activity.insert("stop_time", stop_time.into());
    activity.insert("laps", (laps.len() as i64).into());
    put(&mut activity, "start_lat", trackpoints.iter().find_map(|tp| tp.lat).map(Into::into));
    put(&mut activity, "start_long", trackpoints.iter().find_map(|tp| tp.long).map(Into::into));
    put(
        &mut activity,
        "stop_lat",
        trackpoints.iter().rev().find_map(|tp| tp.lat).map(Into::into),
    );
    put(
        &mut activity,
        "stop_long",
        trackpoints.iter().rev().find_map(|tp| tp.long).map(Into::into),
    );
    put(&mut activity, "distance", distance.map(Into::into));
    put(&mut activity, "ascent", ascent.map(Into::into));
    put(&mut activity, "descent", descent.map(Into::into));
    put(&mut activity, "avg_hr", mean(&heart_rates).map(Into::into));
    put(&mut activity, "max_hr", max(&heart_rates).map(Into::into));
    put(&mut activity, "calories", Some(calories.into()));
    put(&mut activity, "avg_cadence", mean(&cadences).map(Into::into));
    put(&mut activity, "max_cadence", max(&cadences).map(Into::into));

    apply_zero_policy(&mut activity, zero_policy, "activity_id");
    extraction.activities.push(activity);

    Ok(extraction)
}
