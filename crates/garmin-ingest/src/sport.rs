//! Sport dispatcher: sub-sport tag -> specialization field mappings
//!
//! The set of recognized sports is closed; tag aliases (treadmill
//! running, hiking, mountain biking) resolve to the same handler. An
//! unrecognized tag produces no specialization and no error, so the
//! base activity row is never lost to an unknown sport.

use serde_json::Value;
use tracing::{info, warn};

use crate::extract::summary::{json_float, json_str, pace_to_time};
use crate::fields::{put, FieldMap, FieldValue};
use crate::store::EntityKind;
use crate::units::{centimeters_to_meters, length_for, ms_to_time, UnitSystem};

/// Recognized sport specializations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sport {
    Running,
    Walking,
    Paddling,
    Cycling,
    Elliptical,
}

impl Sport {
    /// Resolve a sub-sport tag, including aliases, to its handler
    pub fn from_sub_sport(tag: &str) -> Option<Self> {
        match tag {
            "running" | "treadmill_running" => Some(Sport::Running),
            "walking" | "hiking" => Some(Sport::Walking),
            "paddling" => Some(Sport::Paddling),
            "cycling" | "mountain_biking" => Some(Sport::Cycling),
            "elliptical" => Some(Sport::Elliptical),
            _ => None,
        }
    }
}

/// Build the specialization mappings for one activity, in merge order.
/// Mappings destined for the base activity table come first so a
/// specialization row can never precede its base row.
pub fn dispatch(
    tag: &str,
    activity_id: i64,
    summary: Option<&Value>,
    units: UnitSystem,
) -> Vec<(EntityKind, FieldMap)> {
    let Some(sport) = Sport::from_sub_sport(tag) else {
        info!(activity_id, sub_sport = tag, "no handler for sub-sport, storing base record only");
        return Vec::new();
    };
    let Some(summary) = summary else {
        return Vec::new();
    };

    match sport {
        Sport::Running => running(activity_id, summary, units),
        Sport::Walking => walking(activity_id, summary),
        Sport::Paddling => paddling(activity_id, summary, units),
        Sport::Cycling => cycling(activity_id, summary),
        Sport::Elliptical => elliptical(activity_id, summary),
    }
}

fn float_field(summary: &Value, field: &str) -> Option<FieldValue> {
    json_float(summary, field, "value").map(Into::into)
}

/// Pace lookups read the "display" subfield; the unknown-pace sentinel
/// stays unknown, a malformed display is logged and dropped.
fn pace_field(summary: &Value, field: &str) -> Option<FieldValue> {
    let display = json_str(summary, field, "display")?;
    match pace_to_time(&display) {
        Ok(time) => time.map(Into::into),
        Err(e) => {
            warn!(field, error = %e, "dropping unparseable pace");
            None
        }
    }
}

fn new_map(activity_id: i64) -> FieldMap {
    let mut map = FieldMap::new();
    map.insert("activity_id", activity_id.into());
    map
}

fn running(activity_id: i64, s: &Value, units: UnitSystem) -> Vec<(EntityKind, FieldMap)> {
    let vertical_oscillation = length_for(
        centimeters_to_meters(json_float(s, "WeightedMeanVerticalOscillation", "value")),
        units,
    );
    let step_length = length_for(json_float(s, "WeightedMeanStrideLength", "value"), units);

    let mut run = new_map(activity_id);
    put(&mut run, "steps", float_field(s, "SumStep"));
    put(&mut run, "avg_pace", pace_field(s, "WeightedMeanPace"));
    put(&mut run, "avg_moving_pace", pace_field(s, "WeightedMeanMovingPace"));
    put(&mut run, "max_pace", pace_field(s, "MaxPace"));
    put(&mut run, "avg_steps_per_min", float_field(s, "WeightedMeanRunCadence"));
    put(&mut run, "max_steps_per_min", float_field(s, "MaxRunCadence"));
    put(&mut run, "avg_step_length", step_length.map(Into::into));
    put(
        &mut run,
        "avg_gct_balance",
        float_field(s, "WeightedMeanGroundContactBalanceLeft"),
    );
    put(
        &mut run,
        "lactate_threshold_hr",
        float_field(s, "DirectLactateThresholdHeartRate"),
    );
    put(
        &mut run,
        "avg_vertical_oscillation",
        vertical_oscillation.map(Into::into),
    );
    put(
        &mut run,
        "avg_ground_contact_time",
        ms_to_time(json_float(s, "WeightedMeanGroundContactTime", "value")).map(Into::into),
    );
    put(&mut run, "power", float_field(s, "DirectFunctionalThresholdPower"));
    put(&mut run, "vo2_max", float_field(s, "DirectVO2Max"));

    vec![(EntityKind::RunActivity, run)]
}

fn walking(activity_id: i64, s: &Value) -> Vec<(EntityKind, FieldMap)> {
    let mut walk = new_map(activity_id);
    put(&mut walk, "steps", float_field(s, "SumStep"));
    put(&mut walk, "avg_pace", pace_field(s, "WeightedMeanPace"));
    put(&mut walk, "max_pace", pace_field(s, "MaxPace"));
    put(&mut walk, "vo2_max", float_field(s, "DirectVO2Max"));

    vec![(EntityKind::WalkActivity, walk)]
}

fn paddling(activity_id: i64, s: &Value, units: UnitSystem) -> Vec<(EntityKind, FieldMap)> {
    // Stroke cadence lands on the base activity row
    let mut base = new_map(activity_id);
    put(&mut base, "avg_cadence", float_field(s, "WeightedMeanStrokeCadence"));
    put(&mut base, "max_cadence", float_field(s, "MaxStrokeCadence"));

    let stroke_distance = length_for(json_float(s, "WeightedMeanStrokeDistance", "value"), units);

    let mut paddle = new_map(activity_id);
    put(&mut paddle, "strokes", float_field(s, "SumStrokes"));
    put(
        &mut paddle,
        "avg_stroke_distance",
        stroke_distance.map(Into::into),
    );
    put(&mut paddle, "power", float_field(s, "DirectFunctionalThresholdPower"));

    vec![(EntityKind::Activity, base), (EntityKind::PaddleActivity, paddle)]
}

fn cycling(activity_id: i64, s: &Value) -> Vec<(EntityKind, FieldMap)> {
    let mut base = new_map(activity_id);
    put(&mut base, "avg_cadence", float_field(s, "WeightedMeanBikeCadence"));
    put(&mut base, "max_cadence", float_field(s, "MaxBikeCadence"));

    let mut ride = new_map(activity_id);
    put(&mut ride, "strokes", float_field(s, "SumStrokes"));
    put(&mut ride, "avg_pace", pace_field(s, "WeightedMeanPace"));
    put(&mut ride, "avg_moving_pace", pace_field(s, "WeightedMeanMovingPace"));
    put(&mut ride, "max_pace", pace_field(s, "MaxPace"));
    put(&mut ride, "power", float_field(s, "DirectFunctionalThresholdPower"));
    put(&mut ride, "vo2_max", float_field(s, "DirectVO2Max"));

    vec![(EntityKind::Activity, base), (EntityKind::CycleActivity, ride)]
}

fn elliptical(activity_id: i64, s: &Value) -> Vec<(EntityKind, FieldMap)> {
    let mut base = new_map(activity_id);
    put(&mut base, "avg_cadence", float_field(s, "WeightedMeanRunCadence"));
    put(&mut base, "max_cadence", float_field(s, "MaxRunCadence"));

    let mut workout = new_map(activity_id);
    put(&mut workout, "elliptical_distance", float_field(s, "SumDistance"));
    put(&mut workout, "steps", float_field(s, "SumStep"));
    put(&mut workout, "avg_pace", pace_field(s, "WeightedMeanPace"));
    put(&mut workout, "max_pace", pace_field(s, "MaxPace"));
    put(&mut workout, "power", float_field(s, "DirectFunctionalThresholdPower"));

    vec![(EntityKind::Activity, base), (EntityKind::EllipticalActivity, workout)]
}
