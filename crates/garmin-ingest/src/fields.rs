//! Canonical field mappings produced by the extractors
//!
//! Every source format is reduced to a flat map of canonical field name
//! to typed value before it touches storage. A field that a source does
//! not report is simply absent from the map, so the storage merge never
//! sees it and never overwrites a previously stored value with a null.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveTime, Utc};
use rusqlite::types::{ToSql, ToSqlOutput};
use serde::Serialize;

/// A typed value for one canonical field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
    /// Time-of-day encoding for durations and paces (e.g. ground contact time)
    Time(NaiveTime),
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    /// True for the values the source formats use interchangeably with
    /// "not reported": numeric zero and the empty string.
    pub fn is_zero_like(&self) -> bool {
        match self {
            FieldValue::Int(v) => *v == 0,
            FieldValue::Float(v) => *v == 0.0,
            FieldValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<NaiveTime> for FieldValue {
    fn from(v: NaiveTime) -> Self {
        FieldValue::Time(v)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(v: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(v)
    }
}

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            FieldValue::Int(v) => v.to_sql(),
            FieldValue::Float(v) => v.to_sql(),
            FieldValue::Text(s) => s.to_sql(),
            FieldValue::Time(t) => Ok(ToSqlOutput::from(t.format("%H:%M:%S%.3f").to_string())),
            FieldValue::Timestamp(ts) => Ok(ToSqlOutput::from(ts.to_rfc3339())),
        }
    }
}

/// Canonical field name -> typed value. BTreeMap keeps column order
/// deterministic when the merge SQL is generated.
pub type FieldMap = BTreeMap<&'static str, FieldValue>;

/// Insert `value` under `key` when present; absent values stay out of
/// the map entirely.
pub fn put(map: &mut FieldMap, key: &'static str, value: Option<FieldValue>) {
    if let Some(value) = value {
        map.insert(key, value);
    }
}

/// How to treat a reported zero on sources that cannot distinguish
/// "zero" from "not measured".
///
/// The TCX interchange path historically dropped zero values before the
/// merge so that a zero reading never clobbered a previously recorded
/// measurement. That conflates "not reported" with "reported as zero",
/// so the choice is an explicit policy here rather than an implicit
/// truthiness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZeroPolicy {
    /// Drop zero/empty values from the map before merging
    #[default]
    ZeroIsAbsent,
    /// Keep zero values and let them overwrite stored data
    ZeroIsValue,
}

/// Apply a [`ZeroPolicy`] to a field map, preserving the key field.
pub fn apply_zero_policy(map: &mut FieldMap, policy: ZeroPolicy, key_field: &str) {
    if policy == ZeroPolicy::ZeroIsAbsent {
        map.retain(|k, v| *k == key_field || !v.is_zero_like());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_skips_absent() {
        let mut map = FieldMap::new();
        put(&mut map, "avg_hr", Some(142.0.into()));
        put(&mut map, "max_hr", None);
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("avg_hr"));
    }

    #[test]
    fn test_zero_like() {
        assert!(FieldValue::Int(0).is_zero_like());
        assert!(FieldValue::Float(0.0).is_zero_like());
        assert!(FieldValue::Text(String::new()).is_zero_like());
        assert!(!FieldValue::Float(0.1).is_zero_like());
        assert!(!FieldValue::Text("x".into()).is_zero_like());
    }

    #[test]
    fn test_zero_policy_drops_zero_but_keeps_key() {
        let mut map = FieldMap::new();
        map.insert("activity_id", 0.into());
        map.insert("avg_hr", FieldValue::Float(0.0));
        map.insert("max_hr", FieldValue::Float(181.0));

        apply_zero_policy(&mut map, ZeroPolicy::ZeroIsAbsent, "activity_id");
        assert!(map.contains_key("activity_id"));
        assert!(!map.contains_key("avg_hr"));
        assert!(map.contains_key("max_hr"));
    }

    #[test]
    fn test_zero_policy_keep_values() {
        let mut map = FieldMap::new();
        map.insert("activity_id", 7.into());
        map.insert("avg_hr", FieldValue::Float(0.0));

        apply_zero_policy(&mut map, ZeroPolicy::ZeroIsValue, "activity_id");
        assert!(map.contains_key("avg_hr"));
    }
}
