//! SQLite-backed store with null-safe natural-key upserts

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::error::{IngestError, Result};
use crate::fields::FieldMap;
use crate::store::{Activity, Device, EntityKind, FileRecord, SampleStats};

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// SQLite database holding the canonical schema
pub struct GarminStore {
    conn: Connection,
}

impl GarminStore {
    /// Open or create the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| IngestError::database(format!("Failed to open database: {}", e)))?;

        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| IngestError::database(format!("Failed to open in-memory database: {}", e)))?;

        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Check the stored schema version and apply pending migrations
    fn migrate(&self) -> Result<()> {
        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS schema_migrations (
                    version INTEGER PRIMARY KEY,
                    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                [],
            )
            .map_err(|e| IngestError::database(format!("Failed to create migrations table: {}", e)))?;

        let current_version: i32 = self
            .conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if current_version > SCHEMA_VERSION {
            return Err(IngestError::database(format!(
                "Database schema version {} is newer than supported version {}",
                current_version, SCHEMA_VERSION
            )));
        }

        if current_version < 1 {
            self.migration_v1()?;
        }

        Ok(())
    }

    /// Migration v1: initial schema
    fn migration_v1(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS devices (
                    serial_number INTEGER PRIMARY KEY,
                    timestamp TEXT,
                    manufacturer TEXT,
                    product TEXT,
                    hardware_version TEXT
                );

                CREATE TABLE IF NOT EXISTS device_info (
                    timestamp TEXT PRIMARY KEY,
                    file_name TEXT,
                    serial_number INTEGER REFERENCES devices(serial_number),
                    software_version TEXT
                );

                CREATE TABLE IF NOT EXISTS files (
                    name TEXT PRIMARY KEY,
                    type TEXT NOT NULL,
                    serial_number INTEGER REFERENCES devices(serial_number)
                );

                CREATE TABLE IF NOT EXISTS activities (
                    activity_id INTEGER PRIMARY KEY,
                    name TEXT,
                    description TEXT,
                    type TEXT,
                    sport TEXT,
                    sub_sport TEXT,
                    start_time TEXT,
                    stop_time TEXT,
                    elapsed_time TEXT,
                    moving_time TEXT,
                    laps INTEGER,
                    start_lat REAL,
                    start_long REAL,
                    stop_lat REAL,
                    stop_long REAL,
                    distance REAL,
                    avg_hr REAL,
                    max_hr REAL,
                    calories REAL,
                    avg_speed REAL,
                    avg_moving_speed REAL,
                    max_speed REAL,
                    avg_cadence REAL,
                    max_cadence REAL,
                    ascent REAL,
                    descent REAL,
                    min_temperature REAL,
                    max_temperature REAL,
                    avg_temperature REAL,
                    training_effect REAL,
                    anaerobic_training_effect REAL
                );

                CREATE TABLE IF NOT EXISTS run_activities (
                    activity_id INTEGER PRIMARY KEY REFERENCES activities(activity_id),
                    steps REAL,
                    avg_pace TEXT,
                    avg_moving_pace TEXT,
                    max_pace TEXT,
                    avg_steps_per_min REAL,
                    max_steps_per_min REAL,
                    avg_step_length REAL,
                    avg_gct_balance REAL,
                    lactate_threshold_hr REAL,
                    avg_vertical_oscillation REAL,
                    avg_ground_contact_time TEXT,
                    power REAL,
                    vo2_max REAL
                );

                CREATE TABLE IF NOT EXISTS walk_activities (
                    activity_id INTEGER PRIMARY KEY REFERENCES activities(activity_id),
                    steps REAL,
                    avg_pace TEXT,
                    max_pace TEXT,
                    vo2_max REAL
                );

                CREATE TABLE IF NOT EXISTS paddle_activities (
                    activity_id INTEGER PRIMARY KEY REFERENCES activities(activity_id),
                    strokes REAL,
                    avg_stroke_distance REAL,
                    power REAL
                );

                CREATE TABLE IF NOT EXISTS cycle_activities (
                    activity_id INTEGER PRIMARY KEY REFERENCES activities(activity_id),
                    strokes REAL,
                    avg_pace TEXT,
                    avg_moving_pace TEXT,
                    max_pace TEXT,
                    power REAL,
                    vo2_max REAL
                );

                CREATE TABLE IF NOT EXISTS elliptical_activities (
                    activity_id INTEGER PRIMARY KEY REFERENCES activities(activity_id),
                    elliptical_distance REAL,
                    steps REAL,
                    avg_pace TEXT,
                    max_pace TEXT,
                    power REAL
                );

                CREATE TABLE IF NOT EXISTS weight (
                    timestamp TEXT PRIMARY KEY,
                    weight REAL NOT NULL
                );

                CREATE TABLE IF NOT EXISTS stress (
                    timestamp TEXT PRIMARY KEY,
                    stress INTEGER NOT NULL
                );

                INSERT OR IGNORE INTO schema_migrations (version) VALUES (1);
                "#,
            )
            .map_err(|e| IngestError::database(format!("Failed to run migrations: {}", e)))?;

        Ok(())
    }

    // =========================================================================
    // Null-safe merge
    // =========================================================================

    /// Create the row if absent, else overwrite only the fields present in
    /// `fields`. Fields missing from the map keep their stored value.
    pub fn merge(&self, kind: EntityKind, fields: &FieldMap) -> Result<()> {
        let key_col = kind.key_column();
        if !fields.contains_key(key_col) {
            return Err(IngestError::identity(format!(
                "merge into {} without key field {}",
                kind.table(),
                key_col
            )));
        }

        let columns: Vec<&str> = fields.keys().copied().collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let updates: Vec<String> = columns
            .iter()
            .filter(|c| **c != key_col)
            .map(|c| format!("{} = excluded.{}", c, c))
            .collect();

        let sql = if updates.is_empty() {
            format!(
                "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) DO NOTHING",
                kind.table(),
                columns.join(", "),
                placeholders.join(", "),
                key_col
            )
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) DO UPDATE SET {}",
                kind.table(),
                columns.join(", "),
                placeholders.join(", "),
                key_col,
                updates.join(", ")
            )
        };

        self.conn
            .execute(&sql, params_from_iter(fields.values()))
            .map_err(|e| {
                IngestError::database(format!("Failed to merge into {}: {}", kind.table(), e))
            })?;

        Ok(())
    }

    // =========================================================================
    // Identity rows
    // =========================================================================

    /// Create the device row if absent. Identity fields are first-writer-wins;
    /// only a previously null hardware version may be filled in later.
    pub fn ensure_device(&self, fields: &FieldMap) -> Result<i64> {
        let serial = fields
            .get("serial_number")
            .and_then(|v| v.as_int())
            .ok_or_else(|| IngestError::identity("device record without serial number"))?;

        self.conn
            .execute(
                "INSERT INTO devices (serial_number, timestamp, manufacturer, product, hardware_version)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(serial_number) DO UPDATE SET
                     hardware_version = COALESCE(devices.hardware_version, excluded.hardware_version)",
                params![
                    serial,
                    fields.get("timestamp"),
                    fields.get("manufacturer"),
                    fields.get("product"),
                    fields.get("hardware_version"),
                ],
            )
            .map_err(|e| IngestError::database(format!("Failed to create device: {}", e)))?;

        Ok(serial)
    }

    /// Create the file row if absent; an existing row is only ever updated
    /// to attach a device once one becomes known.
    pub fn ensure_file(&self, fields: &FieldMap) -> Result<()> {
        let name = fields
            .get("name")
            .and_then(|v| v.as_text())
            .ok_or_else(|| IngestError::identity("file record without name"))?;

        self.conn
            .execute(
                "INSERT INTO files (name, type, serial_number) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET
                     serial_number = COALESCE(files.serial_number, excluded.serial_number)",
                params![name, fields.get("type"), fields.get("serial_number")],
            )
            .map_err(|e| IngestError::database(format!("Failed to create file: {}", e)))?;

        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// High-water mark used by latest/incremental ingestion
    pub fn latest_timestamp(&self, kind: EntityKind) -> Result<Option<DateTime<Utc>>> {
        let (table, column) = match kind {
            EntityKind::Activity => ("activities", "start_time"),
            EntityKind::WeightSample => ("weight", "timestamp"),
            EntityKind::StressSample => ("stress", "timestamp"),
            _ => {
                return Err(IngestError::database(format!(
                    "no timestamp column for {}",
                    kind.table()
                )))
            }
        };

        // RFC 3339 strings in a single zone sort chronologically
        let latest: Option<String> = self
            .conn
            .query_row(&format!("SELECT MAX({}) FROM {}", column, table), [], |row| {
                row.get(0)
            })
            .map_err(|e| IngestError::database(format!("Failed to query latest timestamp: {}", e)))?;

        Ok(latest
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)))
    }

    pub fn device(&self, serial_number: i64) -> Result<Option<Device>> {
        self.conn
            .query_row(
                "SELECT serial_number, timestamp, manufacturer, product, hardware_version
                 FROM devices WHERE serial_number = ?1",
                params![serial_number],
                |row| {
                    Ok(Device {
                        serial_number: row.get(0)?,
                        timestamp: parse_ts(row.get(1)?),
                        manufacturer: row.get(2)?,
                        product: row.get(3)?,
                        hardware_version: row.get(4)?,
                    })
                },
            )
            .optional()
            .map_err(|e| IngestError::database(format!("Failed to get device: {}", e)))
    }

    pub fn file(&self, name: &str) -> Result<Option<FileRecord>> {
        self.conn
            .query_row(
                "SELECT name, type, serial_number FROM files WHERE name = ?1",
                params![name],
                |row| {
                    Ok(FileRecord {
                        name: row.get(0)?,
                        kind: row.get(1)?,
                        serial_number: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(|e| IngestError::database(format!("Failed to get file: {}", e)))
    }

    pub fn activity(&self, activity_id: i64) -> Result<Option<Activity>> {
        self.conn
            .query_row(
                "SELECT activity_id, name, description, type, sport, sub_sport,
                        start_time, stop_time, elapsed_time, moving_time, laps,
                        start_lat, start_long, stop_lat, stop_long, distance,
                        avg_hr, max_hr, calories, avg_speed, avg_moving_speed,
                        max_speed, avg_cadence, max_cadence, ascent, descent,
                        min_temperature, max_temperature, avg_temperature,
                        training_effect, anaerobic_training_effect
                 FROM activities WHERE activity_id = ?1",
                params![activity_id],
                |row| {
                    Ok(Activity {
                        activity_id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                        kind: row.get(3)?,
                        sport: row.get(4)?,
                        sub_sport: row.get(5)?,
                        start_time: parse_ts(row.get(6)?),
                        stop_time: parse_ts(row.get(7)?),
                        elapsed_time: row.get(8)?,
                        moving_time: row.get(9)?,
                        laps: row.get(10)?,
                        start_lat: row.get(11)?,
                        start_long: row.get(12)?,
                        stop_lat: row.get(13)?,
                        stop_long: row.get(14)?,
                        distance: row.get(15)?,
                        avg_hr: row.get(16)?,
                        max_hr: row.get(17)?,
                        calories: row.get(18)?,
                        avg_speed: row.get(19)?,
                        avg_moving_speed: row.get(20)?,
                        max_speed: row.get(21)?,
                        avg_cadence: row.get(22)?,
                        max_cadence: row.get(23)?,
                        ascent: row.get(24)?,
                        descent: row.get(25)?,
                        min_temperature: row.get(26)?,
                        max_temperature: row.get(27)?,
                        avg_temperature: row.get(28)?,
                        training_effect: row.get(29)?,
                        anaerobic_training_effect: row.get(30)?,
                    })
                },
            )
            .optional()
            .map_err(|e| IngestError::database(format!("Failed to get activity: {}", e)))
    }

    /// Number of rows in a table (for idempotence checks and batch reporting)
    pub fn row_count(&self, kind: EntityKind) -> Result<i64> {
        self.conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", kind.table()), [], |row| {
                row.get(0)
            })
            .map_err(|e| IngestError::database(format!("Failed to count rows: {}", e)))
    }

    /// Read one numeric column from a row identified by its natural key
    pub fn float_field(&self, kind: EntityKind, key: i64, column: &str) -> Result<Option<f64>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE {} = ?1",
                    column,
                    kind.table(),
                    kind.key_column()
                ),
                params![key],
                |row| row.get::<_, Option<f64>>(0),
            )
            .optional()
            .map_err(|e| IngestError::database(format!("Failed to read {}: {}", column, e)))
            .map(|v| v.flatten())
    }

    /// Read one text column from a row identified by its natural key
    pub fn text_field(&self, kind: EntityKind, key: i64, column: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE {} = ?1",
                    column,
                    kind.table(),
                    kind.key_column()
                ),
                params![key],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()
            .map_err(|e| IngestError::database(format!("Failed to read {}: {}", column, e)))
            .map(|v| v.flatten())
    }

    // =========================================================================
    // Time-series samples
    // =========================================================================

    pub fn record_weight(&self, timestamp: DateTime<Utc>, weight: f64) -> Result<()> {
        let mut fields = FieldMap::new();
        fields.insert("timestamp", timestamp.into());
        fields.insert("weight", weight.into());
        self.merge(EntityKind::WeightSample, &fields)
    }

    pub fn record_stress(&self, timestamp: DateTime<Utc>, stress: i64) -> Result<()> {
        let mut fields = FieldMap::new();
        fields.insert("timestamp", timestamp.into());
        fields.insert("stress", stress.into());
        self.merge(EntityKind::StressSample, &fields)
    }

    /// Range-bounded aggregates for reporting callers; the range is
    /// half-open, `[start, end)`.
    pub fn sample_stats(
        &self,
        kind: EntityKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<SampleStats> {
        let (table, column) = match kind {
            EntityKind::WeightSample => ("weight", "weight"),
            EntityKind::StressSample => ("stress", "stress"),
            _ => {
                return Err(IngestError::database(format!(
                    "{} is not a sample table",
                    kind.table()
                )))
            }
        };

        self.conn
            .query_row(
                &format!(
                    "SELECT AVG({c}), MIN({c}), MAX({c}) FROM {t}
                     WHERE timestamp >= ?1 AND timestamp < ?2",
                    c = column,
                    t = table
                ),
                params![start.to_rfc3339(), end.to_rfc3339()],
                |row| {
                    Ok(SampleStats {
                        avg: row.get(0)?,
                        min: row.get(1)?,
                        max: row.get(2)?,
                    })
                },
            )
            .map_err(|e| IngestError::database(format!("Failed to query sample stats: {}", e)))
    }
}

fn parse_ts(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
