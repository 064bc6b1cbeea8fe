//! End-to-end batch ingestion tests over temporary directories and an
//! in-memory store

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Duration, TimeZone, Utc};

use garmin_ingest::batch::{BatchDriver, BatchStats, IngestContext, Selection};
use garmin_ingest::extract::fit::{FitDecoder, FitMessage};
use garmin_ingest::fields::FieldMap;
use garmin_ingest::store::{EntityKind, GarminStore};
use garmin_ingest::Result;

fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(content.as_bytes()).unwrap();
    path
}

fn running_json(activity_id: i64, sub_sport: &str) -> String {
    format!(
        r#"{{
            "activityId": {activity_id},
            "activityName": "Morning Run",
            "eventType": {{"key": "uncategorized", "display": "Uncategorized"}},
            "activityType": {{"key": "{sub_sport}", "parent": {{"key": "running"}}}},
            "activitySummary": {{
                "BeginTimestamp": {{"value": "2017-05-01T06:30:00.000Z"}},
                "EndTimestamp": {{"value": "2017-05-01T07:15:00.000Z"}},
                "SumDistance": {{"value": 8.05}},
                "WeightedMeanHeartRate": {{"value": 152.0}},
                "MaxHeartRate": {{"value": 181.0}},
                "SumStep": {{"value": 8200.0}},
                "WeightedMeanPace": {{"display": "5:35"}},
                "MaxPace": {{"display": "4:10"}},
                "DirectVO2Max": {{"value": 52.0}}
            }}
        }}"#
    )
}

fn tcx_file() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<TrainingCenterDatabase xmlns="http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2">
  <Activities>
    <Activity Sport="Running">
      <Id>2017-05-02T06:30:00.000Z</Id>
      <Lap StartTime="2017-05-02T06:30:00.000Z">
        <DistanceMeters>5000.0</DistanceMeters>
        <Calories>300</Calories>
        <Track>
          <Trackpoint>
            <Time>2017-05-02T06:30:00.000Z</Time>
            <HeartRateBpm><Value>130</Value></HeartRateBpm>
          </Trackpoint>
          <Trackpoint>
            <Time>2017-05-02T07:00:00.000Z</Time>
            <HeartRateBpm><Value>150</Value></HeartRateBpm>
          </Trackpoint>
        </Track>
      </Lap>
      <Creator>
        <Name>Garmin Forerunner 230</Name>
        <UnitId>3907868574</UnitId>
      </Creator>
    </Activity>
  </Activities>
</TrainingCenterDatabase>"#
}

fn run_batch(store: &GarminStore, dir: &Path) -> BatchStats {
    let driver = BatchDriver::new(store, IngestContext::default());
    driver
        .run(&Selection::Directory {
            root: dir.to_path_buf(),
            latest: false,
        })
        .unwrap()
}

#[test]
fn test_json_ingestion_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "1001.json", &running_json(1001, "running"));

    let store = GarminStore::open_in_memory().unwrap();
    let stats = run_batch(&store, dir.path());
    assert_eq!(stats, BatchStats { processed: 1, skipped: 0 });

    let first = store.activity(1001).unwrap().unwrap();
    let first_pace = store
        .text_field(EntityKind::RunActivity, 1001, "avg_pace")
        .unwrap();

    let stats = run_batch(&store, dir.path());
    assert_eq!(stats.processed, 1);

    let second = store.activity(1001).unwrap().unwrap();
    assert_eq!(first.name, second.name);
    assert_eq!(first.distance, second.distance);
    assert_eq!(first.avg_hr, second.avg_hr);
    assert_eq!(
        first_pace,
        store.text_field(EntityKind::RunActivity, 1001, "avg_pace").unwrap()
    );
    assert_eq!(store.row_count(EntityKind::Activity).unwrap(), 1);
    assert_eq!(store.row_count(EntityKind::RunActivity).unwrap(), 1);
    assert_eq!(store.row_count(EntityKind::File).unwrap(), 1);
}

#[test]
fn test_treadmill_alias_matches_running() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    write_file(dir_a.path(), "1.json", &running_json(1, "running"));
    write_file(dir_b.path(), "1.json", &running_json(1, "treadmill_running"));

    let store_a = GarminStore::open_in_memory().unwrap();
    let store_b = GarminStore::open_in_memory().unwrap();
    run_batch(&store_a, dir_a.path());
    run_batch(&store_b, dir_b.path());

    for column in ["steps", "vo2_max"] {
        assert_eq!(
            store_a.float_field(EntityKind::RunActivity, 1, column).unwrap(),
            store_b.float_field(EntityKind::RunActivity, 1, column).unwrap(),
        );
    }
    assert_eq!(
        store_a.text_field(EntityKind::RunActivity, 1, "avg_pace").unwrap(),
        store_b.text_field(EntityKind::RunActivity, 1, "avg_pace").unwrap(),
    );
}

#[test]
fn test_unknown_sport_keeps_base_record() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "7.json",
        &running_json(7, "underwater_basket_weaving"),
    );

    let store = GarminStore::open_in_memory().unwrap();
    let stats = run_batch(&store, dir.path());
    assert_eq!(stats, BatchStats { processed: 1, skipped: 0 });

    let activity = store.activity(7).unwrap().unwrap();
    assert_eq!(activity.name.as_deref(), Some("Morning Run"));
    assert_eq!(activity.distance, Some(8.05));
    assert_eq!(activity.sub_sport.as_deref(), Some("underwater_basket_weaving"));

    assert_eq!(store.row_count(EntityKind::RunActivity).unwrap(), 0);
    assert_eq!(store.row_count(EntityKind::WalkActivity).unwrap(), 0);
}

#[test]
fn test_bad_identity_does_not_stop_batch() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "abc.tcx", tcx_file());
    write_file(dir.path(), "123456789.tcx", tcx_file());
    write_file(dir.path(), "1001.json", &running_json(1001, "running"));

    let store = GarminStore::open_in_memory().unwrap();
    let stats = run_batch(&store, dir.path());
    assert_eq!(stats, BatchStats { processed: 2, skipped: 1 });

    // The well-formed files made it through
    assert!(store.activity(123456789).unwrap().is_some());
    assert!(store.activity(1001).unwrap().is_some());
    assert!(store.file("abc.tcx").unwrap().is_none());
}

#[test]
fn test_tcx_creates_device_file_and_activity() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "123456789.tcx", tcx_file());

    let store = GarminStore::open_in_memory().unwrap();
    run_batch(&store, dir.path());

    let device = store.device(3907868574).unwrap().unwrap();
    assert_eq!(device.manufacturer.as_deref(), Some("Garmin"));
    assert_eq!(device.product.as_deref(), Some("Garmin Forerunner 230"));

    let file = store.file("123456789.tcx").unwrap().unwrap();
    assert_eq!(file.kind, "tcx");
    assert_eq!(file.serial_number, Some(3907868574));

    let activity = store.activity(123456789).unwrap().unwrap();
    assert_eq!(activity.distance, Some(5.0));
    assert_eq!(activity.avg_hr, Some(140.0));
    assert_eq!(activity.laps, Some(1));
}

#[test]
fn test_zero_hr_does_not_erase_stored_value() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "123456789.tcx", tcx_file());

    let store = GarminStore::open_in_memory().unwrap();
    run_batch(&store, dir.path());
    assert_eq!(store.activity(123456789).unwrap().unwrap().avg_hr, Some(140.0));

    // Same activity re-exported with dead heart-rate data
    let zeroed = tcx_file()
        .replace("<Value>130</Value>", "<Value>0</Value>")
        .replace("<Value>150</Value>", "<Value>0</Value>");
    write_file(dir.path(), "123456789.tcx", &zeroed);
    run_batch(&store, dir.path());

    // Current policy: the zero average is treated as unreported
    assert_eq!(store.activity(123456789).unwrap().unwrap().avg_hr, Some(140.0));
}

#[test]
fn test_latest_mode_uses_high_water_mark() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "1001.json", &running_json(1001, "running"));

    let store = GarminStore::open_in_memory().unwrap();

    // Pretend an activity far in the future was already ingested
    let mut map = FieldMap::new();
    map.insert("activity_id", 1i64.into());
    map.insert("start_time", (Utc::now() + Duration::days(3650)).into());
    store.merge(EntityKind::Activity, &map).unwrap();

    let driver = BatchDriver::new(&store, IngestContext::default());
    let stats = driver
        .run(&Selection::Directory {
            root: dir.path().to_path_buf(),
            latest: true,
        })
        .unwrap();
    assert_eq!(stats, BatchStats { processed: 0, skipped: 0 });

    // Without the high-water mark the file is picked up
    let stats = run_batch(&store, dir.path());
    assert_eq!(stats.processed, 1);
}

struct FakeDecoder;

impl FitDecoder for FakeDecoder {
    fn decode(&self, _path: &Path) -> Result<Vec<FitMessage>> {
        Ok(vec![
            FitMessage::FileId {
                serial_number: Some(555),
                manufacturer: Some("Garmin".into()),
                product: Some("Fenix 3".into()),
                time_created: Some(Utc.with_ymd_and_hms(2017, 5, 3, 8, 0, 0).unwrap()),
            },
            FitMessage::DeviceInfo {
                timestamp: Utc.with_ymd_and_hms(2017, 5, 3, 8, 0, 0).unwrap(),
                serial_number: Some(555),
                software_version: Some("7.10".into()),
                hardware_version: Some("2.30".into()),
            },
        ])
    }
}

#[test]
fn test_fit_files_flow_through_injected_decoder() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "track_1.fit", "binary goes here");

    let store = GarminStore::open_in_memory().unwrap();
    let driver =
        BatchDriver::new(&store, IngestContext::default()).with_decoder(Box::new(FakeDecoder));
    let stats = driver
        .run(&Selection::Directory {
            root: dir.path().to_path_buf(),
            latest: false,
        })
        .unwrap();
    assert_eq!(stats, BatchStats { processed: 1, skipped: 0 });

    let device = store.device(555).unwrap().unwrap();
    assert_eq!(device.hardware_version.as_deref(), Some("2.30"));
    assert_eq!(store.file("track_1.fit").unwrap().unwrap().kind, "fit");
    assert_eq!(store.row_count(EntityKind::DeviceInfo).unwrap(), 1);
}

#[test]
fn test_fit_without_decoder_is_skipped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "track_1.fit", "binary goes here");
    write_file(dir.path(), "1001.json", &running_json(1001, "running"));

    let store = GarminStore::open_in_memory().unwrap();
    let stats = run_batch(&store, dir.path());
    assert_eq!(stats, BatchStats { processed: 1, skipped: 1 });
    assert!(store.activity(1001).unwrap().is_some());
}
