//! Database row and image file written for the same capture

use chrono::NaiveDate;
use wcap_core::{CaptureRecord, CaptureSink, Location, Readings, WeatherReading};
use wcap_sinks::{FanoutSink, FsSink, SinkError, SqliteSink};

fn record(hour: u32) -> CaptureRecord {
    let mut readings = Readings::new();
    readings.insert(
        Location::Alicante,
        WeatherReading {
            location: Location::Alicante,
            temperature_c: 18.4,
            sunrise: "08:12".to_string(),
            sunset: "17:55".to_string(),
            day_length: "9h 43m".to_string(),
            observed_at: 0,
            sunrise_iso: "2024-12-15T08:12".to_string(),
            sunset_iso: "2024-12-15T17:55".to_string(),
        },
    );
    CaptureRecord {
        captured_at: NaiveDate::from_ymd_opt(2024, 12, 15)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap(),
        image: vec![0xFF, 0xD8, 0xFF, 0xD9],
        image_format: "jpeg".to_string(),
        width: 800,
        height: 450,
        readings,
    }
}

#[tokio::test]
async fn test_fanout_writes_row_and_file() {
    let dir = tempfile::tempdir().unwrap();
    let db = SqliteSink::open(dir.path().join("captures.db")).unwrap();
    let sink = FanoutSink::new(vec![Box::new(db.clone()), Box::new(FsSink::new(dir.path()))]);

    let id = sink.store(&record(9)).await.unwrap();

    assert_eq!(sink.primary(), Some(db.name()));
    let row = db.get(id).unwrap().unwrap();
    assert_eq!(row.weather[&Location::Alicante].sunrise.as_deref(), Some("08:12"));
    assert!(!row.weather.contains_key(&Location::Bratislava));
    assert!(dir.path().join("images/2024-12-15/09-00-00.jpg").exists());
}

#[tokio::test]
async fn test_duplicate_everywhere_surfaces_duplicate() {
    let dir = tempfile::tempdir().unwrap();
    let db = SqliteSink::open(dir.path().join("captures.db")).unwrap();
    let sink = FanoutSink::new(vec![Box::new(db.clone()), Box::new(FsSink::new(dir.path()))]);

    sink.store(&record(9)).await.unwrap();
    let err = sink.store(&record(9)).await.unwrap_err();

    assert!(matches!(err.downcast_ref::<SinkError>(), Some(SinkError::Duplicate { .. })));
    assert_eq!(db.count().unwrap(), 1);
}
