//! `captures` table in a SQLite file

use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument};
use wcap_core::{CaptureRecord, CaptureSink, Location};

use crate::{date_key, time_key, SinkError, SinkResult};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS captures (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    capture_date TEXT NOT NULL,
    capture_time TEXT NOT NULL,
    captured_at TEXT NOT NULL,
    image_data BLOB NOT NULL,
    image_format TEXT NOT NULL DEFAULT 'jpeg',
    width INTEGER NOT NULL,
    height INTEGER NOT NULL,
    alicante_temp REAL,
    alicante_sunrise TEXT,
    alicante_sunset TEXT,
    alicante_day_length TEXT,
    bratislava_temp REAL,
    bratislava_sunrise TEXT,
    bratislava_sunset TEXT,
    bratislava_day_length TEXT,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE (capture_date, capture_time)
);
CREATE INDEX IF NOT EXISTS idx_captures_date ON captures (capture_date);
";

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Weather columns of one location as stored
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredWeather {
    pub temperature: Option<f64>,
    pub sunrise: Option<String>,
    pub sunset: Option<String>,
    pub day_length: Option<String>,
}

/// A row of the `captures` table
#[derive(Debug, Clone, PartialEq)]
pub struct StoredCapture {
    pub id: i64,
    pub capture_date: NaiveDate,
    pub capture_time: NaiveTime,
    pub captured_at: NaiveDateTime,
    pub image: Vec<u8>,
    pub image_format: String,
    pub width: u32,
    pub height: u32,
    pub weather: BTreeMap<Location, StoredWeather>,
}

/// SQLite-backed capture store. The connection is shared behind a mutex and
/// used from blocking tasks.
#[derive(Clone)]
pub struct SqliteSink {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSink {
    pub fn open<P: AsRef<Path>>(path: P) -> SinkResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path.as_ref())?;
        info!(path = %path.as_ref().display(), "Capture database opened");
        Self::with_connection(conn)
    }

    pub fn in_memory() -> SinkResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> SinkResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn with_conn<T>(conn: &Mutex<Connection>, f: impl FnOnce(&Connection) -> SinkResult<T>) -> SinkResult<T> {
        let guard = conn
            .lock()
            .map_err(|_| SinkError::Task("database connection poisoned".to_string()))?;
        f(&guard)
    }

    /// Insert one capture and return its row id
    pub fn insert_sync(&self, record: &CaptureRecord) -> SinkResult<i64> {
        Self::with_conn(&self.conn, |conn| insert(conn, record))
    }

    pub fn get(&self, id: i64) -> SinkResult<Option<StoredCapture>> {
        Self::with_conn(&self.conn, |conn| {
            conn.query_row(
                "SELECT id, capture_date, capture_time, captured_at, image_data, image_format,
                        width, height,
                        alicante_temp, alicante_sunrise, alicante_sunset, alicante_day_length,
                        bratislava_temp, bratislava_sunrise, bratislava_sunset, bratislava_day_length
                 FROM captures WHERE id = ?1",
                params![id],
                row_to_capture,
            )
            .optional()
            .map_err(SinkError::from)
        })
    }

    pub fn count(&self) -> SinkResult<i64> {
        Self::with_conn(&self.conn, |conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM captures", [], |r| r.get(0))?)
        })
    }

    /// Row ids captured on `date`, oldest first
    pub fn ids_for_date(&self, date: NaiveDate) -> SinkResult<Vec<i64>> {
        Self::with_conn(&self.conn, |conn| {
            let mut stmt =
                conn.prepare("SELECT id FROM captures WHERE capture_date = ?1 ORDER BY capture_time ASC")?;
            let ids = stmt
                .query_map(params![date_key(date)], |r| r.get(0))?
                .collect::<Result<Vec<i64>, _>>()?;
            Ok(ids)
        })
    }
}

fn insert(conn: &Connection, record: &CaptureRecord) -> SinkResult<i64> {
    let weather = |loc: Location| record.reading(loc);
    let ali = weather(Location::Alicante);
    let bra = weather(Location::Bratislava);

    let result = conn.execute(
        "INSERT INTO captures (
            capture_date, capture_time, captured_at, image_data, image_format, width, height,
            alicante_temp, alicante_sunrise, alicante_sunset, alicante_day_length,
            bratislava_temp, bratislava_sunrise, bratislava_sunset, bratislava_day_length
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            date_key(record.capture_date()),
            time_key(record.capture_time()),
            record.captured_at.format(DATETIME_FORMAT).to_string(),
            record.image,
            record.image_format,
            record.width,
            record.height,
            ali.map(|r| r.temperature_c),
            ali.map(|r| r.sunrise.as_str()),
            ali.map(|r| r.sunset.as_str()),
            ali.map(|r| r.day_length.as_str()),
            bra.map(|r| r.temperature_c),
            bra.map(|r| r.sunrise.as_str()),
            bra.map(|r| r.sunset.as_str()),
            bra.map(|r| r.day_length.as_str()),
        ],
    );

    match result {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Err(SinkError::Duplicate {
                date: record.capture_date(),
                time: record.capture_time(),
            })
        }
        Err(e) => Err(e.into()),
    }
}

fn parse_column<T>(idx: usize, raw: &str, parse: impl FnOnce(&str) -> chrono::ParseResult<T>) -> rusqlite::Result<T> {
    parse(raw).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

fn row_to_capture(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredCapture> {
    let date: String = row.get(1)?;
    let time: String = row.get(2)?;
    let at: String = row.get(3)?;

    let stored = |base: usize| -> rusqlite::Result<StoredWeather> {
        Ok(StoredWeather {
            temperature: row.get(base)?,
            sunrise: row.get(base + 1)?,
            sunset: row.get(base + 2)?,
            day_length: row.get(base + 3)?,
        })
    };
    let mut weather = BTreeMap::new();
    for (location, base) in [(Location::Alicante, 8), (Location::Bratislava, 12)] {
        let w = stored(base)?;
        if w != StoredWeather::default() {
            weather.insert(location, w);
        }
    }

    Ok(StoredCapture {
        id: row.get(0)?,
        capture_date: parse_column(1, &date, |s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))?,
        capture_time: parse_column(2, &time, |s| NaiveTime::parse_from_str(s, "%H:%M:%S"))?,
        captured_at: parse_column(3, &at, |s| NaiveDateTime::parse_from_str(s, DATETIME_FORMAT))?,
        image: row.get(4)?,
        image_format: row.get(5)?,
        width: row.get(6)?,
        height: row.get(7)?,
        weather,
    })
}

#[async_trait::async_trait]
impl CaptureSink for SqliteSink {
    fn name(&self) -> &str {
        "sqlite"
    }

    #[instrument(skip(self, record), fields(captured_at = %record.captured_at))]
    async fn store(&self, record: &CaptureRecord) -> Result<i64> {
        let conn = Arc::clone(&self.conn);
        let record = record.clone();
        let id = tokio::task::spawn_blocking(move || Self::with_conn(&conn, |c| insert(c, &record)))
            .await
            .map_err(|e| SinkError::Task(e.to_string()))??;
        debug!(id, "Capture row inserted");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{both, reading, record};
    use wcap_core::Readings;

    #[test]
    fn test_insert_and_read_back() {
        let sink = SqliteSink::in_memory().unwrap();
        let id = sink.insert_sync(&both("2024-12-15 10:20:30")).unwrap();

        let row = sink.get(id).unwrap().unwrap();
        assert_eq!(row.capture_date, NaiveDate::from_ymd_opt(2024, 12, 15).unwrap());
        assert_eq!(row.capture_time, NaiveTime::from_hms_opt(10, 20, 30).unwrap());
        assert_eq!((row.width, row.height), (800, 450));
        assert_eq!(row.image_format, "jpeg");
        assert_eq!(row.image[..2], [0xFF, 0xD8]);
        assert_eq!(row.weather[&Location::Alicante].temperature, Some(22.0));
        assert_eq!(row.weather[&Location::Bratislava].day_length.as_deref(), Some("10h 25m"));
    }

    #[test]
    fn test_duplicate_slot_is_rejected() {
        let sink = SqliteSink::in_memory().unwrap();
        sink.insert_sync(&both("2024-12-15 10:20:30")).unwrap();

        let err = sink.insert_sync(&both("2024-12-15 10:20:30")).unwrap_err();
        assert!(matches!(err, SinkError::Duplicate { .. }));
        assert_eq!(sink.count().unwrap(), 1);
    }

    #[test]
    fn test_missing_location_leaves_columns_null() {
        let sink = SqliteSink::in_memory().unwrap();
        let mut readings = Readings::new();
        readings.insert(Location::Bratislava, reading(Location::Bratislava, -3.5));
        let id = sink.insert_sync(&record("2025-01-02 08:00:00", readings)).unwrap();

        let row = sink.get(id).unwrap().unwrap();
        assert!(!row.weather.contains_key(&Location::Alicante));
        assert_eq!(row.weather[&Location::Bratislava].temperature, Some(-3.5));
    }

    #[test]
    fn test_get_unknown_id() {
        let sink = SqliteSink::in_memory().unwrap();
        assert!(sink.get(42).unwrap().is_none());
    }

    #[test]
    fn test_ids_for_date_in_time_order() {
        let sink = SqliteSink::in_memory().unwrap();
        let late = sink.insert_sync(&both("2024-12-15 18:00:00")).unwrap();
        let early = sink.insert_sync(&both("2024-12-15 06:00:00")).unwrap();
        sink.insert_sync(&both("2024-12-16 06:00:00")).unwrap();

        let ids = sink
            .ids_for_date(NaiveDate::from_ymd_opt(2024, 12, 15).unwrap())
            .unwrap();
        assert_eq!(ids, vec![early, late]);
    }

    #[tokio::test]
    async fn test_store_through_port() {
        let dir = tempfile::tempdir().unwrap();
        let sink = SqliteSink::open(dir.path().join("db").join("captures.db")).unwrap();

        let id = sink.store(&both("2024-12-15 10:20:30")).await.unwrap();
        assert_eq!(id, 1);

        let err = sink.store(&both("2024-12-15 10:20:30")).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<SinkError>(), Some(SinkError::Duplicate { .. })));
    }
}
