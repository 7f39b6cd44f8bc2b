//! Durable backing for the weather cache

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use wcap_core::{Location, Timestamp, WeatherReading};

use crate::{WeatherError, WeatherResult};

/// One cached reading and when it was fetched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Epoch seconds; fractional values in older files are truncated
    #[serde(deserialize_with = "epoch_seconds")]
    pub timestamp: Timestamp,
    pub data: WeatherReading,
}

fn epoch_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Timestamp, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Epoch {
        Whole(i64),
        Fractional(f64),
    }

    Ok(match Epoch::deserialize(deserializer)? {
        Epoch::Whole(secs) => secs,
        Epoch::Fractional(secs) => secs.trunc() as Timestamp,
    })
}

/// Location id -> entry, the on-disk layout
pub type CacheMap = BTreeMap<Location, CacheEntry>;

/// Whole-map load/save; the cache never needs finer access
pub trait CacheStore: Send + Sync {
    fn load(&self) -> WeatherResult<CacheMap>;

    fn save(&self, entries: &CacheMap) -> WeatherResult<()>;
}

/// JSON file under `<output root>/metadata/`
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub const FILE_NAME: &'static str = "weather_cache.json";

    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Store at the conventional location inside an output root
    pub fn in_output_root<P: AsRef<Path>>(root: P) -> Self {
        Self::new(root.as_ref().join("metadata").join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheStore for JsonFileStore {
    fn load(&self) -> WeatherResult<CacheMap> {
        if !self.path.exists() {
            return Ok(CacheMap::new());
        }
        let raw = fs::read_to_string(&self.path)
            .map_err(|e| WeatherError::Store(format!("{}: {}", self.path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| WeatherError::Store(format!("{}: {}", self.path.display(), e)))
    }

    fn save(&self, entries: &CacheMap) -> WeatherResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| WeatherError::Store(e.to_string()))?;
        }
        let json =
            serde_json::to_string_pretty(entries).map_err(|e| WeatherError::Store(e.to_string()))?;

        // Write-then-rename: readers never see a half-written file
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| WeatherError::Store(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| WeatherError::Store(e.to_string()))?;
        Ok(())
    }
}

/// Process-local store, for tests and ephemeral runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<CacheMap>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: CacheMap) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }

    /// Copy of the current contents
    pub fn snapshot(&self) -> CacheMap {
        self.entries
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl CacheStore for MemoryStore {
    fn load(&self) -> WeatherResult<CacheMap> {
        self.entries
            .lock()
            .map(|guard| guard.clone())
            .map_err(|e| WeatherError::Store(e.to_string()))
    }

    fn save(&self, entries: &CacheMap) -> WeatherResult<()> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| WeatherError::Store(e.to_string()))?;
        *guard = entries.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_reading;

    fn entry(location: Location, timestamp: Timestamp) -> CacheEntry {
        CacheEntry {
            timestamp,
            data: build_reading(
                location,
                Some(12.3),
                Some("2024-12-16T07:45"),
                Some("2024-12-16T18:10"),
                timestamp,
            ),
        }
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::in_output_root(dir.path());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::in_output_root(dir.path());
        let mut entries = CacheMap::new();
        entries.insert(Location::Alicante, entry(Location::Alicante, 1_000));
        store.save(&entries).unwrap();

        assert_eq!(
            store.path(),
            dir.path().join("metadata").join("weather_cache.json")
        );
        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["alicante"]["timestamp"], 1_000);
        assert_eq!(raw["alicante"]["data"]["temperature"], 12.3);
        assert_eq!(store.load().unwrap(), entries);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::in_output_root(dir.path());
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{not json").unwrap();
        assert!(matches!(store.load(), Err(WeatherError::Store(_))));
    }

    #[test]
    fn test_fractional_timestamps_load_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::in_output_root(dir.path());
        let mut entries = CacheMap::new();
        entries.insert(Location::Alicante, entry(Location::Alicante, 1_000));
        store.save(&entries).unwrap();

        let mut raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        raw["alicante"]["timestamp"] = serde_json::json!(1734345600.987);
        fs::write(store.path(), raw.to_string()).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded[&Location::Alicante].timestamp, 1_734_345_600);
        assert_eq!(loaded[&Location::Alicante].data, entries[&Location::Alicante].data);
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        let mut entries = CacheMap::new();
        entries.insert(Location::Bratislava, entry(Location::Bratislava, 5));
        store.save(&entries).unwrap();
        assert_eq!(store.load().unwrap(), entries);
        assert_eq!(store.snapshot(), entries);
    }
}
