//! Time-boxed weather cache with stale fallback

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info, warn};
use wcap_core::{Location, Readings, Timestamp, WeatherReading};

use crate::{CacheEntry, CacheMap, CacheStore, WeatherFetcher, WeatherResult};

/// Entries younger than this are served without a request
pub const CACHE_FRESHNESS_SECS: Timestamp = 600;

/// How a lookup was satisfied
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Cached entry inside the freshness window; no request made
    Fresh(WeatherReading),
    /// Live fetch succeeded and replaced the cache entry
    Fetched(WeatherReading),
    /// Live fetch failed; last known-good reading returned unchanged
    Stale(WeatherReading),
    /// Live fetch failed and nothing was ever cached
    Unavailable,
}

impl Lookup {
    pub fn reading(&self) -> Option<&WeatherReading> {
        match self {
            Lookup::Fresh(r) | Lookup::Fetched(r) | Lookup::Stale(r) => Some(r),
            Lookup::Unavailable => None,
        }
    }

    pub fn into_reading(self) -> Option<WeatherReading> {
        match self {
            Lookup::Fresh(r) | Lookup::Fetched(r) | Lookup::Stale(r) => Some(r),
            Lookup::Unavailable => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Lookup::Unavailable)
    }
}

/// Cache in front of a [`WeatherFetcher`], persisted through a [`CacheStore`].
///
/// A failed fetch never removes or ages out an entry; only a successful
/// fetch replaces it.
pub struct WeatherCache<F, S> {
    fetcher: F,
    store: S,
    freshness: Timestamp,
}

impl<F: WeatherFetcher, S: CacheStore> WeatherCache<F, S> {
    pub fn new(fetcher: F, store: S) -> Self {
        Self {
            fetcher,
            store,
            freshness: CACHE_FRESHNESS_SECS,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn get(&self, location: Location) -> Lookup {
        self.get_at(location, Utc::now().timestamp()).await
    }

    /// Resolve one location as of `now` (epoch seconds)
    pub async fn get_at(&self, location: Location, now: Timestamp) -> Lookup {
        let mut entries = self.load_entries();

        if let Some(reading) = self.fresh(&entries, location, now) {
            debug!(location = %location, "Weather cache hit");
            return Lookup::Fresh(reading);
        }

        let outcome = self.fetcher.fetch(location).await;
        let lookup = settle(&mut entries, location, now, outcome);
        if matches!(lookup, Lookup::Fetched(_)) {
            self.persist(updated(&entries, &[location]));
        }
        lookup
    }

    pub async fn fetch_all(&self) -> Readings {
        self.fetch_all_at(Utc::now().timestamp()).await
    }

    /// Resolve every known location. Fetches for stale locations run
    /// concurrently, and each location's outcome is independent.
    pub async fn fetch_all_at(&self, now: Timestamp) -> Readings {
        let mut entries = self.load_entries();
        let mut lookups = Vec::with_capacity(Location::ALL.len());

        let (fresh, stale): (Vec<Location>, Vec<Location>) = Location::ALL
            .into_iter()
            .partition(|loc| self.fresh(&entries, *loc, now).is_some());

        for location in fresh {
            if let Some(reading) = self.fresh(&entries, location, now) {
                debug!(location = %location, "Weather cache hit");
                lookups.push((location, Lookup::Fresh(reading)));
            }
        }

        let outcomes = join_all(stale.iter().map(|loc| self.fetcher.fetch(*loc))).await;
        let mut fetched = Vec::new();
        for (location, outcome) in stale.into_iter().zip(outcomes) {
            let lookup = settle(&mut entries, location, now, outcome);
            if matches!(lookup, Lookup::Fetched(_)) {
                fetched.push(location);
            }
            lookups.push((location, lookup));
        }

        if !fetched.is_empty() {
            self.persist(updated(&entries, &fetched));
        }

        let readings: Readings = lookups
            .into_iter()
            .filter_map(|(loc, lookup)| lookup.into_reading().map(|r| (loc, r)))
            .collect();
        info!(
            available = readings.len(),
            total = Location::ALL.len(),
            "Weather readings resolved"
        );
        readings
    }

    fn fresh(&self, entries: &CacheMap, location: Location, now: Timestamp) -> Option<WeatherReading> {
        entries
            .get(&location)
            .filter(|entry| now - entry.timestamp < self.freshness)
            .map(|entry| entry.data.clone())
    }

    fn load_entries(&self) -> CacheMap {
        match self.store.load() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Could not load weather cache, starting empty");
                CacheMap::new()
            }
        }
    }

    /// Merge `updates` into what the store holds now and save. Entries this
    /// call did not fetch are kept as stored.
    fn persist(&self, updates: CacheMap) {
        let mut entries = match self.store.load() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Weather cache unreadable, rewriting it");
                CacheMap::new()
            }
        };
        entries.extend(updates);
        if let Err(e) = self.store.save(&entries) {
            warn!(error = %e, "Could not save weather cache");
        }
    }
}

fn updated(entries: &CacheMap, locations: &[Location]) -> CacheMap {
    locations
        .iter()
        .filter_map(|loc| entries.get(loc).map(|entry| (*loc, entry.clone())))
        .collect()
}

/// Apply a fetch outcome to the cache. Age is not re-checked on failure.
fn settle(
    entries: &mut CacheMap,
    location: Location,
    now: Timestamp,
    outcome: WeatherResult<WeatherReading>,
) -> Lookup {
    match outcome {
        Ok(reading) => {
            entries.insert(
                location,
                CacheEntry {
                    timestamp: now,
                    data: reading.clone(),
                },
            );
            Lookup::Fetched(reading)
        }
        Err(e) => match entries.get(&location) {
            Some(entry) => {
                warn!(
                    location = %location,
                    error = %e,
                    age_secs = now - entry.timestamp,
                    "Weather fetch failed, using cached reading"
                );
                Lookup::Stale(entry.data.clone())
            }
            None => {
                warn!(location = %location, error = %e, "Weather fetch failed, no cached reading");
                Lookup::Unavailable
            }
        },
    }
}
