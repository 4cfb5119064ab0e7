//! Per-station remote lookups with caching, a query budget and pacing.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use geo::Coord;
use log::{debug, warn};
use serde::Serialize;
use woladen_core::{
    AmenityDetails, AmenityLookup, AmenityTally, EnrichmentResult, Provenance, RuleTable, Station,
};

use super::{
    BackoffPolicy, OverpassError, OverpassTransport, Pause, ThreadPause, build_overpass_query,
    parse_elements, send_with_retry,
};
use crate::cache::{AmenityCache, CacheEntry, CacheError, cache_key};

/// Run parameters for [`RemoteBackend`].
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSettings {
    /// Search radius in metres.
    pub radius_m: u32,
    /// Maximum live lookups (successful or not) per run.
    pub query_budget: u32,
    /// Cache entries older than this many days are refreshed.
    pub refresh_days: u32,
    /// Pause after every live or failed lookup.
    pub delay: Duration,
    /// Ignore the cache and look every station up again.
    pub force_refresh: bool,
    /// Retry policy for each lookup.
    pub backoff: BackoffPolicy,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            radius_m: 100,
            query_budget: 500,
            refresh_days: 30,
            delay: Duration::from_millis(250),
            force_refresh: false,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Counters accumulated by [`RemoteBackend`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LookupStats {
    /// Live lookups attempted, including failures.
    pub queries_used: u32,
    /// Stations answered from the cache.
    pub cache_hits: u32,
    /// Stations without a usable cache entry, including deferred ones.
    pub cache_misses: u32,
    /// Stations skipped because the budget was exhausted.
    pub deferred: u32,
    /// Live lookups that failed.
    pub lookup_errors: u32,
    /// Entries in the cache after the run.
    pub cache_entries: usize,
}

/// Remote backend: cache first, then a budgeted live lookup.
pub struct RemoteBackend<T, P = ThreadPause> {
    rules: RuleTable,
    transport: T,
    pause: P,
    cache: AmenityCache,
    settings: RemoteSettings,
    now: DateTime<Utc>,
    stats: LookupStats,
}

impl<T, P> std::fmt::Debug for RemoteBackend<T, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteBackend")
            .field("settings", &self.settings)
            .field("now", &self.now)
            .field("stats", &self.stats)
            .field("cache_entries", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl<T: OverpassTransport> RemoteBackend<T, ThreadPause> {
    /// Backend that sleeps on the current thread between requests.
    ///
    /// `now` is the run's reference time: it decides cache freshness and
    /// stamps new entries.
    #[must_use]
    pub fn new(
        rules: RuleTable,
        transport: T,
        cache: AmenityCache,
        settings: RemoteSettings,
        now: DateTime<Utc>,
    ) -> Self {
        Self::with_pause(rules, transport, ThreadPause, cache, settings, now)
    }
}

impl<T: OverpassTransport, P: Pause> RemoteBackend<T, P> {
    /// Backend with an explicit [`Pause`].
    #[must_use]
    pub fn with_pause(
        rules: RuleTable,
        transport: T,
        pause: P,
        cache: AmenityCache,
        settings: RemoteSettings,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            rules,
            transport,
            pause,
            cache,
            settings,
            now,
            stats: LookupStats::default(),
        }
    }

    /// Counters so far.
    #[must_use]
    pub fn stats(&self) -> LookupStats {
        LookupStats {
            cache_entries: self.cache.len(),
            ..self.stats
        }
    }

    /// The in-memory cache.
    #[must_use]
    pub fn cache(&self) -> &AmenityCache {
        &self.cache
    }

    /// Query the service for amenities within `radius_m` of `location`.
    ///
    /// # Errors
    ///
    /// Returns [`OverpassError`] when the request fails after retries or the
    /// response cannot be decoded.
    pub fn lookup(&self, location: Coord<f64>, radius_m: u32) -> Result<AmenityLookup, OverpassError> {
        let query = build_overpass_query(&self.rules, location, radius_m);
        let response = send_with_retry(&self.transport, &query, &self.settings.backoff, &self.pause)?;
        let elements = parse_elements(&response.body)?;
        let mut tally = AmenityTally::new(&self.rules, location);
        for element in &elements {
            let categories = self.rules.classify(&element.tags);
            if categories.is_empty() {
                continue;
            }
            let details = AmenityDetails {
                name: element.tags.non_blank("name"),
                opening_hours: element.tags.non_blank("opening_hours"),
                location: element.location,
            };
            tally.record(element.element, &categories, details);
        }
        Ok(tally.finish())
    }

    /// Produce the result for one station.
    ///
    /// A usable cache entry wins. Otherwise, once the budget is spent the
    /// station is deferred without touching the network; else a live lookup
    /// runs, consuming one budget unit whether or not it succeeds, and the
    /// configured delay follows. Only successful lookups are cached.
    pub fn enrich_station(&mut self, station: &Station) -> EnrichmentResult {
        let key = cache_key(station);
        if !self.settings.force_refresh
            && let Some(entry) = self.cache.lookup(
                &key,
                self.settings.radius_m,
                self.max_age(),
                self.now,
            )
        {
            self.stats.cache_hits += 1;
            return EnrichmentResult::from_lookup(entry.to_lookup(&self.rules), Provenance::Cache);
        }

        self.stats.cache_misses += 1;
        if self.stats.queries_used >= self.settings.query_budget {
            self.stats.deferred += 1;
            debug!("deferring station {}: query budget exhausted", station.id());
            return EnrichmentResult::empty(&self.rules, Provenance::Deferred);
        }

        self.stats.queries_used += 1;
        let result = match self.lookup(station.location(), self.settings.radius_m) {
            Ok(lookup) => {
                self.cache.store(
                    key,
                    CacheEntry::from_lookup(&lookup, self.settings.radius_m, self.now),
                );
                EnrichmentResult::from_lookup(lookup, Provenance::Live)
            }
            Err(err) => {
                self.stats.lookup_errors += 1;
                warn!("amenity lookup failed for station {}: {err}", station.id());
                EnrichmentResult::empty(&self.rules, Provenance::Error)
            }
        };
        self.pause.pause(self.settings.delay);
        result
    }

    /// Persist the cache and return the final counters.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the cache file cannot be written.
    pub fn finish(&mut self) -> Result<LookupStats, CacheError> {
        self.cache.persist(self.settings.radius_m, self.now)?;
        Ok(self.stats())
    }

    fn max_age(&self) -> TimeDelta {
        TimeDelta::days(i64::from(self.settings.refresh_days))
    }
}
