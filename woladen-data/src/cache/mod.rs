//! On-disk cache of remote amenity lookups.
//!
//! The cache is a single JSON document:
//!
//! ```json
//! {
//!   "meta": { "radius_m": 100, "schema_version": 2, "updated_at": "..." },
//!   "entries": {
//!     "52.52000,13.40500": {
//!       "checked_at": "...", "counts": { "cafe": 1 }, "examples": [], "radius_m": 100
//!     }
//!   }
//! }
//! ```
//!
//! Loading never fails on bad content: a missing, corrupt or
//! version-mismatched file yields an empty cache. Entries are only added or
//! overwritten and the whole map is written back once per run.

use std::collections::BTreeMap;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use log::{debug, warn};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use woladen_core::{
    AmenityCounts, AmenityExample, AmenityLookup, RuleTable, Station, rank_examples,
};


/// Version written to and expected in `meta.schema_version`.
pub const CACHE_SCHEMA_VERSION: u32 = 2;

/// Cache key for a station: latitude and longitude with five decimals.
///
/// # Examples
/// ```
/// use woladen_core::Station;
/// use woladen_data::cache::cache_key;
///
/// let station = Station::new("DE-1", 52.52, 13.405).expect("valid station");
/// assert_eq!(cache_key(&station), "52.52000,13.40500");
/// ```
#[must_use]
pub fn cache_key(station: &Station) -> String {
    format!("{:.5},{:.5}", station.lat(), station.lon())
}

/// A cached lookup result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// When the lookup ran. Unparsable timestamps load as the Unix epoch so
    /// the entry is kept but never fresh.
    #[serde(default = "unix_epoch", deserialize_with = "lenient_timestamp")]
    pub checked_at: DateTime<Utc>,
    /// Per-category counts as stored.
    #[serde(default)]
    pub counts: AmenityCounts,
    /// Ranked examples as stored.
    #[serde(default)]
    pub examples: Vec<AmenityExample>,
    /// Search radius the lookup used.
    pub radius_m: u32,
}

impl CacheEntry {
    /// Entry for a successful lookup performed at `checked_at`.
    #[must_use]
    pub fn from_lookup(lookup: &AmenityLookup, radius_m: u32, checked_at: DateTime<Utc>) -> Self {
        Self {
            checked_at,
            counts: lookup.counts.clone(),
            examples: lookup.examples.clone(),
            radius_m,
        }
    }

    /// Reuse the entry under `rules`: counts are re-keyed onto the current
    /// categories, examples for dropped categories are discarded and the
    /// rest are re-ranked.
    #[must_use]
    pub fn to_lookup(&self, rules: &RuleTable) -> AmenityLookup {
        let mut examples: Vec<AmenityExample> = self
            .examples
            .iter()
            .filter(|example| rules.contains(&example.category))
            .cloned()
            .collect();
        rank_examples(&mut examples);
        AmenityLookup {
            counts: self.counts.projected(rules),
            examples,
        }
    }

    fn is_usable(&self, radius_m: u32, max_age: TimeDelta, now: DateTime<Utc>) -> bool {
        self.radius_m == radius_m
            && now
                .checked_sub_signed(max_age)
                .is_none_or(|cutoff| self.checked_at >= cutoff)
    }
}

/// Errors raised while reading or writing the cache file.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The file exists but could not be read.
    #[error("failed to read amenity cache at {path}")]
    Read {
        /// Cache location.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// Encoding the cache as JSON failed.
    #[error("failed to encode amenity cache")]
    Encode {
        /// Underlying encoder failure.
        #[source]
        source: serde_json::Error,
    },
    /// Writing the cache file failed.
    #[error("failed to write amenity cache at {path}")]
    Write {
        /// Cache location.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Serialize)]
struct CacheMeta {
    radius_m: Option<u32>,
    schema_version: u32,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct CacheDocument<'a> {
    entries: &'a BTreeMap<String, CacheEntry>,
    meta: CacheMeta,
}

#[derive(Debug, Deserialize)]
struct StoredMeta {
    schema_version: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct StoredDocument {
    meta: StoredMeta,
    #[serde(default)]
    entries: BTreeMap<String, serde_json::Value>,
}

/// Key/value store of remote lookups, persisted as JSON.
#[derive(Debug, Clone, Default)]
pub struct AmenityCache {
    path: Utf8PathBuf,
    entries: BTreeMap<String, CacheEntry>,
}

impl AmenityCache {
    /// An empty cache that will persist to `path`.
    #[must_use]
    pub fn empty(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Load the cache stored at `path`.
    ///
    /// Missing files, unparsable JSON and schema mismatches all produce an
    /// empty cache; the latter two are logged at `warn`. Entries that fail to
    /// decode are dropped individually.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Read`] when the file exists but cannot be read.
    pub fn load(path: impl Into<Utf8PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        let text = match woladen_fs::read_utf8(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("no amenity cache at {path}; starting empty");
                return Ok(Self::empty(path));
            }
            Err(source) => return Err(CacheError::Read { path, source }),
        };
        let entries = decode_entries(&path, &text);
        Ok(Self { path, entries })
    }

    /// Location the cache persists to.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw entry stored under `key`, regardless of freshness.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Entry under `key` if it was produced with `radius_m` and is no older
    /// than `max_age` at `now`.
    #[must_use]
    pub fn lookup(
        &self,
        key: &str,
        radius_m: u32,
        max_age: TimeDelta,
        now: DateTime<Utc>,
    ) -> Option<&CacheEntry> {
        self.entries
            .get(key)
            .filter(|entry| entry.is_usable(radius_m, max_age, now))
    }

    /// Insert or overwrite the entry under `key`.
    pub fn store(&mut self, key: impl Into<String>, entry: CacheEntry) {
        self.entries.insert(key.into(), entry);
    }

    /// Atomically replace the cache file with the in-memory map.
    ///
    /// `radius_m` and `now` are recorded in the metadata block.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Encode`] or [`CacheError::Write`] when the
    /// document cannot be produced or written.
    pub fn persist(&self, radius_m: u32, now: DateTime<Utc>) -> Result<(), CacheError> {
        let document = CacheDocument {
            entries: &self.entries,
            meta: CacheMeta {
                radius_m: Some(radius_m),
                schema_version: CACHE_SCHEMA_VERSION,
                updated_at: now,
            },
        };
        // Round-trip through `Value` so every object is written key-sorted.
        let value =
            serde_json::to_value(&document).map_err(|source| CacheError::Encode { source })?;
        let mut bytes =
            serde_json::to_vec_pretty(&value).map_err(|source| CacheError::Encode { source })?;
        bytes.push(b'\n');
        woladen_fs::write_atomic(&self.path, &bytes).map_err(|source| CacheError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!("persisted {} amenity cache entries to {}", self.len(), self.path);
        Ok(())
    }
}

fn decode_entries(path: &Utf8Path, text: &str) -> BTreeMap<String, CacheEntry> {
    let document: StoredDocument = match serde_json::from_str(text) {
        Ok(document) => document,
        Err(err) => {
            warn!("discarding corrupt amenity cache at {path}: {err}");
            return BTreeMap::new();
        }
    };
    let version = document
        .meta
        .schema_version
        .as_ref()
        .and_then(serde_json::Value::as_u64);
    if version != Some(u64::from(CACHE_SCHEMA_VERSION)) {
        warn!(
            "discarding amenity cache at {path}: schema version {} does not match {CACHE_SCHEMA_VERSION}",
            document
                .meta
                .schema_version
                .map_or_else(|| "null".to_owned(), |value| value.to_string())
        );
        return BTreeMap::new();
    }
    document
        .entries
        .into_iter()
        .filter_map(|(key, raw)| match serde_json::from_value::<CacheEntry>(raw) {
            Ok(entry) => Some((key, entry)),
            Err(err) => {
                warn!("dropping malformed amenity cache entry {key:?}: {err}");
                None
            }
        })
        .collect()
}

fn unix_epoch() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(parse_timestamp)
        .unwrap_or_else(unix_epoch))
}

/// Parse RFC 3339 timestamps, treating offset-less values as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
