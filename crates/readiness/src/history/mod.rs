//! Local report history
//!
//! A capped, newest-first list of reports kept in a [`KeyValueStore`]. Reads
//! never fail: a missing, unreadable or corrupt payload is an empty history.
//! Writes are last-write-wins; two writers sharing one store (two open tabs,
//! two CLI processes) can lose each other's updates.

mod kv;
pub mod schema;

pub use kv::{FileStore, KeyValueStore, MemoryStore};

use crate::report::Report;
use pressready_common::{Error, Result};
use schema::{
    HistoryDocument, HISTORY_KEY, LEGACY_CARDS_KEY, LEGACY_HISTORY_KEY, LEGACY_SNAPSHOT_KEY,
};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Keys older releases stored history under, in migration order
const LEGACY_KEYS: [&str; 3] = [LEGACY_HISTORY_KEY, LEGACY_CARDS_KEY, LEGACY_SNAPSHOT_KEY];

/// Legacy keys found in the store and the reports they decoded to
#[derive(Default)]
struct LegacyPayloads {
    keys: Vec<&'static str>,
    reports: Vec<Report>,
}

/// Default number of reports kept
pub const DEFAULT_MAX_ENTRIES: usize = 20;

/// History settings
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Key the current document is stored under
    pub storage_key: String,

    /// Maximum number of reports kept
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            storage_key: HISTORY_KEY.to_string(),
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl HistoryConfig {
    pub fn with_max_entries(max_entries: usize) -> Result<Self> {
        let config = Self {
            max_entries,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(Error::InvalidInput(
                "history must keep at least one report".to_string(),
            ));
        }
        if self.storage_key.trim().is_empty() {
            return Err(Error::InvalidInput("history storage key is empty".to_string()));
        }
        Ok(())
    }
}

/// Report history over an injected key-value store
pub struct HistoryStore<S: KeyValueStore> {
    store: S,
    config: HistoryConfig,
}

impl<S: KeyValueStore> HistoryStore<S> {
    /// History with the default key and cap
    pub fn new(store: S) -> Self {
        Self {
            store,
            config: HistoryConfig::default(),
        }
    }

    pub fn with_config(store: S, config: HistoryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// All stored reports, newest first, deduplicated and capped.
    ///
    /// Migrates legacy payloads on the way. Never fails.
    pub fn load(&self) -> Vec<Report> {
        let mut reports = self.read_current();

        let legacy = self.read_legacy();
        if legacy.keys.is_empty() {
            return normalize(reports, self.config.max_entries);
        }

        if legacy.reports.is_empty() {
            debug!("Discarding unreadable legacy history");
            self.remove_legacy(&legacy.keys);
            return normalize(reports, self.config.max_entries);
        }

        info!("Migrated {} legacy report(s) into history", legacy.reports.len());
        reports.extend(legacy.reports);
        let reports = normalize(reports, self.config.max_entries);

        if let Err(e) = self.persist(&reports) {
            warn!("Failed to persist migrated history: {}", e);
            return reports;
        }
        self.remove_legacy(&legacy.keys);

        reports
    }

    /// Add a report, replacing any earlier copy of it, and return the new history
    pub fn save(&self, report: Report) -> Result<Vec<Report>> {
        let mut reports = Vec::with_capacity(self.config.max_entries + 1);
        reports.push(report);
        reports.extend(self.load());

        let reports = normalize(reports, self.config.max_entries);
        self.persist(&reports)?;
        Ok(reports)
    }

    /// Remove one report and return what remains
    pub fn delete_by_id(&self, id: &str) -> Result<Vec<Report>> {
        let mut reports = self.load();
        let before = reports.len();
        reports.retain(|r| r.id != id);

        if reports.len() != before {
            debug!("Deleted report {}", id);
        }
        self.persist(&reports)?;
        Ok(reports)
    }

    /// Forget every report
    pub fn clear(&self) -> Result<()> {
        self.store.remove(&self.config.storage_key)?;
        for key in LEGACY_KEYS {
            self.store.remove(key)?;
        }
        info!("Cleared report history");
        Ok(())
    }

    pub fn get_by_id(&self, id: &str) -> Option<Report> {
        self.load().into_iter().find(|r| r.id == id)
    }

    pub fn get_latest(&self) -> Option<Report> {
        self.load().into_iter().next()
    }

    fn persist(&self, reports: &[Report]) -> Result<()> {
        let json = HistoryDocument::new(reports.to_vec()).to_json()?;
        self.store.set(&self.config.storage_key, &json)
    }

    fn read_current(&self) -> Vec<Report> {
        let raw = match self.store.get(&self.config.storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("History storage unavailable: {}", e);
                return Vec::new();
            }
        };

        match schema::decode_document(&raw) {
            Ok(decoded) => {
                if decoded.dropped > 0 {
                    debug!("Dropped {} unreadable report(s)", decoded.dropped);
                }
                decoded.reports
            }
            Err(e) => {
                warn!("Discarding corrupt history: {}", e);
                if let Err(e) = self.store.remove(&self.config.storage_key) {
                    warn!("Failed to reset corrupt history: {}", e);
                }
                Vec::new()
            }
        }
    }

    fn read_legacy(&self) -> LegacyPayloads {
        let mut legacy = LegacyPayloads::default();

        for key in LEGACY_KEYS {
            let Some(raw) = self.read_key(key) else {
                continue;
            };
            legacy.keys.push(key);
            match key {
                LEGACY_HISTORY_KEY => legacy.reports.extend(schema::decode_entries_v1(&raw)),
                LEGACY_CARDS_KEY => legacy.reports.extend(schema::decode_cards_v1(&raw)),
                _ => legacy.reports.extend(schema::decode_snapshot_v0(&raw)),
            }
        }

        legacy
    }

    fn remove_legacy(&self, keys: &[&'static str]) {
        for key in keys {
            if let Err(e) = self.store.remove(key) {
                warn!("Failed to remove legacy key {}: {}", key, e);
            }
        }
    }

    fn read_key(&self, key: &str) -> Option<String> {
        self.store
            .get(key)
            .map_err(|e| debug!("Cannot read {}: {}", key, e))
            .ok()
            .flatten()
    }
}

/// Drop duplicates (first occurrence wins), order newest first, apply the cap.
///
/// Reports are duplicates when they share an id, or a file name and
/// creation time.
pub fn normalize(reports: Vec<Report>, max_entries: usize) -> Vec<Report> {
    let mut seen_ids = HashSet::new();
    let mut seen_runs = HashSet::new();

    let mut unique: Vec<Report> = reports
        .into_iter()
        .filter(|r| {
            let new_id = seen_ids.insert(r.id.clone());
            let new_run = seen_runs.insert((r.file_name.clone(), r.created_at));
            new_id && new_run
        })
        .collect();

    unique.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    unique.truncate(max_entries);
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::evaluate;
    use crate::intake::{CheckInput, PrintConfig};
    use chrono::{Duration, Utc};

    fn report(file: &str, minutes_ago: i64) -> Report {
        let input = CheckInput::new(file, None, 2400, 2400, PrintConfig::default()).unwrap();
        let mut report = Report::new(&input, evaluate(&input));
        report.created_at = Utc::now() - Duration::minutes(minutes_ago);
        report.rederive()
    }

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(Error::Storage("storage disabled".to_string()))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(Error::Storage("storage disabled".to_string()))
        }

        fn remove(&self, _key: &str) -> Result<()> {
            Err(Error::Storage("storage disabled".to_string()))
        }
    }

    #[test]
    fn test_empty_store_loads_empty() {
        let history = HistoryStore::new(MemoryStore::new());
        assert!(history.load().is_empty());
        assert!(history.get_latest().is_none());
    }

    #[test]
    fn test_unavailable_storage_degrades() {
        let history = HistoryStore::new(BrokenStore);
        assert!(history.load().is_empty());
        assert!(history.get_by_id("anything").is_none());
        assert!(history.save(report("a.png", 0)).is_err());
    }

    #[test]
    fn test_corrupt_payload_is_reset() {
        let store = MemoryStore::new();
        store.set(HISTORY_KEY, "{ not json").unwrap();

        let history = HistoryStore::new(&store);
        assert!(history.load().is_empty());
        assert_eq!(store.get(HISTORY_KEY).unwrap(), None);
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let history = HistoryStore::new(MemoryStore::new());
        let saved = report("front.png", 0);
        history.save(saved.clone()).unwrap();

        let loaded = history.get_by_id(&saved.id).unwrap();
        assert_eq!(loaded, saved);
    }

    #[test]
    fn test_newest_first() {
        let history = HistoryStore::new(MemoryStore::new());
        history.save(report("old.png", 30)).unwrap();
        history.save(report("new.png", 1)).unwrap();
        history.save(report("middle.png", 10)).unwrap();

        let names: Vec<String> = history.load().into_iter().map(|r| r.file_name).collect();
        assert_eq!(names, vec!["new.png", "middle.png", "old.png"]);
        assert_eq!(history.get_latest().unwrap().file_name, "new.png");
    }

    #[test]
    fn test_cap_is_enforced() {
        let config = HistoryConfig::with_max_entries(10).unwrap();
        let history = HistoryStore::with_config(MemoryStore::new(), config).unwrap();

        for i in 0..25 {
            let reports = history.save(report(&format!("{}.png", i), 100 - i)).unwrap();
            assert!(reports.len() <= 10);
        }

        let loaded = history.load();
        assert_eq!(loaded.len(), 10);
        assert_eq!(loaded[0].file_name, "24.png");
    }

    #[test]
    fn test_saving_same_report_twice_keeps_one() {
        let history = HistoryStore::new(MemoryStore::new());
        let r = report("dup.png", 0);
        history.save(r.clone()).unwrap();
        history.save(r.clone()).unwrap();

        let mut same_run = report("dup.png", 0);
        same_run.created_at = r.created_at;
        history.save(same_run.clone()).unwrap();

        let loaded = history.load();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, same_run.id);
    }

    #[test]
    fn test_delete_and_clear() {
        let history = HistoryStore::new(MemoryStore::new());
        let keep = report("keep.png", 5);
        let drop = report("drop.png", 1);
        history.save(keep.clone()).unwrap();
        history.save(drop.clone()).unwrap();

        let remaining = history.delete_by_id(&drop.id).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, keep.id);
        assert!(history.get_by_id(&drop.id).is_none());

        // unknown ids are a no-op
        assert_eq!(history.delete_by_id("missing").unwrap().len(), 1);

        history.clear().unwrap();
        assert!(history.load().is_empty());
    }

    #[test]
    fn test_legacy_payloads_migrate_once() {
        let store = MemoryStore::new();
        store
            .set(
                LEGACY_SNAPSHOT_KEY,
                r#"{"createdAt":"2024-12-01T10:00:00.000Z","fileName":"first.png","results":[{"status":"warning","title":"Small details risk"}]}"#,
            )
            .unwrap();
        store
            .set(
                LEGACY_CARDS_KEY,
                r#"[{"id":"c1","createdAt":"2025-01-01T10:00:00.000Z","fileName":"card.png","inputs":{"printWidthIn":12,"shirtColor":"Light","whiteInk":true,"imageWidthPx":3000,"imageHeightPx":3000},"results":[]},{"broken":true}]"#,
            )
            .unwrap();

        let history = HistoryStore::new(&store);
        let loaded = history.load();
        let names: Vec<&str> = loaded.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(names, vec!["card.png", "first.png"]);

        assert_eq!(store.get(LEGACY_SNAPSHOT_KEY).unwrap(), None);
        assert_eq!(store.get(LEGACY_CARDS_KEY).unwrap(), None);
        assert!(store.get(HISTORY_KEY).unwrap().is_some());

        // second read comes from the current document
        assert_eq!(history.load(), loaded);
    }

    #[test]
    fn test_unreadable_legacy_payload_is_dropped() {
        let store = MemoryStore::new();
        store.set(LEGACY_SNAPSHOT_KEY, "{ not json").unwrap();
        store.set(LEGACY_HISTORY_KEY, r#"[{"broken":true}]"#).unwrap();

        let history = HistoryStore::new(&store);
        assert!(history.load().is_empty());
        assert_eq!(store.get(LEGACY_SNAPSHOT_KEY).unwrap(), None);
        assert_eq!(store.get(LEGACY_HISTORY_KEY).unwrap(), None);
        assert!(history.load().is_empty());
    }

    #[test]
    fn test_clear_drops_unmigrated_legacy_history() {
        let store = MemoryStore::new();
        store
            .set(
                LEGACY_CARDS_KEY,
                r#"[{"id":"c1","createdAt":"2025-01-01T10:00:00.000Z","fileName":"card.png","inputs":{"printWidthIn":12,"shirtColor":"Light","whiteInk":true,"imageWidthPx":3000,"imageHeightPx":3000},"results":[]}]"#,
            )
            .unwrap();

        let history = HistoryStore::new(&store);
        history.clear().unwrap();

        assert!(history.load().is_empty());
        assert_eq!(store.get(LEGACY_CARDS_KEY).unwrap(), None);
    }

    #[test]
    fn test_zero_cap_rejected() {
        assert!(HistoryConfig::with_max_entries(0).is_err());
    }
}
