use std::collections::HashSet;

use anyhow::{anyhow, bail, Context};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use super::record::{GeneratedImageRecord, HistoryCollection};
use super::slot::StorageSlot;

/// Name of the persisted slot; the default history file is `<name>.json`.
pub const HISTORY_SLOT_NAME: &str = "ai-image-generator-history";
pub const MAX_HISTORY_SIZE: usize = 50;
/// Practical ceiling used for the usage readout. Not enforced.
pub const STORAGE_QUOTA_BYTES: u64 = 5 * 1024 * 1024;

const REQUIRED_IMAGE_FIELDS: [&str; 4] = ["id", "url", "prompt", "createdAt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StorageUsage {
    pub used_bytes: u64,
    pub max_bytes: u64,
    pub percentage: u32,
}

/// Bounded, newest-first image history persisted in a single slot.
///
/// Persistence problems never reach the caller: reads fall back to an empty
/// collection and failed writes are logged. Callers should re-read with
/// [`HistoryStore::read_all`] after every mutation instead of patching their
/// own copy.
#[derive(Debug, Clone)]
pub struct HistoryStore<S: StorageSlot> {
    slot: S,
    max_images: usize,
}

impl<S: StorageSlot> HistoryStore<S> {
    pub fn new(slot: S) -> Self {
        Self::with_limit(slot, MAX_HISTORY_SIZE)
    }

    pub fn with_limit(slot: S, max_images: usize) -> Self {
        Self {
            slot,
            max_images: max_images.max(1),
        }
    }

    pub fn slot(&self) -> &S {
        &self.slot
    }

    pub fn max_images(&self) -> usize {
        self.max_images
    }

    pub fn read_all(&self) -> HistoryCollection {
        match self.load() {
            Ok(history) => history,
            Err(err) => {
                tracing::warn!(
                    slot = %self.slot.describe(),
                    error = %format!("{err:#}"),
                    "failed to load generation history; using empty history"
                );
                HistoryCollection::default()
            }
        }
    }

    pub fn find(&self, id: &str) -> Option<GeneratedImageRecord> {
        self.read_all().get(id).cloned()
    }

    /// Inserts at the head, evicting the oldest records past the limit.
    pub fn append(&self, record: GeneratedImageRecord) -> HistoryCollection {
        let mut history = self.read_all();
        history.images.retain(|image| image.id != record.id);
        history.images.insert(0, record);
        history.images.truncate(self.max_images);
        history.last_generated_at = Some(Utc::now());
        self.persist(&history, "append");
        history
    }

    /// Drops the record with `id`. Unknown ids leave the slot untouched.
    pub fn remove(&self, id: &str) -> HistoryCollection {
        let mut history = self.read_all();
        let before = history.images.len();
        history.images.retain(|image| image.id != id);
        if history.images.len() == before {
            tracing::debug!(id, "history remove: id not present");
            return history;
        }
        self.persist(&history, "remove");
        history
    }

    pub fn clear(&self) {
        if let Err(err) = self.slot.remove() {
            tracing::warn!(
                slot = %self.slot.describe(),
                error = %format!("{err:#}"),
                "failed to clear generation history"
            );
        }
    }

    pub fn export_snapshot(&self) -> String {
        let history = self.read_all();
        match serde_json::to_string_pretty(&history) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize history snapshot");
                "{\n  \"images\": []\n}".to_string()
            }
        }
    }

    /// Replaces the stored history with `raw`. Invalid snapshots are rejected
    /// and leave the current history as it was.
    pub fn import_snapshot(&self, raw: &str) -> bool {
        let result = parse_snapshot(raw, self.max_images).and_then(|history| {
            let encoded = serde_json::to_string(&history)?;
            self.slot.write(&encoded)?;
            Ok(history.len())
        });
        match result {
            Ok(count) => {
                tracing::info!(images = count, "imported generation history");
                true
            }
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "failed to import history");
                false
            }
        }
    }

    pub fn storage_usage(&self) -> StorageUsage {
        let used_bytes = match self.slot.read() {
            Ok(raw) => raw.map(|value| value.len() as u64).unwrap_or(0),
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "failed to measure history size");
                0
            }
        };
        let percentage =
            ((used_bytes as f64 / STORAGE_QUOTA_BYTES as f64) * 100.0).round() as u32;
        StorageUsage {
            used_bytes,
            max_bytes: STORAGE_QUOTA_BYTES,
            percentage,
        }
    }

    fn load(&self) -> anyhow::Result<HistoryCollection> {
        let Some(raw) = self.slot.read()? else {
            return Ok(HistoryCollection::default());
        };
        let mut history: HistoryCollection =
            serde_json::from_str(&raw).context("stored history is malformed")?;
        drop_repeated_ids(&mut history);
        Ok(history)
    }

    fn persist(&self, history: &HistoryCollection, op: &str) -> bool {
        let result = serde_json::to_string(history)
            .map_err(anyhow::Error::from)
            .and_then(|encoded| self.slot.write(&encoded));
        match result {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    slot = %self.slot.describe(),
                    op,
                    error = %format!("{err:#}"),
                    "failed to persist generation history"
                );
                false
            }
        }
    }
}

fn parse_snapshot(raw: &str, max_images: usize) -> anyhow::Result<HistoryCollection> {
    let parsed: Value = serde_json::from_str(raw).context("snapshot is not valid JSON")?;
    let images = parsed
        .get("images")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("Invalid history format: missing images array"))?;
    for (idx, image) in images.iter().enumerate() {
        for field in REQUIRED_IMAGE_FIELDS {
            if !is_truthy(image.get(field)) {
                bail!("Invalid image data in history: entry {idx} has no {field}");
            }
        }
    }

    let mut history: HistoryCollection =
        serde_json::from_value(parsed).context("snapshot does not match history schema")?;
    {
        let mut seen = HashSet::new();
        if let Some(duplicate) = history
            .images
            .iter()
            .find(|image| !seen.insert(image.id.as_str()))
        {
            bail!("Invalid history format: duplicate id {}", duplicate.id);
        }
    }
    history.images.truncate(max_images);
    Ok(history)
}

/// Keeps the first (newest) record for each id.
fn drop_repeated_ids(history: &mut HistoryCollection) {
    let before = history.images.len();
    let mut seen = HashSet::new();
    history.images.retain(|image| seen.insert(image.id.clone()));
    let dropped = before - history.images.len();
    if dropped > 0 {
        tracing::warn!(dropped, "stored history repeats ids; keeping newest of each");
    }
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().map(|n| n != 0.0).unwrap_or(true),
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    use super::{HistoryStore, MAX_HISTORY_SIZE, STORAGE_QUOTA_BYTES};
    use crate::history::record::GeneratedImageRecord;
    use crate::history::slot::{FileSlot, MemorySlot, StorageSlot};

    fn record(idx: usize) -> GeneratedImageRecord {
        let base = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        GeneratedImageRecord {
            id: format!("img_{idx}"),
            url: format!("https://cdn.example/{idx}.png"),
            prompt: format!("prompt {idx}"),
            style: Some("artistic".to_string()),
            aspect_ratio: Some("1:1".to_string()),
            created_at: base + Duration::seconds(idx as i64),
            download_url: None,
        }
    }

    struct BrokenSlot;

    impl StorageSlot for BrokenSlot {
        fn describe(&self) -> String {
            "broken".to_string()
        }

        fn read(&self) -> anyhow::Result<Option<String>> {
            anyhow::bail!("read denied")
        }

        fn write(&self, _contents: &str) -> anyhow::Result<()> {
            anyhow::bail!("quota exceeded")
        }

        fn remove(&self) -> anyhow::Result<()> {
            anyhow::bail!("remove denied")
        }
    }

    #[test]
    fn append_inserts_newest_first() {
        let store = HistoryStore::new(MemorySlot::new());
        store.append(record(1));
        let snapshot = store.append(record(2));
        assert_eq!(snapshot, store.read_all());
        assert_eq!(
            snapshot
                .images
                .iter()
                .map(|image| image.id.as_str())
                .collect::<Vec<_>>(),
            vec!["img_2", "img_1"]
        );
        assert!(snapshot.last_generated_at.is_some());
    }

    #[test]
    fn append_past_limit_evicts_oldest() {
        let store = HistoryStore::new(MemorySlot::new());
        for idx in 1..=51 {
            store.append(record(idx));
        }
        let history = store.read_all();
        assert_eq!(history.len(), MAX_HISTORY_SIZE);
        assert_eq!(history.images[0].id, "img_51");
        assert_eq!(history.images[MAX_HISTORY_SIZE - 1].id, "img_2");
        assert!(history.get("img_1").is_none());
    }

    #[test]
    fn append_replaces_record_with_same_id() {
        let store = HistoryStore::new(MemorySlot::new());
        store.append(record(1));
        store.append(record(2));
        let history = store.append(record(1));
        assert_eq!(history.len(), 2);
        assert_eq!(history.images[0].id, "img_1");
    }

    #[test]
    fn corrupt_slot_reads_as_empty() {
        for raw in ["not json", "{\"images\": 5}", "{\"images\":[{\"id\":\"x\"}]}", "[]"] {
            let store = HistoryStore::new(MemorySlot::with_contents(raw));
            assert!(store.read_all().is_empty(), "expected empty for {raw}");
        }
    }

    #[test]
    fn append_over_corrupt_slot_recovers() {
        let store = HistoryStore::new(MemorySlot::with_contents("{broken"));
        store.append(record(7));
        assert_eq!(store.read_all().len(), 1);
    }

    #[test]
    fn remove_filters_matching_id() {
        let store = HistoryStore::new(MemorySlot::new());
        store.append(record(1));
        store.append(record(2));
        let history = store.remove("img_1");
        assert_eq!(history.len(), 1);
        assert_eq!(store.read_all().images[0].id, "img_2");
    }

    #[test]
    fn remove_unknown_id_leaves_slot_bytes_unchanged() -> anyhow::Result<()> {
        let slot = MemorySlot::new();
        let store = HistoryStore::new(slot.clone());
        store.append(record(1));
        let before = slot.read()?;
        store.remove("img_missing");
        assert_eq!(slot.read()?, before);
        Ok(())
    }

    #[test]
    fn clear_removes_slot() -> anyhow::Result<()> {
        let slot = MemorySlot::new();
        let store = HistoryStore::new(slot.clone());
        store.append(record(1));
        store.clear();
        assert_eq!(slot.read()?, None);
        assert!(store.read_all().is_empty());
        Ok(())
    }

    #[test]
    fn export_then_import_round_trips() {
        let source = HistoryStore::new(MemorySlot::new());
        for idx in 1..=3 {
            source.append(record(idx));
        }
        let snapshot = source.export_snapshot();

        let target = HistoryStore::new(MemorySlot::new());
        assert!(target.import_snapshot(&snapshot));
        assert_eq!(target.read_all(), source.read_all());
    }

    #[test]
    fn export_of_empty_store_imports_cleanly() {
        let store = HistoryStore::new(MemorySlot::new());
        let snapshot = store.export_snapshot();
        assert!(store.import_snapshot(&snapshot));
        assert!(store.read_all().is_empty());
    }

    #[test]
    fn import_missing_prompt_is_rejected_without_side_effects() -> anyhow::Result<()> {
        let slot = MemorySlot::new();
        let store = HistoryStore::new(slot.clone());
        store.append(record(1));
        let before = slot.read()?;

        let payload = json!({
            "images": [
                {"id": "a", "url": "https://x/a.png", "prompt": "ok", "createdAt": "2025-01-01T00:00:00Z"},
                {"id": "b", "url": "https://x/b.png", "createdAt": "2025-01-01T00:00:00Z"}
            ]
        });
        assert!(!store.import_snapshot(&payload.to_string()));
        assert_eq!(slot.read()?, before);
        Ok(())
    }

    #[test]
    fn import_rejects_malformed_payloads() {
        let store = HistoryStore::new(MemorySlot::new());
        let rejected = [
            "nope".to_string(),
            json!({"items": []}).to_string(),
            json!({"images": {}}).to_string(),
            json!({"images": [{"id": "", "url": "u", "prompt": "p", "createdAt": "2025-01-01T00:00:00Z"}]}).to_string(),
            json!({"images": [{"id": "a", "url": "u", "prompt": "p", "createdAt": "yesterday"}]}).to_string(),
            json!({"images": [
                {"id": "a", "url": "u", "prompt": "p", "createdAt": "2025-01-01T00:00:00Z"},
                {"id": "a", "url": "v", "prompt": "q", "createdAt": "2025-01-01T00:00:00Z"}
            ]})
            .to_string(),
        ];
        for payload in rejected {
            assert!(!store.import_snapshot(&payload), "accepted {payload}");
        }
        assert!(store.read_all().is_empty());
    }

    #[test]
    fn stored_repeated_ids_still_round_trip() -> anyhow::Result<()> {
        let mut older = record(1);
        older.id = "a".to_string();
        let mut newer = record(2);
        newer.id = "a".to_string();
        let seeded = json!({ "images": [newer.clone(), older] }).to_string();
        let store = HistoryStore::new(MemorySlot::with_contents(seeded));

        let history = store.read_all();
        assert_eq!(history.images, vec![newer.clone()]);
        assert_eq!(store.find("a"), Some(newer));

        let exported = store.export_snapshot();
        assert!(store.import_snapshot(&exported));
        assert_eq!(store.read_all(), history);
        Ok(())
    }

    #[test]
    fn import_truncates_to_limit() {
        let images: Vec<_> = (0..60)
            .map(|idx| serde_json::to_value(record(idx)).unwrap_or_default())
            .collect();
        let store = HistoryStore::new(MemorySlot::new());
        assert!(store.import_snapshot(&json!({ "images": images }).to_string()));
        let history = store.read_all();
        assert_eq!(history.len(), MAX_HISTORY_SIZE);
        assert_eq!(history.images[0].id, "img_0");
    }

    #[test]
    fn broken_slot_never_surfaces_errors() {
        let store = HistoryStore::new(BrokenSlot);
        assert!(store.read_all().is_empty());
        let snapshot = store.append(record(1));
        assert_eq!(snapshot.len(), 1);
        assert!(store.remove("img_1").is_empty());
        store.clear();
        assert!(!store.import_snapshot("{\"images\": []}"));
        assert_eq!(store.storage_usage().used_bytes, 0);
    }

    #[test]
    fn storage_usage_reports_fraction_of_quota() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = HistoryStore::new(FileSlot::new(temp.path().join("history.json")));
        assert_eq!(store.storage_usage().used_bytes, 0);

        store.append(record(1));
        let usage = store.storage_usage();
        let on_disk = std::fs::metadata(temp.path().join("history.json"))?.len();
        assert_eq!(usage.used_bytes, on_disk);
        assert_eq!(usage.max_bytes, STORAGE_QUOTA_BYTES);
        assert_eq!(usage.percentage, 0);
        Ok(())
    }

    #[test]
    fn file_backed_history_survives_reopen() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("history.json");
        HistoryStore::new(FileSlot::new(&path)).append(record(3));
        let reopened = HistoryStore::new(FileSlot::new(&path));
        assert_eq!(reopened.read_all().images[0].id, "img_3");
        assert_eq!(
            reopened.find("img_3").map(|image| image.url),
            Some("https://cdn.example/3.png".to_string())
        );
        Ok(())
    }
}
