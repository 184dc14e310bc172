use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dir_error::Error;
use serde::{Deserialize, Serialize};

/// Per-label bookkeeping kept locally alongside each announced DHT key
///. `timestamp` is set once at first announcement;
/// `last_seen` advances on every successful re-announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelMetadata {
    pub timestamp: u64,
    pub last_seen: u64,
}

impl LabelMetadata {
    pub fn new(now: SystemTime) -> Self {
        let secs = unix_secs(now);
        LabelMetadata { timestamp: secs, last_seen: secs }
    }

    pub fn touch(&mut self, now: SystemTime) {
        self.last_seen = unix_secs(now);
    }

    /// True once `now - last_seen` exceeds `max_age`.
    pub fn is_stale(&self, max_age: Duration, now: SystemTime) -> bool {
        let now_secs = unix_secs(now);
        now_secs.saturating_sub(self.last_seen) > max_age.as_secs()
    }
}

fn unix_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

/// Durable store of `label key -> LabelMetadata` for labels this peer has
/// announced, backed by `sled`.
#[derive(Clone)]
pub struct MetadataStore {
    tree: sled::Tree,
}

impl MetadataStore {
    pub fn open(db: &sled::Db) -> Result<Self, Error> {
        let tree = db.open_tree("label_metadata").map_err(|e| Error::internal(e.to_string()))?;
        Ok(MetadataStore { tree })
    }

    pub fn put(&self, key: &str, meta: LabelMetadata) -> Result<(), Error> {
        let bytes = serde_json::to_vec(&meta).map_err(|e| Error::internal(e.to_string()))?;
        self.tree.insert(key.as_bytes(), bytes).map_err(|e| Error::internal(e.to_string()))?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<LabelMetadata>, Error> {
        match self.tree.get(key.as_bytes()).map_err(|e| Error::internal(e.to_string()))? {
            Some(bytes) => {
                let meta = serde_json::from_slice(&bytes).map_err(|e| Error::internal(e.to_string()))?;
                Ok(Some(meta))
            }
            None => Ok(None),
        }
    }

    pub fn remove(&self, key: &str) -> Result<(), Error> {
        self.tree.remove(key.as_bytes()).map_err(|e| Error::internal(e.to_string()))?;
        Ok(())
    }

    /// All locally-announced `(key, metadata)` pairs, for the refresher
    /// and for `List`.
    pub fn iter_all(&self) -> Result<Vec<(String, LabelMetadata)>, Error> {
        let mut out = Vec::new();
        for entry in self.tree.iter() {
            let (key, bytes) = entry.map_err(|e| Error::internal(e.to_string()))?;
            let key = String::from_utf8_lossy(&key).to_string();
            let meta = serde_json::from_slice(&bytes).map_err(|e| Error::internal(e.to_string()))?;
            out.push((key, meta));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn staleness_triggers_after_max_age() {
        let now = SystemTime::now();
        let meta = LabelMetadata::new(now - Duration::from_secs(120));
        assert!(meta.is_stale(Duration::from_secs(60), now));
        assert!(!meta.is_stale(Duration::from_secs(600), now));
    }

    #[test]
    fn store_round_trips_through_sled() {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let store = MetadataStore::open(&db).unwrap();

        let meta = LabelMetadata::new(SystemTime::now());
        store.put("/skills/nlp/completion/cid1/peer1", meta).unwrap();

        let fetched = store.get("/skills/nlp/completion/cid1/peer1").unwrap().unwrap();
        assert_eq!(fetched, meta);

        store.remove("/skills/nlp/completion/cid1/peer1").unwrap();
        assert!(store.get("/skills/nlp/completion/cid1/peer1").unwrap().is_none());
    }

    #[test]
    fn iter_all_lists_every_announced_label() {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let store = MetadataStore::open(&db).unwrap();
        store.put("/skills/a/cid1/peer1", LabelMetadata::new(SystemTime::now())).unwrap();
        store.put("/skills/b/cid1/peer1", LabelMetadata::new(SystemTime::now())).unwrap();

        let all = store.iter_all().unwrap();
        assert_eq!(all.len(), 2);
    }
}
