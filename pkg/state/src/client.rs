use slatedb::Db;
use slatedb::object_store::local::LocalFileSystem;
use slatedb::object_store::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::watch::{EventLog, EventType};

/// Persistent state store backed by SlateDB on a local filesystem.
///
/// Every mutation is recorded in `event_log` with a monotonically increasing
/// revision. Writes are serialized by a commit lock, and snapshot listings take
/// the same lock, so a listing is exact as of the revision it reports.
#[derive(Clone)]
pub struct StateStore {
    db: Db,
    pub event_log: EventLog,
    commit: Arc<RwLock<()>>,
}

impl StateStore {
    /// Open (or create) a state store rooted at `path` on the local filesystem.
    pub async fn new(path: &str) -> anyhow::Result<Self> {
        Self::with_event_log(path, EventLog::default()).await
    }

    /// Open a state store that records into the given event log.
    pub async fn with_event_log(path: &str, event_log: EventLog) -> anyhow::Result<Self> {
        info!("Opening SlateDB state store at {}", path);

        // Ensure the data directory exists before opening the object store
        std::fs::create_dir_all(path)
            .map_err(|e| anyhow::anyhow!("Failed to create data directory {}: {}", path, e))?;

        let object_store = Arc::new(
            LocalFileSystem::new_with_prefix(path)
                .map_err(|e| anyhow::anyhow!("Failed to create local object store: {}", e))?,
        );
        let db = Db::open(Path::from("/"), object_store)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to open SlateDB: {}", e))?;
        Ok(Self {
            db,
            event_log,
            commit: Arc::new(RwLock::new(())),
        })
    }

    /// Store a value under the given key. Returns the revision of the write.
    pub async fn put(&self, key: &str, value: &[u8]) -> anyhow::Result<u64> {
        self.put_with_revision(key, |_| Ok(value.to_vec())).await
    }

    /// Store a value produced by `encode`, which is handed the revision this
    /// write will be recorded at (so objects can carry their own version).
    pub async fn put_with_revision<F>(&self, key: &str, encode: F) -> anyhow::Result<u64>
    where
        F: FnOnce(u64) -> anyhow::Result<Vec<u8>>,
    {
        let _guard = self.commit.write().await;
        let revision = self.event_log.current_seq().await + 1;
        let value = encode(revision)?;
        let existed = self.raw_get(key).await?.is_some();
        self.db
            .put(key.as_bytes(), &value)
            .await
            .map_err(|e| anyhow::anyhow!("SlateDB put failed: {}", e))?;
        let event_type = if existed {
            EventType::Modified
        } else {
            EventType::Added
        };
        let seq = self
            .event_log
            .emit(event_type, key.to_string(), Some(value))
            .await;
        debug!("put {} at revision {} ({:?})", key, seq, event_type);
        Ok(seq)
    }

    /// Retrieve the value for a key, or `None` if it does not exist.
    pub async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        self.raw_get(key).await
    }

    async fn raw_get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        match self.db.get(key.as_bytes()).await {
            Ok(Some(bytes)) => Ok(Some(bytes.to_vec())),
            Ok(None) => Ok(None),
            Err(e) => Err(anyhow::anyhow!("SlateDB get failed: {}", e)),
        }
    }

    /// Delete a key from the store. Returns the revision of the delete, or
    /// `None` when the key did not exist (no event is recorded then).
    pub async fn delete(&self, key: &str) -> anyhow::Result<Option<u64>> {
        let _guard = self.commit.write().await;
        let Some(previous) = self.raw_get(key).await? else {
            return Ok(None);
        };
        self.db
            .delete(key.as_bytes())
            .await
            .map_err(|e| anyhow::anyhow!("SlateDB delete failed: {}", e))?;
        let seq = self
            .event_log
            .emit(EventType::Deleted, key.to_string(), Some(previous))
            .await;
        debug!("delete {} at revision {}", key, seq);
        Ok(Some(seq))
    }

    /// List all key-value pairs under `prefix` together with the revision the
    /// listing is exact for. No write can interleave with the scan.
    pub async fn list_prefix_at(
        &self,
        prefix: &str,
    ) -> anyhow::Result<(Vec<(String, Vec<u8>)>, u64)> {
        let _guard = self.commit.read().await;
        let revision = self.event_log.current_seq().await;
        let mut results = Vec::new();
        let mut iter = self
            .db
            .scan_prefix(prefix.as_bytes())
            .await
            .map_err(|e| anyhow::anyhow!("SlateDB scan_prefix failed: {}", e))?;

        while let Some(kv) = iter
            .next()
            .await
            .map_err(|e| anyhow::anyhow!("SlateDB scan failed: {}", e))?
        {
            let key = String::from_utf8_lossy(&kv.key).to_string();
            results.push((key, kv.value.to_vec()));
        }
        Ok((results, revision))
    }

    /// Current revision of the store.
    pub async fn revision(&self) -> u64 {
        self.event_log.current_seq().await
    }

    /// Gracefully close the state store.
    pub async fn close(self) -> anyhow::Result<()> {
        info!("Closing SlateDB state store");
        self.db
            .close()
            .await
            .map_err(|e| anyhow::anyhow!("SlateDB close failed: {}", e))
    }
}
