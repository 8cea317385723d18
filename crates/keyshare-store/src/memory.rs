//! In-memory snapshot store for tests and ephemeral deployments.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::warn;

use keyshare_core::error::AppError;
use keyshare_entity::StoreSnapshot;

use crate::accessor::SnapshotStore;

/// Holds the snapshot in process memory.
///
/// Can be switched offline to exercise the `StoreUnavailable` paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// The document.
    state: Arc<RwLock<StoreSnapshot>>,
    /// When set, every call fails as if the backing medium were gone.
    offline: Arc<AtomicBool>,
    /// Number of successful writes.
    writes: Arc<AtomicUsize>,
}

impl MemoryStore {
    /// Create a store holding `snapshot`.
    pub fn new(snapshot: StoreSnapshot) -> Self {
        Self {
            state: Arc::new(RwLock::new(snapshot)),
            offline: Arc::new(AtomicBool::new(false)),
            writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make subsequent reads and writes fail (or succeed again).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// How many times the document has been replaced.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<(), AppError> {
        if self.offline.load(Ordering::SeqCst) {
            warn!("Memory store is offline");
            return Err(AppError::store_unavailable("Memory store is offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn read_snapshot(&self) -> Result<StoreSnapshot, AppError> {
        self.check_online()?;
        Ok(self.state.read().await.clone())
    }

    async fn write_snapshot(&self, snapshot: &StoreSnapshot) -> Result<(), AppError> {
        self.check_online()?;
        *self.state.write().await = snapshot.clone();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
