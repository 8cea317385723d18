//! Shared store handle enforcing single-writer discipline.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::trace;

use keyshare_core::error::AppError;
use keyshare_entity::StoreSnapshot;

use crate::accessor::SnapshotStore;

/// The one handle every component shares.
///
/// Every mutation runs as a single critical section: acquire the write
/// lock, read a fresh snapshot, apply the change, write it back, release.
/// Two admissions can therefore never both observe the same pre-admission
/// occupancy. Plain reads skip the lock and may be slightly stale.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    /// Underlying accessor.
    store: Arc<dyn SnapshotStore>,
    /// Serializes read-modify-write sequences.
    write_lock: Arc<Mutex<()>>,
}

impl StoreHandle {
    /// Wrap an accessor.
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Read the current snapshot without taking the write lock.
    pub async fn read(&self) -> Result<StoreSnapshot, AppError> {
        self.store.read_snapshot().await
    }

    /// Run `apply` against a fresh snapshot inside the critical section.
    ///
    /// The snapshot is written back only when `apply` succeeds *and*
    /// changed something; an error leaves the store untouched.
    pub async fn mutate<T, F>(&self, apply: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut StoreSnapshot) -> Result<T, AppError> + Send,
        T: Send,
    {
        let _guard = self.write_lock.lock().await;

        let mut snapshot = self.store.read_snapshot().await?;
        let before = snapshot.clone();

        let output = apply(&mut snapshot)?;

        if snapshot != before {
            self.store.write_snapshot(&snapshot).await?;
        } else {
            trace!("Mutation produced no changes, skipping write");
        }

        Ok(output)
    }
}
