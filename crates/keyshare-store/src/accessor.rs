//! Store accessor contract.

use async_trait::async_trait;

use keyshare_core::error::AppError;
use keyshare_entity::StoreSnapshot;

/// Reads and writes the whole snapshot document.
///
/// Implementations must make each call atomic on its own: a read returns
/// a consistent document and a write replaces it wholesale. Serializing
/// read-modify-write sequences is the job of
/// [`StoreHandle`](crate::handle::StoreHandle), not of the accessor.
#[async_trait]
pub trait SnapshotStore: Send + Sync + std::fmt::Debug {
    /// Read the current document.
    async fn read_snapshot(&self) -> Result<StoreSnapshot, AppError>;

    /// Replace the document.
    async fn write_snapshot(&self, snapshot: &StoreSnapshot) -> Result<(), AppError>;
}
