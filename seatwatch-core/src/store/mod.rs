//! Request store: durable keyed storage for one monitoring request per user.
//!
//! Writes are full-row upserts keyed by user id; there is no partial-field
//! concurrency control, so concurrent writers are last-write-wins.

mod memory;
mod postgres;

pub use memory::MemoryRequestStore;
pub use postgres::PgRequestStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{MonitoringRequest, RequestStatus};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait RequestStore: Send + Sync {
    /// The user's request, terminal or not.
    async fn get(&self, user_id: &str) -> Result<Option<MonitoringRequest>, StoreError>;

    /// Insert or overwrite the user's request row.
    async fn upsert(&self, request: &MonitoringRequest) -> Result<(), StoreError>;

    /// All requests in `status`, oldest first.
    async fn list_by_status(
        &self,
        status: &RequestStatus,
    ) -> Result<Vec<MonitoringRequest>, StoreError>;

    /// Backend description for health reporting.
    async fn health(&self) -> Result<String, StoreError>;
}
