use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{RequestStore, StoreError};
use crate::models::{MonitoringRequest, RequestStatus};

/// Process-local store for tests and database-less runs.
#[derive(Debug, Default)]
pub struct MemoryRequestStore {
    rows: RwLock<HashMap<String, MonitoringRequest>>,
}

impl MemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }
}

#[async_trait]
impl RequestStore for MemoryRequestStore {
    async fn get(&self, user_id: &str) -> Result<Option<MonitoringRequest>, StoreError> {
        Ok(self.rows.read().await.get(user_id).cloned())
    }

    async fn upsert(&self, request: &MonitoringRequest) -> Result<(), StoreError> {
        self.rows
            .write()
            .await
            .insert(request.user_id.clone(), request.clone());
        Ok(())
    }

    async fn list_by_status(
        &self,
        status: &RequestStatus,
    ) -> Result<Vec<MonitoringRequest>, StoreError> {
        let mut matching: Vec<MonitoringRequest> = self
            .rows
            .read()
            .await
            .values()
            .filter(|r| &r.status == status)
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.created_at);
        Ok(matching)
    }

    async fn health(&self) -> Result<String, StoreError> {
        Ok(format!("memory ({} requests)", self.rows.read().await.len()))
    }
}
