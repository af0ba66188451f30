//! Allow-list gate for inbound events.

use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashSet;

use crate::store::StoreError;

#[async_trait]
pub trait AllowList: Send + Sync {
    async fn is_allowed(&self, user_id: &str) -> Result<bool, StoreError>;
}

/// Looks users up in the `allowed_users` table.
#[derive(Debug, Clone)]
pub struct PgAllowList {
    pool: PgPool,
}

impl PgAllowList {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AllowList for PgAllowList {
    async fn is_allowed(&self, user_id: &str) -> Result<bool, StoreError> {
        let allowed: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM allowed_users WHERE chat_id = $1)")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(allowed)
    }
}

/// Fixed allow-list from config.
#[derive(Debug, Clone, Default)]
pub struct StaticAllowList {
    users: HashSet<String>,
}

impl StaticAllowList {
    pub fn new(users: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            users: users.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl AllowList for StaticAllowList {
    async fn is_allowed(&self, user_id: &str) -> Result<bool, StoreError> {
        Ok(self.users.contains(user_id))
    }
}

/// Fail-closed check: a lookup error denies access.
pub async fn check_access(allow_list: &dyn AllowList, user_id: &str) -> bool {
    if user_id.trim().is_empty() {
        return false;
    }
    match allow_list.is_allowed(user_id).await {
        Ok(allowed) => allowed,
        Err(e) => {
            tracing::error!(user_id, error = %e, "Allow-list lookup failed, denying access");
            false
        }
    }
}
