use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;

use atelier_db::Database;

use crate::providers::IdentityProvider;

/// Identity records kept in the local database.
pub struct LocalIdentityProvider {
    db: Arc<Database>,
}

impl LocalIdentityProvider {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn list_users(&self) -> Result<BTreeMap<String, String>> {
        // Run blocking DB queries off the async runtime
        let db = self.db.clone();
        let rows = tokio::task::spawn_blocking(move || db.list_identities())
            .await
            .map_err(|e| anyhow!("spawn_blocking join error: {}", e))??;

        Ok(rows.into_iter().map(|row| (row.uid, row.email)).collect())
    }

    async fn delete_user(&self, uid: &str) -> Result<()> {
        let db = self.db.clone();
        let target = uid.to_string();
        let removed = tokio::task::spawn_blocking(move || db.delete_identity(&target))
            .await
            .map_err(|e| anyhow!("spawn_blocking join error: {}", e))??;

        if !removed {
            bail!("No identity record for user {}", uid);
        }
        Ok(())
    }
}
