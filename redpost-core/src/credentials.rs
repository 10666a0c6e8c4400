use crate::error::CoreError;
use crate::types::{AccountId, CredentialRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Read-only account lookup consumed by the submission pipeline.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// `Ok(None)` means the account does not exist.
    async fn resolve(&self, account_id: AccountId) -> Result<Option<CredentialRecord>, CoreError>;
}

/// Map-backed resolver for tests and single-account setups.
#[derive(Debug, Default)]
pub struct InMemoryCredentials {
    records: RwLock<HashMap<AccountId, CredentialRecord>>,
}

impl InMemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(self, record: CredentialRecord) -> Self {
        self.insert(record);
        self
    }

    pub fn insert(&self, record: CredentialRecord) {
        if let Ok(mut records) = self.records.write() {
            records.insert(record.account_id, record);
        }
    }
}

#[async_trait]
impl CredentialResolver for InMemoryCredentials {
    async fn resolve(&self, account_id: AccountId) -> Result<Option<CredentialRecord>, CoreError> {
        let records = self.records.read().map_err(|_| CoreError::Internal {
            message: "credential map lock poisoned".to_string(),
        })?;
        Ok(records.get(&account_id).cloned())
    }
}
