//! Services this crate talks to but does not own: blob storage, the identity
//! provider and push delivery.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Names of the stored blobs starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    async fn read(&self, name: &str) -> Result<Vec<u8>>;

    /// Deleting a blob that does not exist succeeds.
    async fn delete(&self, name: &str) -> Result<()>;
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Authenticated identities, uid -> email.
    async fn list_users(&self) -> Result<BTreeMap<String, String>>;

    /// Fails when the provider has no record for `uid`.
    async fn delete_user(&self, uid: &str) -> Result<()>;
}

#[async_trait]
pub trait PushService: Send + Sync {
    /// Sends one notification to every token. The response holds one outcome
    /// per token, in the order of `message.tokens`.
    async fn send_multicast(&self, message: &MulticastMessage) -> Result<BatchResponse>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushNotification {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MulticastMessage {
    pub tokens: Vec<String>,
    pub notification: PushNotification,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushFailure {
    /// The app was uninstalled or the token rotated.
    NotRegistered,
    InvalidArgument,
    Other(String),
}

impl PushFailure {
    pub fn from_code(code: &str) -> Self {
        match code {
            "registration-token-not-registered" => Self::NotRegistered,
            "invalid-argument" => Self::InvalidArgument,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether the token will never be deliverable again.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::NotRegistered | Self::InvalidArgument)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    Failed(PushFailure),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResponse {
    pub outcomes: Vec<SendOutcome>,
}

impl BatchResponse {
    pub fn delivered_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, SendOutcome::Delivered))
            .count()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.len() - self.delivered_count()
    }
}
