//! Fixtures and recording fakes shared by the unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use serde_json::{Value, json};

use atelier_db::{Database, TreePath, TreeStore};

use crate::providers::{
    BatchResponse, BlobStorage, IdentityProvider, MulticastMessage, PushFailure, PushService,
    SendOutcome,
};

pub const MICROS_2024_03_01: i64 = 1_709_251_200_000_000;

/// Two teachers, three students, one token each.
///
/// - `tok-a`, created by `martin`, connects `s1` and `s2`
/// - `tok-b`, created by `tremblay`, connects `s3`
pub fn classroom() -> Value {
    json!({
        "users": {
            "martin": {
                "id": "martin", "firstName": "Ada", "lastName": "Martin", "avatar": "🦊",
                "pushNotificationsTokens": { "fcm-m1": true, "fcm-m2": true },
            },
            "tremblay": {
                "id": "tremblay", "firstName": "Jean", "lastName": "Tremblay", "avatar": "🐻",
            },
            "s1": {
                "id": "s1", "firstName": "Léa", "lastName": "Roy", "avatar": "🐸",
                "tokens": {
                    "connected": { "tok-a": { "connectedAt": 1 } },
                    "userWithExtendedPermissions": { "martin": true },
                },
                "pushNotificationsTokens": ["fcm-s1a", "fcm-s1b"],
            },
            "s2": {
                "id": "s2", "firstName": "Noé", "lastName": "Gagnon", "avatar": "🐙",
                "tokens": {
                    "connected": { "tok-a": { "connectedAt": 2 } },
                    "userWithExtendedPermissions": { "martin": true },
                },
            },
            "s3": {
                "id": "s3", "firstName": "Zoé", "lastName": "Côté", "avatar": "🦉",
                "tokens": {
                    "connected": { "tok-b": { "connectedAt": 3 } },
                    "userWithExtendedPermissions": { "tremblay": true },
                },
            },
        },
        "tokens": {
            "tok-a": {
                "metadata": { "createdBy": "martin", "creationTimestamp": 1 },
                "connectedUsers": { "s1": true, "s2": true },
            },
            "tok-b": {
                "metadata": { "createdBy": "tremblay", "creationTimestamp": 2 },
                "connectedUsers": { "s3": true },
            },
            "existing": { "tok-a": true, "tok-b": true, "tok-reserved": true },
        },
        "questions": {
            "martin": {
                "q1": { "id": "q1", "text": "Quelle tâche as-tu faite?", "section": 0 },
                "q2": { "id": "q2", "text": "Avec quel outil?", "section": 3 },
            },
            "tremblay": {
                "q1": { "id": "q1", "text": "Décris ton milieu.", "section": 5 },
            },
        },
        "answers": {
            "tok-a": {
                "s1": {
                    "id": "s1",
                    "q1": {
                        "createdById": "martin",
                        "discussion": {
                            "m1": { "creatorId": "s1", "creationTimeStamp": MICROS_2024_03_01 + 60_000_000, "text": "J'ai soudé." },
                            "m2": { "creatorId": "martin", "creationTimeStamp": MICROS_2024_03_01 + 120_000_000, "text": "Bravo!" },
                        },
                    },
                    "legacy": { "discussion": {} },
                },
                "s2": {
                    "q2": {
                        "discussion": {
                            "m3": { "creatorId": "s2", "creationTimeStamp": MICROS_2024_03_01, "text": "Un marteau." },
                        },
                    },
                },
            },
            "tok-b": {
                "s3": {
                    "q1": {
                        "discussion": {
                            "m4": { "creatorId": "tremblay", "creationTimeStamp": MICROS_2024_03_01, "text": "Raconte!" },
                        },
                    },
                },
            },
        },
    })
}

pub fn seeded_db(tree: Value) -> Database {
    let db = Database::open_in_memory().unwrap();
    db.set(&TreePath::parse("v0_1_0"), tree).unwrap();
    db
}

pub fn read(db: &Database, path: &str) -> Option<Value> {
    db.get(&TreePath::parse(path)).unwrap()
}

#[derive(Default)]
pub struct MemoryBlobs {
    pub blobs: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBlobs {
    pub fn with(names: &[&str]) -> Self {
        let blobs = names.iter().map(|n| (n.to_string(), b"x".to_vec())).collect();
        Self {
            blobs: Mutex::new(blobs),
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.blobs.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl BlobStorage for MemoryBlobs {
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .blobs
            .lock()
            .unwrap()
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("no blob {}", name))
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.blobs.lock().unwrap().remove(name);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeIdentities {
    pub users: Mutex<BTreeMap<String, String>>,
    pub deleted: Mutex<Vec<String>>,
}

impl FakeIdentities {
    pub fn with(users: &[(&str, &str)]) -> Self {
        let users = users
            .iter()
            .map(|(uid, email)| (uid.to_string(), email.to_string()))
            .collect();
        Self {
            users: Mutex::new(users),
            deleted: Mutex::default(),
        }
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentities {
    async fn list_users(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.users.lock().unwrap().clone())
    }

    async fn delete_user(&self, uid: &str) -> Result<()> {
        if self.users.lock().unwrap().remove(uid).is_none() {
            bail!("user {} not found", uid);
        }
        self.deleted.lock().unwrap().push(uid.to_string());
        Ok(())
    }
}

/// Records every multicast and fails the tokens listed in `failures`.
#[derive(Default)]
pub struct RecordingPush {
    pub sent: Mutex<Vec<MulticastMessage>>,
    pub failures: HashMap<String, PushFailure>,
}

impl RecordingPush {
    pub fn failing(failures: &[(&str, PushFailure)]) -> Self {
        Self {
            sent: Mutex::default(),
            failures: failures
                .iter()
                .map(|(token, failure)| (token.to_string(), failure.clone()))
                .collect(),
        }
    }

    pub fn sent(&self) -> Vec<MulticastMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushService for RecordingPush {
    async fn send_multicast(&self, message: &MulticastMessage) -> Result<BatchResponse> {
        self.sent.lock().unwrap().push(message.clone());
        let outcomes = message
            .tokens
            .iter()
            .map(|token| match self.failures.get(token) {
                Some(failure) => SendOutcome::Failed(failure.clone()),
                None => SendOutcome::Delivered,
            })
            .collect();
        Ok(BatchResponse { outcomes })
    }
}
