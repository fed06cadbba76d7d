use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A user record as stored under `users/{id}`.
///
/// Older records predate the consent and onboarding flags; a missing flag
/// means the user went through the app before it existed, so it reads as `true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub creation_date: Option<String>,

    /// Free-text notes a teacher keeps about each student, keyed by student id.
    #[serde(default)]
    pub student_notes: BTreeMap<String, Value>,
    #[serde(default)]
    pub tokens: UserTokens,

    #[serde(default)]
    pub change_password: bool,
    #[serde(default = "default_true")]
    pub terms_and_services_accepted: bool,
    #[serde(default = "default_true")]
    pub irsst_page_seen: bool,
    #[serde(default = "default_true")]
    pub has_seen_student_onboarding: bool,
    #[serde(default = "default_true")]
    pub has_seen_teacher_onboarding: bool,
}

fn default_true() -> bool {
    true
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Token bookkeeping kept on the user side of a pairing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTokens {
    #[serde(default)]
    pub connected: BTreeMap<String, Value>,
    #[serde(default)]
    pub user_with_extended_permissions: BTreeMap<String, Value>,
}

/// Metadata that turns a `tokens/{id}` entry into a teaching token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMetadata {
    pub created_by: String,
    #[serde(default)]
    pub creation_timestamp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeachingToken {
    pub id: String,
    pub metadata: TokenMetadata,
    pub connected_users: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub text: String,
    /// Ordinal into the fixed category label list.
    #[serde(default)]
    pub section: i64,
}

/// A student's thread on one question, stored under
/// `answers/{token}/{studentId}/{questionId}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    #[serde(default)]
    pub discussion: BTreeMap<String, DiscussionMessage>,
    #[serde(default)]
    pub created_by_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscussionMessage {
    #[serde(default)]
    pub creator_id: String,
    /// Microseconds since the Unix epoch.
    #[serde(default, rename = "creationTimeStamp")]
    pub creation_time_stamp: i64,
    #[serde(default)]
    pub text: String,
}

/// Push delivery tokens of a user. The mobile clients have written both a
/// map keyed by token and a plain list over time.
#[derive(Debug, Clone, PartialEq)]
pub enum PushTokens {
    Keyed(Vec<String>),
    Listed(Vec<String>),
    None,
}

impl PushTokens {
    pub fn tokens(&self) -> &[String] {
        match self {
            Self::Keyed(tokens) | Self::Listed(tokens) => tokens,
            Self::None => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens().is_empty()
    }
}
