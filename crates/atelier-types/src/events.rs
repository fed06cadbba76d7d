use serde::{Deserialize, Serialize};

/// Fired by the hosted tree when a child is created under
/// `answers/{token}/{studentId}/{questionId}/discussion/{messageId}`.
///
/// The trigger can deliver the same creation more than once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscussionMessageCreated {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub student_id: String,
    #[serde(default)]
    pub question_id: String,
    #[serde(default)]
    pub message_id: String,
    pub message: NewDiscussionMessage,
}

/// The created value as delivered by the trigger; nothing in it is guaranteed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDiscussionMessage {
    #[serde(default)]
    pub creator_id: Option<String>,
    #[serde(default, rename = "creationTimeStamp")]
    pub creation_time_stamp: Option<i64>,
    #[serde(default)]
    pub text: Option<String>,
}

impl DiscussionMessageCreated {
    pub fn creator_id(&self) -> Option<&str> {
        self.message
            .creator_id
            .as_deref()
            .filter(|id| !id.is_empty())
    }

    /// True when every path parameter needed to route the event is present.
    pub fn has_route(&self) -> bool {
        !self.token.is_empty() && !self.student_id.is_empty() && !self.question_id.is_empty()
    }
}
