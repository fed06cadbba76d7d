//! Typed views over the tree.
//!
//! Every branch of the tree may be missing, scalar where a record is expected,
//! or half-written by an older client. Lookups here absorb all of that: a
//! missing or undecodable branch is an empty collection or `None`. Only store
//! failures surface as errors.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use atelier_types::models::{
    Answer, DiscussionMessage, PushTokens, Question, TeachingToken, TokenMetadata, User,
};

use crate::path::{Schema, TreePath};
use crate::store::TreeStore;
use crate::tree;

pub struct Repository<'a, S: TreeStore + ?Sized> {
    store: &'a S,
    schema: Schema,
    /// Copy of the whole data root, when warmed. Reads under the data root are
    /// answered from it until `invalidate` is called.
    snapshot: Option<Value>,
}

impl<'a, S: TreeStore + ?Sized> Repository<'a, S> {
    pub fn new(store: &'a S, schema: Schema) -> Self {
        Self {
            store,
            schema,
            snapshot: None,
        }
    }

    pub fn store(&self) -> &'a S {
        self.store
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Reads the whole data root once so that walks over many entities do not
    /// go back to the store for each of them.
    pub fn warm(&mut self) -> Result<()> {
        let root = self.schema.data_root();
        let snapshot = self.store.get(&root)?.unwrap_or(Value::Null);
        debug!("Warmed snapshot of {}", root);
        self.snapshot = Some(snapshot);
        Ok(())
    }

    /// Drops the snapshot. Must be called after writing through the store.
    pub fn invalidate(&mut self) {
        self.snapshot = None;
    }

    pub fn is_warm(&self) -> bool {
        self.snapshot.is_some()
    }

    fn read(&self, path: &TreePath) -> Result<Option<Value>> {
        let root = self.schema.data_root();
        match &self.snapshot {
            Some(snapshot) if path.starts_with(&root) => {
                Ok(tree::lookup(snapshot, &path.segments()[root.len()..]).cloned())
            }
            _ => self.store.get(path),
        }
    }

    fn read_object(&self, path: &TreePath) -> Result<serde_json::Map<String, Value>> {
        match self.read(path)? {
            Some(Value::Object(map)) => Ok(map),
            _ => Ok(serde_json::Map::new()),
        }
    }

    fn read_keys(&self, path: &TreePath) -> Result<Vec<String>> {
        Ok(self.read_object(path)?.into_iter().map(|(key, _)| key).collect())
    }

    // -- Users --

    pub fn user(&self, user_id: &str) -> Result<Option<User>> {
        let path = self.schema.user(user_id);
        let Some(value @ Value::Object(_)) = self.read(&path)? else {
            return Ok(None);
        };
        Ok(decode::<User>(value, &path).map(|mut user| {
            if user.id.is_empty() {
                user.id = user_id.to_string();
            }
            user
        }))
    }

    /// The stored first name, read from the raw record so that a record with
    /// other malformed fields still counts as present.
    pub fn user_first_name(&self, user_id: &str) -> Result<Option<String>> {
        Ok(match self.read(&self.schema.user(user_id).child("firstName"))? {
            Some(Value::String(name)) if !name.is_empty() => Some(name),
            _ => None,
        })
    }

    /// Tokens the user is connected to, from the user side of the pairing.
    pub fn connected_tokens(&self, user_id: &str) -> Result<Vec<String>> {
        self.read_keys(&self.schema.user_connected_tokens(user_id))
    }

    pub fn push_tokens(&self, user_id: &str) -> Result<PushTokens> {
        Ok(match self.read(&self.schema.push_tokens(user_id))? {
            Some(Value::Object(map)) => PushTokens::Keyed(map.into_iter().map(|(k, _)| k).collect()),
            Some(Value::Array(items)) => PushTokens::Listed(
                items
                    .into_iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect(),
            ),
            _ => PushTokens::None,
        })
    }

    // -- Tokens --

    /// Ids of the token entries that carry metadata. Reservation markers such
    /// as `tokens/existing` are not teaching tokens.
    pub fn teaching_tokens(&self) -> Result<Vec<String>> {
        Ok(self
            .read_object(&self.schema.tokens())?
            .into_iter()
            .filter(|(_, entry)| entry.get("metadata").is_some())
            .map(|(token, _)| token)
            .collect())
    }

    pub fn teaching_token(&self, token: &str) -> Result<Option<TeachingToken>> {
        let path = self.schema.token(token);
        let Some(mut entry @ Value::Object(_)) = self.read(&path)? else {
            return Ok(None);
        };
        let Some(metadata) = entry.get_mut("metadata").map(Value::take) else {
            return Ok(None);
        };
        let Some(metadata) = decode::<TokenMetadata>(metadata, &path) else {
            return Ok(None);
        };
        let connected_users = match entry.get("connectedUsers") {
            Some(Value::Object(users)) => users.keys().cloned().collect(),
            _ => Vec::new(),
        };

        Ok(Some(TeachingToken {
            id: token.to_string(),
            metadata,
            connected_users,
        }))
    }

    pub fn teacher_id(&self, token: &str) -> Result<Option<String>> {
        Ok(match self.read(&self.schema.token_creator(token))? {
            Some(Value::String(id)) if !id.is_empty() => Some(id),
            _ => None,
        })
    }

    pub fn student_ids(&self, token: &str) -> Result<Vec<String>> {
        self.read_keys(&self.schema.token_connected_users(token))
    }

    // -- Answers --

    /// A student's answers under one token, keyed by question id. Entries that
    /// are not answer records (such as the legacy `id` marker) are left out.
    /// Messages are decoded one by one; a malformed message is dropped alone.
    pub fn answers(&self, token: &str, student_id: &str) -> Result<BTreeMap<String, Answer>> {
        let path = self.schema.student_answers(token, student_id);
        Ok(self
            .read_object(&path)?
            .into_iter()
            .filter_map(|(question_id, entry)| {
                let Value::Object(entry) = entry else {
                    return None;
                };
                let answer = decode_answer(entry, &path.child(question_id.as_str()));
                Some((question_id, answer))
            })
            .collect())
    }

    // -- Questions --

    pub fn questions(&self, teacher_id: &str) -> Result<BTreeMap<String, Question>> {
        let path = self.schema.questions(teacher_id);
        Ok(self
            .read_object(&path)?
            .into_iter()
            .filter(|(_, entry)| entry.is_object())
            .filter_map(|(question_id, entry)| {
                let mut question = decode::<Question>(entry, &path.child(question_id.as_str()))?;
                if question.id.is_empty() {
                    question.id = question_id.clone();
                }
                Some((question_id, question))
            })
            .collect())
    }

    pub fn question(&self, teacher_id: &str, question_id: &str) -> Result<Option<Question>> {
        Ok(self.questions(teacher_id)?.remove(question_id))
    }

    // -- App info --

    pub fn required_version(&self) -> Result<Option<String>> {
        Ok(match self.read(&self.schema.required_version())? {
            Some(Value::String(version)) => Some(version),
            _ => None,
        })
    }
}

fn decode_answer(mut entry: serde_json::Map<String, Value>, path: &TreePath) -> Answer {
    let discussion = match entry.remove("discussion") {
        Some(Value::Object(messages)) => messages
            .into_iter()
            .filter_map(|(message_id, message)| {
                match serde_json::from_value::<DiscussionMessage>(message) {
                    Ok(message) => Some((message_id, message)),
                    Err(e) => {
                        warn!("Skipping malformed message {}/discussion/{}: {}", path, message_id, e);
                        None
                    }
                }
            })
            .collect(),
        _ => BTreeMap::new(),
    };
    let created_by_id = match entry.remove("createdById") {
        Some(Value::String(id)) => Some(id),
        _ => None,
    };

    Answer {
        discussion,
        created_by_id,
    }
}

fn decode<T: DeserializeOwned>(value: Value, path: &TreePath) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            debug!("Ignoring malformed record at {}: {}", path, e);
            None
        }
    }
}
