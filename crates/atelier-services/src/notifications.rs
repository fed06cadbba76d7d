//! Push notification for a new discussion message, sent to the other side of
//! the teacher/student pair.
//!
//! Deciding who to notify (`route`) only reads the tree; sending and pruning
//! stale delivery tokens (`dispatch`) is separate. Both are safe to repeat
//! when the trigger fires twice for the same message.

use serde_json::Value;
use tracing::{debug, info};

use atelier_db::{Repository, Schema, TreeStore};
use atelier_types::events::DiscussionMessageCreated;
use atelier_types::models::PushTokens;

use crate::error::{ServiceError, ServiceResult};
use crate::providers::{
    BatchResponse, MulticastMessage, PushNotification, PushService, SendOutcome,
};

pub const NOTIFICATION_TITLE: &str = "Nouvelle réponse";
pub const TEACHER_MESSAGE_BODY: &str = "Ton enseignant.e a envoyé un message!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub receiver_id: String,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub attempted: usize,
    pub delivered: usize,
    /// Delivery tokens removed from the receiver because they are dead.
    pub pruned: Vec<String>,
}

fn student_message_body(first_name: &str, last_name: &str, avatar: &str) -> String {
    format!("{} {} ({}) vous a envoyé un message.", first_name, last_name, avatar)
}

/// Works out who should hear about `event`. `None` when the event cannot be
/// routed: missing creator or path parameter, a token without a teacher, or
/// a creator who is neither the student nor the teacher of the pairing.
pub fn route<S: TreeStore + ?Sized>(
    repo: &Repository<'_, S>,
    event: &DiscussionMessageCreated,
) -> ServiceResult<Option<Notification>> {
    let Some(creator_id) = event.creator_id() else {
        return Ok(None);
    };
    if !event.has_route() {
        return Ok(None);
    }
    let Some(teacher_id) = repo.teacher_id(&event.token)? else {
        debug!("Token {} has no teacher, dropping message {}", event.token, event.message_id);
        return Ok(None);
    };

    let (receiver_id, body) = if creator_id == event.student_id {
        let body = match repo.user(&event.student_id)? {
            Some(student) => student_message_body(&student.first_name, &student.last_name, &student.avatar),
            None => student_message_body("", "", ""),
        };
        (teacher_id, body)
    } else if creator_id == teacher_id {
        (event.student_id.clone(), TEACHER_MESSAGE_BODY.to_string())
    } else {
        debug!(
            "Creator {} is not part of pairing {}/{}, dropping message {}",
            creator_id, event.token, event.student_id, event.message_id
        );
        return Ok(None);
    };

    Ok(Some(Notification {
        receiver_id,
        title: NOTIFICATION_TITLE.to_string(),
        body,
    }))
}

/// A notification bound to the receiver's delivery tokens as they were read
/// before sending.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub receiver_id: String,
    pub push_tokens: PushTokens,
    pub message: MulticastMessage,
}

impl Delivery {
    pub fn is_empty(&self) -> bool {
        self.message.tokens.is_empty()
    }
}

/// Reads the receiver's delivery tokens.
pub fn prepare<S: TreeStore + ?Sized>(
    store: &S,
    schema: &Schema,
    notification: &Notification,
) -> ServiceResult<Delivery> {
    let repo = Repository::new(store, schema.clone());
    let push_tokens = repo.push_tokens(&notification.receiver_id)?;
    let message = MulticastMessage {
        tokens: push_tokens.tokens().to_vec(),
        notification: PushNotification {
            title: notification.title.clone(),
            body: notification.body.clone(),
        },
    };
    Ok(Delivery {
        receiver_id: notification.receiver_id.clone(),
        push_tokens,
        message,
    })
}

pub async fn send(push: &dyn PushService, delivery: &Delivery) -> ServiceResult<BatchResponse> {
    push.send_multicast(&delivery.message)
        .await
        .map_err(ServiceError::Push)
}

/// Removes the tokens `response` reports as unregistered or invalid.
pub fn settle<S: TreeStore + ?Sized>(
    store: &S,
    schema: &Schema,
    delivery: &Delivery,
    response: &BatchResponse,
) -> ServiceResult<DispatchReport> {
    let stale: Vec<String> = delivery
        .message
        .tokens
        .iter()
        .zip(&response.outcomes)
        .filter(|(_, outcome)| matches!(outcome, SendOutcome::Failed(failure) if failure.is_stale()))
        .map(|(token, _)| token.clone())
        .collect();

    if !stale.is_empty() {
        prune_tokens(store, schema, &delivery.receiver_id, &delivery.push_tokens, &stale)?;
    }

    let attempted = delivery.message.tokens.len();
    info!(
        "Notified {}: {}/{} delivered, {} stale tokens pruned",
        delivery.receiver_id,
        response.delivered_count(),
        attempted,
        stale.len()
    );
    Ok(DispatchReport {
        attempted,
        delivered: response.delivered_count(),
        pruned: stale,
    })
}

/// Sends `notification` to every delivery token of the receiver and removes
/// the tokens the push service reports as unregistered or invalid.
pub async fn dispatch<S: TreeStore + ?Sized>(
    store: &S,
    schema: &Schema,
    push: &dyn PushService,
    notification: &Notification,
) -> ServiceResult<DispatchReport> {
    let delivery = prepare(store, schema, notification)?;
    if delivery.is_empty() {
        debug!("User {} has no delivery tokens", notification.receiver_id);
        return Ok(DispatchReport::default());
    }
    let response = send(push, &delivery).await?;
    settle(store, schema, &delivery, &response)
}

fn prune_tokens<S: TreeStore + ?Sized>(
    store: &S,
    schema: &Schema,
    user_id: &str,
    current: &PushTokens,
    stale: &[String],
) -> ServiceResult<()> {
    let path = schema.push_tokens(user_id);
    match current {
        PushTokens::Keyed(_) => {
            for token in stale {
                store.delete(&path.child(token.as_str()))?;
            }
        }
        PushTokens::Listed(_) => {
            // Indices come from a fresh read so that a token registered since
            // the send keeps its slot.
            let Some(Value::Array(items)) = store.get(&path)? else {
                return Ok(());
            };
            for (index, item) in items.iter().enumerate() {
                if item.as_str().is_some_and(|token| stale.iter().any(|s| s == token)) {
                    store.delete(&path.child(index.to_string()))?;
                }
            }
        }
        PushTokens::None => {}
    }
    Ok(())
}

/// Handles trigger events end to end.
pub struct NotificationRouter<'a, S: TreeStore + ?Sized> {
    store: &'a S,
    schema: Schema,
    push: &'a dyn PushService,
}

impl<'a, S: TreeStore + ?Sized> NotificationRouter<'a, S> {
    pub fn new(store: &'a S, schema: Schema, push: &'a dyn PushService) -> Self {
        Self { store, schema, push }
    }

    /// `None` when the event was dropped as unroutable.
    pub async fn handle(&self, event: &DiscussionMessageCreated) -> ServiceResult<Option<DispatchReport>> {
        let repo = Repository::new(self.store, self.schema.clone());
        let Some(notification) = route(&repo, event)? else {
            return Ok(None);
        };
        let report = dispatch(self.store, &self.schema, self.push, &notification).await?;
        Ok(Some(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::PushFailure;
    use crate::testing::{RecordingPush, classroom, read, seeded_db};
    use atelier_db::TreePath;
    use atelier_types::events::NewDiscussionMessage;
    use serde_json::json;

    fn event(token: &str, student_id: &str, creator_id: Option<&str>) -> DiscussionMessageCreated {
        DiscussionMessageCreated {
            token: token.into(),
            student_id: student_id.into(),
            question_id: "q1".into(),
            message_id: "m9".into(),
            message: NewDiscussionMessage {
                creator_id: creator_id.map(str::to_string),
                creation_time_stamp: Some(1),
                text: Some("Allô".into()),
            },
        }
    }

    #[test]
    fn student_message_goes_to_teacher_with_student_identity() {
        let db = seeded_db(classroom());
        let repo = Repository::new(&db, Schema::default());

        let notification = route(&repo, &event("tok-a", "s1", Some("s1"))).unwrap().unwrap();
        assert_eq!(notification.receiver_id, "martin");
        assert_eq!(notification.title, NOTIFICATION_TITLE);
        assert_eq!(notification.body, "Léa Roy (🐸) vous a envoyé un message.");
    }

    #[test]
    fn teacher_message_goes_to_student() {
        let db = seeded_db(classroom());
        let repo = Repository::new(&db, Schema::default());

        let notification = route(&repo, &event("tok-a", "s2", Some("martin"))).unwrap().unwrap();
        assert_eq!(notification.receiver_id, "s2");
        assert_eq!(notification.body, TEACHER_MESSAGE_BODY);
    }

    #[test]
    fn unroutable_events_are_dropped() {
        let db = seeded_db(classroom());
        let repo = Repository::new(&db, Schema::default());

        // Teacher of another pairing
        assert_eq!(route(&repo, &event("tok-a", "s1", Some("tremblay"))).unwrap(), None);
        assert_eq!(route(&repo, &event("tok-a", "s1", None)).unwrap(), None);
        assert_eq!(route(&repo, &event("tok-a", "", Some("s1"))).unwrap(), None);
        assert_eq!(route(&repo, &event("tok-gone", "s1", Some("s1"))).unwrap(), None);
    }

    #[tokio::test]
    async fn unroutable_event_sends_nothing() {
        let db = seeded_db(classroom());
        let push = RecordingPush::default();
        let router = NotificationRouter::new(&db, Schema::default(), &push);

        let outcome = router.handle(&event("tok-a", "s1", Some("s3"))).await.unwrap();
        assert_eq!(outcome, None);
        assert!(push.sent().is_empty());
    }

    #[tokio::test]
    async fn receiver_without_tokens_is_not_sent_to() {
        let db = seeded_db(classroom());
        let push = RecordingPush::default();
        let router = NotificationRouter::new(&db, Schema::default(), &push);

        let report = router.handle(&event("tok-b", "s3", Some("s3"))).await.unwrap().unwrap();
        assert_eq!(report, DispatchReport::default());
        assert!(push.sent().is_empty());
    }

    #[tokio::test]
    async fn multicast_reaches_every_token() {
        let db = seeded_db(classroom());
        let push = RecordingPush::default();
        let router = NotificationRouter::new(&db, Schema::default(), &push);

        let report = router.handle(&event("tok-a", "s1", Some("s1"))).await.unwrap().unwrap();
        assert_eq!(report.attempted, 2);
        assert_eq!(report.delivered, 2);

        let sent = push.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].tokens, ["fcm-m1", "fcm-m2"]);
    }

    #[tokio::test]
    async fn invalid_keyed_token_is_pruned_alone() {
        let db = seeded_db(classroom());
        let push = RecordingPush::failing(&[("fcm-m2", PushFailure::NotRegistered)]);
        let router = NotificationRouter::new(&db, Schema::default(), &push);

        let report = router.handle(&event("tok-a", "s1", Some("s1"))).await.unwrap().unwrap();
        assert_eq!(report.pruned, ["fcm-m2"]);
        assert_eq!(
            read(&db, "v0_1_0/users/martin/pushNotificationsTokens"),
            Some(json!({ "fcm-m1": true }))
        );
    }

    #[tokio::test]
    async fn invalid_listed_token_is_pruned_alone() {
        let db = seeded_db(classroom());
        let push = RecordingPush::failing(&[
            ("fcm-s1a", PushFailure::InvalidArgument),
            ("fcm-s1b", PushFailure::Other("unavailable".into())),
        ]);
        let router = NotificationRouter::new(&db, Schema::default(), &push);

        let report = router.handle(&event("tok-a", "s1", Some("martin"))).await.unwrap().unwrap();
        assert_eq!(report.delivered, 0);
        assert_eq!(report.pruned, ["fcm-s1a"]);
        assert_eq!(
            read(&db, "v0_1_0/users/s1/pushNotificationsTokens"),
            Some(json!([null, "fcm-s1b"]))
        );
        let repo = Repository::new(&db, Schema::default());
        assert_eq!(
            repo.push_tokens("s1").unwrap(),
            PushTokens::Listed(vec!["fcm-s1b".into()])
        );
    }

    #[test]
    fn listed_pruning_keeps_tokens_registered_after_the_send() {
        let db = seeded_db(classroom());
        let schema = Schema::default();
        let sent_to = PushTokens::Listed(vec!["fcm-s1a".into(), "fcm-s1b".into()]);
        // The app rewrote the list with a new token while the send was in flight.
        db.set(
            &TreePath::parse("v0_1_0/users/s1/pushNotificationsTokens"),
            json!(["fcm-s1a", "fcm-s1b", "fcm-s1c"]),
        )
        .unwrap();

        prune_tokens(&db, &schema, "s1", &sent_to, &["fcm-s1a".to_string()]).unwrap();

        assert_eq!(
            read(&db, "v0_1_0/users/s1/pushNotificationsTokens"),
            Some(json!([null, "fcm-s1b", "fcm-s1c"]))
        );
    }

    #[test]
    fn pruning_every_listed_token_removes_the_list() {
        let db = seeded_db(classroom());
        let sent_to = PushTokens::Listed(vec!["fcm-s1a".into(), "fcm-s1b".into()]);

        prune_tokens(
            &db,
            &Schema::default(),
            "s1",
            &sent_to,
            &["fcm-s1a".to_string(), "fcm-s1b".to_string()],
        )
        .unwrap();

        assert_eq!(read(&db, "v0_1_0/users/s1/pushNotificationsTokens"), None);
        assert!(read(&db, "v0_1_0/users/s1/firstName").is_some());
    }

    #[tokio::test]
    async fn repeated_event_is_harmless() {
        let db = seeded_db(classroom());
        let push = RecordingPush::failing(&[("fcm-m1", PushFailure::NotRegistered)]);
        let router = NotificationRouter::new(&db, Schema::default(), &push);
        let created = event("tok-a", "s1", Some("s1"));

        router.handle(&created).await.unwrap();
        let second = router.handle(&created).await.unwrap().unwrap();

        assert!(second.pruned.is_empty());
        assert_eq!(
            read(&db, "v0_1_0/users/martin/pushNotificationsTokens"),
            Some(json!({ "fcm-m2": true }))
        );
    }
}
