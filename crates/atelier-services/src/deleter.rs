//! Removal of a user and of every record elsewhere in the tree that names them.
//!
//! The tree has no multi-path transactions, so the deletion is a list of
//! independent steps, each of which is a no-op once applied. Running the whole
//! deletion again after an interruption finishes the job.

use tracing::{debug, info, warn};

use atelier_db::{Repository, Schema, TreePath, TreeStore};

use crate::error::{ServiceError, ServiceResult, validate_id};
use crate::providers::{BlobStorage, IdentityProvider};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeStep {
    DeletePath(TreePath),
    /// Remove every stored file whose name starts with `prefix`.
    DeleteBlobs { prefix: String },
    /// Remove the authentication record. Failure is tolerated.
    DeleteIdentity(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadePlan {
    pub user_id: String,
    pub steps: Vec<CascadeStep>,
    pub tokens_visited: usize,
    /// Teaching tokens created by the user; these are removed entirely.
    pub tokens_owned: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionReport {
    pub tokens_visited: usize,
    pub tokens_removed: usize,
    pub blobs_removed: usize,
    pub identity_removed: bool,
}

pub struct UserDeleter<'a, S: TreeStore + ?Sized> {
    store: &'a S,
    schema: Schema,
    blobs: &'a dyn BlobStorage,
    identity: &'a dyn IdentityProvider,
}

impl<'a, S: TreeStore + ?Sized> UserDeleter<'a, S> {
    pub fn new(
        store: &'a S,
        schema: Schema,
        blobs: &'a dyn BlobStorage,
        identity: &'a dyn IdentityProvider,
    ) -> Self {
        Self {
            store,
            schema,
            blobs,
            identity,
        }
    }

    /// Lists the steps that remove `user_id`, from a fresh read of the tree.
    pub fn plan(&self, user_id: &str) -> ServiceResult<CascadePlan> {
        validate_id(user_id)?;

        let mut repo = Repository::new(self.store, self.schema.clone());
        repo.warm()?;

        let schema = &self.schema;
        let mut steps = vec![CascadeStep::DeletePath(schema.questions(user_id))];
        let tokens = repo.teaching_tokens()?;
        let mut tokens_owned = 0;

        for token in &tokens {
            steps.push(CascadeStep::DeletePath(schema.student_answers(token, user_id)));
            steps.push(CascadeStep::DeleteBlobs {
                prefix: format!("{}/{}/", token, user_id),
            });

            if repo.teacher_id(token)?.as_deref() == Some(user_id) {
                tokens_owned += 1;
                for student_id in repo.student_ids(token)? {
                    steps.push(CascadeStep::DeletePath(
                        schema.user_connected_token(&student_id, token),
                    ));
                    steps.push(CascadeStep::DeletePath(
                        schema.user_extended_permission(&student_id, user_id),
                    ));
                }
                steps.push(CascadeStep::DeletePath(schema.token(token)));
                steps.push(CascadeStep::DeletePath(schema.existing_token(token)));
            } else {
                steps.push(CascadeStep::DeletePath(
                    schema.token_connected_user(token, user_id),
                ));
            }
        }

        steps.push(CascadeStep::DeletePath(schema.user(user_id)));
        steps.push(CascadeStep::DeleteIdentity(user_id.to_string()));

        Ok(CascadePlan {
            user_id: user_id.to_string(),
            steps,
            tokens_visited: tokens.len(),
            tokens_owned,
        })
    }

    /// Applies the steps in order. Stops at the first failing tree or storage
    /// step; the identity step never fails the run.
    pub async fn execute(&self, plan: &CascadePlan) -> ServiceResult<DeletionReport> {
        let mut report = DeletionReport {
            tokens_visited: plan.tokens_visited,
            tokens_removed: plan.tokens_owned,
            ..DeletionReport::default()
        };

        for step in &plan.steps {
            match step {
                CascadeStep::DeletePath(path) => {
                    self.store.delete(path)?;
                    debug!("Deleted {}", path);
                }
                CascadeStep::DeleteBlobs { prefix } => {
                    let names = self.blobs.list(prefix).await.map_err(ServiceError::Storage)?;
                    for name in &names {
                        self.blobs.delete(name).await.map_err(ServiceError::Storage)?;
                    }
                    report.blobs_removed += names.len();
                }
                CascadeStep::DeleteIdentity(uid) => match self.identity.delete_user(uid).await {
                    Ok(()) => report.identity_removed = true,
                    Err(e) => warn!("Identity record of {} not deleted: {}", uid, e),
                },
            }
        }

        info!(
            "Deleted user {}: {} tokens visited, {} removed, {} files",
            plan.user_id, report.tokens_visited, report.tokens_removed, report.blobs_removed
        );
        Ok(report)
    }

    pub async fn delete_user(&self, user_id: &str) -> ServiceResult<DeletionReport> {
        let plan = self.plan(user_id)?;
        self.execute(&plan).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeIdentities, MemoryBlobs, classroom, read, seeded_db};
    use atelier_db::Database;
    use serde_json::json;

    fn deleter<'a>(
        db: &'a Database,
        blobs: &'a MemoryBlobs,
        identities: &'a FakeIdentities,
    ) -> UserDeleter<'a, Database> {
        UserDeleter::new(db, Schema::default(), blobs, identities)
    }

    fn identities() -> FakeIdentities {
        FakeIdentities::with(&[
            ("martin", "ada.martin@example.org"),
            ("s1", "lea.roy@example.org"),
            ("lonely", "lonely@example.org"),
        ])
    }

    #[tokio::test]
    async fn teacher_deletion_unlinks_every_connected_student() {
        let db = seeded_db(classroom());
        let blobs = MemoryBlobs::with(&["tok-a/martin/cover.jpg", "tok-a/s1/photo.jpg"]);
        let ids = identities();

        let report = deleter(&db, &blobs, &ids).delete_user("martin").await.unwrap();

        assert_eq!(report.tokens_visited, 2);
        assert_eq!(report.tokens_removed, 1);
        assert_eq!(report.blobs_removed, 1);
        assert!(report.identity_removed);

        assert_eq!(read(&db, "v0_1_0/tokens/tok-a"), None);
        assert_eq!(read(&db, "v0_1_0/tokens/existing/tok-a"), None);
        assert_eq!(read(&db, "v0_1_0/questions/martin"), None);
        assert_eq!(read(&db, "v0_1_0/users/martin"), None);
        for student in ["s1", "s2"] {
            assert_eq!(read(&db, &format!("v0_1_0/users/{student}/tokens/connected/tok-a")), None);
            assert_eq!(
                read(&db, &format!("v0_1_0/users/{student}/tokens/userWithExtendedPermissions/martin")),
                None
            );
            // The students themselves stay.
            assert!(read(&db, &format!("v0_1_0/users/{student}")).is_some());
        }

        // Unrelated pairing is untouched.
        assert!(read(&db, "v0_1_0/tokens/tok-b").is_some());
        assert_eq!(read(&db, "v0_1_0/tokens/existing/tok-b"), Some(json!(true)));
        assert_eq!(blobs.names(), ["tok-a/s1/photo.jpg"]);
    }

    #[tokio::test]
    async fn student_deletion_only_disconnects_from_token() {
        let db = seeded_db(classroom());
        let blobs = MemoryBlobs::with(&["tok-a/s1/photo.jpg", "tok-a/s2/photo.jpg"]);
        let ids = identities();

        let report = deleter(&db, &blobs, &ids).delete_user("s1").await.unwrap();

        assert_eq!(report.tokens_removed, 0);
        assert_eq!(report.blobs_removed, 1);
        assert_eq!(read(&db, "v0_1_0/tokens/tok-a/connectedUsers/s1"), None);
        assert_eq!(read(&db, "v0_1_0/tokens/tok-a/connectedUsers/s2"), Some(json!(true)));
        assert!(read(&db, "v0_1_0/tokens/tok-a/metadata").is_some());
        assert_eq!(read(&db, "v0_1_0/answers/tok-a/s1"), None);
        assert!(read(&db, "v0_1_0/answers/tok-a/s2").is_some());
        assert_eq!(read(&db, "v0_1_0/users/s1"), None);
        assert_eq!(blobs.names(), ["tok-a/s2/photo.jpg"]);
    }

    #[tokio::test]
    async fn user_without_tokens_only_loses_own_record() {
        let mut tree = classroom();
        tree["users"]["lonely"] = json!({ "id": "lonely", "firstName": "Solo" });
        let db = seeded_db(tree);
        let blobs = MemoryBlobs::default();
        let ids = identities();

        deleter(&db, &blobs, &ids).delete_user("lonely").await.unwrap();

        let mut expected = classroom();
        expected["users"].as_object_mut().unwrap().remove("lonely");
        assert_eq!(read(&db, "v0_1_0"), Some(expected));
        assert_eq!(*ids.deleted.lock().unwrap(), ["lonely"]);
    }

    #[tokio::test]
    async fn deletion_is_idempotent() {
        let db = seeded_db(classroom());
        let blobs = MemoryBlobs::default();
        let ids = identities();
        let deleter = deleter(&db, &blobs, &ids);

        deleter.delete_user("martin").await.unwrap();
        let once = read(&db, "v0_1_0");

        let second = deleter.delete_user("martin").await.unwrap();
        assert_eq!(read(&db, "v0_1_0"), once);
        assert!(!second.identity_removed);
        assert_eq!(second.tokens_removed, 0);
    }

    #[tokio::test]
    async fn rerun_after_partial_cascade_converges() {
        let db = seeded_db(classroom());
        let blobs = MemoryBlobs::default();
        let ids = identities();
        let deleter = deleter(&db, &blobs, &ids);

        // Simulate a crash after the first few steps.
        let plan = deleter.plan("martin").unwrap();
        for step in plan.steps.iter().take(3) {
            if let CascadeStep::DeletePath(path) = step {
                db.delete(path).unwrap();
            }
        }
        deleter.delete_user("martin").await.unwrap();

        let reference = seeded_db(classroom());
        let blobs2 = MemoryBlobs::default();
        let ids2 = identities();
        UserDeleter::new(&reference, Schema::default(), &blobs2, &ids2)
            .delete_user("martin")
            .await
            .unwrap();

        assert_eq!(read(&db, "v0_1_0"), read(&reference, "v0_1_0"));
    }

    #[tokio::test]
    async fn identity_failure_is_swallowed() {
        let db = seeded_db(classroom());
        let blobs = MemoryBlobs::default();
        let ids = FakeIdentities::default();

        let report = deleter(&db, &blobs, &ids).delete_user("s2").await.unwrap();
        assert!(!report.identity_removed);
        assert_eq!(read(&db, "v0_1_0/users/s2"), None);
    }

    #[test]
    fn plan_follows_cascade_order() {
        let db = seeded_db(classroom());
        let blobs = MemoryBlobs::default();
        let ids = identities();
        let plan = deleter(&db, &blobs, &ids).plan("s3").unwrap();
        let schema = Schema::default();

        assert_eq!(plan.steps.first(), Some(&CascadeStep::DeletePath(schema.questions("s3"))));
        assert_eq!(
            &plan.steps[plan.steps.len() - 2..],
            [
                CascadeStep::DeletePath(schema.user("s3")),
                CascadeStep::DeleteIdentity("s3".into()),
            ]
        );
        assert!(plan.steps.contains(&CascadeStep::DeletePath(
            schema.token_connected_user("tok-b", "s3")
        )));
        assert!(plan.steps.contains(&CascadeStep::DeleteBlobs {
            prefix: "tok-a/s3/".into()
        }));
    }

    #[test]
    fn empty_user_id_is_refused() {
        let db = seeded_db(classroom());
        let blobs = MemoryBlobs::default();
        let ids = identities();
        let result = deleter(&db, &blobs, &ids).plan("");
        assert!(matches!(result, Err(ServiceError::InvalidIdentifier(_))));
    }
}
