//! Maintenance of user records and of the app-version gate.

use std::sync::LazyLock;

use chrono::Local;
use rand::seq::IndexedRandom;
use regex::Regex;
use tracing::info;

use atelier_db::{Repository, Schema, TreeStore};
use atelier_types::models::{User, UserTokens};

use crate::error::ServiceResult;
use crate::providers::IdentityProvider;

pub const ANONYMOUS_FIRST_NAME: &str = "Élève";
pub const ANONYMOUS_LAST_NAME: &str = "Anonyme";

pub const AVATARS: &[&str] = &[
    // Faces
    "🐶", "🐺", "🐱", "🦁", "🐯", "🐴", "🦄", "🐮", "🐷", "🐽", "🐸", "🐵", "🙈", "🙉", "🙊",
    // Pets & farm
    "🐹", "🐰", "🦊", "🐻", "🐼", "🐻‍❄️", "🐨", "🐔", "🐤", "🐥", "🐣", "🐧", "🦆", "🦅", "🦉", "🦇",
    // Wild animals
    "🐗", "🦓", "🦍", "🦧", "🐘", "🦛", "🦏", "🦒", "🐪", "🐫", "🦙", "🦌", "🦬",
    // Sea life
    "🐭", "🐟", "🐠", "🐡", "🦈", "🐬", "🐳", "🐋", "🦭", "🐙", "🦑", "🦀", "🦞", "🦐",
    // Reptiles & insects
    "🐍", "🦎", "🐢", "🐊", "🦖", "🦕", "🐝", "🐞", "🦋", "🐛", "🪲", "🪳", "🕷️", "🦂",
    // Birds
    "🦃", "🦚", "🦜", "🦢", "🦩", "🕊️", "🐦",
    // Extras
    "🦘", "🦥", "🦦", "🦨", "🦡", "🐿️", "🦔",
];

/// `first.last@domain`, splitting on the last dot before the `@`.
static EMAIL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*)\.(.*)@.*$").expect("valid email pattern"));

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Guesses a first and last name from an email address, falling back to the
/// anonymous student name.
pub fn infer_names(email: &str) -> (String, String) {
    match EMAIL_NAME.captures(email) {
        Some(caps) => (capitalize(&caps[1]), capitalize(&caps[2])),
        None => (ANONYMOUS_FIRST_NAME.to_string(), ANONYMOUS_LAST_NAME.to_string()),
    }
}

pub fn random_avatar() -> String {
    AVATARS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or("🦊")
        .to_string()
}

/// A user record as the app creates it at sign-up.
pub fn new_user(id: &str, first_name: &str, last_name: &str, email: &str) -> User {
    User {
        id: id.to_string(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email: email.to_string(),
        avatar: random_avatar(),
        creation_date: Some(Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()),
        student_notes: Default::default(),
        tokens: UserTokens::default(),
        change_password: false,
        terms_and_services_accepted: false,
        irsst_page_seen: false,
        has_seen_student_onboarding: false,
        has_seen_teacher_onboarding: false,
    }
}

/// Creates a user record for every authenticated identity that lacks one.
/// Records without a first name count as missing and are rewritten.
/// Returns the ids of the created users.
pub async fn backfill_missing_users<S: TreeStore + ?Sized>(
    store: &S,
    schema: &Schema,
    identity: &dyn IdentityProvider,
) -> ServiceResult<Vec<String>> {
    let identities = identity.list_users().await?;
    let repo = Repository::new(store, schema.clone());
    let mut created = Vec::new();

    for (uid, email) in identities {
        if repo.user_first_name(&uid)?.is_some() {
            continue;
        }

        let (first_name, last_name) = infer_names(&email);
        let user = new_user(&uid, &first_name, &last_name, &email);
        store.set(&schema.user(&uid), serde_json::to_value(&user).map_err(anyhow::Error::from)?)?;
        info!("Created missing user {} ({} {})", uid, first_name, last_name);
        created.push(uid);
    }

    Ok(created)
}

pub fn set_required_version<S: TreeStore + ?Sized>(
    store: &S,
    schema: &Schema,
    version: &str,
) -> ServiceResult<()> {
    store.set(&schema.required_version(), serde_json::Value::String(version.to_string()))?;
    info!("Required app version set to {}", version);
    Ok(())
}
