use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use atelier_db::{Database, Schema};
use atelier_services::accounts;
use atelier_services::config::Settings;
use atelier_services::deleter::UserDeleter;
use atelier_services::identity::LocalIdentityProvider;
use atelier_services::projector;
use atelier_services::snapshot;
use atelier_services::storage::DirectoryBlobStorage;

#[derive(Parser, Debug)]
#[command(name = "atelier-admin")]
#[command(author, version, about = "Maintenance tasks for the atelier tree", long_about = None)]
struct Args {
    /// Database file, overrides ATELIER_DB_PATH
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the discussion export as JSON rows
    Export {
        /// Output file, defaults to ATELIER_EXPORT_DIR/export.json
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Remove a user and everything that belongs to them
    DeleteUser {
        /// Asked for on stdin when omitted
        #[arg(long)]
        user_id: Option<String>,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Create user records for identities that have none
    FixMissingUsers,
    /// Set the minimum app version clients must run
    SetRequiredVersion { version: String },
    /// Write the whole tree to a JSON file
    Dump {
        #[arg(long)]
        out: PathBuf,

        /// Also copy every stored file into this directory
        #[arg(long)]
        with_storage: Option<PathBuf>,
    },
    /// Replace top-level nodes with the contents of a dump
    Load {
        #[arg(long)]
        from: PathBuf,
    },
    /// Register an authenticated identity
    AddIdentity {
        #[arg(long)]
        uid: String,
        #[arg(long)]
        email: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atelier_admin=info,atelier_services=info".into()),
        )
        .init();

    let args = Args::parse();
    let mut settings = Settings::from_env()?;
    if let Some(db) = args.db {
        settings.db_path = db;
    }

    let db = Arc::new(Database::open(&settings.db_path)?);
    let schema = Schema::new(settings.data_root.clone());

    match args.command {
        Command::Export { out } => {
            let rows = projector::project(db.as_ref(), schema)?;
            let out = match out {
                Some(path) => path,
                None => {
                    tokio::fs::create_dir_all(&settings.export_dir).await?;
                    settings.export_dir.join("export.json")
                }
            };
            let json = serde_json::to_string_pretty(&rows)?;
            tokio::fs::write(&out, json)
                .await
                .with_context(|| format!("Failed to write {}", out.display()))?;
            info!("Exported {} rows to {}", rows.len(), out.display());
        }
        Command::DeleteUser { user_id, yes } => {
            let entered = match user_id {
                Some(id) => id,
                None => prompt("User id to delete: ")?,
            };
            let Some(user_id) = requested_user_id(&entered) else {
                warn!("No user id provided, cancelling");
                return Ok(());
            };
            if !yes && !confirm(&format!("Delete user {} and all their data? y/[n] ", user_id))? {
                warn!("Deletion of {} cancelled", user_id);
                return Ok(());
            }

            let blobs = DirectoryBlobStorage::new(settings.storage_dir.clone()).await?;
            let identity = LocalIdentityProvider::new(db.clone());
            let deleter = UserDeleter::new(db.as_ref(), schema, &blobs, &identity);
            let report = deleter.delete_user(&user_id).await?;
            info!(
                "Deleted {}: {} tokens visited, {} removed, {} files, identity removed: {}",
                user_id,
                report.tokens_visited,
                report.tokens_removed,
                report.blobs_removed,
                report.identity_removed
            );
        }
        Command::FixMissingUsers => {
            let identity = LocalIdentityProvider::new(db.clone());
            let created = accounts::backfill_missing_users(db.as_ref(), &schema, &identity).await?;
            info!("Created {} missing users", created.len());
        }
        Command::SetRequiredVersion { version } => {
            accounts::set_required_version(db.as_ref(), &schema, &version)?;
        }
        Command::Dump { out, with_storage } => {
            let tree = snapshot::dump(&db)?;
            tokio::fs::write(&out, serde_json::to_string_pretty(&tree)?)
                .await
                .with_context(|| format!("Failed to write {}", out.display()))?;
            info!("Dumped tree to {}", out.display());

            if let Some(dir) = with_storage {
                let source = DirectoryBlobStorage::new(settings.storage_dir.clone()).await?;
                let target = DirectoryBlobStorage::new(dir).await?;
                snapshot::mirror_storage(&source, &target).await?;
            }
        }
        Command::Load { from } => {
            let raw = tokio::fs::read_to_string(&from)
                .await
                .with_context(|| format!("Failed to read {}", from.display()))?;
            let tree: serde_json::Value = serde_json::from_str(&raw)?;
            snapshot::load(db.as_ref(), tree)?;
        }
        Command::AddIdentity { uid, email } => {
            db.upsert_identity(&uid, &email)?;
            info!("Identity {} <{}> registered", uid, email);
        }
    }

    Ok(())
}

fn prompt(question: &str) -> Result<String> {
    print!("{}", question);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// `None` for blank input, which cancels the deletion before any prompt.
fn requested_user_id(entered: &str) -> Option<String> {
    let id = entered.trim();
    (!id.is_empty()).then(|| id.to_string())
}

fn confirm(question: &str) -> Result<bool> {
    let answer = prompt(question)?;
    Ok(answer.eq_ignore_ascii_case("y"))
}
