use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tracing::error;

use atelier_db::{Database, Repository, Schema};
use atelier_services::notifications::{self, Delivery};
use atelier_services::{ServiceError, ServiceResult};
use atelier_services::projector;
use atelier_services::providers::PushService;
use atelier_types::api::{ErrorResponse, EventAck};
use atelier_types::events::DiscussionMessageCreated;
use atelier_types::export::ExportRow;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub schema: Schema,
    pub push: Arc<dyn PushService>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/events/discussion-created", post(discussion_created))
        .route("/export", get(export))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Trigger target for a new message under
/// `answers/{token}/{studentId}/{questionId}/discussion/{messageId}`.
/// Unroutable events are acknowledged, not rejected, so the trigger does not retry them.
pub async fn discussion_created(
    State(state): State<AppState>,
    Json(event): Json<DiscussionMessageCreated>,
) -> Result<Json<EventAck>, StatusCode> {
    let message_id = event.message_id.clone();
    let failed = |e: ServiceError| {
        error!("Notification for message {} failed: {}", message_id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    };

    let db = state.db.clone();
    let schema = state.schema.clone();
    let delivery = tokio::task::spawn_blocking(move || -> ServiceResult<Option<Delivery>> {
        let repo = Repository::new(db.as_ref(), schema.clone());
        match notifications::route(&repo, &event)? {
            Some(notification) => notifications::prepare(db.as_ref(), &schema, &notification).map(Some),
            None => Ok(None),
        }
    })
    .await
    .map_err(join_failed)?
    .map_err(&failed)?;

    let Some(delivery) = delivery else {
        return Ok(Json(EventAck::default()));
    };
    if delivery.is_empty() {
        return Ok(Json(EventAck {
            routed: true,
            ..EventAck::default()
        }));
    }

    let response = notifications::send(state.push.as_ref(), &delivery)
        .await
        .map_err(&failed)?;

    let db = state.db.clone();
    let schema = state.schema.clone();
    let report = tokio::task::spawn_blocking(move || {
        notifications::settle(db.as_ref(), &schema, &delivery, &response)
    })
    .await
    .map_err(join_failed)?
    .map_err(&failed)?;

    Ok(Json(EventAck {
        routed: true,
        attempted: report.attempted,
        delivered: report.delivered,
        pruned: report.pruned,
    }))
}

fn join_failed(e: tokio::task::JoinError) -> StatusCode {
    error!("spawn_blocking join error: {}", e);
    StatusCode::INTERNAL_SERVER_ERROR
}

pub async fn export(
    State(state): State<AppState>,
) -> Result<Json<Vec<ExportRow>>, (StatusCode, Json<ErrorResponse>)> {
    // The walk reads the whole tree; keep it off the async runtime
    let db = state.db.clone();
    let schema = state.schema.clone();
    let result = tokio::task::spawn_blocking(move || projector::project(db.as_ref(), schema))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            internal_error()
        })?;

    match result {
        Ok(rows) => Ok(Json(rows)),
        Err(e @ (ServiceError::UnsupportedConfiguration { .. } | ServiceError::CategoryOutOfRange { .. })) => {
            Err((
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ErrorResponse { error: e.to_string() }),
            ))
        }
        Err(e) => {
            error!("Export failed: {}", e);
            Err(internal_error())
        }
    }
}

fn internal_error() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "internal error".to_string(),
        }),
    )
}

pub async fn health() -> &'static str {
    "ok"
}
