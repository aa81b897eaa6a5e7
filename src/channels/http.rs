//! HTTP channel — the Bot Framework messaging endpoint.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use super::connector::ConnectorClient;
use crate::activity::{Activity, OutgoingActivity};
use crate::error::ChannelError;
use crate::router::DialogRouter;

/// Plain-text answer of `GET /`.
pub const ROOT_BANNER: &str = "Bot is running ✅";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<DialogRouter>,
    pub connector: ConnectorClient,
}

/// Build the Axum router with the messaging endpoint and status routes.
pub fn bot_routes(router: Arc<DialogRouter>, connector: ConnectorClient) -> Router {
    let state = AppState { router, connector };

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/messages", post(messages))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn root() -> &'static str {
    ROOT_BANNER
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn messages(State(state): State<AppState>, body: Bytes) -> Response {
    let activity: Activity = match serde_json::from_slice(&body) {
        Ok(activity) => activity,
        Err(e) => {
            warn!(error = %e, "Rejecting malformed activity");
            return bad_request(format!("Invalid activity: {e}"));
        }
    };

    let expects_replies = activity.expects_replies();
    if !expects_replies && activity.service_url.is_none() {
        warn!("Rejecting activity without serviceUrl");
        return bad_request("Invalid activity: missing serviceUrl".to_string());
    }

    if expects_replies {
        let replies = state.router.handle_turn(activity).await;
        debug!(count = replies.len(), "Turn replies ready");
        return Json(json!({ "activities": replies })).into_response();
    }

    // Replies are posted as the turn flushes them, so the working notice
    // reaches the user before a slow webhook answers.
    let (outbox, mut queued) = mpsc::unbounded_channel::<OutgoingActivity>();
    let connector = state.connector.clone();
    let inbound = activity.clone();
    let delivery = tokio::spawn(async move {
        let mut result = Ok(());
        while let Some(reply) = queued.recv().await {
            if result.is_ok() {
                result = connector.send(&inbound, &reply).await;
            }
        }
        result
    });

    state.router.handle_turn_streaming(activity, outbox).await;
    let delivered = match delivery.await {
        Ok(result) => result,
        Err(e) => Err(ChannelError::SendFailed {
            name: "connector".to_string(),
            reason: e.to_string(),
        }),
    };

    match delivered {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => {
            error!(error = %e, "Failed to deliver replies");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}
