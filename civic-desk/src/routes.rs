//! HTTP routes: Meta webhook verification, webhook delivery, health.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::limit::RequestBodyLimitLayer;

use civic_common::AckMode;

use crate::flow::DeskEngine;
use crate::message::InboundMessage;
use crate::whatsapp;

const BANNER: &str = "🤖 WhatsApp bot is running. Webhook endpoint is /webhook";

// ============================================================================
// State
// ============================================================================

/// Shared state for the desk HTTP server.
pub struct DeskState {
    pub engine: Arc<DeskEngine>,
    /// Token Meta echoes back during webhook verification
    pub verify_token: String,
    pub ack_mode: AckMode,
    /// Inbound queue, present in `immediate` mode
    pub message_tx: Option<mpsc::Sender<InboundMessage>>,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
struct WebhookResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl WebhookResponse {
    fn ok() -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
        })
    }

    fn failed(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: false,
            message: Some(message.into()),
        })
    }
}

// ============================================================================
// Health Routes
// ============================================================================

async fn banner() -> &'static str {
    BANNER
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        service: "civic-desk",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn ready(State(state): State<Arc<DeskState>>) -> impl IntoResponse {
    if state.message_tx.as_ref().is_some_and(mpsc::Sender::is_closed) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "not_ready",
                service: "civic-desk",
                version: env!("CARGO_PKG_VERSION"),
            }),
        );
    }

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ready",
            service: "civic-desk",
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

// ============================================================================
// WhatsApp Webhook
// ============================================================================

/// Meta webhook verification query params
#[derive(Debug, Deserialize)]
struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a
            .as_bytes()
            .iter()
            .zip(b.as_bytes())
            .fold(0u8, |acc, (x, y)| acc | (x ^ y))
            == 0
}

/// GET /webhook
async fn verify_webhook(
    State(state): State<Arc<DeskState>>,
    Query(params): Query<VerifyQuery>,
) -> impl IntoResponse {
    let token_matches = params
        .verify_token
        .as_deref()
        .is_some_and(|t| constant_time_eq(t, &state.verify_token));

    if params.mode.as_deref() == Some("subscribe") && token_matches {
        if let Some(challenge) = params.challenge {
            tracing::info!("Webhook verified");
            return (StatusCode::OK, challenge);
        }
        return (StatusCode::BAD_REQUEST, "Missing hub.challenge".to_string());
    }

    tracing::warn!("Webhook verification failed");
    (StatusCode::FORBIDDEN, "Forbidden".to_string())
}

/// POST /webhook
async fn receive_webhook(State(state): State<Arc<DeskState>>, body: Bytes) -> impl IntoResponse {
    let payload = match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(error = %e, "Webhook body is not JSON");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                WebhookResponse::failed("Invalid JSON payload"),
            );
        }
    };

    let messages = whatsapp::parse_webhook_payload(&payload);
    if messages.is_empty() {
        return (StatusCode::OK, WebhookResponse::ok());
    }
    tracing::info!(count = messages.len(), "Webhook delivery received");

    match (&state.ack_mode, &state.message_tx) {
        (AckMode::Immediate, Some(tx)) => {
            for message in messages {
                if let Err(e) = tx.send(message).await {
                    tracing::error!(error = %e, "Inbound queue closed");
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        WebhookResponse::failed("Inbound queue closed"),
                    );
                }
            }
        }
        _ => {
            for message in messages {
                state.engine.handle(message).await;
            }
        }
    }

    (StatusCode::OK, WebhookResponse::ok())
}

// ============================================================================
// Router Builder
// ============================================================================

/// Build the desk HTTP router.
pub fn build_router(state: Arc<DeskState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}
