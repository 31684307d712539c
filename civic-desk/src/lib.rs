//! Civic Desk - WhatsApp conversation desk for municipal services.
//!
//! Turns WhatsApp Cloud API webhook events into guided, multi-step
//! transactions: lodging a query, a complaint, a suggestion or a service
//! request, and looking up a billing statement.
//!
//! ```text
//! Meta → POST /webhook → parse → DeskEngine ── classify ── step handler
//!                                    │                          │
//!                          QueryBackend / BillingPortal    Presenter
//!                                    │                          │
//! User ←──────────────── WhatsAppChannel ←───────── OutgoingMessage
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod category;
pub mod command;
pub mod dispatch;
pub mod error;
pub mod flow;
pub mod fulfillment;
pub mod message;
pub mod notify;
pub mod presenter;
pub mod routes;
pub mod session;
pub mod tracking;
pub mod traits;
pub mod whatsapp;

// Re-export commonly used types
pub use category::Category;
pub use command::{classify, Command};
pub use error::{DeskError, DeskResult};
pub use flow::{DeskEngine, DeskSettings, FeedbackEntry, FeedbackLog};
pub use fulfillment::{BillingPortal, Fulfillment, QueryBackend};
pub use message::{Inbound, InboundMessage, OutgoingContent, OutgoingMessage};
pub use notify::{Notification, Notifier};
pub use routes::{build_router, DeskState};
pub use session::{Session, SessionStore};
pub use traits::{Channel, ChannelError, ChannelResult};
pub use whatsapp::WhatsAppChannel;

use std::sync::Arc;

use civic_common::{AckMode, Config};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Assemble the engine and HTTP state from configuration.
///
/// In `immediate` ack mode this also spawns the inbound processor; its
/// handle is returned so the caller can stop it on shutdown.
pub fn build_desk(config: &Config) -> anyhow::Result<(Arc<DeskState>, Option<JoinHandle<()>>)> {
    let channel: Arc<dyn Channel> = Arc::new(WhatsAppChannel::new(&config.whatsapp));
    let fulfillment = Fulfillment::from_config(config)?;
    let notifier = notify::from_config(&config.smtp);

    let engine = Arc::new(
        DeskEngine::new(channel, fulfillment, notifier)
            .with_settings(DeskSettings::from_config(&config.desk, &config.portal)),
    );

    let (message_tx, processor) = match config.desk.ack_mode {
        AckMode::Immediate => {
            let (tx, rx) = mpsc::channel(config.desk.queue_capacity.max(1));
            let handle = dispatch::spawn_processor(Arc::clone(&engine), rx);
            (Some(tx), Some(handle))
        }
        AckMode::AfterProcessing => (None, None),
    };

    let state = Arc::new(DeskState {
        engine,
        verify_token: config.whatsapp.verify_token.clone(),
        ack_mode: config.desk.ack_mode,
        message_tx,
    });

    Ok((state, processor))
}

/// Start the desk HTTP server and run until Ctrl-C.
pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    let addr = config.bind_address();
    let (state, processor) = build_desk(config)?;

    // Reclaim idle session slots
    let sessions = Arc::clone(state.engine.sessions());
    let prune_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            sessions.prune_idle();
        }
    });

    let router = build_router(state, config.server.max_body_bytes);

    tracing::info!(
        ack_mode = ?config.desk.ack_mode,
        backend = ?config.backend.strategy,
        "Starting Civic Desk on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
        })
        .await?;

    prune_handle.abort();
    if let Some(handle) = processor {
        handle.abort();
    }

    Ok(())
}
