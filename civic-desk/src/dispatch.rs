//! Background processor for `immediate` acknowledgement mode.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::flow::DeskEngine;
use crate::message::InboundMessage;

/// Drain the inbound queue.
///
/// Each message runs on its own task, chained behind the previous task for
/// the same sender, so one user's messages are handled in queue order while
/// different users run concurrently. When the queue closes the processor
/// waits for the outstanding chains before returning.
pub fn spawn_processor(
    engine: Arc<DeskEngine>,
    mut rx: mpsc::Receiver<InboundMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("Inbound processor started");
        let mut tails: HashMap<String, JoinHandle<()>> = HashMap::new();

        while let Some(message) = rx.recv().await {
            tails.retain(|_, tail| !tail.is_finished());

            let user = message.from.clone();
            let previous = tails.remove(&user);
            let engine = Arc::clone(&engine);
            let tail = tokio::spawn(async move {
                if let Some(previous) = previous {
                    if let Err(e) = previous.await {
                        tracing::warn!(error = %e, "Previous message task failed");
                    }
                }
                engine.handle(message).await;
            });
            tails.insert(user, tail);
        }

        for (_, tail) in tails.drain() {
            if let Err(e) = tail.await {
                tracing::warn!(error = %e, "Message task failed");
            }
        }
        tracing::info!("Inbound processor stopped");
    })
}
