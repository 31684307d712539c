//! WhatsApp Business Cloud API channel.
//!
//! Inbound events arrive on the webhook (push-based) and are normalized by
//! [`parse_webhook_payload`]. Outbound messages are POSTed to the Graph API
//! messages endpoint.

use crate::message::{Inbound, InboundMessage, OutgoingContent, OutgoingMessage};
use crate::traits::{Channel, ChannelError, ChannelResult};
use async_trait::async_trait;
use civic_common::WhatsAppConfig;
use reqwest::Client;
use serde_json::{json, Value};

/// WhatsApp channel using the Business Cloud API.
pub struct WhatsAppChannel {
    access_token: String,
    messages_url: String,
    client: Client,
}

impl WhatsAppChannel {
    pub fn new(config: &WhatsAppConfig) -> Self {
        Self {
            access_token: config.access_token.clone(),
            messages_url: config.messages_url(),
            client: Client::new(),
        }
    }
}

/// Extract every message from a webhook delivery, in payload order.
///
/// Status updates and entries without `messages` yield nothing.
pub fn parse_webhook_payload(payload: &Value) -> Vec<InboundMessage> {
    let mut messages = Vec::new();

    let Some(entries) = payload.get("entry").and_then(Value::as_array) else {
        return messages;
    };

    for entry in entries {
        let Some(changes) = entry.get("changes").and_then(Value::as_array) else {
            continue;
        };

        for change in changes {
            let Some(msgs) = change
                .get("value")
                .and_then(|v| v.get("messages"))
                .and_then(Value::as_array)
            else {
                continue;
            };

            for msg in msgs {
                let Some(from) = msg.get("from").and_then(Value::as_str) else {
                    tracing::debug!("WhatsApp: skipping message without sender");
                    continue;
                };

                let id = msg
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");

                let mut inbound = InboundMessage::new(id, from, parse_content(msg));
                if let Some(ts) = msg
                    .get("timestamp")
                    .and_then(Value::as_str)
                    .and_then(|t| t.parse::<i64>().ok())
                {
                    inbound.timestamp = ts * 1000;
                }
                messages.push(inbound);
            }
        }
    }

    messages
}

fn parse_content(msg: &Value) -> Inbound {
    let kind = msg.get("type").and_then(Value::as_str).unwrap_or_default();

    match kind {
        "text" => Inbound::FreeText(
            msg.pointer("/text/body")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        ),
        "interactive" => {
            let id = msg
                .pointer("/interactive/list_reply/id")
                .or_else(|| msg.pointer("/interactive/button_reply/id"))
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty());
            match id {
                Some(id) => Inbound::Selection(id.to_string()),
                None => Inbound::EmptySelection,
            }
        }
        // Some deliveries carry a text body without a type tag
        "" if msg.get("text").is_some() => Inbound::FreeText(
            msg.pointer("/text/body")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        ),
        other => Inbound::Unsupported(if other.is_empty() { "unknown" } else { other }.to_string()),
    }
}

/// Graph API request body for one outgoing message.
pub fn build_payload(message: &OutgoingMessage) -> Value {
    let mut body = json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": message.to,
    });

    match &message.content {
        OutgoingContent::Text { body: text } => {
            body["type"] = json!("text");
            body["text"] = json!({ "preview_url": false, "body": text });
        }
        OutgoingContent::List(list) => {
            let sections: Vec<Value> = list
                .sections
                .iter()
                .map(|section| {
                    let rows: Vec<Value> = section
                        .rows
                        .iter()
                        .map(|row| {
                            let mut value = json!({ "id": row.id, "title": row.title });
                            if let Some(description) = &row.description {
                                value["description"] = json!(description);
                            }
                            value
                        })
                        .collect();
                    json!({ "title": section.title, "rows": rows })
                })
                .collect();

            let mut interactive = json!({
                "type": "list",
                "header": { "type": "text", "text": list.header },
                "body": { "text": list.body },
                "action": { "button": list.button, "sections": sections },
            });
            if let Some(footer) = &list.footer {
                interactive["footer"] = json!({ "text": footer });
            }
            body["type"] = json!("interactive");
            body["interactive"] = interactive;
        }
        OutgoingContent::Buttons(prompt) => {
            let buttons: Vec<Value> = prompt
                .buttons
                .iter()
                .map(|b| json!({ "type": "reply", "reply": { "id": b.id, "title": b.title } }))
                .collect();
            body["type"] = json!("interactive");
            body["interactive"] = json!({
                "type": "button",
                "body": { "text": prompt.body },
                "action": { "buttons": buttons },
            });
        }
    }

    body
}

#[async_trait]
impl Channel for WhatsAppChannel {
    fn name(&self) -> &'static str {
        "whatsapp"
    }

    async fn send(&self, message: OutgoingMessage) -> ChannelResult<String> {
        if message.to.is_empty() {
            return Err(ChannelError::InvalidMessage("Missing recipient".into()));
        }

        let body = build_payload(&message);

        let resp = self
            .client
            .post(&self.messages_url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::Connection(format!("WhatsApp send error: {e}")))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ChannelError::Auth("WhatsApp rejected the access token".into()));
        }
        if !status.is_success() {
            let error = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed(format!(
                "WhatsApp API error ({status}): {error}"
            )));
        }

        let result: Value = resp
            .json()
            .await
            .map_err(|e| ChannelError::Internal(format!("Failed to parse response: {e}")))?;

        let message_id = result
            .pointer("/messages/0/id")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        tracing::debug!(kind = message.kind(), message_id = %message_id, "WhatsApp message sent");
        Ok(message_id)
    }
}
