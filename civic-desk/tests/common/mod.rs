//! Shared doubles for engine and route tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use civic_desk::error::{DeskError, DeskResult};
use civic_desk::fulfillment::{
    AccountSummary, Assignment, BillingPortal, BillingStatement, Fulfillment, QueryBackend,
    QueryReceipt, QuerySubmission, StatementOutcome, Transaction,
};
use civic_desk::message::{Inbound, InboundMessage, OutgoingMessage};
use civic_desk::notify::{Notification, Notifier};
use civic_desk::traits::{Channel, ChannelError, ChannelResult};
use civic_desk::DeskEngine;

pub const USER: &str = "263771234567";

/// Records every outgoing message instead of sending it.
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<OutgoingMessage>>,
    fail: bool,
}

impl RecordingChannel {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::default(),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Drain recorded messages.
    pub fn take(&self) -> Vec<OutgoingMessage> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }

    /// Text bodies of drained messages; non-text messages yield `None`.
    pub fn take_bodies(&self) -> Vec<Option<String>> {
        self.take()
            .into_iter()
            .map(|m| m.body().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, message: OutgoingMessage) -> ChannelResult<String> {
        self.sent.lock().unwrap().push(message);
        if self.fail {
            return Err(ChannelError::SendFailed("offline".into()));
        }
        Ok("wamid.test".into())
    }
}

/// Query backend with a canned reply.
pub struct StubQueries {
    pub assignment: Option<Assignment>,
    pub accepted: bool,
    pub error: Option<DeskError>,
    /// Id the backend reports instead of the submitted one
    pub stored_as: Option<String>,
    pub submitted: Mutex<Vec<QuerySubmission>>,
}

impl StubQueries {
    pub fn unassigned() -> Self {
        Self {
            assignment: None,
            accepted: true,
            error: None,
            stored_as: None,
            submitted: Mutex::default(),
        }
    }

    pub fn storing_as(self, tracking_id: &str) -> Self {
        Self {
            stored_as: Some(tracking_id.to_string()),
            ..self
        }
    }

    pub fn assigned_to(assignment: Assignment) -> Self {
        Self {
            assignment: Some(assignment),
            ..Self::unassigned()
        }
    }

    pub fn rejecting() -> Self {
        Self {
            accepted: false,
            ..Self::unassigned()
        }
    }

    pub fn failing() -> Self {
        Self {
            error: Some(DeskError::Transport("connection refused".into())),
            ..Self::unassigned()
        }
    }

    pub fn submissions(&self) -> Vec<QuerySubmission> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryBackend for StubQueries {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn submit_query(&self, submission: &QuerySubmission) -> DeskResult<QueryReceipt> {
        self.submitted.lock().unwrap().push(submission.clone());
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        if !self.accepted {
            return Ok(QueryReceipt::rejected(&submission.tracking_id));
        }
        Ok(QueryReceipt {
            accepted: true,
            tracking_id: self
                .stored_as
                .clone()
                .unwrap_or_else(|| submission.tracking_id.clone()),
            assignment: self.assignment.clone(),
        })
    }
}

/// What the stub portal answers.
#[derive(Clone)]
pub enum PortalReply {
    Statement,
    Rejected(String),
    Error(DeskError),
}

pub struct StubPortal {
    reply: PortalReply,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl StubPortal {
    pub fn new(reply: PortalReply) -> Self {
        Self {
            reply,
            calls: Mutex::default(),
        }
    }
}

pub fn sample_statement() -> BillingStatement {
    BillingStatement {
        account: AccountSummary {
            number: "12345".into(),
            name: "J Doe".into(),
            balance: "42.50".into(),
            last_payment: Some("20.00".into()),
            last_payment_date: Some("2024-05-01".into()),
        },
        transactions: vec![Transaction {
            date: "2024-05-01".into(),
            detail: "Payment".into(),
            amount: "-20.00".into(),
        }],
    }
}

#[async_trait]
impl BillingPortal for StubPortal {
    async fn fetch_statement(&self, account: &str, password: &str) -> DeskResult<StatementOutcome> {
        self.calls
            .lock()
            .unwrap()
            .push((account.to_string(), password.to_string()));
        match &self.reply {
            PortalReply::Statement => Ok(StatementOutcome::Statement {
                statement: sample_statement(),
                session_token: "PHPSESSID=abc".into(),
            }),
            PortalReply::Rejected(message) => Ok(StatementOutcome::AuthFailed {
                message: message.clone(),
            }),
            PortalReply::Error(e) => Err(e.clone()),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn notify(&self, notification: &Notification) -> DeskResult<()> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Engine wired to doubles.
pub struct Harness {
    pub engine: Arc<DeskEngine>,
    pub channel: Arc<RecordingChannel>,
    pub queries: Arc<StubQueries>,
    pub portal: Arc<StubPortal>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new(queries: StubQueries, portal: PortalReply) -> Self {
        Self::with_channel(queries, portal, RecordingChannel::default())
    }

    pub fn with_channel(queries: StubQueries, portal: PortalReply, channel: RecordingChannel) -> Self {
        let channel = Arc::new(channel);
        let queries = Arc::new(queries);
        let portal = Arc::new(StubPortal::new(portal));
        let notifier = Arc::new(RecordingNotifier::default());

        let fulfillment = Fulfillment {
            queries: queries.clone(),
            portal: portal.clone(),
        };
        let engine = Arc::new(DeskEngine::new(channel.clone(), fulfillment, notifier.clone()));

        Self {
            engine,
            channel,
            queries,
            portal,
            notifier,
        }
    }

    pub fn default_stubs() -> Self {
        Self::new(StubQueries::unassigned(), PortalReply::Statement)
    }

    pub async fn text(&self, body: &str) {
        self.engine
            .handle(InboundMessage::new("wamid.in", USER, Inbound::FreeText(body.into())))
            .await;
    }

    pub async fn select(&self, id: &str) {
        self.engine
            .handle(InboundMessage::new("wamid.in", USER, Inbound::Selection(id.into())))
            .await;
    }
}
