//! Flow engine.
//!
//! [`DeskEngine::handle`] runs one inbound event end to end:
//!
//! 1. Enter the sender's critical section ([`SessionStore::lock`])
//! 2. Classify the event against the current session
//! 3. Let the flow's step handler decide a [`Transition`]
//! 4. Apply it: write the session, call fulfillment, deliver replies
//!
//! Step handlers in the submodules are synchronous and only touch their own
//! form. Everything that awaits happens here, with the guard held.

pub mod billing;
pub mod feedback;
pub mod query;

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn, Instrument};

use civic_common::{DeskConfig, PortalConfig};

use crate::command::{classify, Command};
use crate::error::DeskError;
use crate::fulfillment::{Assignment, Fulfillment, QuerySubmission, StatementOutcome};
use crate::message::{InboundMessage, OutgoingMessage};
use crate::notify::{Notification, Notifier};
use crate::presenter::{self, text};
use crate::session::{FeedbackKind, Process, Session, SessionGuard, SessionStore, FEEDBACK_CONFIRM_STEP};
use crate::tracking::TrackingIds;
use crate::traits::Channel;

// ============================================================================
// Transitions
// ============================================================================

/// Outcome of a step handler.
#[derive(Debug)]
pub enum Transition {
    /// Field written and step advanced; send the next prompt(s).
    Advance(Vec<OutgoingMessage>),
    /// Send a selection or informational prompt; step unchanged.
    Branch(Vec<OutgoingMessage>),
    /// Input rejected; re-prompt, step unchanged.
    Reject(OutgoingMessage),
    /// Clear the session, then send the closing message(s).
    Finalize(Vec<OutgoingMessage>),
    /// Boundary call whose outcome decides what happens next.
    Fulfil(Fulfilment),
}

#[derive(Debug)]
pub enum Fulfilment {
    SubmitQuery(QuerySubmission),
    RecordFeedback(FeedbackEntry),
    FetchStatement(StatementRequest),
}

/// Credentials for one portal fetch.
#[derive(Clone, PartialEq, Eq)]
pub struct StatementRequest {
    pub account: String,
    pub password: String,
}

impl fmt::Debug for StatementRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatementRequest")
            .field("account", &self.account)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// Feedback log
// ============================================================================

/// A confirmed complaint, suggestion or service request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedbackEntry {
    pub kind: FeedbackKind,
    pub from: String,
    pub full_name: String,
    pub detail: String,
    pub recorded_at: DateTime<Utc>,
}

/// Entries kept in memory; older ones survive only as log events.
pub const FEEDBACK_LOG_CAPACITY: usize = 1_000;

/// In-process record of the most recent confirmed feedback.
pub struct FeedbackLog {
    entries: Mutex<VecDeque<FeedbackEntry>>,
    capacity: usize,
}

impl Default for FeedbackLog {
    fn default() -> Self {
        Self::with_capacity(FEEDBACK_LOG_CAPACITY)
    }
}

impl FeedbackLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            capacity: capacity.max(1),
        }
    }

    pub async fn record(&self, entry: FeedbackEntry) {
        info!(
            kind = ?entry.kind,
            from = %entry.from,
            recorded_at = %entry.recorded_at,
            "Feedback recorded"
        );
        let mut entries = self.entries.lock().await;
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Oldest first.
    pub async fn recorded(&self) -> Vec<FeedbackEntry> {
        self.entries.lock().await.iter().cloned().collect()
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Static links the engine hands out.
#[derive(Debug, Clone)]
pub struct DeskSettings {
    pub faq_url: String,
    pub pdf_statement_base: String,
}

impl Default for DeskSettings {
    fn default() -> Self {
        Self::from_config(&DeskConfig::default(), &PortalConfig::default())
    }
}

impl DeskSettings {
    pub fn from_config(desk: &DeskConfig, portal: &PortalConfig) -> Self {
        Self {
            faq_url: desk.faq_url.clone(),
            pdf_statement_base: portal.pdf_statement_base.clone(),
        }
    }
}

pub struct DeskEngine {
    channel: Arc<dyn Channel>,
    fulfillment: Fulfillment,
    notifier: Arc<dyn Notifier>,
    sessions: Arc<SessionStore>,
    tracking: TrackingIds,
    feedback: FeedbackLog,
    settings: DeskSettings,
}

impl DeskEngine {
    pub fn new(channel: Arc<dyn Channel>, fulfillment: Fulfillment, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            channel,
            fulfillment,
            notifier,
            sessions: Arc::new(SessionStore::new()),
            tracking: TrackingIds::new(),
            feedback: FeedbackLog::default(),
            settings: DeskSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: DeskSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_sessions(mut self, sessions: Arc<SessionStore>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn feedback(&self) -> &FeedbackLog {
        &self.feedback
    }

    /// Process one inbound message. Never fails; every error ends in a
    /// reply, a log line, or both.
    pub async fn handle(&self, message: InboundMessage) {
        let span = tracing::info_span!(
            "desk_message",
            trace_id = %message.trace_id,
            message_id = %message.id,
        );

        async {
            let mut guard = self.sessions.lock(&message.from).await;
            let command = classify(&message.content, guard.session());
            debug!(
                command = command.kind(),
                process = guard.session().map(|s| s.process().as_str()),
                step = guard.session().map(Session::step),
                "Classified inbound message"
            );

            let transition = self.route(&mut guard, command);
            self.apply(&mut guard, transition).await;

            debug!(
                process = guard.session().map(|s| s.process().as_str()),
                step = guard.session().map(Session::step),
                "Event processed"
            );
            drop(guard);
            self.sessions.release_if_idle(&message.from);
        }
        .instrument(span)
        .await;
    }

    fn start(guard: &mut SessionGuard, process: Process, prompt: OutgoingMessage) -> Transition {
        guard.start(process);
        Transition::Advance(vec![prompt])
    }

    fn route(&self, guard: &mut SessionGuard, command: Command) -> Transition {
        let to = guard.user().to_string();
        let to = to.as_str();

        match command {
            Command::ShowMainMenu | Command::BackToMain => {
                Transition::Finalize(vec![presenter::main_menu(to)])
            }
            Command::OpenCustomerRelations => {
                Transition::Finalize(vec![presenter::customer_relations_menu(to)])
            }
            Command::StartBilling => {
                Self::start(guard, Process::Billing, text(to, presenter::ACCOUNT_PROMPT))
            }
            Command::StartQuery => {
                Self::start(guard, Process::Query, text(to, presenter::QUERY_NAME_PROMPT))
            }
            Command::StartComplaint => {
                Self::start(guard, Process::Complaint, text(to, presenter::FEEDBACK_NAME_PROMPT))
            }
            Command::StartSuggestion => {
                Self::start(guard, Process::Suggestion, text(to, presenter::FEEDBACK_NAME_PROMPT))
            }
            Command::StartServiceRequest => Self::start(
                guard,
                Process::ServiceRequest,
                text(to, presenter::FEEDBACK_NAME_PROMPT),
            ),
            Command::ShowFaqs => {
                Transition::Branch(vec![presenter::faq_reply(to, &self.settings.faq_url)])
            }
            Command::LiveAgent => Transition::Branch(vec![text(to, presenter::LIVE_AGENT)]),

            Command::ConfirmYes => match guard.session_mut() {
                None => Transition::Reject(text(to, presenter::NOTHING_TO_CONFIRM)),
                Some(Session::Query(form)) => query::confirm(form, to, &self.tracking),
                Some(Session::Billing(form)) => billing::reprompt(form, to),
                Some(session) => match session.feedback_mut() {
                    Some((kind, form)) => feedback::confirm(kind, form, to, true),
                    None => Transition::Reject(text(to, presenter::UNRECOGNIZED_CHOICE)),
                },
            },
            Command::ConfirmNo => match guard.session_mut() {
                None => Transition::Reject(text(to, presenter::NOTHING_TO_CONFIRM)),
                Some(session) => match session.feedback_mut() {
                    Some((kind, form)) if form.step == FEEDBACK_CONFIRM_STEP => {
                        feedback::confirm(kind, form, to, false)
                    }
                    _ => Transition::Finalize(vec![text(to, presenter::SUBMISSION_CANCELLED)]),
                },
            },

            Command::PdfYes | Command::PdfNo => match guard.session_mut() {
                Some(Session::Billing(form)) => billing::choose(
                    form,
                    to,
                    matches!(command, Command::PdfYes),
                    &self.settings.pdf_statement_base,
                ),
                _ => Transition::Reject(text(to, presenter::FOLLOW_MENU)),
            },
            Command::MoreCategories => match guard.session_mut() {
                Some(Session::Query(form)) => query::more_categories(form, to),
                _ => Transition::Reject(text(to, presenter::FOLLOW_MENU)),
            },
            Command::SelectCategory(category) => match guard.session_mut() {
                Some(Session::Query(form)) => query::select_category(form, to, category),
                _ => Transition::Reject(text(to, presenter::UNRECOGNIZED_CHOICE)),
            },

            Command::StepInput(input) => match guard.session_mut() {
                None => Transition::Reject(text(to, presenter::UNRECOGNIZED)),
                Some(Session::Query(form)) => query::on_input(form, to, &input),
                Some(Session::Billing(form)) => {
                    billing::on_input(form, to, &input, &self.settings.pdf_statement_base)
                }
                Some(session) => match session.feedback_mut() {
                    Some((kind, form)) => feedback::on_input(kind, form, to, &input),
                    None => Transition::Reject(text(to, presenter::UNRECOGNIZED)),
                },
            },

            Command::UnrecognizedSelection(_) => {
                Transition::Reject(text(to, presenter::UNRECOGNIZED_CHOICE))
            }
            Command::EmptySelection => Transition::Reject(text(to, presenter::EMPTY_SELECTION)),
            Command::Unsupported(kind) => {
                info!(kind = %kind, "Unsupported message type");
                Transition::Reject(text(to, presenter::UNSUPPORTED_TYPE))
            }
            Command::Unrecognized => Transition::Reject(text(to, presenter::UNRECOGNIZED)),
        }
    }

    async fn apply(&self, guard: &mut SessionGuard, transition: Transition) {
        match transition {
            Transition::Advance(messages) | Transition::Branch(messages) => {
                self.deliver_all(messages).await;
            }
            Transition::Reject(message) => self.deliver(message).await,
            Transition::Finalize(messages) => {
                guard.clear();
                self.deliver_all(messages).await;
            }
            Transition::Fulfil(Fulfilment::SubmitQuery(submission)) => {
                guard.clear();
                self.submit_query(submission).await;
            }
            Transition::Fulfil(Fulfilment::RecordFeedback(entry)) => {
                guard.clear();
                let reply = text(&entry.from, presenter::feedback_logged(entry.kind));
                self.feedback.record(entry).await;
                self.deliver(reply).await;
            }
            Transition::Fulfil(Fulfilment::FetchStatement(request)) => {
                self.fetch_statement(guard, request).await;
            }
        }
    }

    async fn submit_query(&self, mut submission: QuerySubmission) {
        let to = submission.client_whatsapp.clone();
        let backend = self.fulfillment.queries.name();

        match self.fulfillment.queries.submit_query(&submission).await {
            Ok(receipt) if !receipt.accepted => {
                warn!(backend, tracking_id = %receipt.tracking_id, "Query not accepted");
                self.deliver(text(&to, presenter::QUERY_NOT_LOGGED)).await;
            }
            Ok(receipt) => match receipt.assignment {
                Some(assignment) => {
                    // Stored id may have been redrawn by the backend
                    submission.tracking_id.clone_from(&receipt.tracking_id);
                    info!(backend, tracking_id = %receipt.tracking_id, "Query logged and assigned");
                    self.notify_assignee(&assignment, &submission).await;
                    self.deliver(presenter::query_assigned(
                        &to,
                        &receipt.tracking_id,
                        &assignment.name,
                    ))
                    .await;
                    if let Some(number) = &assignment.number {
                        self.deliver(presenter::staff_alert(number, &submission)).await;
                    }
                }
                None => {
                    info!(backend, tracking_id = %receipt.tracking_id, "Query logged without assignee");
                    self.deliver(presenter::query_unassigned(&to, &receipt.tracking_id))
                        .await;
                }
            },
            Err(e) => {
                error!(backend, error = %e, error_kind = e.kind(), "Query submission failed");
                self.deliver(text(&to, presenter::SYSTEM_ERROR)).await;
            }
        }
    }

    async fn notify_assignee(&self, assignment: &Assignment, submission: &QuerySubmission) {
        let Some(email) = &assignment.email else {
            debug!("Assignee has no email address");
            return;
        };
        let notification = Notification {
            to: email.clone(),
            subject: presenter::assignment_email_subject(&submission.tracking_id),
            html: presenter::assignment_email_html(assignment, submission),
        };
        if let Err(e) = self.notifier.notify(&notification).await {
            error!(
                notifier = self.notifier.name(),
                error = %e,
                "Failed to notify assignee"
            );
        }
    }

    async fn fetch_statement(&self, guard: &mut SessionGuard, request: StatementRequest) {
        let to = guard.user().to_string();
        self.deliver(text(&to, presenter::FETCHING_BILL)).await;

        let outcome = self
            .fulfillment
            .portal
            .fetch_statement(&request.account, &request.password)
            .await;

        let transition = match outcome {
            Ok(StatementOutcome::Statement {
                statement,
                session_token,
            }) => match guard.session_mut() {
                Some(Session::Billing(form)) => {
                    billing::statement_ready(form, &to, &statement, session_token)
                }
                _ => Transition::Finalize(vec![text(&to, presenter::SYSTEM_ERROR)]),
            },
            Ok(StatementOutcome::AuthFailed { message }) => {
                info!("Billing login rejected");
                Transition::Finalize(vec![presenter::login_failed(&to, &message)])
            }
            Err(DeskError::Authentication(message)) => {
                warn!(error = %message, "Billing authentication incomplete");
                Transition::Finalize(vec![text(&to, format!("❌ {message}"))])
            }
            Err(e @ DeskError::UpstreamData(_)) => {
                error!(error = %e, "Unusable bill data");
                Transition::Finalize(vec![text(&to, presenter::BILL_UNREADABLE)])
            }
            Err(e) => {
                error!(error = %e, error_kind = e.kind(), "Billing fetch failed");
                Transition::Finalize(vec![text(&to, presenter::BILL_FETCH_FAILED)])
            }
        };

        match transition {
            Transition::Finalize(messages) => {
                guard.clear();
                self.deliver_all(messages).await;
            }
            Transition::Advance(messages) => self.deliver_all(messages).await,
            other => warn!(?other, "Unexpected transition after statement fetch"),
        }
    }

    async fn deliver_all(&self, messages: Vec<OutgoingMessage>) {
        for message in messages {
            self.deliver(message).await;
        }
    }

    /// Best-effort send. Failures are logged, never surfaced to the user.
    async fn deliver(&self, message: OutgoingMessage) {
        let kind = message.kind();
        if let Err(e) = self.channel.send(message).await {
            error!(channel = self.channel.name(), kind, error = %e, "Failed to deliver message");
        }
    }
}
