//! Per-user conversation sessions.
//!
//! A session exists only while a user is inside a flow. Absence of a
//! session is the idle state. Each flow variant carries exactly the fields
//! it collects, written strictly in step order.
//!
//! # Concurrency
//!
//! Every user id maps to one slot guarded by a `tokio::sync::Mutex`. The
//! engine holds the slot's owned guard for the whole event, including every
//! awaited boundary call, so at most one step transition per user is in
//! flight. Waiters are served in arrival order.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::category::Category;

// ============================================================================
// Session model
// ============================================================================

/// Flow kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Process {
    Query,
    Complaint,
    Suggestion,
    ServiceRequest,
    Billing,
}

impl Process {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Complaint => "complaint",
            Self::Suggestion => "suggestion",
            Self::ServiceRequest => "service_request",
            Self::Billing => "billing_enquiry",
        }
    }
}

/// Flows sharing the name, detail, confirm shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Complaint,
    Suggestion,
    ServiceRequest,
}

impl FeedbackKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Complaint => "Complaint",
            Self::Suggestion => "Suggestion",
            Self::ServiceRequest => "Service request",
        }
    }
}

/// Query flow: name, address, email, category, description, confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryForm {
    pub step: u8,
    pub full_name: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
    pub category: Option<Category>,
    pub description: Option<String>,
}

/// Shared shape of the complaint, suggestion and service request flows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackForm {
    pub step: u8,
    pub full_name: Option<String>,
    pub detail: Option<String>,
}

/// Billing enquiry: account, password, then the statement view.
#[derive(Clone, PartialEq, Eq)]
pub struct BillingForm {
    pub step: u8,
    pub account: Option<String>,
    pub password: Option<String>,
    pub session_token: Option<String>,
}

impl fmt::Debug for BillingForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BillingForm")
            .field("step", &self.step)
            .field("account", &self.account)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl QueryForm {
    pub const fn new() -> Self {
        Self {
            step: 1,
            full_name: None,
            address: None,
            email: None,
            category: None,
            description: None,
        }
    }
}

impl FeedbackForm {
    pub const fn new() -> Self {
        Self {
            step: 1,
            full_name: None,
            detail: None,
        }
    }
}

impl BillingForm {
    pub const fn new() -> Self {
        Self {
            step: 1,
            account: None,
            password: None,
            session_token: None,
        }
    }
}

/// Query step at which a category selection is expected.
pub const QUERY_CATEGORY_STEP: u8 = 4;
/// Query step awaiting the yes/no buttons.
pub const QUERY_CONFIRM_STEP: u8 = 6;
/// Feedback step awaiting the typed "yes".
pub const FEEDBACK_CONFIRM_STEP: u8 = 3;
/// Billing step showing the statement choice.
pub const BILLING_CHOICE_STEP: u8 = 4;

/// One active flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    Query(QueryForm),
    Complaint(FeedbackForm),
    Suggestion(FeedbackForm),
    ServiceRequest(FeedbackForm),
    Billing(BillingForm),
}

impl Session {
    /// Fresh session at step 1.
    pub const fn new(process: Process) -> Self {
        match process {
            Process::Query => Self::Query(QueryForm::new()),
            Process::Complaint => Self::Complaint(FeedbackForm::new()),
            Process::Suggestion => Self::Suggestion(FeedbackForm::new()),
            Process::ServiceRequest => Self::ServiceRequest(FeedbackForm::new()),
            Process::Billing => Self::Billing(BillingForm::new()),
        }
    }

    pub const fn process(&self) -> Process {
        match self {
            Self::Query(_) => Process::Query,
            Self::Complaint(_) => Process::Complaint,
            Self::Suggestion(_) => Process::Suggestion,
            Self::ServiceRequest(_) => Process::ServiceRequest,
            Self::Billing(_) => Process::Billing,
        }
    }

    pub const fn step(&self) -> u8 {
        match self {
            Self::Query(f) => f.step,
            Self::Complaint(f) | Self::Suggestion(f) | Self::ServiceRequest(f) => f.step,
            Self::Billing(f) => f.step,
        }
    }

    /// True exactly at the query category-selection step.
    pub const fn awaits_category(&self) -> bool {
        matches!(self, Self::Query(f) if f.step == QUERY_CATEGORY_STEP)
    }

    /// True when a yes/cancel answer is the expected input.
    pub const fn awaits_confirmation(&self) -> bool {
        match self {
            Self::Query(f) => f.step == QUERY_CONFIRM_STEP,
            Self::Complaint(f) | Self::Suggestion(f) | Self::ServiceRequest(f) => {
                f.step == FEEDBACK_CONFIRM_STEP
            }
            Self::Billing(_) => false,
        }
    }

    /// The shared feedback form, for the three feedback flows.
    pub fn feedback_mut(&mut self) -> Option<(FeedbackKind, &mut FeedbackForm)> {
        match self {
            Self::Complaint(f) => Some((FeedbackKind::Complaint, f)),
            Self::Suggestion(f) => Some((FeedbackKind::Suggestion, f)),
            Self::ServiceRequest(f) => Some((FeedbackKind::ServiceRequest, f)),
            Self::Query(_) | Self::Billing(_) => None,
        }
    }

    /// True at the billing statement choice.
    pub const fn awaits_statement_choice(&self) -> bool {
        matches!(self, Self::Billing(f) if f.step == BILLING_CHOICE_STEP)
    }
}

// ============================================================================
// Session store
// ============================================================================

type Slot = Arc<Mutex<Option<Session>>>;

/// In-memory session store keyed by sender id.
#[derive(Default)]
pub struct SessionStore {
    slots: DashMap<String, Slot>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, user: &str) -> Slot {
        self.slots
            .entry(user.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Enter the user's critical section.
    pub async fn lock(&self, user: &str) -> SessionGuard {
        let slot = self.slot(user).lock_owned().await;
        SessionGuard {
            user: user.to_string(),
            slot,
        }
    }

    /// Snapshot of the user's session, if any. Never creates a slot.
    pub async fn get(&self, user: &str) -> Option<Session> {
        let slot = self.slots.get(user).map(|s| Arc::clone(s.value()))?;
        let session = slot.lock().await.clone();
        session
    }

    /// Return the existing session, or start one for `process`.
    pub async fn get_or_create(&self, user: &str, process: Process) -> Session {
        let mut guard = self.lock(user).await;
        let session = guard.get_or_create(process).clone();
        drop(guard);
        self.release_if_idle(user);
        session
    }

    pub async fn clear(&self, user: &str) {
        let mut guard = self.lock(user).await;
        guard.clear();
        drop(guard);
        self.release_if_idle(user);
    }

    /// Drop the user's slot when it is empty and nobody is waiting on it.
    pub fn release_if_idle(&self, user: &str) -> bool {
        self.slots
            .remove_if(user, |_, slot| slot_is_idle(slot))
            .is_some()
    }

    /// Drop every idle slot. Returns the number removed.
    pub fn prune_idle(&self) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, slot| !slot_is_idle(slot));
        let removed = before.saturating_sub(self.slots.len());
        if removed > 0 {
            tracing::debug!(removed, "Pruned idle session slots");
        }
        removed
    }

    /// Number of tracked user slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

fn slot_is_idle(slot: &Slot) -> bool {
    Arc::strong_count(slot) == 1 && slot.try_lock().is_ok_and(|s| s.is_none())
}

/// Exclusive access to one user's session for the length of an event.
pub struct SessionGuard {
    user: String,
    slot: OwnedMutexGuard<Option<Session>>,
}

impl fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGuard").field("user", &self.user).finish_non_exhaustive()
    }
}

impl SessionGuard {
    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn session(&self) -> Option<&Session> {
        self.slot.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut Session> {
        self.slot.as_mut()
    }

    /// Replace any active flow with a fresh one at step 1.
    pub fn start(&mut self, process: Process) -> &mut Session {
        self.slot.insert(Session::new(process))
    }

    pub fn get_or_create(&mut self, process: Process) -> &mut Session {
        self.slot.get_or_insert_with(|| Session::new(process))
    }

    /// End the flow, returning what it held.
    pub fn clear(&mut self) -> Option<Session> {
        self.slot.take()
    }
}
