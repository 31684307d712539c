//! Command classification.
//!
//! Maps a normalized inbound event onto a [`Command`] given a read-only view
//! of the sender's session. Classification never mutates state.

use crate::category::Category;
use crate::message::Inbound;
use crate::session::Session;

/// Words that reset the conversation from anywhere.
const RESET_KEYWORDS: &[&str] = &["menu", "hello", "hi"];

/// Fixed ids carried by list rows and reply buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionToken {
    CustomerRelations,
    Billing,
    ServiceRequests,
    Faqs,
    LiveAgent,
    LogQuery,
    SubmitComplaint,
    MakeSuggestion,
    BackMain,
    ConfirmYes,
    ConfirmNo,
    PdfYes,
    PdfNo,
    More,
    Category(Category),
}

impl SelectionToken {
    pub fn parse(id: &str) -> Option<Self> {
        let token = match id {
            "customer_relations" => Self::CustomerRelations,
            "billing" => Self::Billing,
            "service_requests" => Self::ServiceRequests,
            "faqs" => Self::Faqs,
            "live_agent" => Self::LiveAgent,
            "log_query" => Self::LogQuery,
            "submit_complaint" => Self::SubmitComplaint,
            "make_suggestion" => Self::MakeSuggestion,
            "back_main" => Self::BackMain,
            "confirm_yes" => Self::ConfirmYes,
            "confirm_no" => Self::ConfirmNo,
            "pdf_yes" => Self::PdfYes,
            "pdf_no" => Self::PdfNo,
            "more" => Self::More,
            other => return other.parse().ok().map(Self::Category),
        };
        Some(token)
    }

    /// Wire id, as placed on list rows and buttons.
    pub fn id(self) -> String {
        let id = match self {
            Self::CustomerRelations => "customer_relations",
            Self::Billing => "billing",
            Self::ServiceRequests => "service_requests",
            Self::Faqs => "faqs",
            Self::LiveAgent => "live_agent",
            Self::LogQuery => "log_query",
            Self::SubmitComplaint => "submit_complaint",
            Self::MakeSuggestion => "make_suggestion",
            Self::BackMain => "back_main",
            Self::ConfirmYes => "confirm_yes",
            Self::ConfirmNo => "confirm_no",
            Self::PdfYes => "pdf_yes",
            Self::PdfNo => "pdf_no",
            Self::More => "more",
            Self::Category(c) => return c.ordinal().to_string(),
        };
        id.to_string()
    }
}

/// What the engine should do with an inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ShowMainMenu,
    OpenCustomerRelations,
    StartBilling,
    StartServiceRequest,
    ShowFaqs,
    LiveAgent,
    StartQuery,
    StartComplaint,
    StartSuggestion,
    BackToMain,
    ConfirmYes,
    ConfirmNo,
    PdfYes,
    PdfNo,
    MoreCategories,
    SelectCategory(Category),
    /// Free text for the active flow's current step, trimmed, case kept.
    StepInput(String),
    UnrecognizedSelection(String),
    EmptySelection,
    Unsupported(String),
    Unrecognized,
}

impl Command {
    /// Label for logs. Never includes user content.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ShowMainMenu => "show_main_menu",
            Self::OpenCustomerRelations => "open_customer_relations",
            Self::StartBilling => "start_billing",
            Self::StartServiceRequest => "start_service_request",
            Self::ShowFaqs => "show_faqs",
            Self::LiveAgent => "live_agent",
            Self::StartQuery => "start_query",
            Self::StartComplaint => "start_complaint",
            Self::StartSuggestion => "start_suggestion",
            Self::BackToMain => "back_to_main",
            Self::ConfirmYes => "confirm_yes",
            Self::ConfirmNo => "confirm_no",
            Self::PdfYes => "pdf_yes",
            Self::PdfNo => "pdf_no",
            Self::MoreCategories => "more_categories",
            Self::SelectCategory(_) => "select_category",
            Self::StepInput(_) => "step_input",
            Self::UnrecognizedSelection(_) => "unrecognized_selection",
            Self::EmptySelection => "empty_selection",
            Self::Unsupported(_) => "unsupported",
            Self::Unrecognized => "unrecognized",
        }
    }
}

/// Classify an inbound event against the sender's current session.
pub fn classify(input: &Inbound, session: Option<&Session>) -> Command {
    match input {
        Inbound::FreeText(raw) => classify_text(raw, session),
        Inbound::Selection(id) => classify_selection(id, session),
        Inbound::EmptySelection => Command::EmptySelection,
        Inbound::Unsupported(kind) => Command::Unsupported(kind.clone()),
    }
}

fn classify_text(raw: &str, session: Option<&Session>) -> Command {
    let text = raw.trim();
    let lower = text.to_lowercase();

    if RESET_KEYWORDS.contains(&lower.as_str()) {
        return Command::ShowMainMenu;
    }

    let Some(_) = session else {
        if lower == "1" || lower.contains("customer relations") {
            return Command::OpenCustomerRelations;
        }
        if lower == "2" || lower.contains("billing") {
            return Command::StartBilling;
        }
        return Command::Unrecognized;
    };

    Command::StepInput(text.to_string())
}

fn classify_selection(id: &str, session: Option<&Session>) -> Command {
    let Some(token) = SelectionToken::parse(id) else {
        return Command::UnrecognizedSelection(id.to_string());
    };

    match token {
        SelectionToken::CustomerRelations => Command::OpenCustomerRelations,
        SelectionToken::Billing => Command::StartBilling,
        SelectionToken::ServiceRequests => Command::StartServiceRequest,
        SelectionToken::Faqs => Command::ShowFaqs,
        SelectionToken::LiveAgent => Command::LiveAgent,
        SelectionToken::LogQuery => Command::StartQuery,
        SelectionToken::SubmitComplaint => Command::StartComplaint,
        SelectionToken::MakeSuggestion => Command::StartSuggestion,
        SelectionToken::BackMain => Command::BackToMain,
        SelectionToken::ConfirmYes => Command::ConfirmYes,
        SelectionToken::ConfirmNo => Command::ConfirmNo,
        SelectionToken::PdfYes => Command::PdfYes,
        SelectionToken::PdfNo => Command::PdfNo,
        SelectionToken::More => Command::MoreCategories,
        SelectionToken::Category(category) => {
            if session.is_some_and(Session::awaits_category) {
                Command::SelectCategory(category)
            } else {
                Command::UnrecognizedSelection(id.to_string())
            }
        }
    }
}
