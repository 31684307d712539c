//! Complaint, suggestion and service request flows: name, detail, then a
//! typed "yes" to record.

use super::{FeedbackEntry, Fulfilment, Transition};
use crate::presenter::{self, text};
use crate::session::{FeedbackForm, FeedbackKind, FEEDBACK_CONFIRM_STEP};

pub fn on_input(kind: FeedbackKind, form: &mut FeedbackForm, to: &str, input: &str) -> Transition {
    match form.step {
        1 => {
            form.full_name = Some(input.to_string());
            form.step = 2;
            Transition::Advance(vec![text(to, presenter::feedback_detail_prompt(kind))])
        }
        2 => {
            form.detail = Some(input.to_string());
            form.step = FEEDBACK_CONFIRM_STEP;
            Transition::Advance(vec![presenter::feedback_summary(to, kind, form)])
        }
        FEEDBACK_CONFIRM_STEP => confirm(kind, form, to, input.eq_ignore_ascii_case("yes")),
        _ => reprompt(kind, form, to),
    }
}

/// Record on yes, cancel on anything else. Terminal either way.
pub fn confirm(kind: FeedbackKind, form: &FeedbackForm, to: &str, accepted: bool) -> Transition {
    if form.step != FEEDBACK_CONFIRM_STEP {
        return reprompt(kind, form, to);
    }
    if !accepted {
        return Transition::Finalize(vec![text(to, presenter::FEEDBACK_CANCELLED)]);
    }

    Transition::Fulfil(Fulfilment::RecordFeedback(FeedbackEntry {
        kind,
        from: to.to_string(),
        full_name: form.full_name.clone().unwrap_or_default(),
        detail: form.detail.clone().unwrap_or_default(),
        recorded_at: chrono::Utc::now(),
    }))
}

pub fn reprompt(kind: FeedbackKind, form: &FeedbackForm, to: &str) -> Transition {
    let message = match form.step {
        1 => text(to, presenter::FEEDBACK_NAME_PROMPT),
        2 => text(to, presenter::feedback_detail_prompt(kind)),
        _ => presenter::feedback_summary(to, kind, form),
    };
    Transition::Reject(message)
}
