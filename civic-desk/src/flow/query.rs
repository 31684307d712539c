//! Query flow: name, address, email, category, description, then a yes/no
//! confirmation that submits to the query backend.

use super::{Fulfilment, Transition};
use crate::category::Category;
use crate::fulfillment::QuerySubmission;
use crate::presenter::{self, text};
use crate::session::{QueryForm, QUERY_CATEGORY_STEP, QUERY_CONFIRM_STEP};
use crate::tracking::TrackingIds;

/// Typed input for the current step.
pub fn on_input(form: &mut QueryForm, to: &str, input: &str) -> Transition {
    match form.step {
        1 => {
            form.full_name = Some(input.to_string());
            form.step = 2;
            Transition::Advance(vec![text(to, presenter::QUERY_ADDRESS_PROMPT)])
        }
        2 => {
            form.address = Some(input.to_string());
            form.step = 3;
            Transition::Advance(vec![text(to, presenter::QUERY_EMAIL_PROMPT)])
        }
        3 => {
            form.email = Some(input.to_string());
            form.step = QUERY_CATEGORY_STEP;
            Transition::Advance(vec![presenter::category_page(to, 1)])
        }
        QUERY_CATEGORY_STEP => {
            if input.eq_ignore_ascii_case("more") {
                return more_categories(form, to);
            }
            match input.parse::<Category>() {
                Ok(category) => select_category(form, to, category),
                Err(e) => {
                    tracing::debug!(error = %e, "Rejected category input");
                    Transition::Reject(text(to, presenter::QUERY_CATEGORY_REPROMPT))
                }
            }
        }
        5 => {
            form.description = Some(input.to_string());
            form.step = QUERY_CONFIRM_STEP;
            Transition::Advance(vec![
                presenter::query_summary(to, form),
                presenter::confirmation_prompt(to),
            ])
        }
        _ => reprompt(form, to),
    }
}

/// Category picked from the list.
pub fn select_category(form: &mut QueryForm, to: &str, category: Category) -> Transition {
    if form.step != QUERY_CATEGORY_STEP {
        return Transition::Reject(text(to, presenter::UNRECOGNIZED_CHOICE));
    }
    form.category = Some(category);
    form.step = 5;
    Transition::Advance(vec![text(to, presenter::QUERY_DESCRIPTION_PROMPT)])
}

/// Second category page. Step unchanged.
pub fn more_categories(form: &QueryForm, to: &str) -> Transition {
    if form.step == QUERY_CATEGORY_STEP {
        Transition::Branch(vec![presenter::category_page(to, 2)])
    } else {
        Transition::Reject(text(to, presenter::FOLLOW_MENU))
    }
}

/// `confirm_yes`: submit when awaiting confirmation, otherwise re-prompt.
pub fn confirm(form: &QueryForm, to: &str, tracking: &TrackingIds) -> Transition {
    if form.step != QUERY_CONFIRM_STEP {
        return reprompt(form, to);
    }

    match submission(form, to, tracking.issue()) {
        Some(submission) => Transition::Fulfil(Fulfilment::SubmitQuery(submission)),
        None => {
            tracing::error!(step = form.step, "Query form incomplete at confirmation");
            Transition::Finalize(vec![text(to, presenter::SYSTEM_ERROR)])
        }
    }
}

fn submission(form: &QueryForm, client: &str, tracking_id: String) -> Option<QuerySubmission> {
    Some(QuerySubmission {
        full_name: form.full_name.clone()?,
        address: form.address.clone()?,
        email: form.email.clone()?,
        category: form.category?,
        description: form.description.clone()?,
        tracking_id,
        client_whatsapp: client.to_string(),
    })
}

/// Repeat the prompt for the current step.
pub fn reprompt(form: &QueryForm, to: &str) -> Transition {
    let message = match form.step {
        1 => text(to, presenter::QUERY_NAME_PROMPT),
        2 => text(to, presenter::QUERY_ADDRESS_PROMPT),
        3 => text(to, presenter::QUERY_EMAIL_PROMPT),
        QUERY_CATEGORY_STEP => presenter::category_page(to, 1),
        5 => text(to, presenter::QUERY_DESCRIPTION_PROMPT),
        _ => text(to, presenter::QUERY_CONFIRM_REPROMPT),
    };
    Transition::Reject(message)
}
