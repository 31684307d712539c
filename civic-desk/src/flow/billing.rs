//! Billing enquiry: account, password, portal fetch, then the PDF/menu choice.

use super::{Fulfilment, StatementRequest, Transition};
use crate::fulfillment::BillingStatement;
use crate::presenter::{self, text};
use crate::session::{BillingForm, BILLING_CHOICE_STEP};

const FETCH_STEP: u8 = 3;

pub fn on_input(form: &mut BillingForm, to: &str, input: &str, pdf_base: &str) -> Transition {
    match form.step {
        1 => {
            form.account = Some(input.trim().to_string());
            form.step = 2;
            Transition::Advance(vec![text(to, presenter::PASSWORD_PROMPT)])
        }
        2 => {
            form.password = Some(input.trim().to_string());
            form.step = FETCH_STEP;
            Transition::Fulfil(Fulfilment::FetchStatement(StatementRequest {
                account: form.account.clone().unwrap_or_default(),
                password: input.trim().to_string(),
            }))
        }
        BILLING_CHOICE_STEP if input.eq_ignore_ascii_case("pdf") => {
            choose(form, to, true, pdf_base)
        }
        BILLING_CHOICE_STEP => Transition::Reject(text(to, presenter::STATEMENT_CHOICE_REPROMPT)),
        _ => reprompt(form, to),
    }
}

/// Statement fetched: remember the portal session and offer the choice.
pub fn statement_ready(
    form: &mut BillingForm,
    to: &str,
    statement: &BillingStatement,
    session_token: String,
) -> Transition {
    form.session_token = Some(session_token);
    form.step = BILLING_CHOICE_STEP;
    Transition::Advance(vec![
        presenter::statement(to, statement),
        presenter::statement_choice_prompt(to),
    ])
}

/// `pdf_yes` / `pdf_no`. Only valid at the choice step; terminal there.
pub fn choose(form: &BillingForm, to: &str, pdf: bool, pdf_base: &str) -> Transition {
    if form.step != BILLING_CHOICE_STEP {
        return Transition::Reject(text(to, presenter::FOLLOW_MENU));
    }
    if pdf {
        let account = form.account.as_deref().unwrap_or_default();
        Transition::Finalize(vec![presenter::pdf_link(to, pdf_base, account)])
    } else {
        Transition::Finalize(vec![presenter::main_menu(to)])
    }
}

pub fn reprompt(form: &BillingForm, to: &str) -> Transition {
    let message = match form.step {
        1 => text(to, presenter::ACCOUNT_PROMPT),
        2 => text(to, presenter::PASSWORD_PROMPT),
        FETCH_STEP => text(to, presenter::STILL_FETCHING),
        _ => presenter::statement_choice_prompt(to),
    };
    Transition::Reject(message)
}
