//! Outbound message builders.
//!
//! Pure functions returning [`OutgoingMessage`] documents; delivery is the
//! channel's job.

use civic_common::util::truncate_chars;

use crate::category::Category;
use crate::command::SelectionToken;
use crate::fulfillment::{Assignment, BillingStatement, QuerySubmission};
use crate::message::{
    ButtonPrompt, ListMessage, ListRow, ListSection, OutgoingContent, OutgoingMessage, ReplyButton,
};
use crate::session::{FeedbackForm, FeedbackKind, QueryForm};

/// WhatsApp list row title limit.
pub const MAX_ROW_TITLE: usize = 24;

/// Most recent transactions shown on a statement.
pub const STATEMENT_TRANSACTIONS: usize = 5;

pub const QUERY_NAME_PROMPT: &str = "Step 1/5: Enter your full name:";
pub const QUERY_ADDRESS_PROMPT: &str = "Step 2/5: Enter your address:";
pub const QUERY_EMAIL_PROMPT: &str = "Step 3/5: Enter your email address:";
pub const QUERY_CATEGORY_REPROMPT: &str =
    "Please select a category from the list, or type a number from 1 to 15.";
pub const QUERY_DESCRIPTION_PROMPT: &str = "Step 5/5: Enter your query description:";
pub const QUERY_CONFIRM_REPROMPT: &str = "Please tap ✅ Yes or ❌ No to confirm or cancel.";

pub const FEEDBACK_NAME_PROMPT: &str = "Step 1/3: Enter your full name:";
pub const FEEDBACK_CANCELLED: &str = "ℹ️ Process cancelled. Enjoy your day!";

pub const ACCOUNT_PROMPT: &str = "Please enter your account number:";
pub const PASSWORD_PROMPT: &str = "Please enter your portal password:";
pub const FETCHING_BILL: &str = "Fetching your bill details…";
pub const DEFAULT_LOGIN_ERROR: &str = "Invalid username or password.";
pub const BILL_UNREADABLE: &str = "❌ Could not read your bill details. Please try again later.";
pub const BILL_FETCH_FAILED: &str = "⚠️ Error fetching bill details. Please try again later.";
pub const STATEMENT_CHOICE_REPROMPT: &str =
    "Please type “PDF” to receive the statement, or “menu” to go back.";
pub const STILL_FETCHING: &str = "Still fetching your bill details. Please wait…";

pub const QUERY_NOT_LOGGED: &str = "⚠️ Could not log your query. Please try again later.";
pub const SYSTEM_ERROR: &str = "⚠️ System error. Please try again later.";
pub const SUBMISSION_CANCELLED: &str = "Your submission was cancelled. Type “menu” to start over.";

pub const NOTHING_TO_CONFIRM: &str = "There is nothing to confirm. Type “menu” to start over.";
pub const FOLLOW_MENU: &str = "Please follow the menu. Type “menu” to start over.";
pub const UNRECOGNIZED: &str = "Sorry, I didn’t understand. Type “menu” to see options.";
pub const UNRECOGNIZED_CHOICE: &str =
    "Sorry, I didn’t understand that choice. Type “menu” to start over.";
pub const EMPTY_SELECTION: &str =
    "Sorry, I didn’t understand that selection. Type “menu” to start over.";
pub const UNSUPPORTED_TYPE: &str = "Sorry, I can only process text or menu selections right now.";
pub const LIVE_AGENT: &str = "Connecting you to a live agent…";

const PAYMENT_FOOTER: &str = "💳 *PAYMENT METHODS* 💳\n\
1. Online: https://www.topup.co.zw/pay-bill/ruwa-local-board\n\
2. Bank Transfer:\n   ZB BANK\n   4136-00060989-207 ZWG\n   4136-00060989-405 USD\n\
3. Mobile Ecocash: *151*2*1*87208*Amount*StandNo#\n\n\
Need help? Call: 0242 132 988\n";

/// Truncate a list row title to the platform limit.
pub fn truncate_title(title: &str) -> String {
    truncate_chars(title, MAX_ROW_TITLE)
}

fn row(token: SelectionToken, title: &str, description: Option<&str>) -> ListRow {
    ListRow {
        id: token.id(),
        title: truncate_title(title),
        description: description.map(str::to_string),
    }
}

fn list(to: &str, list: ListMessage) -> OutgoingMessage {
    OutgoingMessage {
        to: to.to_string(),
        content: OutgoingContent::List(list),
    }
}

fn buttons(to: &str, body: &str, yes: (SelectionToken, &str), no: (SelectionToken, &str)) -> OutgoingMessage {
    OutgoingMessage {
        to: to.to_string(),
        content: OutgoingContent::Buttons(ButtonPrompt {
            body: body.to_string(),
            buttons: [
                ReplyButton {
                    id: yes.0.id(),
                    title: yes.1.to_string(),
                },
                ReplyButton {
                    id: no.0.id(),
                    title: no.1.to_string(),
                },
            ],
        }),
    }
}

pub fn text(to: &str, body: impl Into<String>) -> OutgoingMessage {
    OutgoingMessage::text(to, body)
}

// ============================================================================
// Menus
// ============================================================================

pub fn main_menu(to: &str) -> OutgoingMessage {
    list(
        to,
        ListMessage {
            header: "Ruwa Local Board Services".into(),
            body: "Hi there! 👋 I’m Ruvimbo, your virtual assistant at Ruwa Local Board. \
                   Need help with bills, services, or local info? I’ve got you covered!"
                .into(),
            footer: None,
            button: "Choose an option".into(),
            sections: vec![
                ListSection {
                    title: "Core Services".into(),
                    rows: vec![
                        row(
                            SelectionToken::CustomerRelations,
                            "Customer Relations",
                            Some("Queries/Complaints/Suggestions"),
                        ),
                        row(
                            SelectionToken::Billing,
                            "Bill Enquiries",
                            Some("Account balance & statements"),
                        ),
                        row(
                            SelectionToken::ServiceRequests,
                            "Service Requests",
                            Some("Report issues"),
                        ),
                    ],
                },
                ListSection {
                    title: "Support".into(),
                    rows: vec![
                        row(SelectionToken::Faqs, "FAQs", Some("Common questions")),
                        row(SelectionToken::LiveAgent, "Live Agent", Some("Speak to human")),
                    ],
                },
            ],
        },
    )
}

pub fn customer_relations_menu(to: &str) -> OutgoingMessage {
    list(
        to,
        ListMessage {
            header: "Customer Relations".into(),
            body: "Select an option:".into(),
            footer: None,
            button: "Choose service".into(),
            sections: vec![
                ListSection {
                    title: "Services".into(),
                    rows: vec![
                        row(SelectionToken::LogQuery, "Log Query", None),
                        row(SelectionToken::SubmitComplaint, "Submit Complaint", None),
                        row(SelectionToken::MakeSuggestion, "Make Suggestion", None),
                    ],
                },
                ListSection {
                    title: "Navigation".into(),
                    rows: vec![row(SelectionToken::BackMain, "Back to Main Menu", None)],
                },
            ],
        },
    )
}

/// Category list page 1 (1–9 plus a "more" row) or page 2 (10–15).
pub fn category_page(to: &str, page: u8) -> OutgoingMessage {
    let mut rows: Vec<ListRow> = Category::page(page)
        .iter()
        .map(|c| row(SelectionToken::Category(*c), c.name(), None))
        .collect();

    let (header, body, section) = if page == 1 {
        rows.push(row(SelectionToken::More, "➕ More categories", None));
        (
            "Choose a Category (1–9)",
            "Step 4/5: Select one category or tap “More categories”.",
            "Categories (1–9)",
        )
    } else {
        (
            "More Categories (10–15)",
            "Step 4/5: Select one category from 10–15.",
            "Categories (10–15)",
        )
    };

    list(
        to,
        ListMessage {
            header: header.into(),
            body: body.into(),
            footer: None,
            button: "Select Category".into(),
            sections: vec![ListSection {
                title: section.into(),
                rows,
            }],
        },
    )
}

pub fn confirmation_prompt(to: &str) -> OutgoingMessage {
    buttons(
        to,
        "Confirm submission?",
        (SelectionToken::ConfirmYes, "✅ Yes"),
        (SelectionToken::ConfirmNo, "❌ No"),
    )
}

pub fn statement_choice_prompt(to: &str) -> OutgoingMessage {
    buttons(
        to,
        "Type “PDF” to receive your PDF statement, or type “menu” to go back.",
        (SelectionToken::PdfYes, "📄 PDF statement"),
        (SelectionToken::PdfNo, "🏠 Main menu"),
    )
}

pub fn faq_reply(to: &str, faq_url: &str) -> OutgoingMessage {
    text(to, format!("You asked for FAQs. Visit: {faq_url}"))
}

// ============================================================================
// Query flow
// ============================================================================

/// Echo of everything collected, sent before the confirmation buttons.
pub fn query_summary(to: &str, form: &QueryForm) -> OutgoingMessage {
    text(
        to,
        format!(
            "Name: {}\nAddress: {}\nEmail: {}\nCategory: {}\nQuery: {}",
            form.full_name.as_deref().unwrap_or_default(),
            form.address.as_deref().unwrap_or_default(),
            form.email.as_deref().unwrap_or_default(),
            form.category.map_or("Unknown", Category::name),
            form.description.as_deref().unwrap_or_default(),
        ),
    )
}

pub fn query_assigned(to: &str, tracking_id: &str, assignee: &str) -> OutgoingMessage {
    text(
        to,
        format!(
            "✅ Query Successfully Logged\nYour Query ID is *{tracking_id}*.\n\n\
             It has been assigned to *{assignee}*. They will reach out soon."
        ),
    )
}

pub fn query_unassigned(to: &str, tracking_id: &str) -> OutgoingMessage {
    text(
        to,
        format!(
            "✅ Query Logged with ID *{tracking_id}*.\n\
             Currently no staff is assigned to this category. \
             We will update you when someone is assigned."
        ),
    )
}

/// WhatsApp alert for the staff member a query was assigned to.
pub fn staff_alert(to: &str, submission: &QuerySubmission) -> OutgoingMessage {
    text(
        to,
        format!(
            "📬 New query *{}* assigned to you:\n\
             • Category: {}\n\
             • From: {} ({})\n\
             • Client WhatsApp: {}\n\
             • Address: {}\n\
             • Query: {}\n\n\
             Please log in to the portal to update its status.",
            submission.tracking_id,
            submission.category,
            submission.full_name,
            submission.email,
            submission.client_whatsapp,
            submission.address,
            submission.description,
        ),
    )
}

pub fn assignment_email_subject(tracking_id: &str) -> String {
    format!("New Query Assigned: {tracking_id}")
}

/// HTML body for the assignee email. User text is escaped.
pub fn assignment_email_html(assignment: &Assignment, submission: &QuerySubmission) -> String {
    let esc = |s: &str| html_escape::encode_text(s).into_owned();
    format!(
        "<p>Hello {name},</p>\n\
         <p>A new query (<strong>{id}</strong>) has been assigned to you:</p>\n\
         <ul>\n\
         <li>Category: {category}</li>\n\
         <li>From: {from} ({email})</li>\n\
         <li><strong>Client WhatsApp:</strong> {whatsapp}</li>\n\
         <li>Address: {address}</li>\n\
         <li>Query: {query}</li>\n\
         </ul>\n\
         <p>Please log in to the portal to update its status.</p>\n\
         <p>Thank you.</p>\n",
        name = esc(&assignment.name),
        id = esc(&submission.tracking_id),
        category = esc(submission.category.name()),
        from = esc(&submission.full_name),
        email = esc(&submission.email),
        whatsapp = esc(&submission.client_whatsapp),
        address = esc(&submission.address),
        query = esc(&submission.description),
    )
}

// ============================================================================
// Feedback flows
// ============================================================================

pub const fn feedback_detail_prompt(kind: FeedbackKind) -> &'static str {
    match kind {
        FeedbackKind::Complaint => "Step 2/3: Describe your complaint in detail:",
        FeedbackKind::Suggestion => "Step 2/3: Describe your suggestion:",
        FeedbackKind::ServiceRequest => "Step 2/3: Describe your service request:",
    }
}

pub const fn feedback_logged(kind: FeedbackKind) -> &'static str {
    match kind {
        FeedbackKind::Complaint => "✅ Complaint logged successfully! We will get back to you shortly.",
        FeedbackKind::Suggestion => "✅ Suggestion logged successfully! Thank you for your feedback.",
        FeedbackKind::ServiceRequest => {
            "✅ Service request logged successfully! Our team will follow up shortly."
        }
    }
}

pub fn feedback_summary(to: &str, kind: FeedbackKind, form: &FeedbackForm) -> OutgoingMessage {
    text(
        to,
        format!(
            "Confirm your {}:\nName: {}\n{}: {}\n\nReply *yes* to confirm or *cancel* to abort.",
            kind.label().to_lowercase(),
            form.full_name.as_deref().unwrap_or_default(),
            kind.label(),
            form.detail.as_deref().unwrap_or_default(),
        ),
    )
}

// ============================================================================
// Billing
// ============================================================================

pub fn login_failed(to: &str, message: &str) -> OutgoingMessage {
    let message = if message.trim().is_empty() {
        DEFAULT_LOGIN_ERROR
    } else {
        message
    };
    text(to, format!("❌ Login failed: {message}"))
}

pub fn pdf_link(to: &str, pdf_base: &str, account: &str) -> OutgoingMessage {
    text(to, format!("Here is your PDF statement:\n{pdf_base}{account}"))
}

/// Formatted bill statement.
pub fn render_statement(statement: &BillingStatement) -> String {
    let account = &statement.account;
    let mut out = format!(
        "🏦 *BILL STATEMENT* 🏦\n\nAccount: {}\nName: {}\nBalance: USD {}\n\n",
        account.number, account.name, account.balance
    );

    if let (Some(amount), Some(date)) = (&account.last_payment, &account.last_payment_date) {
        out.push_str(&format!("Last Payment: USD {amount} ({date})\n\n"));
    }

    if statement.transactions.is_empty() {
        out.push_str("No recent transactions found.\n\n");
    } else {
        out.push_str("*RECENT TRANSACTIONS*\n");
        for (i, tx) in statement
            .transactions
            .iter()
            .take(STATEMENT_TRANSACTIONS)
            .enumerate()
        {
            out.push_str(&format!(
                "{}. {} – {}: USD {}\n",
                i + 1,
                tx.date,
                tx.detail,
                tx.amount
            ));
        }
        out.push('\n');
    }

    out.push_str(PAYMENT_FOOTER);
    out
}

pub fn statement(to: &str, statement: &BillingStatement) -> OutgoingMessage {
    text(to, render_statement(statement))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fulfillment::{AccountSummary, Transaction};

    fn submission() -> QuerySubmission {
        QuerySubmission {
            full_name: "Jane <Doe>".into(),
            address: "12 Main St".into(),
            email: "jane@x.com".into(),
            category: Category::DevelopmentPermit,
            description: "Need a permit & a plan".into(),
            tracking_id: "QR123W".into(),
            client_whatsapp: "263771234567".into(),
        }
    }

    #[test]
    fn test_truncate_title_is_idempotent() {
        let long = "Payment of Supplier Creditors";
        let once = truncate_title(long);
        assert_eq!(once.chars().count(), MAX_ROW_TITLE);
        assert_eq!(truncate_title(&once), once);

        let short = "Tariffs";
        assert_eq!(truncate_title(short), short);

        let exact = "a".repeat(MAX_ROW_TITLE);
        assert_eq!(truncate_title(&exact), exact);
    }

    #[test]
    fn test_main_menu_rows() {
        let msg = main_menu("263771");
        let OutgoingContent::List(list) = &msg.content else {
            panic!("expected list");
        };
        assert_eq!(list.sections[0].title, "Core Services");
        assert_eq!(list.sections[1].title, "Support");
        assert_eq!(
            list.row_ids().collect::<Vec<_>>(),
            vec!["customer_relations", "billing", "service_requests", "faqs", "live_agent"]
        );
    }

    #[test]
    fn test_category_pages() {
        let OutgoingContent::List(first) = category_page("u", 1).content else {
            panic!("expected list");
        };
        let ids: Vec<_> = first.row_ids().collect();
        assert_eq!(ids.len(), 10);
        assert_eq!(ids[0], "1");
        assert_eq!(ids[8], "9");
        assert_eq!(ids[9], "more");
        assert!(first.sections[0]
            .rows
            .iter()
            .all(|r| r.title.chars().count() <= MAX_ROW_TITLE));

        let OutgoingContent::List(second) = category_page("u", 2).content else {
            panic!("expected list");
        };
        assert_eq!(
            second.row_ids().collect::<Vec<_>>(),
            vec!["10", "11", "12", "13", "14", "15"]
        );
    }

    #[test]
    fn test_confirmation_buttons() {
        let OutgoingContent::Buttons(prompt) = confirmation_prompt("u").content else {
            panic!("expected buttons");
        };
        assert_eq!(prompt.buttons[0].id, "confirm_yes");
        assert_eq!(prompt.buttons[1].id, "confirm_no");
    }

    #[test]
    fn test_query_summary_lists_all_fields() {
        let form = QueryForm {
            step: 6,
            full_name: Some("Jane Doe".into()),
            address: Some("12 Main St".into()),
            email: Some("jane@x.com".into()),
            category: Some(Category::DevelopmentPermit),
            description: Some("Need a permit".into()),
        };
        let body = query_summary("u", &form).body().unwrap().to_string();
        for part in [
            "Jane Doe",
            "12 Main St",
            "jane@x.com",
            "Development Permit Processing",
            "Need a permit",
        ] {
            assert!(body.contains(part), "missing {part}");
        }
    }

    #[test]
    fn test_assignment_email_escapes_user_text() {
        let assignment = Assignment {
            name: "Tino".into(),
            email: Some("tino@example.org".into()),
            number: None,
        };
        let html = assignment_email_html(&assignment, &submission());
        assert!(html.contains("Jane &lt;Doe&gt;"));
        assert!(html.contains("permit &amp; a plan"));
        assert!(html.contains("<strong>QR123W</strong>"));
    }

    #[test]
    fn test_staff_alert_mentions_client() {
        let msg = staff_alert("263770000000", &submission());
        assert_eq!(msg.to, "263770000000");
        let body = msg.body().unwrap();
        assert!(body.contains("QR123W"));
        assert!(body.contains("263771234567"));
    }

    #[test]
    fn test_login_failed_falls_back_to_default() {
        assert_eq!(
            login_failed("u", "").body(),
            Some("❌ Login failed: Invalid username or password.")
        );
        assert_eq!(
            login_failed("u", "Account locked").body(),
            Some("❌ Login failed: Account locked")
        );
    }

    fn statement_with(transactions: usize, last_payment: bool) -> BillingStatement {
        BillingStatement {
            account: AccountSummary {
                number: "12345".into(),
                name: "J Doe".into(),
                balance: "42.50".into(),
                last_payment: last_payment.then(|| "10.00".to_string()),
                last_payment_date: last_payment.then(|| "2024-05-01".to_string()),
            },
            transactions: (0..transactions)
                .map(|i| Transaction {
                    date: format!("2024-0{}-01", i + 1),
                    detail: format!("Item {i}"),
                    amount: "1.00".into(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_statement_caps_transactions_at_five() {
        let rendered = render_statement(&statement_with(7, true));
        assert!(rendered.contains("Account: 12345"));
        assert!(rendered.contains("Balance: USD 42.50"));
        assert!(rendered.contains("Last Payment: USD 10.00 (2024-05-01)"));
        assert!(rendered.contains("5. 2024-05-01 – Item 4"));
        assert!(!rendered.contains("Item 5"));
        assert!(rendered.contains("PAYMENT METHODS"));
    }

    #[test]
    fn test_statement_without_transactions_or_payment() {
        let rendered = render_statement(&statement_with(0, false));
        assert!(rendered.contains("No recent transactions found."));
        assert!(!rendered.contains("Last Payment"));
    }

    #[test]
    fn test_feedback_summary() {
        let form = FeedbackForm {
            step: 3,
            full_name: Some("Sam".into()),
            detail: Some("Potholes".into()),
        };
        let body = feedback_summary("u", FeedbackKind::Complaint, &form)
            .body()
            .unwrap()
            .to_string();
        assert!(body.starts_with("Confirm your complaint:"));
        assert!(body.contains("Complaint: Potholes"));
        assert!(body.contains("Reply *yes*"));
    }
}
