//! Boundary calls made from flow-terminal steps.
//!
//! The engine talks to two contracts, [`QueryBackend`] and [`BillingPortal`],
//! and never learns which strategy sits behind them. Every call is a single
//! attempt; failures come back as [`DeskError`] for the engine to map.

pub mod http;
pub mod portal;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use civic_common::{BackendStrategy, Config};

use crate::category::Category;
use crate::error::{DeskError, DeskResult};

pub use http::HttpQueryBackend;
pub use portal::HttpBillingPortal;
pub use sqlite::SqliteQueryBackend;

// ============================================================================
// Query submission
// ============================================================================

/// Everything a logged query carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySubmission {
    pub full_name: String,
    pub address: String,
    pub email: String,
    pub category: Category,
    pub description: String,
    pub tracking_id: String,
    /// Sender id of the client who logged it
    pub client_whatsapp: String,
}

/// Staff member a query was routed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub name: String,
    pub email: Option<String>,
    /// WhatsApp number for the staff alert
    pub number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryReceipt {
    /// Backend stored the query
    pub accepted: bool,
    pub tracking_id: String,
    pub assignment: Option<Assignment>,
}

impl QueryReceipt {
    pub fn rejected(tracking_id: impl Into<String>) -> Self {
        Self {
            accepted: false,
            tracking_id: tracking_id.into(),
            assignment: None,
        }
    }
}

#[async_trait]
pub trait QueryBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn submit_query(&self, submission: &QuerySubmission) -> DeskResult<QueryReceipt>;
}

// ============================================================================
// Billing
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    #[serde(deserialize_with = "required_scalar")]
    pub number: String,
    #[serde(default, deserialize_with = "scalar")]
    pub name: String,
    #[serde(deserialize_with = "required_scalar")]
    pub balance: String,
    #[serde(default, deserialize_with = "optional_scalar")]
    pub last_payment: Option<String>,
    #[serde(default, deserialize_with = "optional_scalar")]
    pub last_payment_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "tr-date", default, deserialize_with = "scalar")]
    pub date: String,
    #[serde(default, deserialize_with = "scalar")]
    pub detail: String,
    #[serde(default, deserialize_with = "scalar")]
    pub amount: String,
}

/// Bill data returned by the portal API, most recent transaction first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingStatement {
    pub account: AccountSummary,
    #[serde(default, deserialize_with = "transactions")]
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementOutcome {
    Statement {
        statement: BillingStatement,
        /// Portal session cookie string, replayable on later requests
        session_token: String,
    },
    AuthFailed {
        message: String,
    },
}

#[async_trait]
pub trait BillingPortal: Send + Sync {
    async fn fetch_statement(&self, account: &str, password: &str) -> DeskResult<StatementOutcome>;
}

/// Both boundary contracts, as injected into the engine.
#[derive(Clone)]
pub struct Fulfillment {
    pub queries: Arc<dyn QueryBackend>,
    pub portal: Arc<dyn BillingPortal>,
}

impl Fulfillment {
    /// Build the configured strategies.
    pub fn from_config(config: &Config) -> DeskResult<Self> {
        let queries: Arc<dyn QueryBackend> = match config.backend.strategy {
            BackendStrategy::Http => Arc::new(HttpQueryBackend::new(&config.backend.query_api_url)),
            BackendStrategy::Sqlite => {
                let path = config.backend.sqlite_path.as_deref().ok_or_else(|| {
                    DeskError::Validation("backend.sqlite_path is required for sqlite".into())
                })?;
                Arc::new(SqliteQueryBackend::open(path)?)
            }
        };
        let portal = Arc::new(HttpBillingPortal::new(&config.portal)?);
        tracing::info!(backend = queries.name(), "Fulfillment adapters ready");
        Ok(Self { queries, portal })
    }
}

// ============================================================================
// Lenient scalar decoding
// ============================================================================

fn scalar_to_string(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Accept a string or a number.
fn scalar<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(scalar_to_string(value).unwrap_or_default())
}

/// Like [`scalar`], but null and blank values are a decode error.
fn required_scalar<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    scalar_to_string(value)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| serde::de::Error::custom("missing required value"))
}

/// Loose boolean: `true`, non-zero numbers and non-empty strings other
/// than `"0"` and `"false"`.
fn is_truthy(value: Option<&serde_json::Value>) -> bool {
    match value {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(serde_json::Value::String(s)) => !s.is_empty() && s != "0" && s != "false",
        _ => false,
    }
}

fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(is_truthy(Some(&value)))
}

/// Like [`scalar`], treating null and empty strings as absent.
fn optional_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(scalar_to_string(value).filter(|s| !s.trim().is_empty()))
}

/// Non-array transaction fields decode as an empty list.
fn transactions<'de, D>(deserializer: D) -> Result<Vec<Transaction>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Array(_) => serde_json::from_value(value).map_err(serde::de::Error::custom),
        _ => Ok(Vec::new()),
    }
}
