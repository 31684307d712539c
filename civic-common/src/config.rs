//! Configuration management for the Civic Desk service.
//!
//! The service reads `~/.civic-desk/config.json`, deep-merges
//! `~/.civic-desk/secrets.json` over it, then applies environment overrides.
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. `secrets.json`
//! 3. `config.json`
//! 4. Default values
//!
//! # Environment Variable Mapping
//!
//! - `PORT` → server.port
//! - `CIVIC_BIND_ADDRESS` → network.bind
//! - `TOKEN` / `WHATSAPP_TOKEN` → whatsapp.access_token
//! - `PHONE_NUMBER_ID` → whatsapp.phone_number_id
//! - `VERIFY_TOKEN` → whatsapp.verify_token
//! - `SMTP_PASSWORD` → smtp.password
//! - `CIVIC_ACK_MODE` → desk.ack_mode
//! - `CIVIC_LOG_LEVEL` → observability.log_level
//! - `CIVIC_LOG_FORMAT` → observability.log_format

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config_loader::load_layered_config;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".civic-desk"),
        |dirs| dirs.home_dir().join(".civic-desk"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Network / Server
// ============================================================================

/// Global network configuration.
///
/// The webhook must be reachable by the chat platform, so the default bind
/// address is `0.0.0.0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Bind address for the HTTP server.
    #[serde(default = "default_bind_address")]
    pub bind: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".into()
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum accepted webhook body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_port() -> u16 {
    3000
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

// ============================================================================
// WhatsApp
// ============================================================================

/// WhatsApp Business Cloud API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    /// Graph API base URL (overridable for tests)
    #[serde(default = "default_graph_api_base")]
    pub api_base: String,
    /// Graph API version segment
    #[serde(default = "default_graph_api_version")]
    pub api_version: String,
    /// Phone number ID issued by Meta
    #[serde(default)]
    pub phone_number_id: String,
    /// Bearer token for the Cloud API
    #[serde(default)]
    pub access_token: String,
    /// Shared token echoed by Meta during webhook verification
    #[serde(default)]
    pub verify_token: String,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            api_base: default_graph_api_base(),
            api_version: default_graph_api_version(),
            phone_number_id: String::new(),
            access_token: String::new(),
            verify_token: String::new(),
        }
    }
}

impl WhatsAppConfig {
    /// Full URL of the messages endpoint for the configured phone number.
    pub fn messages_url(&self) -> String {
        format!(
            "{}/{}/{}/messages",
            self.api_base.trim_end_matches('/'),
            self.api_version,
            self.phone_number_id
        )
    }
}

fn default_graph_api_base() -> String {
    "https://graph.facebook.com".into()
}

fn default_graph_api_version() -> String {
    "v23.0".into()
}

// ============================================================================
// Backend / Portal
// ============================================================================

/// Which query backend integration is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendStrategy {
    /// Remote JSON API
    #[default]
    Http,
    /// Direct relational insert + assignment lookup
    Sqlite,
}

/// Query backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub strategy: BackendStrategy,
    /// Endpoint accepting query submissions (http strategy)
    #[serde(default = "default_query_api_url")]
    pub query_api_url: String,
    /// Database file (sqlite strategy)
    #[serde(default)]
    pub sqlite_path: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            strategy: BackendStrategy::default(),
            query_api_url: default_query_api_url(),
            sqlite_path: None,
        }
    }
}

fn default_query_api_url() -> String {
    "https://portal.ruwalocalboard.co.zw/db-api.php".into()
}

/// Billing portal configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default = "default_portal_login_url")]
    pub login_url: String,
    #[serde(default = "default_portal_api_url")]
    pub api_url: String,
    /// Prefix of the PDF statement link; the account number is appended.
    #[serde(default = "default_pdf_statement_base")]
    pub pdf_statement_base: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            login_url: default_portal_login_url(),
            api_url: default_portal_api_url(),
            pdf_statement_base: default_pdf_statement_base(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_portal_login_url() -> String {
    "https://portal.ruwalocalboard.co.zw/data/login2.php".into()
}

fn default_portal_api_url() -> String {
    "https://portal.ruwalocalboard.co.zw/api.php".into()
}

fn default_pdf_statement_base() -> String {
    "https://portal.ruwalocalboard.co.zw/stat/statement.php?id=".into()
}

fn default_user_agent() -> String {
    "Mozilla/5.0".into()
}

// ============================================================================
// SMTP
// ============================================================================

/// Outbound email (staff notification) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub host: String,
    /// SMTP port (default: 465 for implicit TLS)
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub tls: bool,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub from_address: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: String::new(),
            port: default_smtp_port(),
            tls: true,
            username: String::new(),
            password: String::new(),
            from_address: String::new(),
            from_name: default_from_name(),
        }
    }
}

fn default_smtp_port() -> u16 {
    465
}

fn default_from_name() -> String {
    "Ruwa Local Board".into()
}

// ============================================================================
// Desk behaviour
// ============================================================================

/// When the webhook acknowledges a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AckMode {
    /// Respond after every message in the payload has been processed.
    #[default]
    AfterProcessing,
    /// Queue messages for a background processor and respond at once.
    Immediate,
}

impl std::str::FromStr for AckMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "after_processing" => Ok(Self::AfterProcessing),
            "immediate" => Ok(Self::Immediate),
            other => Err(format!("unknown ack mode: {other}")),
        }
    }
}

/// Conversation desk configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeskConfig {
    #[serde(default)]
    pub ack_mode: AckMode,
    /// Capacity of the inbound queue used in `immediate` ack mode
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_faq_url")]
    pub faq_url: String,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            ack_mode: AckMode::default(),
            queue_capacity: default_queue_capacity(),
            faq_url: default_faq_url(),
        }
    }
}

fn default_queue_capacity() -> usize {
    100
}

fn default_faq_url() -> String {
    "https://ruwalocalboard.co.zw/faqs".into()
}

// ============================================================================
// Observability
// ============================================================================

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Root
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// JSON Schema reference
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub portal: PortalConfig,

    #[serde(default)]
    pub smtp: SmtpConfig,

    #[serde(default)]
    pub desk: DeskConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default directory.
    pub fn load() -> Result<Self> {
        Self::load_from_dir(config_dir())
    }

    /// Load configuration from a specific directory.
    pub fn load_from_dir(dir: PathBuf) -> Result<Self> {
        let dir_display = dir.display().to_string();
        let value = load_layered_config(Some(dir))?;
        if value.as_object().is_some_and(|o| o.is_empty()) {
            tracing::info!("Config files not found in {}, using defaults", dir_display);
        }

        serde_json::from_value(value)
            .with_context(|| format!("Failed to parse config from {dir_display}"))
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }

        if let Some(bind) = lookup("CIVIC_BIND_ADDRESS") {
            self.network.bind = bind;
        }

        // TOKEN is the historical name; WHATSAPP_TOKEN wins when both are set
        if let Some(token) = lookup("WHATSAPP_TOKEN").or_else(|| lookup("TOKEN")) {
            self.whatsapp.access_token = token;
        }
        if let Some(id) = lookup("PHONE_NUMBER_ID") {
            self.whatsapp.phone_number_id = id;
        }
        if let Some(token) = lookup("VERIFY_TOKEN") {
            self.whatsapp.verify_token = token;
        }

        if let Some(password) = lookup("SMTP_PASSWORD") {
            self.smtp.password = password;
        }

        if let Some(mode) = lookup("CIVIC_ACK_MODE") {
            match mode.parse() {
                Ok(mode) => self.desk.ack_mode = mode,
                Err(e) => tracing::warn!("Ignoring CIVIC_ACK_MODE: {}", e),
            }
        }

        if let Some(level) = lookup("CIVIC_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("CIVIC_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }

    /// Socket address string the HTTP server binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.network.bind, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.network.bind, "0.0.0.0");
        assert_eq!(config.whatsapp.api_version, "v23.0");
        assert_eq!(config.backend.strategy, BackendStrategy::Http);
        assert_eq!(config.desk.ack_mode, AckMode::AfterProcessing);
        assert_eq!(config.observability.log_level, "info");
        assert!(!config.smtp.enabled);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{
            "whatsapp": { "phone_number_id": "12345", "access_token": "tok" },
            "backend": { "strategy": "sqlite", "sqlite_path": "/tmp/desk.db" },
            "desk": { "ack_mode": "immediate" },
            "observability": { "level": "debug", "format": "json" }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.whatsapp.phone_number_id, "12345");
        assert_eq!(config.whatsapp.api_base, "https://graph.facebook.com");
        assert_eq!(config.backend.strategy, BackendStrategy::Sqlite);
        assert_eq!(config.desk.ack_mode, AckMode::Immediate);
        assert_eq!(config.desk.queue_capacity, 100);
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.observability.log_format, "json");
    }

    #[test]
    fn test_messages_url() {
        let mut wa = WhatsAppConfig::default();
        wa.phone_number_id = "555".into();
        assert_eq!(
            wa.messages_url(),
            "https://graph.facebook.com/v23.0/555/messages"
        );
        wa.api_base = "http://127.0.0.1:9000/".into();
        assert_eq!(wa.messages_url(), "http://127.0.0.1:9000/v23.0/555/messages");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("PORT", "8080"),
            ("TOKEN", "legacy"),
            ("WHATSAPP_TOKEN", "preferred"),
            ("PHONE_NUMBER_ID", "999"),
            ("VERIFY_TOKEN", "verify"),
            ("CIVIC_ACK_MODE", "immediate"),
            ("CIVIC_LOG_LEVEL", "trace"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides_from(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.whatsapp.access_token, "preferred");
        assert_eq!(config.whatsapp.phone_number_id, "999");
        assert_eq!(config.whatsapp.verify_token, "verify");
        assert_eq!(config.desk.ack_mode, AckMode::Immediate);
        assert_eq!(config.observability.log_level, "trace");
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_invalid_overrides_are_ignored() {
        let mut config = Config::default();
        config.apply_overrides_from(|k| match k {
            "PORT" => Some("not-a-port".into()),
            "CIVIC_ACK_MODE" => Some("sometimes".into()),
            _ => None,
        });
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.desk.ack_mode, AckMode::AfterProcessing);
    }

    #[test]
    fn test_load_from_dir_merges_secrets() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.json"),
            r#"{"server": {"port": 4000}, "smtp": {"enabled": true, "host": "smtp.example.org"}}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("secrets.json"),
            r#"{"smtp": {"password": "hunter2"}}"#,
        )
        .unwrap();

        let config = Config::load_from_dir(dir.path().to_path_buf()).unwrap();
        assert_eq!(config.server.port, 4000);
        assert!(config.smtp.enabled);
        assert_eq!(config.smtp.host, "smtp.example.org");
        assert_eq!(config.smtp.password, "hunter2");
        assert_eq!(config.smtp.port, 465);
    }

    #[test]
    fn test_load_from_empty_dir_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_dir(dir.path().to_path_buf()).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.desk.ack_mode, AckMode::AfterProcessing);
    }
}
