//! Civic Common - Shared types, utilities, and configuration for the Civic Desk service.
//!
//! This crate provides:
//! - Configuration types and layered loading (`config.json` + `secrets.json` + env)
//! - Configuration validation
//! - Error types and handling utilities
//! - Logging setup and trace id helpers
//! - Small string utilities shared by the service crates

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod config_loader;
pub mod error;
pub mod logging;
pub mod util;
pub mod validation;

pub use config::{
    AckMode, BackendConfig, BackendStrategy, Config, DeskConfig, NetworkConfig,
    ObservabilityConfig, PortalConfig, ServerConfig, SmtpConfig, WhatsAppConfig,
};
pub use error::{Error, Result};
pub use validation::{Validate, ValidationError, ValidationResult};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::logging::init_logging;
    pub use crate::validation::{Validate, ValidationError};
}
