//! Configuration validation.
//!
//! Provides validation logic for configuration fields to ensure
//! all required values are present and within valid ranges.

use thiserror::Error;

use crate::config::{
    BackendConfig, BackendStrategy, Config, DeskConfig, ObservabilityConfig, ServerConfig,
    SmtpConfig, WhatsAppConfig,
};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid port {port}: must be between 1 and 65535")]
    InvalidPort { port: u16, field: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let sections: [&dyn Validate; 6] = [
            &self.server,
            &self.whatsapp,
            &self.backend,
            &self.smtp,
            &self.desk,
            &self.observability,
        ];

        let mut errors: Vec<ValidationError> = sections
            .iter()
            .filter_map(|section| section.validate().err())
            .collect();

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }

    /// Load (with env overrides) and validate configuration.
    pub fn load_and_validate() -> anyhow::Result<Self> {
        let config = Self::load_with_env()?;
        config.validate().map_err(|e| anyhow::anyhow!("{}", e))?;
        Ok(config)
    }
}

fn require(value: &str, field: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField {
            field: field.into(),
        });
    }
    Ok(())
}

impl Validate for ServerConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort {
                port: self.port,
                field: "server.port".into(),
            });
        }
        if self.max_body_bytes == 0 {
            return Err(ValidationError::InvalidValue {
                field: "server.max_body_bytes".into(),
                reason: "must be greater than 0".into(),
            });
        }
        Ok(())
    }
}

impl Validate for WhatsAppConfig {
    fn validate(&self) -> ValidationResult<()> {
        require(&self.access_token, "whatsapp.access_token")?;
        require(&self.phone_number_id, "whatsapp.phone_number_id")?;
        require(&self.verify_token, "whatsapp.verify_token")?;
        if !self.api_base.starts_with("http://") && !self.api_base.starts_with("https://") {
            return Err(ValidationError::InvalidValue {
                field: "whatsapp.api_base".into(),
                reason: "must be an http(s) URL".into(),
            });
        }
        Ok(())
    }
}

impl Validate for BackendConfig {
    fn validate(&self) -> ValidationResult<()> {
        match self.strategy {
            BackendStrategy::Http => require(&self.query_api_url, "backend.query_api_url"),
            BackendStrategy::Sqlite => match self.sqlite_path.as_deref() {
                Some(path) => require(path, "backend.sqlite_path"),
                None => Err(ValidationError::MissingField {
                    field: "backend.sqlite_path".into(),
                }),
            },
        }
    }
}

impl Validate for SmtpConfig {
    fn validate(&self) -> ValidationResult<()> {
        if !self.enabled {
            return Ok(());
        }
        require(&self.host, "smtp.host")?;
        require(&self.from_address, "smtp.from_address")?;
        if self.port == 0 {
            return Err(ValidationError::InvalidPort {
                port: self.port,
                field: "smtp.port".into(),
            });
        }
        Ok(())
    }
}

impl Validate for DeskConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.queue_capacity == 0 {
            return Err(ValidationError::InvalidValue {
                field: "desk.queue_capacity".into(),
                reason: "must be greater than 0".into(),
            });
        }
        Ok(())
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            });
        }

        Ok(())
    }
}
