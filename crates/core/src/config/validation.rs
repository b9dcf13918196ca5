use thiserror::Error;
use url::Url;

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required field: {field}. {hint}")]
    MissingRequired { field: String, hint: String },

    #[error("Invalid value for field '{field}': '{value}'. Expected: {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Configuration validation failed: {message}")]
    ValidationFailed { message: String },
}

impl ConfigError {
    /// Create a missing required field error
    pub fn missing_required(field: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::MissingRequired {
            field: field.into(),
            hint: hint.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }

    /// Create a validation failed error
    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }
}

/// Trait for validating configuration values
pub trait ConfigValidator<T: ?Sized> {
    fn validate(&self, field: &str, value: &T) -> Result<(), ConfigError>;
}

/// Connection URL validator
pub struct UrlValidator {
    pub schemes: Vec<String>,
    pub require_host: bool,
}

impl UrlValidator {
    /// Accept `postgres://` and `postgresql://` URLs with a host
    pub fn postgres() -> Self {
        Self {
            schemes: vec!["postgres".to_string(), "postgresql".to_string()],
            require_host: true,
        }
    }
}

impl ConfigValidator<str> for UrlValidator {
    fn validate(&self, field: &str, value: &str) -> Result<(), ConfigError> {
        let url = Url::parse(value).map_err(|e| {
            ConfigError::invalid_value(field, mask_database_url(value), format!("valid URL ({})", e))
        })?;

        if !self.schemes.iter().any(|scheme| scheme == url.scheme()) {
            return Err(ConfigError::invalid_value(
                field,
                mask_database_url(value),
                format!("URL with scheme: {}", self.schemes.join(", ")),
            ));
        }

        if self.require_host && url.host_str().map_or(true, str::is_empty) {
            return Err(ConfigError::invalid_value(
                field,
                mask_database_url(value),
                "URL with host",
            ));
        }

        Ok(())
    }
}

/// Plain SQL identifier validator (letters, digits and underscores)
pub struct IdentifierValidator {
    pub max_length: usize,
}

impl Default for IdentifierValidator {
    fn default() -> Self {
        // PostgreSQL truncates identifiers longer than 63 bytes
        Self { max_length: 63 }
    }
}

impl ConfigValidator<str> for IdentifierValidator {
    fn validate(&self, field: &str, value: &str) -> Result<(), ConfigError> {
        let mut chars = value.chars();
        let valid_start = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

        if !valid_start || !valid_rest || value.len() > self.max_length {
            return Err(ConfigError::invalid_value(
                field,
                value,
                format!(
                    "identifier of at most {} letters, digits or underscores, not starting with a digit",
                    self.max_length
                ),
            ));
        }
        Ok(())
    }
}

/// Replace the password of a connection URL with `****`
pub fn mask_database_url(url_str: &str) -> String {
    match Url::parse(url_str) {
        Ok(mut url) => {
            if url.password().is_some() && url.set_password(Some("****")).is_err() {
                return "<unprintable database url>".to_string();
            }
            url.to_string()
        }
        Err(_) => url_str.to_string(),
    }
}
