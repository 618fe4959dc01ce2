//! Error types for the Skyflow client.
//!
//! Failures reported by the vault service are caught once at the client
//! boundary and reclassified into [`SkyflowError`]. The original
//! [`ApiError`] stays reachable through `source()`.

use thiserror::Error;

use crate::service::ApiError;

/// Result type for Skyflow client operations.
pub type Result<T> = std::result::Result<T, SkyflowError>;

/// Skyflow client errors.
#[derive(Debug, Error)]
pub enum SkyflowError {
    /// Invalid or missing client configuration (vault id, vault URL, credentials)
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Credential rejected by the vault service. Never raised by this crate;
    /// hosts and custom [`DetectService`](crate::DetectService)s use it to
    /// surface rejections they detect themselves.
    #[error("Authentication error: {message}")]
    Authentication {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The vault service failed to deidentify text
    #[error("Deidentify failed: {message}")]
    Deidentify {
        message: String,
        status: Option<u16>,
        details: Option<serde_json::Value>,
        #[source]
        source: Option<ApiError>,
    },

    /// The vault service failed to reidentify text
    #[error("Reidentify failed: {message}")]
    Reidentify {
        message: String,
        status: Option<u16>,
        details: Option<serde_json::Value>,
        #[source]
        source: Option<ApiError>,
    },

    /// Entity tag outside the supported vocabulary
    #[error("Invalid entity type: {entity}")]
    InvalidEntity { entity: String },
}

impl SkyflowError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn authentication(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Authentication {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Reclassify a failed deidentify call.
    pub fn deidentify(err: ApiError) -> Self {
        Self::Deidentify {
            message: err.message.clone(),
            status: err.status,
            details: err.details.clone(),
            source: Some(err),
        }
    }

    /// Reclassify a failed reidentify call.
    pub fn reidentify(err: ApiError) -> Self {
        Self::Reidentify {
            message: err.message.clone(),
            status: err.status,
            details: err.details.clone(),
            source: Some(err),
        }
    }

    /// Stable machine-readable code, for branching without matching on messages.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::Authentication { .. } => "AUTHENTICATION_ERROR",
            Self::Deidentify { .. } => "DEIDENTIFY_ERROR",
            Self::Reidentify { .. } => "REIDENTIFY_ERROR",
            Self::InvalidEntity { .. } => "INVALID_ENTITY_ERROR",
        }
    }

    /// HTTP status reported by the vault service, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Deidentify { status, .. } | Self::Reidentify { status, .. } => *status,
            _ => None,
        }
    }

    /// Error details payload reported by the vault service, if any.
    pub fn details(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Deidentify { details, .. } | Self::Reidentify { details, .. } => {
                details.as_ref()
            }
            _ => None,
        }
    }
}
