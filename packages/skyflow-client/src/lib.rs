//! Typed Skyflow Detect client.
//!
//! Deidentifies and reidentifies sensitive text through a Skyflow vault and
//! provides a protection envelope for routing sensitive text through
//! untrusted processing (LLMs, third-party APIs). The same operations can be
//! exposed as MCP tools.
//!
//! # Example
//!
//! ```rust,ignore
//! use skyflow_client::{DeidentifyOptions, EntityType, SkyflowClient, TokenType};
//!
//! let client = SkyflowClient::from_env()?;
//!
//! let result = client
//!     .deidentify(
//!         "Call Ann at 555-0100",
//!         &DeidentifyOptions::new()
//!             .with_token_type(TokenType::EntityUniqueCounter)
//!             .with_entities([EntityType::Name, EntityType::PhoneNumber]),
//!     )
//!     .await?;
//!
//! let restored = client.reidentify(&result.processed_text).await?;
//! ```
//!
//! # Protection Envelope
//!
//! ```rust,ignore
//! let answer: String = client
//!     .wrap(
//!         "Draft a reply to john@example.com",
//!         |safe_text| async move { llm.complete(&safe_text).await },
//!         WrapOptions::default(),
//!     )
//!     .await?;
//! ```

pub mod config;
pub mod credentials;
pub mod entity;
pub mod envelope;
pub mod error;
pub mod schema;
pub mod service;
pub mod testing;
pub mod tools;
pub mod types;

pub use config::{
    extract_cluster_id, validate_vault_config, ClientConfig, VaultIdentity, VaultParams,
};
pub use credentials::{CredentialKind, Credentials};
pub use entity::{is_valid_entity, resolve_entities, resolve_entity, EntityType};
pub use envelope::{protect, ProtectOptions, ProtectedOutput, WrapOptions};
pub use error::{Result, SkyflowError};
pub use service::{ApiError, DetectService, HttpDetectService};
pub use tools::{
    register_tools, CallToolResult, ToolContent, ToolDefinition, ToolError, ToolHandler, ToolHost,
    ToolOptions, ToolRegistry,
};
pub use types::*;

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

/// Skyflow Detect client.
///
/// Holds only immutable configuration, so clones are cheap and concurrent
/// calls on one client are independent.
#[derive(Clone)]
pub struct SkyflowClient {
    identity: VaultIdentity,
    defaults: DeidentifyOptions,
    service: Arc<dyn DetectService>,
}

impl SkyflowClient {
    /// Create a client talking to the vault over HTTP.
    ///
    /// Fails with `Configuration` when the vault parameters are invalid or no
    /// credentials were supplied.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let identity = validate_vault_config(&config.vault)?;
        let credentials = config.credentials.ok_or_else(|| {
            SkyflowError::configuration("Either a bearer token or an API key is required")
        })?;

        let service = HttpDetectService::new(&identity, &credentials)?;
        debug!(
            vault_id = %identity.vault_id,
            cluster_id = %identity.cluster_id,
            credential = ?credentials.kind(),
            "Skyflow client configured"
        );

        Ok(Self::with_service(identity, Arc::new(service)).with_defaults(config.defaults))
    }

    /// Create from environment variables (see [`ClientConfig::from_env`]).
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Create a client over any [`DetectService`] implementation.
    pub fn with_service(identity: VaultIdentity, service: Arc<dyn DetectService>) -> Self {
        Self {
            identity,
            defaults: DeidentifyOptions::default(),
            service,
        }
    }

    /// Set client-level deidentify defaults.
    pub fn with_defaults(mut self, defaults: DeidentifyOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn identity(&self) -> &VaultIdentity {
        &self.identity
    }

    pub fn vault_id(&self) -> &str {
        &self.identity.vault_id
    }

    pub fn cluster_id(&self) -> &str {
        &self.identity.cluster_id
    }

    pub fn defaults(&self) -> &DeidentifyOptions {
        &self.defaults
    }

    /// Replace sensitive values in `text` with tokens.
    ///
    /// Per-call options win over the client defaults.
    pub async fn deidentify(
        &self,
        text: &str,
        options: &DeidentifyOptions,
    ) -> Result<DeidentifyResult> {
        let effective = options.merged_over(&self.defaults);
        let request = DeidentifyRequest::new(text, &effective);
        let start = std::time::Instant::now();

        let result = self.service.deidentify_text(request).await.map_err(|e| {
            warn!(status = ?e.status, error = %e, "Skyflow deidentify failed");
            SkyflowError::deidentify(e)
        })?;

        debug!(
            input_len = text.len(),
            entities = result.entity_count().unwrap_or(0),
            duration_ms = start.elapsed().as_millis(),
            "Skyflow deidentify"
        );

        Ok(result)
    }

    /// Restore original values behind the tokens in `text`.
    pub async fn reidentify(&self, text: &str) -> Result<ReidentifyResult> {
        let start = std::time::Instant::now();

        let result = self.service.reidentify_text(text).await.map_err(|e| {
            warn!(status = ?e.status, error = %e, "Skyflow reidentify failed");
            SkyflowError::reidentify(e)
        })?;

        debug!(
            input_len = text.len(),
            duration_ms = start.elapsed().as_millis(),
            "Skyflow reidentify"
        );

        Ok(result)
    }

    /// Run `operation` on deidentified `input`, reidentifying string output.
    ///
    /// Convenience over [`protect`] without field targeting or hooks.
    pub async fn wrap<T, E, F, Fut>(
        &self,
        input: &str,
        operation: F,
        options: WrapOptions,
    ) -> std::result::Result<T, E>
    where
        T: ProtectedOutput,
        E: From<SkyflowError>,
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        protect(self, input, operation, options.into()).await
    }

    /// Method form of [`protect`].
    pub async fn protect<T, E, F, Fut>(
        &self,
        input: &str,
        operation: F,
        options: ProtectOptions,
    ) -> std::result::Result<T, E>
    where
        T: ProtectedOutput,
        E: From<SkyflowError>,
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        protect(self, input, operation, options).await
    }
}

impl std::fmt::Debug for SkyflowClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkyflowClient")
            .field("identity", &self.identity)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}
