//! The vault detect service the client delegates to.
//!
//! [`DetectService`] is the seam between the client and the vault. The
//! envelope and tool layers only ever talk to this trait;
//! [`HttpDetectService`] is the REST implementation used in production and
//! [`crate::testing::MockDetectService`] stands in for it in tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::VaultIdentity;
use crate::credentials::Credentials;
use crate::entity::EntityType;
use crate::error::{Result, SkyflowError};
use crate::types::{DeidentifyRequest, DeidentifyResult, EntityInfo, ReidentifyResult, TextIndex};

const DEIDENTIFY_STRING_PATH: &str = "/v1/detect/deidentify/string";
const REIDENTIFY_STRING_PATH: &str = "/v1/detect/reidentify/string";
const ACCOUNT_ID_HEADER: &str = "x-skyflow-account-id";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Failure reported by the vault service or while reaching it.
///
/// `status` is `None` for transport failures.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ApiError {
    pub status: Option<u16>,
    pub message: String,
    pub details: Option<serde_json::Value>,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn transport(err: reqwest::Error) -> Self {
        Self {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
            details: None,
            source: Some(Box::new(err)),
        }
    }
}

/// Deidentify/reidentify capability of the vault.
#[async_trait]
pub trait DetectService: Send + Sync {
    /// Replace sensitive spans of `request.text` with tokens.
    async fn deidentify_text(
        &self,
        request: DeidentifyRequest,
    ) -> std::result::Result<DeidentifyResult, ApiError>;

    /// Restore the original values behind the tokens in `text`.
    async fn reidentify_text(&self, text: &str) -> std::result::Result<ReidentifyResult, ApiError>;
}

// Wire types for the detect REST API

#[derive(Serialize)]
struct DeidentifyStringBody<'a> {
    vault_id: &'a str,
    text: &'a str,
    token_type: TokenTypeBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    entity_types: Option<Vec<EntityType>>,
}

#[derive(Serialize)]
struct TokenTypeBody {
    default: &'static str,
}

#[derive(Serialize)]
struct ReidentifyStringBody<'a> {
    vault_id: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct DeidentifyStringResponse {
    processed_text: String,
    #[serde(default)]
    entities: Option<Vec<WireEntity>>,
    word_count: Option<u64>,
    character_count: Option<u64>,
}

#[derive(Deserialize)]
struct WireEntity {
    token: Option<String>,
    value: Option<String>,
    entity_type: Option<String>,
    location: Option<WireLocation>,
    entity_scores: Option<HashMap<String, f64>>,
}

#[derive(Deserialize)]
struct WireLocation {
    start_index: Option<usize>,
    end_index: Option<usize>,
    start_index_processed: Option<usize>,
    end_index_processed: Option<usize>,
}

#[derive(Deserialize)]
struct ReidentifyStringResponse {
    processed_text: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    http_code: Option<u16>,
    message: Option<String>,
    details: Option<serde_json::Value>,
}

fn span(start: Option<usize>, end: Option<usize>) -> Option<TextIndex> {
    Some(TextIndex {
        start: start?,
        end: end?,
    })
}

impl From<WireEntity> for EntityInfo {
    fn from(wire: WireEntity) -> Self {
        let (text_index, processed_index) = match wire.location {
            Some(loc) => (
                span(loc.start_index, loc.end_index),
                span(loc.start_index_processed, loc.end_index_processed),
            ),
            None => (None, None),
        };

        EntityInfo {
            token: wire.token,
            value: wire.value,
            entity: wire.entity_type,
            text_index,
            processed_index,
            scores: wire.entity_scores,
        }
    }
}

impl From<DeidentifyStringResponse> for DeidentifyResult {
    fn from(wire: DeidentifyStringResponse) -> Self {
        DeidentifyResult {
            processed_text: wire.processed_text,
            entities: wire
                .entities
                .map(|entities| entities.into_iter().map(EntityInfo::from).collect()),
            word_count: wire.word_count,
            char_count: wire.character_count,
        }
    }
}

/// REST implementation of [`DetectService`].
#[derive(Clone)]
pub struct HttpDetectService {
    http_client: Client,
    base_url: String,
    vault_id: String,
}

impl HttpDetectService {
    /// Create a service bound to a validated vault.
    ///
    /// Fails with `Configuration` if the credential cannot be used as an
    /// `Authorization` header.
    pub fn new(identity: &VaultIdentity, credentials: &Credentials) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&credentials.authorization_value()).map_err(|_| {
            SkyflowError::configuration(format!(
                "{} contains characters not allowed in an HTTP header",
                credentials.kind().label()
            ))
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(account_id) = &identity.account_id {
            let value = HeaderValue::from_str(account_id).map_err(|_| {
                SkyflowError::configuration("accountId is not a valid header value")
            })?;
            headers.insert(ACCOUNT_ID_HEADER, value);
        }

        let http_client = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SkyflowError::configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url: identity.vault_url.trim_end_matches('/').to_string(),
            vault_id: identity.vault_id.clone(),
        })
    }

    /// Point the service at a different base URL (proxies, local fakes).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> std::result::Result<R, ApiError> {
        let response = self
            .http_client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, path, "Skyflow request failed");
                ApiError::transport(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = %status, path, "Skyflow API error");
            return Err(api_error_from_body(status.as_u16(), &text));
        }

        response.json().await.map_err(ApiError::transport)
    }
}

/// Map a non-2xx response body into an [`ApiError`].
fn api_error_from_body(status: u16, body: &str) -> ApiError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => ApiError {
            status: Some(envelope.error.http_code.unwrap_or(status)),
            message: envelope
                .error
                .message
                .unwrap_or_else(|| format!("Skyflow API returned status {status}")),
            details: envelope.error.details,
            source: None,
        },
        Err(_) if body.is_empty() => {
            ApiError::new(format!("Skyflow API returned status {status}")).with_status(status)
        }
        Err(_) => ApiError::new(body.to_string()).with_status(status),
    }
}

#[async_trait]
impl DetectService for HttpDetectService {
    async fn deidentify_text(
        &self,
        request: DeidentifyRequest,
    ) -> std::result::Result<DeidentifyResult, ApiError> {
        let body = DeidentifyStringBody {
            vault_id: &self.vault_id,
            text: &request.text,
            token_type: TokenTypeBody {
                default: request.token_type.wire_format(),
            },
            entity_types: request.entities.clone(),
        };

        let response: DeidentifyStringResponse = self.post(DEIDENTIFY_STRING_PATH, &body).await?;
        debug!(
            entities = response.entities.as_ref().map(Vec::len).unwrap_or(0),
            "Skyflow deidentify response"
        );
        Ok(response.into())
    }

    async fn reidentify_text(&self, text: &str) -> std::result::Result<ReidentifyResult, ApiError> {
        let body = ReidentifyStringBody {
            vault_id: &self.vault_id,
            text,
        };

        let response: ReidentifyStringResponse = self.post(REIDENTIFY_STRING_PATH, &body).await?;
        Ok(ReidentifyResult::new(response.processed_text))
    }
}
