use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::credentials::Credentials;
use crate::error::{Result, SkyflowError};
use crate::types::DeidentifyOptions;

pub const VAULT_ID_VAR: &str = "SKYFLOW_VAULT_ID";
pub const VAULT_URL_VAR: &str = "SKYFLOW_VAULT_URL";
pub const BEARER_TOKEN_VAR: &str = "SKYFLOW_BEARER_TOKEN";
pub const API_KEY_VAR: &str = "SKYFLOW_API_KEY";
pub const ACCOUNT_ID_VAR: &str = "SKYFLOW_ACCOUNT_ID";
pub const WORKSPACE_ID_VAR: &str = "SKYFLOW_WORKSPACE_ID";

lazy_static! {
    // Host label sitting right before `.vault`, scheme already stripped
    static ref CLUSTER_ID_REGEX: Regex = Regex::new(r"^([^./]+)\.vault").unwrap();
}

/// Caller-supplied vault location parameters, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VaultParams {
    pub vault_id: Option<String>,
    pub vault_url: Option<String>,
    pub account_id: Option<String>,
    pub workspace_id: Option<String>,
}

impl VaultParams {
    pub fn new(vault_id: impl Into<String>, vault_url: impl Into<String>) -> Self {
        Self {
            vault_id: Some(vault_id.into()),
            vault_url: Some(vault_url.into()),
            ..Default::default()
        }
    }

    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    pub fn with_workspace_id(mut self, workspace_id: impl Into<String>) -> Self {
        self.workspace_id = Some(workspace_id.into());
        self
    }
}

/// Validated vault identity. Immutable once built.
///
/// `account_id` and `workspace_id` are always serialized, as `null` when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultIdentity {
    pub vault_id: String,
    pub vault_url: String,
    pub cluster_id: String,
    pub account_id: Option<String>,
    pub workspace_id: Option<String>,
}

/// Extract the cluster id from a vault URL such as
/// `https://abc123.vault.skyflowapis.com`.
///
/// Returns `None` when the URL does not contain a `<label>.vault` host.
pub fn extract_cluster_id(vault_url: &str) -> Option<String> {
    let host = vault_url
        .strip_prefix("https://")
        .or_else(|| vault_url.strip_prefix("http://"))
        .unwrap_or(vault_url);

    CLUSTER_ID_REGEX
        .captures(host)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Validate vault parameters and derive the cluster id.
///
/// Pure and deterministic; makes no network calls.
pub fn validate_vault_config(params: &VaultParams) -> Result<VaultIdentity> {
    let vault_id = present(&params.vault_id)
        .ok_or_else(|| SkyflowError::configuration("vaultId is required"))?;
    let vault_url = present(&params.vault_url)
        .ok_or_else(|| SkyflowError::configuration("vaultUrl is required"))?;
    let cluster_id = extract_cluster_id(vault_url).ok_or_else(|| {
        SkyflowError::configuration(
            "Invalid vaultUrl format. Expected: https://<clusterId>.vault.<domain>",
        )
    })?;

    Ok(VaultIdentity {
        vault_id: vault_id.to_string(),
        vault_url: vault_url.to_string(),
        cluster_id,
        account_id: params.account_id.clone(),
        workspace_id: params.workspace_id.clone(),
    })
}

/// Everything needed to construct a [`crate::SkyflowClient`].
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub vault: VaultParams,
    pub credentials: Option<Credentials>,
    /// Client-level defaults applied beneath per-call options.
    pub defaults: DeidentifyOptions,
}

impl ClientConfig {
    pub fn new(vault: VaultParams, credentials: Credentials) -> Self {
        Self {
            vault,
            credentials: Some(credentials),
            defaults: DeidentifyOptions::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: DeidentifyOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file is loaded first when present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// The bearer token takes precedence over the API key when both are set.
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let vault_id = var(VAULT_ID_VAR).ok_or_else(|| {
            SkyflowError::configuration(format!(
                "{VAULT_ID_VAR} environment variable is required"
            ))
        })?;
        let vault_url = var(VAULT_URL_VAR).ok_or_else(|| {
            SkyflowError::configuration(format!(
                "{VAULT_URL_VAR} environment variable is required"
            ))
        })?;

        let credentials = match (var(BEARER_TOKEN_VAR), var(API_KEY_VAR)) {
            (Some(token), _) => Credentials::bearer_token(token),
            (None, Some(key)) => Credentials::api_key(key),
            (None, None) => {
                return Err(SkyflowError::configuration(format!(
                    "Either {BEARER_TOKEN_VAR} or {API_KEY_VAR} environment variable is required"
                )))
            }
        };

        let vault = VaultParams {
            vault_id: Some(vault_id),
            vault_url: Some(vault_url),
            account_id: var(ACCOUNT_ID_VAR),
            workspace_id: var(WORKSPACE_ID_VAR),
        };

        Ok(Self::new(vault, credentials))
    }
}
