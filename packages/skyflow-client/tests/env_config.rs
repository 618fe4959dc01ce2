//! Client construction from process environment variables.
//!
//! These tests mutate the process environment, so they run serially.

use serial_test::serial;
use skyflow_client::config::{
    ACCOUNT_ID_VAR, API_KEY_VAR, BEARER_TOKEN_VAR, VAULT_ID_VAR, VAULT_URL_VAR, WORKSPACE_ID_VAR,
};
use skyflow_client::{ClientConfig, CredentialKind, SkyflowClient};

const ALL_VARS: [&str; 6] = [
    VAULT_ID_VAR,
    VAULT_URL_VAR,
    BEARER_TOKEN_VAR,
    API_KEY_VAR,
    ACCOUNT_ID_VAR,
    WORKSPACE_ID_VAR,
];

fn reset_env(vars: &[(&str, &str)]) {
    for name in ALL_VARS {
        std::env::remove_var(name);
    }
    for (name, value) in vars {
        std::env::set_var(name, value);
    }
}

#[test]
#[serial]
fn test_bearer_token_wins_over_api_key() {
    reset_env(&[
        (VAULT_ID_VAR, "vault-123"),
        (VAULT_URL_VAR, "https://abc123.vault.skyflowapis.com"),
        (BEARER_TOKEN_VAR, "bearer-token"),
        (API_KEY_VAR, "invalid\nkey"),
    ]);

    // The API key cannot be sent as a header, so construction only succeeds
    // if the bearer token is the credential in use.
    let client = SkyflowClient::from_env().unwrap();
    assert_eq!(client.cluster_id(), "abc123");

    let config = ClientConfig::from_env().unwrap();
    assert_eq!(
        config.credentials.unwrap().kind(),
        CredentialKind::BearerToken
    );
}

#[test]
#[serial]
fn test_optional_ids_from_env() {
    reset_env(&[
        (VAULT_ID_VAR, "vault-123"),
        (VAULT_URL_VAR, "https://abc123.vault.skyflowapis.com"),
        (API_KEY_VAR, "key"),
        (ACCOUNT_ID_VAR, "acc-1"),
        (WORKSPACE_ID_VAR, "ws-1"),
    ]);

    let client = SkyflowClient::from_env().unwrap();
    assert_eq!(client.identity().account_id.as_deref(), Some("acc-1"));
    assert_eq!(client.identity().workspace_id.as_deref(), Some("ws-1"));
}

#[test]
#[serial]
fn test_missing_credentials_fail_construction() {
    reset_env(&[
        (VAULT_ID_VAR, "vault-123"),
        (VAULT_URL_VAR, "https://abc123.vault.skyflowapis.com"),
    ]);

    let err = SkyflowClient::from_env().unwrap_err();
    assert_eq!(err.code(), "CONFIGURATION_ERROR");
    assert!(err.to_string().contains(BEARER_TOKEN_VAR));
}

#[test]
#[serial]
fn test_invalid_url_from_env_fails_construction() {
    reset_env(&[
        (VAULT_ID_VAR, "vault-123"),
        (VAULT_URL_VAR, "https://invalid.com"),
        (BEARER_TOKEN_VAR, "tok"),
    ]);

    let err = SkyflowClient::from_env().unwrap_err();
    assert!(err.to_string().contains("Invalid vaultUrl format"));
}
