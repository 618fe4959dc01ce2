//! Vault credentials.
//!
//! The secret is held in a `secrecy` box and only leaves it to build the
//! `Authorization` header, so tokens and API keys never reach logs or
//! error messages.

use secrecy::{ExposeSecret, SecretBox};
use std::fmt;

/// Which credential form is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    BearerToken,
    ApiKey,
}

impl CredentialKind {
    /// Human-readable name, safe to put in error messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::BearerToken => "bearer token",
            Self::ApiKey => "API key",
        }
    }
}

/// Credentials for the vault service.
///
/// Both forms are presented as `Authorization: Bearer ...`.
pub struct Credentials {
    kind: CredentialKind,
    secret: SecretBox<str>,
}

impl Credentials {
    fn new(kind: CredentialKind, secret: String) -> Self {
        Self {
            kind,
            secret: SecretBox::new(secret.into_boxed_str()),
        }
    }

    pub fn bearer_token(token: impl Into<String>) -> Self {
        Self::new(CredentialKind::BearerToken, token.into())
    }

    pub fn api_key(key: impl Into<String>) -> Self {
        Self::new(CredentialKind::ApiKey, key.into())
    }

    pub fn kind(&self) -> CredentialKind {
        self.kind
    }

    /// Value for the `Authorization` header.
    ///
    /// Only call this when building the request that needs it.
    pub fn authorization_value(&self) -> String {
        format!("Bearer {}", self.secret.expose_secret())
    }
}

impl Clone for Credentials {
    fn clone(&self) -> Self {
        Self::new(self.kind, self.secret.expose_secret().to_string())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credentials")
            .field(&self.kind)
            .field(&"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_is_redacted() {
        let creds = Credentials::api_key("key-123");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("ApiKey"));
        assert!(!debug.contains("key-123"));

        let cloned = creds.clone();
        assert_eq!(cloned.kind(), CredentialKind::ApiKey);
        assert!(!format!("{:?}", cloned).contains("key-123"));
    }

    #[test]
    fn test_authorization_value() {
        assert_eq!(
            Credentials::bearer_token("tok").authorization_value(),
            "Bearer tok"
        );
        assert_eq!(Credentials::api_key("key").authorization_value(), "Bearer key");
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(CredentialKind::BearerToken.label(), "bearer token");
        assert_eq!(CredentialKind::ApiKey.label(), "API key");
    }
}
