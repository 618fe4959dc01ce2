//! Request and response types for deidentify/reidentify calls.

use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entity::{resolve_entities, EntityType};
use crate::error::Result;

/// Format of the placeholder tokens substituted for sensitive values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenType {
    /// Vault-backed tokens that can be reidentified
    #[default]
    VaultToken,
    /// Entity name with a per-entity counter, e.g. `[EMAIL_ADDRESS_1]`
    EntityUniqueCounter,
    /// Entity name only, e.g. `[EMAIL_ADDRESS]`
    EntityOnly,
}

impl TokenType {
    /// Token format as understood by the detect API.
    pub fn wire_format(&self) -> &'static str {
        match self {
            TokenType::VaultToken => "vault_token",
            TokenType::EntityUniqueCounter => "entity_unq_counter",
            TokenType::EntityOnly => "entity_only",
        }
    }
}

/// Per-call deidentify options.
///
/// Unset fields fall back to the client defaults, then to the system
/// defaults ([`TokenType::VaultToken`], every entity type).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeidentifyOptions {
    pub token_type: Option<TokenType>,
    pub entities: Option<Vec<EntityType>>,
}

impl DeidentifyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token_type(mut self, token_type: TokenType) -> Self {
        self.token_type = Some(token_type);
        self
    }

    pub fn with_entities(mut self, entities: impl IntoIterator<Item = EntityType>) -> Self {
        self.entities = Some(entities.into_iter().collect());
        self
    }

    /// Restrict detection to the named entity tags.
    ///
    /// Fails with `InvalidEntity` on the first unknown tag.
    pub fn with_entity_names<I, S>(mut self, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.entities = Some(resolve_entities(names)?);
        Ok(self)
    }

    /// Layer these options over `defaults`; values set here win.
    pub fn merged_over(&self, defaults: &DeidentifyOptions) -> DeidentifyOptions {
        DeidentifyOptions {
            token_type: self.token_type.or(defaults.token_type),
            entities: self
                .entities
                .clone()
                .or_else(|| defaults.entities.clone()),
        }
    }
}

/// Fully resolved deidentify request handed to the vault service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeidentifyRequest {
    pub text: String,
    pub token_type: TokenType,
    /// `None` means every entity type.
    pub entities: Option<Vec<EntityType>>,
}

impl DeidentifyRequest {
    pub fn new(text: impl Into<String>, options: &DeidentifyOptions) -> Self {
        Self {
            text: text.into(),
            token_type: options.token_type.unwrap_or_default(),
            entities: options.entities.clone(),
        }
    }
}

/// Character span of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextIndex {
    pub start: usize,
    pub end: usize,
}

/// A detected entity, as reported by the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    /// Span in the original text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_index: Option<TextIndex>,
    /// Span in the processed text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_index: Option<TextIndex>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<HashMap<String, f64>>,
}

/// Outcome of a deidentify call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeidentifyResult {
    pub processed_text: String,
    /// Entities in the order the service returned them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<EntityInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub char_count: Option<u64>,
}

impl DeidentifyResult {
    pub fn new(processed_text: impl Into<String>) -> Self {
        Self {
            processed_text: processed_text.into(),
            ..Default::default()
        }
    }

    /// Number of entities detected, if the service reported them.
    pub fn entity_count(&self) -> Option<usize> {
        self.entities.as_ref().map(Vec::len)
    }
}

/// Outcome of a reidentify call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReidentifyResult {
    pub processed_text: String,
}

impl ReidentifyResult {
    pub fn new(processed_text: impl Into<String>) -> Self {
        Self {
            processed_text: processed_text.into(),
        }
    }
}
