//! MCP tool registration for the deidentify/reidentify operations.
//!
//! Tools are registered through the narrow [`ToolHost`] trait, so any MCP
//! server implementation can host them behind a small adapter.
//! [`ToolRegistry`] is the in-process host used by the `skyflow-mcp`
//! binary and by tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use skyflow_client::{register_tools, SkyflowClient, ToolOptions, ToolRegistry};
//!
//! let client = SkyflowClient::from_env()?;
//! let mut registry = ToolRegistry::new();
//! register_tools(&mut registry, &client, &ToolOptions::with_prefix("skyflow_"));
//!
//! let result = registry
//!     .call("skyflow_deidentify", json!({"inputString": "My SSN is 123-45-6789"}))
//!     .await?;
//! ```

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use indexmap::IndexMap;
use schemars::gen::SchemaGenerator;
use schemars::schema::{ArrayValidation, InstanceType, Schema, SchemaObject};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::entity::{resolve_entities, EntityType};
use crate::error::SkyflowError;
use crate::schema::tool_schema;
use crate::types::{DeidentifyOptions, TokenType};
use crate::SkyflowClient;

pub const DEIDENTIFY_TOOL: &str = "deidentify";
pub const REIDENTIFY_TOOL: &str = "reidentify";

/// Describes a tool to an MCP host.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub title: String,
    pub description: String,
    pub input_schema: Value,
    pub output_schema: Value,
}

/// One block of tool output content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    Text { text: String },
}

/// Result of a tool call in MCP shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    pub content: Vec<ToolContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl CallToolResult {
    /// Successful result carrying `output` as both JSON text and structured content.
    pub fn structured<T: Serialize>(output: &T) -> Result<Self, ToolError> {
        let structured =
            serde_json::to_value(output).map_err(|e| ToolError::OutputSerialize(e.to_string()))?;
        let text = serde_json::to_string(&structured)
            .map_err(|e| ToolError::OutputSerialize(e.to_string()))?;

        Ok(Self {
            content: vec![ToolContent::Text { text }],
            structured_content: Some(structured),
            is_error: None,
        })
    }

    /// Error result for reporting a failed call back to the model.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            structured_content: None,
            is_error: Some(true),
        }
    }
}

/// Error type for tool calls.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Arguments missing, malformed, or out of range
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The vault call failed or an entity tag was rejected
    #[error(transparent)]
    Skyflow(#[from] SkyflowError),

    /// Failed to serialize tool output
    #[error("Failed to serialize output: {0}")]
    OutputSerialize(String),

    /// No tool registered under this name
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

impl ToolError {
    /// Machine-readable code for the failure.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArguments(_) => "INVALID_ARGUMENTS",
            Self::Skyflow(err) => err.code(),
            Self::OutputSerialize(_) => "OUTPUT_SERIALIZE_ERROR",
            Self::UnknownTool(_) => "UNKNOWN_TOOL",
        }
    }
}

/// Handler invoked with the raw JSON arguments of a call.
pub type ToolHandler =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<CallToolResult, ToolError>> + Send + Sync>;

/// Anything that can host tools.
pub trait ToolHost {
    fn register_tool(&mut self, definition: ToolDefinition, handler: ToolHandler);
}

/// Options for [`register_tools`].
#[derive(Debug, Clone, Default)]
pub struct ToolOptions {
    /// Prepended verbatim to each tool name, e.g. `skyflow_`.
    pub prefix: Option<String>,
}

impl ToolOptions {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn tool_name(&self, name: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}{name}"),
            None => name.to_string(),
        }
    }
}

fn entity_list_schema(_: &mut SchemaGenerator) -> Schema {
    let names = EntityType::ALL
        .iter()
        .map(|entity| Value::from(entity.as_str()))
        .collect();

    let item = SchemaObject {
        instance_type: Some(InstanceType::String.into()),
        enum_values: Some(names),
        ..Default::default()
    };

    SchemaObject {
        instance_type: Some(InstanceType::Array.into()),
        array: Some(Box::new(ArrayValidation {
            items: Some(Schema::Object(item).into()),
            ..Default::default()
        })),
        ..Default::default()
    }
    .into()
}

/// Arguments of the deidentify tool.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeidentifyToolInput {
    /// Text that may contain sensitive data
    #[schemars(length(min = 1))]
    pub input_string: String,
    /// Format of the replacement tokens
    #[serde(default)]
    pub token_type: Option<TokenType>,
    /// Entity types to detect; all when omitted
    #[serde(default)]
    #[schemars(schema_with = "entity_list_schema")]
    pub entities: Option<Vec<String>>,
}

/// Output of the deidentify tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeidentifyToolOutput {
    /// Text with sensitive values replaced by tokens
    pub processed_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub char_count: Option<u64>,
    /// Number of entities detected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities_found: Option<usize>,
}

/// Arguments of the reidentify tool.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReidentifyToolInput {
    /// Text containing tokens to restore
    #[schemars(length(min = 1))]
    pub input_string: String,
}

/// Output of the reidentify tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReidentifyToolOutput {
    /// Text with tokens replaced by the original values
    pub processed_text: String,
}

fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

fn require_text(text: &str) -> Result<(), ToolError> {
    if text.is_empty() {
        return Err(ToolError::InvalidArguments(
            "inputString must not be empty".into(),
        ));
    }
    Ok(())
}

async fn run_deidentify(client: SkyflowClient, args: Value) -> Result<CallToolResult, ToolError> {
    let input: DeidentifyToolInput = parse_args(args)?;
    require_text(&input.input_string)?;

    let options = DeidentifyOptions {
        token_type: input.token_type,
        entities: input.entities.map(resolve_entities).transpose()?,
    };

    let result = client.deidentify(&input.input_string, &options).await?;
    CallToolResult::structured(&DeidentifyToolOutput {
        entities_found: result.entity_count(),
        processed_text: result.processed_text,
        word_count: result.word_count,
        char_count: result.char_count,
    })
}

async fn run_reidentify(client: SkyflowClient, args: Value) -> Result<CallToolResult, ToolError> {
    let input: ReidentifyToolInput = parse_args(args)?;
    require_text(&input.input_string)?;

    let result = client.reidentify(&input.input_string).await?;
    CallToolResult::structured(&ReidentifyToolOutput {
        processed_text: result.processed_text,
    })
}

/// Register the deidentify and reidentify tools on `host`.
pub fn register_tools<H: ToolHost + ?Sized>(
    host: &mut H,
    client: &SkyflowClient,
    options: &ToolOptions,
) {
    let deidentify_client = client.clone();
    host.register_tool(
        ToolDefinition {
            name: options.tool_name(DEIDENTIFY_TOOL),
            title: "Deidentify text".into(),
            description: "Replace sensitive data (PII/PHI) in text with vault tokens. \
                          Returns the processed text and detection statistics."
                .into(),
            input_schema: tool_schema::<DeidentifyToolInput>(),
            output_schema: tool_schema::<DeidentifyToolOutput>(),
        },
        Arc::new(move |args| run_deidentify(deidentify_client.clone(), args).boxed()),
    );

    let reidentify_client = client.clone();
    host.register_tool(
        ToolDefinition {
            name: options.tool_name(REIDENTIFY_TOOL),
            title: "Reidentify text".into(),
            description: "Restore the original sensitive values behind vault tokens in text."
                .into(),
            input_schema: tool_schema::<ReidentifyToolInput>(),
            output_schema: tool_schema::<ReidentifyToolOutput>(),
        },
        Arc::new(move |args| run_reidentify(reidentify_client.clone(), args).boxed()),
    );

    info!(
        prefix = options.prefix.as_deref().unwrap_or(""),
        "Registered Skyflow tools"
    );
}

struct RegisteredTool {
    definition: ToolDefinition,
    handler: ToolHandler,
}

/// In-memory tool host, keeping tools in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: IndexMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Definitions of all registered tools.
    pub fn definitions(&self) -> Vec<&ToolDefinition> {
        self.tools.values().map(|tool| &tool.definition).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name).map(|tool| &tool.definition)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Invoke a tool by name with JSON arguments.
    pub async fn call(&self, name: &str, args: Value) -> Result<CallToolResult, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        debug!(tool = name, "Calling tool");
        (tool.handler)(args).await
    }
}

impl ToolHost for ToolRegistry {
    fn register_tool(&mut self, definition: ToolDefinition, handler: ToolHandler) {
        self.tools.insert(
            definition.name.clone(),
            RegisteredTool {
                definition,
                handler,
            },
        );
    }
}
