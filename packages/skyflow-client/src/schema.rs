//! JSON schema generation for tool inputs and outputs.
//!
//! Uses `schemars` to derive schemas from the Rust argument/output types.
//! MCP hosts expect a self-contained object schema per tool.

use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde_json::Value;

/// Generate a self-contained JSON schema for `T`.
///
/// Subschemas are inlined at generation time, so the result carries no
/// `$ref`, `definitions` or `$schema` keys. `T` must not be recursive.
pub fn tool_schema<T: JsonSchema>() -> Value {
    let generator = SchemaSettings::draft07()
        .with(|settings| {
            settings.inline_subschemas = true;
            settings.meta_schema = None;
        })
        .into_generator();

    let root = generator.into_root_schema_for::<T>();
    let mut value = serde_json::to_value(root).unwrap_or_default();
    if let Value::Object(map) = &mut value {
        map.remove("definitions");
    }

    value
}
