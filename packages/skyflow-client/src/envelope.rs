//! Deidentify → operation → reidentify protection envelope.
//!
//! Sensitive input is tokenized before it reaches the caller's operation
//! (typically an LLM or another third-party call), and the operation's
//! output is reidentified on the way back.
//!
//! # Example
//!
//! ```rust,ignore
//! use skyflow_client::{protect, ProtectOptions, SkyflowClient};
//!
//! let client = SkyflowClient::from_env()?;
//!
//! let summary: String = protect(
//!     &client,
//!     "Email john@example.com about his claim",
//!     |safe_text| async move { llm.summarize(&safe_text).await },
//!     ProtectOptions::default(),
//! )
//! .await?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::SkyflowClient;
use crate::error::SkyflowError;
use crate::types::{DeidentifyOptions, DeidentifyResult};

/// Callback invoked with the deidentify outcome.
pub type DeidentifiedHook = Arc<dyn Fn(&DeidentifyResult) + Send + Sync>;

/// Callback invoked with the reidentified text.
pub type ReidentifiedHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Options for [`protect`].
#[derive(Clone)]
pub struct ProtectOptions {
    /// Forwarded to the deidentify call.
    pub deidentify: DeidentifyOptions,
    /// Reidentify the operation's output. Defaults to `true`.
    pub reidentify_output: bool,
    /// Field of a structured output to reidentify.
    pub reidentify_field: Option<String>,
    pub on_deidentified: Option<DeidentifiedHook>,
    pub on_reidentified: Option<ReidentifiedHook>,
}

impl Default for ProtectOptions {
    fn default() -> Self {
        Self {
            deidentify: DeidentifyOptions::default(),
            reidentify_output: true,
            reidentify_field: None,
            on_deidentified: None,
            on_reidentified: None,
        }
    }
}

impl ProtectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deidentify_options(mut self, options: DeidentifyOptions) -> Self {
        self.deidentify = options;
        self
    }

    pub fn with_reidentify_output(mut self, reidentify: bool) -> Self {
        self.reidentify_output = reidentify;
        self
    }

    pub fn with_reidentify_field(mut self, field: impl Into<String>) -> Self {
        self.reidentify_field = Some(field.into());
        self
    }

    pub fn on_deidentified<F>(mut self, hook: F) -> Self
    where
        F: Fn(&DeidentifyResult) + Send + Sync + 'static,
    {
        self.on_deidentified = Some(Arc::new(hook));
        self
    }

    pub fn on_reidentified<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_reidentified = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for ProtectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtectOptions")
            .field("deidentify", &self.deidentify)
            .field("reidentify_output", &self.reidentify_output)
            .field("reidentify_field", &self.reidentify_field)
            .field("on_deidentified", &self.on_deidentified.is_some())
            .field("on_reidentified", &self.on_reidentified.is_some())
            .finish()
    }
}

/// Options for [`SkyflowClient::wrap`]: no field targeting, no hooks.
#[derive(Debug, Clone)]
pub struct WrapOptions {
    pub deidentify: DeidentifyOptions,
    pub reidentify_output: bool,
}

impl Default for WrapOptions {
    fn default() -> Self {
        Self {
            deidentify: DeidentifyOptions::default(),
            reidentify_output: true,
        }
    }
}

impl WrapOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deidentify_options(mut self, options: DeidentifyOptions) -> Self {
        self.deidentify = options;
        self
    }

    pub fn with_reidentify_output(mut self, reidentify: bool) -> Self {
        self.reidentify_output = reidentify;
        self
    }
}

impl From<WrapOptions> for ProtectOptions {
    fn from(options: WrapOptions) -> Self {
        ProtectOptions {
            deidentify: options.deidentify,
            reidentify_output: options.reidentify_output,
            ..Default::default()
        }
    }
}

/// Output of a protected operation.
///
/// `reidentify_slot` picks the single string to reidentify, if any. A string
/// value is always its own slot; structured values expose `field` when that
/// field currently holds a string. Everything else passes through untouched,
/// which is what the default implementation does.
pub trait ProtectedOutput {
    fn reidentify_slot(&mut self, _field: Option<&str>) -> Option<&mut String> {
        None
    }
}

impl ProtectedOutput for String {
    fn reidentify_slot(&mut self, _field: Option<&str>) -> Option<&mut String> {
        Some(self)
    }
}

impl ProtectedOutput for Option<String> {
    fn reidentify_slot(&mut self, _field: Option<&str>) -> Option<&mut String> {
        self.as_mut()
    }
}

impl ProtectedOutput for Value {
    fn reidentify_slot(&mut self, field: Option<&str>) -> Option<&mut String> {
        match self {
            Value::String(text) => Some(text),
            Value::Object(map) => map.reidentify_slot(field),
            _ => None,
        }
    }
}

impl ProtectedOutput for Map<String, Value> {
    fn reidentify_slot(&mut self, field: Option<&str>) -> Option<&mut String> {
        match self.get_mut(field?) {
            Some(Value::String(text)) => Some(text),
            _ => None,
        }
    }
}

impl ProtectedOutput for HashMap<String, String> {
    fn reidentify_slot(&mut self, field: Option<&str>) -> Option<&mut String> {
        self.get_mut(field?)
    }
}

impl<T> ProtectedOutput for Vec<T> {}

macro_rules! passthrough_output {
    ($($ty:ty),+ $(,)?) => {
        $(impl ProtectedOutput for $ty {})+
    };
}

passthrough_output!((), bool, i8, i16, i32, i64, u8, u16, u32, u64, usize, isize, f32, f64);

/// Run `operation` on a deidentified copy of `input` and reidentify its output.
///
/// 1. `input` is deidentified. On failure the operation never runs and the
///    `Deidentify` error is returned through `E::from`.
/// 2. `operation` runs exactly once with the processed text. Its error is
///    returned as-is.
/// 3. Unless `reidentify_output` is false, the output's reidentify slot (see
///    [`ProtectedOutput`]) is reidentified in place. At most one reidentify
///    call is made.
pub async fn protect<T, E, F, Fut>(
    client: &SkyflowClient,
    input: &str,
    operation: F,
    options: ProtectOptions,
) -> Result<T, E>
where
    T: ProtectedOutput,
    E: From<SkyflowError>,
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let deidentified = client.deidentify(input, &options.deidentify).await?;
    if let Some(hook) = &options.on_deidentified {
        hook(&deidentified);
    }

    let mut output = operation(deidentified.processed_text).await?;

    if !options.reidentify_output {
        debug!("Reidentification disabled, returning raw output");
        return Ok(output);
    }

    if let Some(slot) = output.reidentify_slot(options.reidentify_field.as_deref()) {
        let restored = client.reidentify(slot).await?;
        *slot = restored.processed_text;
        if let Some(hook) = &options.on_reidentified {
            hook(slot.as_str());
        }
    } else {
        debug!("Output has nothing to reidentify, passing through");
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_wins_over_field() {
        let mut output = String::from("token");
        assert_eq!(
            output.reidentify_slot(Some("output")).map(|s| s.as_str()),
            Some("token")
        );

        let mut value = json!("token");
        assert!(value.reidentify_slot(Some("output")).is_some());
    }

    #[test]
    fn test_object_field_slot() {
        let mut value = json!({"output": "token", "other": "x", "n": 1});
        assert_eq!(
            value.reidentify_slot(Some("output")).map(|s| s.as_str()),
            Some("token")
        );
        assert!(value.reidentify_slot(Some("n")).is_none());
        assert!(value.reidentify_slot(Some("missing")).is_none());
        assert!(value.reidentify_slot(None).is_none());
    }

    #[test]
    fn test_non_string_values_pass_through() {
        assert!(json!(null).reidentify_slot(Some("output")).is_none());
        assert!(json!([1, 2]).reidentify_slot(Some("output")).is_none());
        assert!(42_i64.reidentify_slot(None).is_none());
        assert!(vec!["token".to_string()].reidentify_slot(None).is_none());
        assert!(None::<String>.reidentify_slot(None).is_none());
    }

    #[test]
    fn test_hash_map_field_slot() {
        let mut map = HashMap::from([("answer".to_string(), "token".to_string())]);
        assert!(map.reidentify_slot(Some("answer")).is_some());
        assert!(map.reidentify_slot(Some("question")).is_none());
    }

    #[test]
    fn test_wrap_options_disable_field_and_hooks() {
        let options: ProtectOptions = WrapOptions::new().with_reidentify_output(false).into();
        assert!(!options.reidentify_output);
        assert!(options.reidentify_field.is_none());
        assert!(options.on_deidentified.is_none());
        assert!(options.on_reidentified.is_none());
    }
}
