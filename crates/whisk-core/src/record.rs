use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::ActionError;

/// Reserved key holding the action's input.
pub const VALUE_KEY: &str = "value";

/// One invocation as delivered by the platform.
///
/// `value` is the action input; every other top-level key is platform
/// metadata (`api_host`, `api_key`, `namespace`, `action_name`,
/// `activation_id`, `deadline`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRecord {
    pub value: Value,
    pub metadata: BTreeMap<String, String>,
}

impl InvocationRecord {
    /// Parse one line of the input channel.
    ///
    /// A record without `value` gets an empty object. Metadata values that
    /// are not strings are skipped.
    pub fn parse(line: &str) -> Result<Self, ActionError> {
        let parsed: Value = serde_json::from_str(line)
            .map_err(|e| ActionError::decode(line, "InvocationRecord", e))?;
        let Value::Object(mut fields) = parsed else {
            return Err(ActionError::decode(
                line,
                "InvocationRecord",
                "expected a JSON object",
            ));
        };

        let value = fields
            .remove(VALUE_KEY)
            .unwrap_or_else(|| Value::Object(Map::new()));

        let mut metadata = BTreeMap::new();
        for (key, meta) in fields {
            match meta {
                Value::String(s) => {
                    metadata.insert(key, s);
                }
                other => {
                    tracing::warn!(key, value = %other, "Ignoring non-string invocation metadata");
                }
            }
        }

        Ok(Self { value, metadata })
    }

    pub fn activation_id(&self) -> Option<&str> {
        self.metadata.get("activation_id").map(String::as_str)
    }

    pub fn action_name(&self) -> Option<&str> {
        self.metadata.get("action_name").map(String::as_str)
    }
}

/// The single record written back for an invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultRecord {
    Success(Map<String, Value>),
    Failure(String),
}

impl ResultRecord {
    pub fn failure(message: impl Into<String>) -> Self {
        ResultRecord::Failure(message.into())
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ResultRecord::Failure(_))
    }

    pub fn to_json(&self) -> Value {
        match self {
            ResultRecord::Success(map) => Value::Object(map.clone()),
            ResultRecord::Failure(message) => serde_json::json!({ "error": message }),
        }
    }

    /// Wire form: compact JSON terminated by a single newline.
    pub fn to_line(&self) -> Vec<u8> {
        let mut line = self.to_json().to_string().into_bytes();
        line.push(b'\n');
        line
    }
}

impl From<ActionError> for ResultRecord {
    fn from(err: ActionError) -> Self {
        ResultRecord::Failure(err.to_string())
    }
}

impl From<Result<Map<String, Value>, ActionError>> for ResultRecord {
    fn from(outcome: Result<Map<String, Value>, ActionError>) -> Self {
        match outcome {
            Ok(map) => ResultRecord::Success(map),
            Err(err) => err.into(),
        }
    }
}
