use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ActionError;

/// Encoder/decoder knobs carried in [`RuntimeConfig`](crate::config::RuntimeConfig).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CodecOptions {
    /// Drop top-level `null` fields from encoded results, the way the
    /// platform's native encoders omit unset optionals.
    #[serde(default)]
    pub omit_null_fields: bool,
}

/// JSON codec between the wire and handler types.
///
/// All serde errors stop here and come out as [`ActionError`] variants, so
/// callers never see a raw `serde_json::Error`.
#[derive(Debug, Clone, Default)]
pub struct WireCodec {
    options: CodecOptions,
}

impl WireCodec {
    pub fn new(options: CodecOptions) -> Self {
        Self { options }
    }

    /// Decode a JSON value into a typed handler input.
    pub fn decode<T: DeserializeOwned>(&self, value: &Value) -> Result<T, ActionError> {
        T::deserialize(value)
            .map_err(|e| ActionError::decode(&value.to_string(), std::any::type_name::<T>(), e))
    }

    /// Encode a typed handler output. The output must serialize to a JSON object.
    pub fn encode<T: Serialize>(&self, output: &T) -> Result<Map<String, Value>, ActionError> {
        let value = serde_json::to_value(output).map_err(|e| ActionError::Encode {
            type_name: std::any::type_name::<T>().to_string(),
            cause: e.to_string(),
        })?;
        self.encode_untyped(value)
    }

    /// Validate an untyped handler result before it goes on the wire.
    ///
    /// Distinguishes "not an object" ([`ActionError::NotAnObject`]) from a
    /// serialization failure ([`ActionError::Encode`]).
    pub fn encode_untyped(&self, value: Value) -> Result<Map<String, Value>, ActionError> {
        let Value::Object(mut map) = value else {
            return Err(ActionError::NotAnObject);
        };
        if self.options.omit_null_fields {
            map.retain(|_, v| !v.is_null());
        }
        Ok(map)
    }
}
