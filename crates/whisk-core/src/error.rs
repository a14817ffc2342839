use thiserror::Error;

/// Error type user handlers report domain failures with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Every failure an invocation can end in.
///
/// Each variant belongs to exactly one [`ErrorKind`]; the `Display` text is
/// what ends up in the `{"error": ...}` result record.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("failed to decode JSON string {raw} to type: {type_name}: {cause}")]
    Decode {
        /// Offending input text with embedded quotes escaped.
        raw: String,
        type_name: String,
        cause: String,
    },

    #[error("failed to encode {type_name} to JSON string: {cause}")]
    Encode { type_name: String, cause: String },

    #[error("Error serializing JSON, data does not appear to be a valid JSON object")]
    NotAnObject,

    #[error("Action handler returned an error: {0}")]
    Handler(String),

    #[error("Action handler callback did not return response or error.")]
    CallbackContract,

    #[error("{0}")]
    Network(String),

    #[error("control plane returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("response from server is not a dictionary")]
    ResponseNotObject,

    #[error("Error creating json from response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Config(String),

    #[error("result channel error: {0}")]
    Channel(#[from] std::io::Error),
}

/// The error taxonomy every handler shape converges on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DecodeFailure,
    EncodeFailure,
    HandlerError,
    CallbackContractViolation,
    NetworkFailure,
    ResponseShapeError,
    ConfigError,
    ChannelFailure,
}

impl ActionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ActionError::Decode { .. } => ErrorKind::DecodeFailure,
            ActionError::Encode { .. } | ActionError::NotAnObject => ErrorKind::EncodeFailure,
            ActionError::Handler(_) => ErrorKind::HandlerError,
            ActionError::CallbackContract => ErrorKind::CallbackContractViolation,
            ActionError::Network(_) | ActionError::Status { .. } | ActionError::Timeout(_) => {
                ErrorKind::NetworkFailure
            }
            ActionError::ResponseNotObject | ActionError::InvalidResponse(_) => {
                ErrorKind::ResponseShapeError
            }
            ActionError::Config(_) => ErrorKind::ConfigError,
            ActionError::Channel(_) => ErrorKind::ChannelFailure,
        }
    }

    /// Wrap a handler-reported error.
    pub fn handler(err: impl std::fmt::Display) -> Self {
        ActionError::Handler(err.to_string())
    }

    /// Build a decode failure carrying the offending text verbatim.
    ///
    /// Quotes are escaped once, when the result record is rendered.
    pub fn decode(raw: &str, type_name: &str, cause: impl std::fmt::Display) -> Self {
        ActionError::Decode {
            raw: raw.to_string(),
            type_name: type_name.to_string(),
            cause: cause.to_string(),
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::DecodeFailure => write!(f, "decode_failure"),
            ErrorKind::EncodeFailure => write!(f, "encode_failure"),
            ErrorKind::HandlerError => write!(f, "handler_error"),
            ErrorKind::CallbackContractViolation => write!(f, "callback_contract_violation"),
            ErrorKind::NetworkFailure => write!(f, "network_failure"),
            ErrorKind::ResponseShapeError => write!(f, "response_shape_error"),
            ErrorKind::ConfigError => write!(f, "config_error"),
            ErrorKind::ChannelFailure => write!(f, "channel_failure"),
        }
    }
}
