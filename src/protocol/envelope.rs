use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An inbound request: which operation to run and its payload.
///
/// `data` is kept as raw JSON so each handler decodes it into its own type.
/// A missing `data` field reads as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub pattern: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl RequestEnvelope {
    pub fn new(pattern: impl Into<String>, data: Value) -> Self {
        Self {
            pattern: pattern.into(),
            data,
            id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// The reply published for every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub success: Status,
    pub message: String,
    pub data: Value,
}

impl ResponseEnvelope {
    /// A `success` reply carrying `data` as embedded JSON.
    ///
    /// Serialising a reply can only fail for maps with non-string keys,
    /// which no reply type has; that case degrades to an `error` envelope.
    pub fn ok<T: Serialize>(message: impl Into<String>, data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => Self {
                success: Status::Success,
                message: message.into(),
                data,
            },
            Err(e) => Self::error("Error encoding response", e),
        }
    }

    /// An `error` reply whose `data` is the error text as a JSON string.
    pub fn error(message: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        Self {
            success: Status::Error,
            message: message.into(),
            data: Value::String(detail.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success == Status::Success
    }
}
