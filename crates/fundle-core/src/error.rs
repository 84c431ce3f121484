//! Error types for model definition, record handling and REST calls.

use thiserror::Error;

/// A model schema that cannot be registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    /// No field is marked primary and no field is named `id`.
    #[error("model `{model}` must have a primary key or an `id` field")]
    MissingPrimaryKey { model: String },
    /// More than one field is marked primary.
    #[error("model `{model}` marks both `{first}` and `{second}` as primary key")]
    AmbiguousPrimaryKey {
        model: String,
        first: String,
        second: String,
    },
    /// The same field name was declared twice.
    #[error("model `{model}` declares field `{field}` more than once")]
    DuplicateField { model: String, field: String },
    /// A registry already holds a model with this name.
    #[error("model `{0}` is already defined")]
    DuplicateModel(String),
}

/// Failure reported by the REST boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server answered with a non-2xx status.
    #[error("API error: {status} - {body}")]
    Status { status: u16, body: String },
    /// The transport could not complete the request.
    #[error("transport failure: {0}")]
    Transport(String),
    /// The response body was not valid JSON.
    #[error("invalid JSON response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// HTTP status, when the server answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors from model and collection operations.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The field is not declared on the model.
    #[error("model `{model}` has no field `{field}`")]
    UnknownField { model: String, field: String },
    /// Record data must be a JSON object.
    #[error("model `{model}` expects an object record, got {found}")]
    NotARecord { model: String, found: &'static str },
    /// A model of one class was given where another class is required.
    #[error("expected a `{expected}` model, got `{found}`")]
    WrongModel { expected: String, found: String },
    /// A listing endpoint returned something other than an array.
    #[error("listing `{model}` expected a JSON array, got {found}")]
    NotAList { model: String, found: &'static str },
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Short name of a JSON value's type for error messages.
pub(crate) fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_status_message_carries_body() {
        let err = ApiError::Status {
            status: 404,
            body: "missing".into(),
        };
        assert_eq!(err.to_string(), "API error: 404 - missing");
        assert_eq!(err.status(), Some(404));
        assert_eq!(ApiError::Transport("offline".into()).status(), None);
    }

    #[test]
    fn model_error_wraps_api_error() {
        let err: ModelError = ApiError::Status {
            status: 500,
            body: "boom".into(),
        }
        .into();
        assert!(matches!(err, ModelError::Api(ApiError::Status { status: 500, .. })));
        assert_eq!(err.to_string(), "API error: 500 - boom");
    }
}
