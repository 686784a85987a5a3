//! Request parsing and parameter validation.
//!
//! [`parse_request`] performs the envelope-level checks in a fixed order:
//!
//! 1. The text must be a JSON object → otherwise `INVALID_JSON`.
//! 2. `command` must be a non-empty string → otherwise `MISSING_COMMAND`.
//! 3. `command` must name a known [`CommandKind`] → otherwise `UNKNOWN_COMMAND`.
//!
//! Parameter checks happen later, inside each handler, through the
//! [`Parameters`] accessors.  A `parameters` value that is absent or not an
//! object is treated as an empty set, so a handler with required keys reports
//! `MISSING_PARAMETERS` rather than a parse error.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::protocol::messages::{CommandKind, ErrorCode, Response, ResponseStatus};

/// A request that failed validation, ready to become an error response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{details}")]
pub struct RequestError {
    pub status: ResponseStatus,
    pub code: ErrorCode,
    pub details: String,
}

impl RequestError {
    /// An `ERROR` status failure.
    pub fn new(code: ErrorCode, details: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            code,
            details: details.into(),
        }
    }

    /// A present parameter with the wrong type or an out-of-range value.
    pub fn invalid(details: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Invalid,
            code: ErrorCode::InvalidParameter,
            details: details.into(),
        }
    }
}

impl From<RequestError> for Response {
    fn from(err: RequestError) -> Self {
        Response::failure(err.status, err.code, err.details)
    }
}

/// A validated request envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub kind: CommandKind,
    pub parameters: Parameters,
}

/// The `parameters` object of a request.
///
/// A key whose value is `null` counts as absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters(Map<String, Value>);

impl Parameters {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// `true` if `key` is present and not `null`.
    pub fn contains(&self, key: &str) -> bool {
        self.value(key).is_some()
    }

    /// Fails with `MISSING_PARAMETERS` naming every absent key.
    pub fn require(&self, keys: &[&str]) -> Result<(), RequestError> {
        let missing: Vec<&str> = keys.iter().copied().filter(|k| !self.contains(k)).collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(RequestError::new(
                ErrorCode::MissingParameters,
                format!("Missing required parameters: {}", missing.join(", ")),
            ))
        }
    }

    /// A required string parameter.
    pub fn required_str(&self, key: &str) -> Result<&str, RequestError> {
        self.require(&[key])?;
        self.optional_str(key)?
            .ok_or_else(|| RequestError::invalid(format!("parameter {key:?} must be a string")))
    }

    /// An optional string parameter; present but not a string is `INVALID`.
    pub fn optional_str(&self, key: &str) -> Result<Option<&str>, RequestError> {
        match self.value(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(RequestError::invalid(format!(
                "parameter {key:?} must be a string"
            ))),
        }
    }

    /// An optional non-negative integer parameter.
    pub fn optional_u64(&self, key: &str) -> Result<Option<u64>, RequestError> {
        match self.value(key) {
            None => Ok(None),
            Some(v) => v.as_u64().map(Some).ok_or_else(|| {
                RequestError::invalid(format!("parameter {key:?} must be a non-negative integer"))
            }),
        }
    }

    /// A required parameter deserialised into `T`.
    pub fn required<T: DeserializeOwned>(&self, key: &str) -> Result<T, RequestError> {
        self.require(&[key])?;
        let value = self.value(key).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value)
            .map_err(|e| RequestError::invalid(format!("parameter {key:?} is malformed: {e}")))
    }

    /// Returns all parameters as one JSON object deserialised into `T`.
    pub fn as_object<T: DeserializeOwned>(&self) -> Result<T, RequestError> {
        serde_json::from_value(Value::Object(self.0.clone()))
            .map_err(|e| RequestError::invalid(format!("parameters are malformed: {e}")))
    }

    fn value(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }
}

/// Parses and envelope-validates one request.
///
/// # Errors
///
/// `INVALID_JSON`, `MISSING_COMMAND`, or `UNKNOWN_COMMAND`; see the module
/// docs for the order.
pub fn parse_request(text: &str) -> Result<Request, RequestError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| RequestError::new(ErrorCode::InvalidJson, e.to_string()))?;
    let Value::Object(mut envelope) = value else {
        return Err(RequestError::new(
            ErrorCode::InvalidJson,
            "request must be a JSON object",
        ));
    };

    let command = match envelope.get("command") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => {
            return Err(RequestError::new(
                ErrorCode::MissingCommand,
                "No command specified",
            ))
        }
    };

    let kind: CommandKind = command.parse().map_err(|_| {
        RequestError::new(
            ErrorCode::UnknownCommand,
            format!("Command not recognized: {command}"),
        )
    })?;

    let parameters = match envelope.remove("parameters") {
        Some(Value::Object(map)) => Parameters::new(map),
        _ => Parameters::default(),
    };

    Ok(Request { kind, parameters })
}
