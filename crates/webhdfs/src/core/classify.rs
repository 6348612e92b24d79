//! Response classification.
//!
//! The namenode and datanodes only ever answer with a small set of status codes.
//! Everything outside that set is a protocol mismatch and is never retried.

use serde_json::Value;

use crate::data::ErrorSchema;
use crate::error::RemoteError;

/// Message used when an error body carries no usable envelope.
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error";

/// Message for a 404 without an envelope: almost always a wrong base path or WebHDFS being disabled.
pub const ENDPOINT_NOT_FOUND_MESSAGE: &str =
    "Invalid path or WebHDFS endpoint not found (is WebHDFS enabled at this path?)";

/// Status-level category of a response, decided before the body is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseClass {
    Success,
    Redirect(String),
    /// One of the listed error codes; the body still has to be decoded.
    Failure,
    Unexpected,
}

/// Full classification of a response including its decoded error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Success,
    Redirect(String),
    RemoteFailure(RemoteError),
    Unexpected,
}

pub fn is_success(status: u16) -> bool { matches!(status, 200 | 201) }

pub fn is_redirect(status: u16) -> bool { matches!(status, 301 | 307) }

pub fn is_error(status: u16) -> bool { matches!(status, 400 | 401 | 402 | 403 | 404 | 500) }

/// Categorize a response from its status line and `Location` header.
///
/// A 301/307 without `Location` is [`ResponseClass::Unexpected`].
pub fn classify_status(status: u16, location: Option<&str>) -> ResponseClass {
    if is_success(status) {
        ResponseClass::Success
    } else if is_redirect(status) {
        match location {
            Some(location) if !location.is_empty() => ResponseClass::Redirect(location.to_string()),
            _ => ResponseClass::Unexpected,
        }
    } else if is_error(status) {
        ResponseClass::Failure
    } else {
        ResponseClass::Unexpected
    }
}

/// Classify a response, decoding the error body for failures.
pub fn classify(
    status: u16,
    location: Option<&str>,
    body: Option<&[u8]>,
    schema: &ErrorSchema,
) -> Classification {
    match classify_status(status, location) {
        ResponseClass::Success => Classification::Success,
        ResponseClass::Redirect(location) => Classification::Redirect(location),
        ResponseClass::Failure => {
            Classification::RemoteFailure(remote_error_for_status(status, body.unwrap_or_default(), schema))
        }
        ResponseClass::Unexpected => Classification::Unexpected,
    }
}

/// Decode the error envelope of a failed response, synthesizing one from the status if needed.
pub fn remote_error_for_status(status: u16, body: &[u8], schema: &ErrorSchema) -> RemoteError {
    parse_remote_error(body, schema, true).unwrap_or_else(|| {
        if status == 404 {
            RemoteError::new(ENDPOINT_NOT_FOUND_MESSAGE)
        } else {
            RemoteError::new(format!("{UNKNOWN_ERROR_MESSAGE} (HTTP {status})"))
        }
    })
}

/// Extract a [`RemoteError`] from a JSON body.
///
/// In strict mode a body without the envelope is not an error at all and `None`
/// is returned. Otherwise a generic error is synthesized.
pub fn parse_remote_error(body: &[u8], schema: &ErrorSchema, strict: bool) -> Option<RemoteError> {
    let envelope = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|mut value| value.get_mut(&schema.envelope).map(Value::take))
        .filter(Value::is_object);

    let Some(envelope) = envelope else {
        return (!strict).then(|| RemoteError::new(UNKNOWN_ERROR_MESSAGE));
    };

    let field = |name: &str| envelope.get(name).and_then(Value::as_str).map(str::to_string);

    Some(RemoteError {
        message:         field(&schema.message).unwrap_or_else(|| UNKNOWN_ERROR_MESSAGE.to_string()),
        exception:       field(&schema.exception),
        java_class_name: field(&schema.java_class_name),
    })
}
