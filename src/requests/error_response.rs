//! Decoding of backend JSON:API error bodies.
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error title the backend uses for field validation rejections.
pub const INVALID_INPUT_TITLE: &str = "Invalid input.";

/// Pointer fragment identifying the email field. Backend pointer prefixes vary, so matching
/// is by suffix.
pub const EMAIL_POINTER_PATH: &str = "attributes/email";
/// Pointer fragment identifying the phone number field.
pub const PHONE_NUMBER_POINTER_PATH: &str = "attributes/phone_number";

/// Decoded error response body: an ordered list of typed errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Errors in the order the backend reported them.
    #[serde(default)]
    pub errors: Vec<ApiError>,
}

/// One error reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Backend-assigned error id.
    #[serde(default)]
    pub id: Option<String>,
    /// HTTP status the error maps to.
    #[serde(default)]
    pub status: Option<u16>,
    /// Short error title, e.g. `Invalid input.`.
    #[serde(default)]
    pub title: Option<String>,
    /// Human-readable detail.
    #[serde(default)]
    pub detail: Option<String>,
    /// Which part of the submitted document the error refers to.
    #[serde(default)]
    pub source: Option<ErrorSource>,
}

/// Source of an [`ApiError`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorSource {
    /// JSON-pointer-like path into the submitted document.
    #[serde(default)]
    pub pointer: Option<String>,
}

impl ApiError {
    /// Whether this error is a field validation rejection.
    pub fn is_invalid_input(&self) -> bool {
        self.title.as_deref() == Some(INVALID_INPUT_TITLE)
    }

    /// The source pointer, if the backend supplied one.
    pub fn pointer(&self) -> Option<&str> {
        self.source.as_ref().and_then(|source| source.pointer.as_deref())
    }

    /// Whether the source pointer refers to the email field.
    pub fn points_at_email(&self) -> bool {
        self.pointer()
            .is_some_and(|pointer| pointer.ends_with(EMAIL_POINTER_PATH))
    }

    /// Whether the source pointer refers to the phone number field.
    pub fn points_at_phone_number(&self) -> bool {
        self.pointer()
            .is_some_and(|pointer| pointer.ends_with(PHONE_NUMBER_POINTER_PATH))
    }
}

/// Decode a raw error response body.
///
/// Failure handling is deliberately asymmetric. A body that isn't JSON at all degrades to
/// an empty error list: the caller still has the status code to act on. A body that *is*
/// JSON but carries an undecodable entry in `errors` aborts the whole decode — a systemic
/// format break is worse than a missing array, and acting on half a list would be
/// misleading.
pub fn decode_error_response(body: &str) -> ErrorResponse {
    let json: Value = match serde_json::from_str(body) {
        Ok(json) => json,
        Err(err) => {
            log::warn!(target: "beacon", "malformed error response body from backend: {err}");
            return ErrorResponse::default();
        }
    };

    let Some(entries) = json.get("errors").and_then(Value::as_array) else {
        return ErrorResponse::default();
    };

    let mut errors = Vec::with_capacity(entries.len());
    for entry in entries {
        match serde_json::from_value::<ApiError>(entry.clone()) {
            Ok(error) => errors.push(error),
            Err(err) => {
                log::error!(target: "beacon", "undecodable error entry from backend: {err}");
                return ErrorResponse::default();
            }
        }
    }

    ErrorResponse { errors }
}
