//! The JSON record schema carried inside a [`crate::frame`] payload.

use serde::{Deserialize, Serialize};

/// A decoded, validated log record.
///
/// Unknown additional JSON fields are accepted and discarded during
/// decoding; they are never round-tripped back out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub version: i64,
    pub app_id: String,
    pub module: String,
    pub stamp: i64,
    pub nsecs: i64,
    pub hostname: String,
    pub body: String,
    #[serde(default)]
    pub signature: Option<String>,
}

/// Errors while decoding and validating a record payload.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// The payload was not valid JSON, or was valid JSON that was not an object.
    #[error("message payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    /// A required field was missing or had the wrong type.
    #[error("message is missing required field {0:?}")]
    MissingField(&'static str),
    /// `app_id` was present but empty.
    #[error("app_id must not be empty")]
    EmptyAppId,
}

/// Decodes and validates one [`Record`] from a JSON payload.
///
/// This performs the first two steps of the processor pipeline described in
/// the specification as distinct stages: "decode JSON" (step 1, producing
/// [`RecordError::InvalidJson`] on failure) and "validate presence of every
/// required field" (step 2, producing [`RecordError::MissingField`]), so the
/// caller can log a more specific warning for each failure mode.
pub fn parse_record(bytes: &[u8]) -> Result<Record, RecordError> {
    let value: serde_json::Value = serde_json::from_slice(bytes)?;

    let get_i64 = |field: &'static str| -> Result<i64, RecordError> {
        value
            .get(field)
            .and_then(serde_json::Value::as_i64)
            .ok_or(RecordError::MissingField(field))
    };
    let get_str = |field: &'static str| -> Result<String, RecordError> {
        value
            .get(field)
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned)
            .ok_or(RecordError::MissingField(field))
    };

    let app_id = get_str("app_id")?;
    if app_id.is_empty() {
        return Err(RecordError::EmptyAppId);
    }

    let record = Record {
        version: get_i64("version")?,
        app_id,
        module: get_str("module")?,
        stamp: get_i64("stamp")?,
        nsecs: get_i64("nsecs")?,
        hostname: get_str("hostname")?,
        body: get_str("body")?,
        signature: value
            .get("signature")
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned),
    };

    Ok(record)
}
