//! Submission validation for the ingestion gate.
//!
//! Validation is pure and runs before any I/O: a submission that fails here
//! never reaches the report store. Field decoding is deliberately tolerant
//! about representation (numeric strings from form-encoded clients are
//! accepted) and strict about range.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::{Attribution, BeachCondition, CrowdLevel, WaterCondition};

/// Maximum length of a location identifier.
pub const MAX_LOCATION_ID_LEN: usize = 96;
/// Maximum length of a reporter hash.
pub const MAX_REPORTER_HASH_LEN: usize = 128;

/// Attribution keys that survive validation. Everything else is dropped
/// silently, never stored.
pub const ALLOWED_ATTRIBUTION_KEYS: &[&str] = &["source", "campaign", "medium", "referrer"];

/// Raw submission payload as decoded from the request body.
///
/// Fields are loose (`Value`) where the validation contract wants a precise
/// rejection code rather than a generic body error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSubmission {
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default)]
    pub crowd_level: Option<Value>,
    #[serde(default)]
    pub water_condition: Option<Value>,
    #[serde(default)]
    pub beach_condition: Option<Value>,
    #[serde(default)]
    pub reporter_hash: Option<String>,
    #[serde(default)]
    pub attribution: Option<serde_json::Map<String, Value>>,
}

/// Validated submission, ready for stamping and persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidReport {
    pub location_id: String,
    pub crowd_level: CrowdLevel,
    pub water_condition: Option<WaterCondition>,
    pub beach_condition: Option<BeachCondition>,
    pub reporter_hash: String,
    pub attribution: Option<Attribution>,
}

/// Validation failures. Caller mistakes: never retried automatically and
/// never touch storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("request body could not be decoded: {0}")]
    InvalidBody(String),
    #[error("locationId must be 1-{MAX_LOCATION_ID_LEN} characters")]
    InvalidLocationId,
    #[error("crowdLevel must decode to one of 1-4")]
    InvalidCrowdLevel,
    #[error("reporterHash must be 1-{MAX_REPORTER_HASH_LEN} characters")]
    InvalidReporterHash,
    #[error("request body exceeds the configured size limit")]
    PayloadTooLarge,
}

impl ValidationError {
    /// Stable machine-readable error code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidBody(_) => "invalid_body",
            Self::InvalidLocationId => "invalid_location_id",
            Self::InvalidCrowdLevel => "invalid_crowd_level",
            Self::InvalidReporterHash => "invalid_reporter_hash",
            Self::PayloadTooLarge => "payload_too_large",
        }
    }
}

/// Validate a submission, producing a [`ValidReport`] or the first failure.
///
/// Checks run cheapest-first and short-circuit; attribution filtering only
/// happens once every required field has passed.
pub fn validate(submission: ReportSubmission) -> Result<ValidReport, ValidationError> {
    let location_id = submission
        .location_id
        .filter(|id| !id.is_empty() && id.len() <= MAX_LOCATION_ID_LEN)
        .ok_or(ValidationError::InvalidLocationId)?;

    let crowd_level = submission
        .crowd_level
        .as_ref()
        .and_then(decode_level_code)
        .and_then(CrowdLevel::from_code)
        .ok_or(ValidationError::InvalidCrowdLevel)?;

    let reporter_hash = submission
        .reporter_hash
        .filter(|hash| !hash.is_empty() && hash.len() <= MAX_REPORTER_HASH_LEN)
        .ok_or(ValidationError::InvalidReporterHash)?;

    let water_condition = decode_optional_axis(
        submission.water_condition.as_ref(),
        WaterCondition::from_code,
        "waterCondition",
    )?;
    let beach_condition = decode_optional_axis(
        submission.beach_condition.as_ref(),
        BeachCondition::from_code,
        "beachCondition",
    )?;

    let attribution = submission.attribution.and_then(filter_attribution);

    Ok(ValidReport {
        location_id,
        crowd_level,
        water_condition,
        beach_condition,
        reporter_hash,
        attribution,
    })
}

/// Decode a level code from a JSON value.
///
/// Accepts integers and integer-valued strings; anything else (floats with a
/// fraction, arbitrary text, booleans) yields `None`.
fn decode_level_code(value: &Value) -> Option<u8> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|v| u8::try_from(v).ok()),
        Value::String(s) => s.trim().parse::<u8>().ok(),
        _ => None,
    }
}

fn decode_optional_axis<T>(
    value: Option<&Value>,
    from_code: fn(u8) -> Option<T>,
    field: &'static str,
) -> Result<Option<T>, ValidationError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => decode_level_code(value)
            .and_then(from_code)
            .map(Some)
            .ok_or_else(|| ValidationError::InvalidBody(format!("{} out of range", field))),
    }
}

/// Reduce an attribution map to the allow-listed keys with scalar values.
///
/// Returns `None` when nothing survives, so empty maps are not persisted.
fn filter_attribution(map: serde_json::Map<String, Value>) -> Option<Attribution> {
    let filtered: Attribution = map
        .into_iter()
        .filter(|(key, value)| {
            ALLOWED_ATTRIBUTION_KEYS.contains(&key.as_str())
                && matches!(
                    value,
                    Value::String(_) | Value::Number(_) | Value::Bool(_)
                )
        })
        .collect();

    if filtered.is_empty() {
        None
    } else {
        Some(filtered)
    }
}
