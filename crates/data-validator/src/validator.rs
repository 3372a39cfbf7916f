//! Request Validator for Feature Payloads

use crate::error::{InvalidField, ValidationError};
use crate::features::{Feature, FeatureVector, FEATURE_COUNT};
use serde_json::value::RawValue;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

/// Validates inbound payloads against the feature vector contract
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestValidator;

impl RequestValidator {
    /// Create a new validator
    pub fn new() -> Self {
        Self
    }

    /// Validate a raw request body.
    ///
    /// Field values are decoded one at a time, so a number outside the f64
    /// range is reported against its field instead of failing the body.
    pub fn validate_bytes(&self, body: &[u8]) -> Result<FeatureVector, ValidationError> {
        let fields: HashMap<String, &RawValue> = serde_json::from_slice(body)
            .map_err(|e| ValidationError::MalformedPayload(e.to_string()))?;
        self.collect(|name| fields.get(name).map(|raw| parse_raw(raw)))
    }

    /// Validate a decoded JSON payload.
    ///
    /// Unknown keys are ignored. Every missing or invalid field is reported.
    pub fn validate(&self, payload: &Value) -> Result<FeatureVector, ValidationError> {
        let object = payload.as_object().ok_or_else(|| {
            ValidationError::MalformedPayload(format!(
                "expected a JSON object, got {}",
                json_type(payload)
            ))
        })?;

        self.validate_object(object)
    }

    fn validate_object(
        &self,
        object: &Map<String, Value>,
    ) -> Result<FeatureVector, ValidationError> {
        self.collect(|name| object.get(name).map(parse_finite))
    }

    /// Look up every feature, gathering all missing and invalid fields
    fn collect<F>(&self, mut lookup: F) -> Result<FeatureVector, ValidationError>
    where
        F: FnMut(&str) -> Option<Result<f64, String>>,
    {
        let mut values = [0.0; FEATURE_COUNT];
        let mut missing_fields = Vec::new();
        let mut invalid_fields = Vec::new();

        for feature in Feature::ALL {
            let name = feature.as_str();
            match lookup(name) {
                None => missing_fields.push(name),
                Some(Ok(v)) => values[feature.index()] = v,
                Some(Err(reason)) => invalid_fields.push(InvalidField { field: name, reason }),
            }
        }

        if !missing_fields.is_empty() || !invalid_fields.is_empty() {
            debug!(
                missing = ?missing_fields,
                invalid = invalid_fields.len(),
                "Rejected feature payload"
            );
            return Err(ValidationError::InvalidFields {
                missing_fields,
                invalid_fields,
            });
        }

        FeatureVector::new(values)
    }
}

/// Accept JSON numbers and numeric strings, rejecting anything non-finite
fn parse_finite(raw: &Value) -> Result<f64, String> {
    let value = match raw {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("number {} is not representable as f64", n))?,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("'{}' is not a number", s))?,
        other => return Err(format!("expected a number, got {}", json_type(other))),
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err(format!("value {} is not finite", value))
    }
}

/// Decode one raw field value, then apply [`parse_finite`]
fn parse_raw(raw: &RawValue) -> Result<f64, String> {
    let value: Value = serde_json::from_str(raw.get())
        .map_err(|e| format!("{} is not a usable number: {}", raw.get(), e))?;
    parse_finite(&value)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
