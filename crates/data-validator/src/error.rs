//! Validation Error Types

use serde::Serialize;
use thiserror::Error;

/// A single field that was present but unusable
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidField {
    /// Field name as it appears in the payload
    pub field: &'static str,
    /// Human readable reason
    pub reason: String,
}

/// Errors during request validation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Body is not JSON or not a JSON object
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// One or more fields are missing or invalid.
    ///
    /// Every offending field is listed, not only the first one found.
    #[error(
        "Invalid feature payload: {} missing, {} invalid",
        .missing_fields.len(),
        .invalid_fields.len()
    )]
    InvalidFields {
        missing_fields: Vec<&'static str>,
        invalid_fields: Vec<InvalidField>,
    },
}

impl ValidationError {
    /// Names of all fields that were missing from the payload
    pub fn missing_fields(&self) -> &[&'static str] {
        match self {
            ValidationError::InvalidFields { missing_fields, .. } => missing_fields,
            ValidationError::MalformedPayload(_) => &[],
        }
    }

    /// All fields that were present but not a finite number
    pub fn invalid_fields(&self) -> &[InvalidField] {
        match self {
            ValidationError::InvalidFields { invalid_fields, .. } => invalid_fields,
            ValidationError::MalformedPayload(_) => &[],
        }
    }

    /// Every offending field name, missing first
    pub fn offending_fields(&self) -> Vec<&'static str> {
        self.missing_fields()
            .iter()
            .copied()
            .chain(self.invalid_fields().iter().map(|f| f.field))
            .collect()
    }
}
