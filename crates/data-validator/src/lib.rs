//! Water Sample Validation
//!
//! Defines the nine-feature sample contract and validates inbound payloads
//! before they reach the inference engine.

mod error;
mod features;
mod validator;

pub use error::{InvalidField, ValidationError};
pub use features::{Feature, FeatureVector, FEATURE_COUNT};
pub use validator::RequestValidator;
