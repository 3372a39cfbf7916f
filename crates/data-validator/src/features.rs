//! Water Sample Feature Vector

use crate::error::{InvalidField, ValidationError};
use serde::{Serialize, Serializer};
use serde::ser::SerializeMap;

/// Number of features the model consumes
pub const FEATURE_COUNT: usize = 9;

/// Named water quality measurement, in model index order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Ph,
    Hardness,
    Solids,
    Chloramines,
    Sulfate,
    Conductivity,
    OrganicCarbon,
    Trihalomethanes,
    Turbidity,
}

impl Feature {
    /// All features ordered by their index in the vector
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::Ph,
        Feature::Hardness,
        Feature::Solids,
        Feature::Chloramines,
        Feature::Sulfate,
        Feature::Conductivity,
        Feature::OrganicCarbon,
        Feature::Trihalomethanes,
        Feature::Turbidity,
    ];

    /// Payload field name
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Ph => "ph",
            Feature::Hardness => "Hardness",
            Feature::Solids => "Solids",
            Feature::Chloramines => "Chloramines",
            Feature::Sulfate => "Sulfate",
            Feature::Conductivity => "Conductivity",
            Feature::OrganicCarbon => "Organic_carbon",
            Feature::Trihalomethanes => "Trihalomethanes",
            Feature::Turbidity => "Turbidity",
        }
    }

    /// Position of this feature in the vector
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Feature at a vector position
    pub fn from_index(index: usize) -> Option<Feature> {
        Self::ALL.get(index).copied()
    }
}

/// One validated water sample.
///
/// Every value is finite. The only ways to build one are
/// [`FeatureVector::new`] and [`crate::RequestValidator::validate`], both of
/// which enforce that.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    /// Build a vector from raw values in index order
    pub fn new(values: [f64; FEATURE_COUNT]) -> Result<Self, ValidationError> {
        let invalid_fields: Vec<InvalidField> = Feature::ALL
            .iter()
            .zip(values.iter())
            .filter(|(_, v)| !v.is_finite())
            .map(|(feature, v)| InvalidField {
                field: feature.as_str(),
                reason: format!("value {} is not finite", v),
            })
            .collect();

        if !invalid_fields.is_empty() {
            return Err(ValidationError::InvalidFields {
                missing_fields: Vec::new(),
                invalid_fields,
            });
        }

        Ok(Self { values })
    }

    /// Value at a vector index, `None` when out of range
    #[inline]
    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    /// Value of a named feature
    #[inline]
    pub fn value(&self, feature: Feature) -> f64 {
        self.values[feature.index()]
    }

    /// Raw values in index order
    pub fn as_array(&self) -> &[f64; FEATURE_COUNT] {
        &self.values
    }

    pub fn ph(&self) -> f64 {
        self.value(Feature::Ph)
    }

    pub fn hardness(&self) -> f64 {
        self.value(Feature::Hardness)
    }

    pub fn solids(&self) -> f64 {
        self.value(Feature::Solids)
    }

    pub fn chloramines(&self) -> f64 {
        self.value(Feature::Chloramines)
    }

    pub fn sulfate(&self) -> f64 {
        self.value(Feature::Sulfate)
    }

    pub fn conductivity(&self) -> f64 {
        self.value(Feature::Conductivity)
    }

    pub fn organic_carbon(&self) -> f64 {
        self.value(Feature::OrganicCarbon)
    }

    pub fn trihalomethanes(&self) -> f64 {
        self.value(Feature::Trihalomethanes)
    }

    pub fn turbidity(&self) -> f64 {
        self.value(Feature::Turbidity)
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FEATURE_COUNT))?;
        for feature in Feature::ALL {
            map.serialize_entry(feature.as_str(), &self.value(feature))?;
        }
        map.end()
    }
}
