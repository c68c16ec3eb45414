//! Named result attributes reported by the execution collaborator

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
}

impl AttributeValue {
    /// Numeric view used by response functions
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            AttributeValue::Integer(i) => Some(*i as f64),
            AttributeValue::Double(d) => Some(*d),
            AttributeValue::String(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: AttributeValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: AttributeValue) -> Self {
        Self {
            name: name.into(),
            value,
            units: None,
        }
    }

    pub fn double(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, AttributeValue::Double(value))
    }

    #[must_use]
    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }
}

/// First attribute named `name`
pub fn find_attribute<'a>(attributes: &'a [Attribute], name: &str) -> Option<&'a Attribute> {
    attributes.iter().find(|a| a.name == name)
}
