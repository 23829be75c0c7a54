//! Per-instance input values supplied when a model is set up.
//!
//! Inputs are keyed by component instance label and field name.
//! Numbers and arrays provide initial values for owned state variables, parameter values and
//! constant forcings.
//! Labels and label lists resolve foreign references to quantities owned by other components.

use crate::errors::{RSECOError, RSECOResult};
use crate::state::StateValue;
use crate::timeseries::FloatValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single input value
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Number(FloatValue),
    Array(Vec<FloatValue>),
    Label(String),
    Labels(Vec<String>),
}

impl From<FloatValue> for InputValue {
    fn from(value: FloatValue) -> Self {
        InputValue::Number(value)
    }
}

impl From<Vec<FloatValue>> for InputValue {
    fn from(value: Vec<FloatValue>) -> Self {
        InputValue::Array(value)
    }
}

impl From<&str> for InputValue {
    fn from(value: &str) -> Self {
        InputValue::Label(value.to_string())
    }
}

impl From<Vec<&str>> for InputValue {
    fn from(value: Vec<&str>) -> Self {
        InputValue::Labels(value.into_iter().map(|s| s.to_string()).collect())
    }
}

/// Input values for every component instance in a model
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelInputs {
    values: BTreeMap<String, BTreeMap<String, InputValue>>,
}

impl ModelInputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value of `field` on the component instance `component`
    pub fn set(
        &mut self,
        component: &str,
        field: &str,
        value: impl Into<InputValue>,
    ) -> &mut Self {
        self.values
            .entry(component.to_string())
            .or_default()
            .insert(field.to_string(), value.into());
        self
    }

    pub fn get(&self, component: &str, field: &str) -> Option<&InputValue> {
        self.values.get(component).and_then(|fields| fields.get(field))
    }

    pub fn components(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn extend(&mut self, other: ModelInputs) {
        for (component, fields) in other.values {
            self.values.entry(component).or_default().extend(fields);
        }
    }

    pub fn for_component<'a>(&'a self, component: &'a str) -> ComponentInputs<'a> {
        ComponentInputs {
            component,
            values: self.values.get(component),
        }
    }
}

/// A view of the inputs of one component instance
#[derive(Clone, Copy, Debug)]
pub struct ComponentInputs<'a> {
    component: &'a str,
    values: Option<&'a BTreeMap<String, InputValue>>,
}

impl<'a> ComponentInputs<'a> {
    pub fn component(&self) -> &'a str {
        self.component
    }

    pub fn get(&self, field: &str) -> Option<&'a InputValue> {
        self.values.and_then(|values| values.get(field))
    }

    fn require(&self, field: &str) -> RSECOResult<&'a InputValue> {
        self.get(field).ok_or_else(|| RSECOError::MissingInput {
            component: self.component.to_string(),
            field: field.to_string(),
        })
    }

    fn invalid(&self, field: &str, reason: &str) -> RSECOError {
        RSECOError::InvalidInput {
            component: self.component.to_string(),
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }

    /// A numeric scalar input
    pub fn number(&self, field: &str) -> RSECOResult<FloatValue> {
        match self.require(field)? {
            InputValue::Number(v) => Ok(*v),
            _ => Err(self.invalid(field, "expected a number")),
        }
    }

    /// A numeric input which may be scalar or array valued
    pub fn value(&self, field: &str) -> RSECOResult<StateValue> {
        match self.require(field)? {
            InputValue::Number(v) => Ok(StateValue::Scalar(*v)),
            InputValue::Array(values) if !values.is_empty() => {
                Ok(StateValue::from(values.clone()))
            }
            InputValue::Array(_) => Err(self.invalid(field, "array inputs cannot be empty")),
            _ => Err(self.invalid(field, "expected a number or an array of numbers")),
        }
    }

    /// A single label referencing a quantity owned by another component
    pub fn label(&self, field: &str) -> RSECOResult<&'a str> {
        match self.require(field)? {
            InputValue::Label(label) => Ok(label.as_str()),
            InputValue::Labels(labels) if labels.len() == 1 => Ok(labels[0].as_str()),
            _ => Err(self.invalid(field, "expected a label")),
        }
    }

    /// A list of labels, used by list input fields
    ///
    /// A single label is accepted as a list of one.
    pub fn labels(&self, field: &str) -> RSECOResult<Vec<&'a str>> {
        match self.require(field)? {
            InputValue::Label(label) => Ok(vec![label.as_str()]),
            InputValue::Labels(labels) if !labels.is_empty() => {
                Ok(labels.iter().map(|l| l.as_str()).collect())
            }
            InputValue::Labels(_) => Err(self.invalid(field, "label lists cannot be empty")),
            _ => Err(self.invalid(field, "expected a list of labels")),
        }
    }
}
