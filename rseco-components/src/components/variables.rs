//! Owners of state variables
//!
//! Each instance owns one state variable labelled with the instance label and initialised
//! from its `value` input.

use rseco_core::component::{Component, ComponentDescriptor, FieldDefinition, InitStage};
use serde::{Deserialize, Serialize};

/// A state variable
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateVariable {}

#[typetag::serde]
impl Component for StateVariable {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(InitStage::Label).with_field(
            FieldDefinition::owned_variable("value").describe("initial value of the variable"),
        )
    }
}

/// An array valued state variable along the shared `var` axis
///
/// Every array state variable in a model has the same length, for example one element per
/// size class.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArrayStateVariable {}

#[typetag::serde]
impl Component for ArrayStateVariable {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(InitStage::Label).with_field(
            FieldDefinition::owned_variable("value")
                .with_dims("var")
                .describe("initial values, one per element"),
        )
    }
}
