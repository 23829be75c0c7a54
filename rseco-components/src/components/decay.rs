//! Losses from a single pool
//!
//! Decayed material leaves the model unless another component routes it elsewhere.

use super::combine;
use rseco_core::component::{
    Component, ComponentDescriptor, FieldDefinition, FluxDefinition, InitStage,
};
use rseco_core::errors::RSECOResult;
use rseco_core::router::FluxArguments;
use rseco_core::state::StateValue;
use serde::{Deserialize, Serialize};

/// First order loss
///
/// $$ \frac{dX}{dt} = -r X $$
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearDecay {}

#[typetag::serde]
impl Component for LinearDecay {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(InitStage::Process)
            .with_field(FieldDefinition::foreign_variable("var").with_negative_flux("decay"))
            .with_field(FieldDefinition::parameter("rate").describe("loss rate (1 / d)"))
            .with_flux(FluxDefinition::new("decay"))
    }

    fn calculate_flux(&self, flux: &str, args: &FluxArguments) -> RSECOResult<StateValue> {
        combine(flux, args.value("var")?, args.value("rate")?, |x, r| x * r)
    }
}

/// Second order loss, such as density dependent mortality
///
/// $$ \frac{dX}{dt} = -r X^2 $$
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuadraticDecay {}

#[typetag::serde]
impl Component for QuadraticDecay {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(InitStage::Process)
            .with_field(FieldDefinition::foreign_variable("var").with_negative_flux("decay"))
            .with_field(FieldDefinition::parameter("rate"))
            .with_flux(FluxDefinition::new("decay"))
    }

    fn calculate_flux(&self, flux: &str, args: &FluxArguments) -> RSECOResult<StateValue> {
        combine(flux, args.value("var")?, args.value("rate")?, |x, r| x * x * r)
    }
}
