//! Transfers from one pool to another
//!
//! The flux leaves `source` and enters `sink` with the same magnitude, so the total of the two
//! pools is conserved.

use super::combine;
use rseco_core::component::{
    Component, ComponentDescriptor, FieldDefinition, FluxDefinition, InitStage,
};
use rseco_core::errors::RSECOResult;
use rseco_core::router::FluxArguments;
use rseco_core::state::StateValue;
use serde::{Deserialize, Serialize};

fn exchange_descriptor() -> ComponentDescriptor {
    ComponentDescriptor::new(InitStage::Process)
        .with_field(FieldDefinition::foreign_variable("source").with_negative_flux("exchange"))
        .with_field(FieldDefinition::foreign_variable("sink").with_flux("exchange"))
        .with_field(FieldDefinition::parameter("rate"))
        .with_flux(FluxDefinition::new("exchange"))
}

/// First order transfer, e.g. remineralisation of detritus into nutrient
///
/// $$ \frac{dS}{dt} = -r S, \quad \frac{dK}{dt} = r S $$
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearExchange {}

#[typetag::serde]
impl Component for LinearExchange {
    fn descriptor(&self) -> ComponentDescriptor {
        exchange_descriptor()
    }

    fn calculate_flux(&self, flux: &str, args: &FluxArguments) -> RSECOResult<StateValue> {
        combine(flux, args.value("source")?, args.value("rate")?, |s, r| s * r)
    }
}

/// Second order transfer, e.g. quadratic mortality of zooplankton into detritus
///
/// $$ \frac{dS}{dt} = -r S^2, \quad \frac{dK}{dt} = r S^2 $$
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuadraticExchange {}

#[typetag::serde]
impl Component for QuadraticExchange {
    fn descriptor(&self) -> ComponentDescriptor {
        exchange_descriptor()
    }

    fn calculate_flux(&self, flux: &str, args: &FluxArguments) -> RSECOResult<StateValue> {
        combine(flux, args.value("source")?, args.value("rate")?, |s, r| {
            s * s * r
        })
    }
}
