use super::combine;
use rseco_core::component::{
    Component, ComponentDescriptor, FieldDefinition, FluxDefinition, InitStage,
};
use rseco_core::errors::RSECOResult;
use rseco_core::router::FluxArguments;
use rseco_core::state::StateValue;
use serde::{Deserialize, Serialize};

/// Supply of a pool proportional to a forcing
///
/// $$ \frac{dX}{dt} = r F(t) $$
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearForcingInput {}

#[typetag::serde]
impl Component for LinearForcingInput {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(InitStage::Process)
            .with_field(FieldDefinition::foreign_variable("var").with_flux("input"))
            .with_field(FieldDefinition::foreign_forcing("forcing"))
            .with_field(FieldDefinition::parameter("rate"))
            .with_flux(FluxDefinition::new("input"))
    }

    fn calculate_flux(&self, flux: &str, args: &FluxArguments) -> RSECOResult<StateValue> {
        combine(flux, args.value("forcing")?, args.value("rate")?, |f, r| f * r)
    }
}
