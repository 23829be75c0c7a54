//! Nutrient limited growth
//!
//! A consumer (typically phytoplankton) takes up a resource (typically nutrient) at a rate
//! limited by Michaelis-Menten kinetics.
//! An array valued consumer grows element by element through the `uptake` flux.
//! The resource is a scalar and loses the sum of the uptake of every element through the
//! `uptake_total` flux.

use super::combine;
use rseco_core::component::{
    Component, ComponentDescriptor, FieldDefinition, FluxDefinition, InitStage,
};
use rseco_core::errors::{RSECOError, RSECOResult};
use rseco_core::router::FluxArguments;
use rseco_core::state::StateValue;
use rseco_core::timeseries::FloatValue;
use serde::{Deserialize, Serialize};

/// Nutrient limitation of growth, between 0 and 1
pub fn monod_limitation(resource: FloatValue, halfsat: FloatValue) -> FloatValue {
    if resource <= 0.0 {
        return 0.0;
    }
    resource / (resource + halfsat)
}

/// Monod growth of a consumer on a resource
///
/// $$ U = \mu_{max} \frac{R}{R + k} C $$
///
/// `halfsat` and `mu_max` may be scalars or hold one value per consumer element.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonodGrowth {}

#[typetag::serde]
impl Component for MonodGrowth {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(InitStage::Process)
            .with_field(
                FieldDefinition::foreign_variable("resource").with_negative_flux("uptake_total"),
            )
            .with_field(
                FieldDefinition::foreign_variable("consumer")
                    .with_dims("var")
                    .with_flux("uptake"),
            )
            .with_field(
                FieldDefinition::parameter("halfsat").describe("half saturation constant"),
            )
            .with_field(FieldDefinition::parameter("mu_max").describe("maximum growth rate"))
            .with_flux(FluxDefinition::new("uptake").with_dims("var"))
            .with_flux(FluxDefinition::new("uptake_total"))
    }

    fn calculate_flux(&self, flux: &str, args: &FluxArguments) -> RSECOResult<StateValue> {
        let resource = args.value("resource")?;
        let limitation = combine(flux, resource, args.value("halfsat")?, monod_limitation)?;
        let rate = combine(flux, &limitation, args.value("mu_max")?, |l, mu| l * mu)?;
        let uptake = combine(flux, &rate, args.value("consumer")?, |r, c| r * c)?;
        match flux {
            "uptake" => Ok(uptake),
            "uptake_total" => {
                if resource.as_scalar().is_none() {
                    return Err(RSECOError::FluxShapeMismatch {
                        flux: flux.to_string(),
                        target: "resource".to_string(),
                        expected: 1,
                        found: resource.width(),
                    });
                }
                Ok(StateValue::Scalar(uptake.sum()))
            }
            _ => Err(RSECOError::Error(format!(
                "MonodGrowth does not compute a flux named '{flux}'"
            ))),
        }
    }
}
