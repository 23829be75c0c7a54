//! Physical exchange of a slab mixed layer with the water below
//!
//! The mixed layer depth $H(t)$ is a forcing.
//! Material is exchanged across its base by constant diffusive mixing $\kappa$ and by
//! entrainment when the layer deepens, so both fluxes use the rate
//!
//! $$ \frac{\kappa + \max(0, dH/dt)}{H} $$
//!
//! Shoaling leaves material behind without diluting what stays in the layer.

use rseco_core::component::{
    Component, ComponentDescriptor, FieldDefinition, FluxDefinition, InitStage,
};
use rseco_core::errors::{RSECOError, RSECOResult};
use rseco_core::router::FluxArguments;
use rseco_core::state::StateValue;
use rseco_core::timeseries::FloatValue;
use serde::{Deserialize, Serialize};

/// Specific rate of exchange across the base of the mixed layer (1 / d)
pub fn exchange_rate(
    kappa: FloatValue,
    mld: FloatValue,
    mld_derivative: FloatValue,
) -> FloatValue {
    (kappa + mld_derivative.max(0.0)) / mld
}

fn mixed_layer_rate(flux: &str, args: &FluxArguments) -> RSECOResult<FloatValue> {
    let mld = args.scalar("mld")?;
    if mld <= 0.0 {
        return Err(RSECOError::Error(format!(
            "{flux}: mixed layer depth must be positive, got {mld} at t={}",
            args.time()
        )));
    }
    let derivative = args.derivative("mld")?.sum();
    Ok(exchange_rate(args.scalar("kappa")?, mld, derivative))
}

/// Dilution of mixed layer concentrations by the water below
///
/// Every listed variable (phytoplankton, zooplankton, detritus, ...) loses
/// $X \frac{\kappa + \max(0, dH/dt)}{H}$ per unit time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlabMixing {}

#[typetag::serde]
impl Component for SlabMixing {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(InitStage::Process)
            .with_field(
                FieldDefinition::foreign_variable("vars")
                    .as_list_input()
                    .with_negative_flux("mixing"),
            )
            .with_field(FieldDefinition::foreign_forcing("mld").describe("mixed layer depth (m)"))
            .with_field(FieldDefinition::parameter("kappa").describe("mixing velocity (m / d)"))
            .with_flux(FluxDefinition::new("mixing"))
    }

    fn calculate_flux(&self, flux: &str, args: &FluxArguments) -> RSECOResult<StateValue> {
        let rate = mixed_layer_rate(flux, args)?;
        Ok(args.value("vars")?.map(|x| x * rate))
    }
}

/// Nutrient resupply from below the mixed layer
///
/// The nutrient relaxes towards the concentration below the layer, `n_below`:
/// $(N_0 - N) \frac{\kappa + \max(0, dH/dt)}{H}$.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlabUpwelling {}

#[typetag::serde]
impl Component for SlabUpwelling {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(InitStage::Process)
            .with_field(FieldDefinition::foreign_variable("n").with_flux("upwelling"))
            .with_field(
                FieldDefinition::foreign_forcing("n_below")
                    .describe("nutrient concentration below the mixed layer"),
            )
            .with_field(FieldDefinition::foreign_forcing("mld"))
            .with_field(FieldDefinition::parameter("kappa"))
            .with_flux(FluxDefinition::new("upwelling"))
    }

    fn calculate_flux(&self, flux: &str, args: &FluxArguments) -> RSECOResult<StateValue> {
        let rate = mixed_layer_rate(flux, args)?;
        super::combine(flux, args.value("n_below")?, args.value("n")?, |below, n| {
            (below - n) * rate
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;

    #[test]
    fn shoaling_does_not_dilute() {
        assert!(is_close!(exchange_rate(0.1, 10.0, -5.0), 0.01));
        assert!(is_close!(exchange_rate(0.1, 10.0, 0.9), 0.1));
    }

    #[test]
    fn forcings_are_required() {
        // A plain value has no derivative, mixing needs a forcing argument
        let values = [
            ("vars", StateValue::Scalar(1.0)),
            ("mld", StateValue::Scalar(10.0)),
            ("kappa", StateValue::Scalar(0.1)),
        ];
        let args = FluxArguments::from_values("mixing", 0.0, &values);
        assert!(matches!(
            SlabMixing {}.calculate_flux("mixing", &args),
            Err(RSECOError::MissingArgument { .. })
        ));
    }

    #[test]
    fn non_positive_depth_is_an_error() {
        let values = [
            ("vars", StateValue::Scalar(1.0)),
            ("mld", StateValue::Scalar(0.0)),
            ("kappa", StateValue::Scalar(0.1)),
        ];
        let args = FluxArguments::from_values("mixing", 0.0, &values);
        assert!(matches!(
            SlabMixing {}.calculate_flux("mixing", &args),
            Err(RSECOError::Error(_))
        ));
    }
}
