//! Forcing owners
//!
//! A forcing component owns a single forcing, labelled with the instance label, which other
//! components reference through their foreign forcing fields.
//!
//! - `ConstantForcing`: a fixed scalar or array value
//! - `MonthlyForcing`: a yearly cycle interpolated through twelve monthly values
//! - `ClimatologyForcing`: a yearly cycle read from a registered climatology provider

use log::debug;
use rseco_core::component::{Component, ComponentDescriptor, FieldDefinition, InitStage};
use rseco_core::errors::{RSECOError, RSECOResult};
use rseco_core::forcing::{
    ClimatologyRequest, ForcingContext, ForcingFunction, PeriodicSpline, MONTHS_PER_YEAR,
};
use rseco_core::inputs::ComponentInputs;
use rseco_core::timeseries::FloatValue;
use serde::{Deserialize, Serialize};

fn cubic() -> usize {
    3
}

/// A forcing which does not change with time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstantForcing {}

#[typetag::serde]
impl Component for ConstantForcing {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(InitStage::Forcing)
            .with_field(FieldDefinition::owned_forcing("forcing").describe("constant value"))
    }
}

/// A periodic forcing through twelve monthly values
///
/// Values are placed in the middle of each month of a 365 day year and interpolated with a
/// periodic spline of the configured degree, from linear (1) up to 11.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyForcing {
    #[serde(default = "cubic")]
    pub degree: usize,
}

impl Default for MonthlyForcing {
    fn default() -> Self {
        Self { degree: cubic() }
    }
}

impl MonthlyForcing {
    pub fn with_degree(degree: usize) -> Self {
        Self { degree }
    }
}

#[typetag::serde]
impl Component for MonthlyForcing {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(InitStage::Forcing).with_field(
            FieldDefinition::owned_forcing("forcing").describe("twelve monthly values"),
        )
    }

    fn setup_forcing(
        &self,
        field: &str,
        inputs: &ComponentInputs,
        _context: &ForcingContext,
    ) -> RSECOResult<ForcingFunction> {
        let values: [FloatValue; MONTHS_PER_YEAR] = inputs
            .value(field)?
            .to_vec()
            .try_into()
            .map_err(|values: Vec<FloatValue>| RSECOError::InvalidInput {
                component: inputs.component().to_string(),
                field: field.to_string(),
                reason: format!(
                    "expected {} monthly values, got {}",
                    MONTHS_PER_YEAR,
                    values.len()
                ),
            })?;
        Ok(ForcingFunction::Spline(PeriodicSpline::monthly(
            values,
            self.degree,
        )?))
    }
}

/// A periodic forcing built from a climatology around a location
///
/// The monthly values of `dataset`, averaged within `range` degrees of (`lat`, `lon`), are
/// requested from the climatology provider registered on the model builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClimatologyForcing {
    /// Name of the climatology, interpreted by the provider
    pub dataset: String,
    #[serde(default = "cubic")]
    pub degree: usize,
}

impl ClimatologyForcing {
    pub fn new(dataset: &str) -> Self {
        Self {
            dataset: dataset.to_string(),
            degree: cubic(),
        }
    }
}

#[typetag::serde]
impl Component for ClimatologyForcing {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(InitStage::Forcing)
            .with_field(FieldDefinition::parameter("lat").describe("latitude in degrees north"))
            .with_field(FieldDefinition::parameter("lon").describe("longitude in degrees east"))
            .with_field(
                FieldDefinition::parameter("range").describe("half-width of the averaged box"),
            )
            .with_field(FieldDefinition::owned_forcing("forcing"))
    }

    fn setup_forcing(
        &self,
        _field: &str,
        inputs: &ComponentInputs,
        context: &ForcingContext,
    ) -> RSECOResult<ForcingFunction> {
        let provider = context.provider(inputs.component())?;
        let request = ClimatologyRequest {
            lat: inputs.number("lat")?,
            lon: inputs.number("lon")?,
            range: inputs.number("range")?,
            dataset: self.dataset.clone(),
        };
        debug!(
            "Requesting '{}' climatology for '{}'",
            self.dataset,
            inputs.component()
        );
        let values = provider.monthly_forcing(&request)?;
        Ok(ForcingFunction::Spline(PeriodicSpline::monthly(
            values,
            self.degree,
        )?))
    }
}
