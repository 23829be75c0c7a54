#![allow(dead_code)]

use crate::component::{Component, ComponentDescriptor, FieldDefinition, FluxDefinition, InitStage};
use crate::errors::{RSECOError, RSECOResult};
use crate::router::FluxArguments;
use crate::state::StateValue;
use crate::timeseries::FloatValue;
use serde::{Deserialize, Serialize};

/// Owns a single state variable initialised from its `value` input
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ExampleVariable {}

#[typetag::serde]
impl Component for ExampleVariable {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(InitStage::Label)
            .with_field(FieldDefinition::owned_variable("value"))
    }
}

/// Owns a constant forcing
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ExampleForcing {}

#[typetag::serde]
impl Component for ExampleForcing {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(InitStage::Forcing)
            .with_field(FieldDefinition::owned_forcing("forcing"))
    }
}

/// First order loss `rate * var`
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ExampleDecay {}

#[typetag::serde]
impl Component for ExampleDecay {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(InitStage::Process)
            .with_field(FieldDefinition::foreign_variable("var").with_negative_flux("decay"))
            .with_field(FieldDefinition::parameter("rate"))
            .with_flux(FluxDefinition::new("decay"))
    }

    fn calculate_flux(&self, _flux: &str, args: &FluxArguments) -> RSECOResult<StateValue> {
        let var = args.value("var")?;
        let rate = args.value("rate")?;
        var.zip_with(rate, |v, r| v * r)
            .ok_or_else(|| RSECOError::Error("rate and var have different lengths".to_string()))
    }
}

/// Returns an array of ones of length `width`, whatever the shape of `var`
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ExampleVectorDecay {}

#[typetag::serde]
impl Component for ExampleVectorDecay {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(InitStage::Process)
            .with_field(FieldDefinition::foreign_variable("var").with_negative_flux("decay"))
            .with_field(FieldDefinition::parameter("width"))
            .with_flux(FluxDefinition::new("decay"))
    }

    fn calculate_flux(&self, _flux: &str, args: &FluxArguments) -> RSECOResult<StateValue> {
        let width = args.scalar("width")? as usize;
        Ok(StateValue::from(vec![1.0; width]))
    }
}

/// Grazing of a consumer on a list of resources
///
/// With `per_member` set the `grazing` output holds one lump per resource, otherwise one value
/// per stacked resource element.
/// The consumer gains the total through the scalar `ingestion` flux.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ExampleGrazing {}

#[typetag::serde]
impl Component for ExampleGrazing {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(InitStage::Process)
            .with_field(
                FieldDefinition::foreign_variable("resources")
                    .as_list_input()
                    .with_negative_flux("grazing"),
            )
            .with_field(FieldDefinition::foreign_variable("consumer").with_flux("ingestion"))
            .with_field(FieldDefinition::parameter("rate"))
            .with_field(FieldDefinition::parameter("per_member"))
            .with_flux(FluxDefinition::new("grazing").in_group("grazing"))
            .with_flux(FluxDefinition::new("ingestion"))
    }

    fn calculate_flux(&self, flux: &str, args: &FluxArguments) -> RSECOResult<StateValue> {
        let resources = args.value("resources")?.to_vec();
        let consumer = args.value("consumer")?.sum();
        let rate = args.scalar("rate")?;
        if flux == "ingestion" {
            let total: FloatValue = resources.iter().sum();
            return Ok(StateValue::Scalar(rate * total * consumer));
        }
        if args.scalar("per_member")? > 0.5 {
            let mut offset = 0;
            let mut lumps = vec![];
            for member in args.members("resources")? {
                let width = member.width();
                let total: FloatValue = resources[offset..offset + width].iter().sum();
                lumps.push(rate * total * consumer);
                offset += width;
            }
            Ok(StateValue::from(lumps))
        } else {
            Ok(StateValue::from(
                resources
                    .iter()
                    .map(|r| rate * r * consumer)
                    .collect::<Vec<_>>(),
            ))
        }
    }
}

/// Loss of `var` at `rate`, collected into the `losses` group
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ExampleGroupedLoss {}

#[typetag::serde]
impl Component for ExampleGroupedLoss {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(InitStage::Process)
            .with_field(FieldDefinition::foreign_variable("var").with_negative_flux("loss"))
            .with_field(FieldDefinition::parameter("rate"))
            .with_flux(FluxDefinition::new("loss").in_group("losses"))
    }

    fn calculate_flux(&self, _flux: &str, args: &FluxArguments) -> RSECOResult<StateValue> {
        Ok(StateValue::Scalar(
            args.scalar("rate")? * args.value("var")?.sum(),
        ))
    }
}

/// Routes the sum of every flux in the `losses` group into `target`
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ExampleGroupSum {}

#[typetag::serde]
impl Component for ExampleGroupSum {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(InitStage::GroupConsumer)
            .with_field(FieldDefinition::foreign_variable("target").with_flux("collect"))
            .with_flux(FluxDefinition::new("collect").consuming_group("losses"))
    }

    fn calculate_flux(&self, _flux: &str, args: &FluxArguments) -> RSECOResult<StateValue> {
        Ok(StateValue::Scalar(
            args.group("losses")?.iter().map(|v| v.sum()).sum(),
        ))
    }
}

/// Constant input of the `forcing` value into `var`
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ExampleForcedInput {}

#[typetag::serde]
impl Component for ExampleForcedInput {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(InitStage::Process)
            .with_field(FieldDefinition::foreign_variable("var").with_flux("input"))
            .with_field(FieldDefinition::foreign_forcing("forcing"))
            .with_flux(FluxDefinition::new("input"))
    }

    fn calculate_flux(&self, _flux: &str, args: &FluxArguments) -> RSECOResult<StateValue> {
        Ok(args.value("forcing")?.clone())
    }
}

/// Feeds back a fraction of an earlier flux into `var`
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ExampleFluxEcho {}

#[typetag::serde]
impl Component for ExampleFluxEcho {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(InitStage::Process)
            .with_field(FieldDefinition::foreign_variable("var").with_flux("echo"))
            .with_field(FieldDefinition::flux_output("source"))
            .with_field(FieldDefinition::parameter("fraction"))
            .with_flux(FluxDefinition::new("echo"))
    }

    fn calculate_flux(&self, _flux: &str, args: &FluxArguments) -> RSECOResult<StateValue> {
        let fraction = args.scalar("fraction")?;
        Ok(args.value("source")?.map(|v| v * fraction))
    }
}
