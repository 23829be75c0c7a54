//! Grazing and the fate of grazed material
//!
//! Grazing is split into two components joined by a flux group.
//! `HollingTypeIIIGrazing` removes food from its resources and collects the grazed amounts
//! into the group; `GrossGrowthEfficiency` consumes the whole group and partitions the total
//! between the grazer (assimilation), detritus (egestion) and nutrient (excretion).
//! Several grazers can feed the same partitioning by sharing a group name.

use super::combine;
use rseco_core::component::{
    Component, ComponentDescriptor, FieldDefinition, FluxDefinition, InitStage,
};
use rseco_core::errors::{RSECOError, RSECOResult};
use rseco_core::router::FluxArguments;
use rseco_core::state::StateValue;
use rseco_core::timeseries::FloatValue;
use serde::{Deserialize, Serialize};

fn default_group() -> String {
    "grazing".to_string()
}

/// Sigmoidal grazing of a consumer on a list of resources
///
/// $$ G_i = I_{max} \frac{p_i R_i^2}{k^2 + \sum_j p_j R_j^2} Z $$
///
/// Where:
/// - $R_i$ are the stacked resources (every element of every listed variable)
/// - $p_i$ is the feeding preference (`feed_pref`), a scalar or one value per stacked element
/// - $I_{max}$ is the maximum ingestion rate (`max_rate`)
/// - $k$ is the half saturation constant (`halfsat`)
/// - $Z$ is the total consumer biomass
///
/// The output holds one value per stacked resource element and is removed from the resources.
/// It is not added to the consumer; a group consumer decides where grazed material goes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HollingTypeIIIGrazing {
    /// Group the grazing output is collected into
    #[serde(default = "default_group")]
    pub group: String,
}

impl Default for HollingTypeIIIGrazing {
    fn default() -> Self {
        Self {
            group: default_group(),
        }
    }
}

impl HollingTypeIIIGrazing {
    pub fn in_group(group: &str) -> Self {
        Self {
            group: group.to_string(),
        }
    }
}

/// Grazing on each resource element
///
/// `scaled` holds the preference weighted squared resources.
pub fn holling_type_iii(
    scaled: &[FloatValue],
    max_rate: FloatValue,
    halfsat: FloatValue,
    consumer: FloatValue,
) -> Vec<FloatValue> {
    let total: FloatValue = scaled.iter().sum();
    let denominator = halfsat * halfsat + total;
    scaled
        .iter()
        .map(|s| max_rate * s / denominator * consumer)
        .collect()
}

#[typetag::serde]
impl Component for HollingTypeIIIGrazing {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(InitStage::Process)
            .with_field(
                FieldDefinition::foreign_variable("resources")
                    .as_list_input()
                    .with_negative_flux("grazing"),
            )
            .with_field(FieldDefinition::foreign_variable("consumer"))
            .with_field(FieldDefinition::parameter("feed_pref"))
            .with_field(FieldDefinition::parameter("max_rate"))
            .with_field(FieldDefinition::parameter("halfsat"))
            .with_flux(FluxDefinition::new("grazing").in_group(&self.group))
    }

    fn calculate_flux(&self, flux: &str, args: &FluxArguments) -> RSECOResult<StateValue> {
        let scaled = combine(
            flux,
            args.value("resources")?,
            args.value("feed_pref")?,
            |r, p| p * r * r,
        )?;
        Ok(StateValue::from(holling_type_iii(
            &scaled.to_vec(),
            args.scalar("max_rate")?,
            args.scalar("halfsat")?,
            args.value("consumer")?.sum(),
        )))
    }
}

/// Partition of grazed material
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrazingPartition {
    pub assimilation: FloatValue,
    pub egestion: FloatValue,
    pub excretion: FloatValue,
}

/// Split `total` grazing by assimilation efficiency `beta` and net growth efficiency `epsilon`
///
/// The three parts always add up to `total`.
pub fn partition_grazing(
    total: FloatValue,
    beta: FloatValue,
    epsilon: FloatValue,
) -> GrazingPartition {
    GrazingPartition {
        assimilation: total * beta * epsilon,
        egestion: total * (1.0 - beta),
        excretion: total * beta * (1.0 - epsilon),
    }
}

/// Gross growth efficiency routing of everything grazed in a group
///
/// - assimilation: $\sum G \beta \epsilon$ into `assimilated`
/// - egestion: $\sum G (1 - \beta)$ into `egested`
/// - excretion: $\sum G \beta (1 - \epsilon)$ into `excreted`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrossGrowthEfficiency {
    /// Group whose outputs are partitioned
    #[serde(default = "default_group")]
    pub group: String,
}

impl Default for GrossGrowthEfficiency {
    fn default() -> Self {
        Self {
            group: default_group(),
        }
    }
}

impl GrossGrowthEfficiency {
    pub fn consuming(group: &str) -> Self {
        Self {
            group: group.to_string(),
        }
    }
}

#[typetag::serde]
impl Component for GrossGrowthEfficiency {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(InitStage::GroupConsumer)
            .with_field(FieldDefinition::foreign_variable("assimilated").with_flux("assimilation"))
            .with_field(FieldDefinition::foreign_variable("egested").with_flux("egestion"))
            .with_field(FieldDefinition::foreign_variable("excreted").with_flux("excretion"))
            .with_field(
                FieldDefinition::parameter("beta").describe("assimilation efficiency"),
            )
            .with_field(
                FieldDefinition::parameter("epsilon").describe("net growth efficiency"),
            )
            .with_flux(FluxDefinition::new("assimilation").consuming_group(&self.group))
            .with_flux(FluxDefinition::new("egestion").consuming_group(&self.group))
            .with_flux(FluxDefinition::new("excretion").consuming_group(&self.group))
    }

    fn calculate_flux(&self, flux: &str, args: &FluxArguments) -> RSECOResult<StateValue> {
        let total: FloatValue = args.group(&self.group)?.iter().map(|g| g.sum()).sum();
        let partition = partition_grazing(total, args.scalar("beta")?, args.scalar("epsilon")?);
        let value = match flux {
            "assimilation" => partition.assimilation,
            "egestion" => partition.egestion,
            "excretion" => partition.excretion,
            _ => {
                return Err(RSECOError::Error(format!(
                    "GrossGrowthEfficiency does not compute a flux named '{flux}'"
                )))
            }
        };
        Ok(StateValue::Scalar(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;
    use ndarray::array;

    #[test]
    fn partition_sums_to_total() {
        let partition = partition_grazing(10.0, 0.33, 0.33);
        assert!(is_close!(partition.assimilation, 1.089));
        assert!(is_close!(partition.egestion, 6.7));
        assert!(is_close!(partition.excretion, 2.211));
        assert!(is_close!(
            partition.assimilation + partition.egestion + partition.excretion,
            10.0
        ));
    }

    #[test]
    fn grazing_prefers_abundant_resources() {
        let grazing = holling_type_iii(&[1.0, 4.0], 1.0, 1.0, 2.0);
        // Denominator 1 + 5
        assert!(is_close!(grazing[0], 2.0 / 6.0));
        assert!(is_close!(grazing[1], 8.0 / 6.0));
    }

    #[test]
    fn grazing_on_stacked_resources() {
        let values = [
            ("resources", StateValue::Array(array![1.0, 2.0])),
            ("consumer", StateValue::Scalar(0.5)),
            ("feed_pref", StateValue::Array(array![1.0, 0.25])),
            ("max_rate", StateValue::Scalar(2.0)),
            ("halfsat", StateValue::Scalar(1.0)),
        ];
        let args = FluxArguments::from_values("grazing", 0.0, &values);
        let grazing = HollingTypeIIIGrazing::default()
            .calculate_flux("grazing", &args)
            .unwrap();
        assert_eq!(grazing.width(), 2);
        // Scaled resources 1 and 1, denominator 3
        assert!(is_close!(grazing.get(0).unwrap(), 1.0 / 3.0));
        assert!(is_close!(grazing.get(1).unwrap(), 1.0 / 3.0));
    }

    #[test]
    fn group_names_are_configurable() {
        let producer = HollingTypeIIIGrazing::in_group("zoo_grazing").descriptor();
        let consumer = GrossGrowthEfficiency::consuming("zoo_grazing").descriptor();
        assert_eq!(
            producer.flux("grazing").unwrap().group.as_deref(),
            Some("zoo_grazing")
        );
        assert!(consumer
            .fluxes
            .iter()
            .all(|f| f.group_to_arg.as_deref() == Some("zoo_grazing")));
        assert!(producer.validate("graze").is_ok());
        assert!(consumer.validate("gge").is_ok());
    }

    #[test]
    fn serialised_with_group() {
        let component: Box<dyn Component> = Box::new(HollingTypeIIIGrazing::default());
        assert_eq!(
            serde_json::to_string(&component).unwrap(),
            r#"{"type":"HollingTypeIIIGrazing","group":"grazing"}"#
        );
    }
}
