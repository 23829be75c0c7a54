//! Evaluation of every flux and assembly of the rates of change.
//!
//! The router is shared by all solver backends.
//! Given the current state it evaluates each flux exactly once, in the fixed order set by the
//! model builder, then sums the signed contributions of every flux into the rate of change of
//! the variables it is routed to.

use crate::dimensions::{classify_list_output, ListSplit};
use crate::errors::{RSECOError, RSECOResult};
use crate::model::{ArgumentSource, Flux, ModelGraph, Route, RouteKind};
use crate::state::{Shape, StateLayout, StateValue};
use crate::timeseries::{FloatValue, Time, TimeAxis};
use std::borrow::Cow;
use std::collections::HashMap;

/// Value and time derivative of a forcing at one point in time
#[derive(Clone, Debug, PartialEq)]
pub struct ForcingSample {
    pub value: StateValue,
    pub derivative: StateValue,
}

/// Forcing values evaluated once per point of a time axis
///
/// Used by backends which only evaluate fluxes on the time grid.
#[derive(Clone, Debug, Default)]
pub struct ForcingTable {
    samples: Vec<Vec<ForcingSample>>,
}

impl ForcingTable {
    /// A table from samples already grouped by point in time
    pub fn from_samples(samples: Vec<Vec<ForcingSample>>) -> Self {
        Self { samples }
    }

    pub fn precompute(graph: &ModelGraph, time_axis: &TimeAxis) -> Self {
        Self {
            samples: time_axis
                .values()
                .iter()
                .map(|t| sample_forcings(graph, *t))
                .collect(),
        }
    }

    pub fn at(&self, index: usize) -> Option<&[ForcingSample]> {
        self.samples.get(index).map(|s| s.as_slice())
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Evaluate every forcing of the model at `t`
pub fn sample_forcings(graph: &ModelGraph, t: Time) -> Vec<ForcingSample> {
    graph
        .forcings()
        .iter()
        .map(|f| ForcingSample {
            value: f.function.value(t),
            derivative: f.function.derivative(t),
        })
        .collect()
}

/// How forcing values are obtained during an evaluation
#[derive(Clone, Copy, Debug)]
pub enum ForcingSource<'a> {
    /// Call the forcing functions at the evaluation time
    Time,
    /// Read precomputed values for a point on the time grid
    Step {
        index: usize,
        table: &'a ForcingTable,
    },
}

#[derive(Clone, Debug)]
enum Argument<'a> {
    Value(&'a StateValue),
    Stacked {
        value: StateValue,
        members: Vec<Shape>,
    },
    Forcing(&'a ForcingSample),
    Group(&'a [StateValue]),
}

/// The arguments a flux is evaluated with, keyed by the component's own field names
#[derive(Debug)]
pub struct FluxArguments<'a> {
    flux: &'a str,
    time: Time,
    entries: Vec<(&'a str, Argument<'a>)>,
}

impl<'a> FluxArguments<'a> {
    /// Build arguments directly from named values
    ///
    /// Useful for evaluating a component outside of a model.
    pub fn from_values(flux: &'a str, time: Time, values: &'a [(&'a str, StateValue)]) -> Self {
        Self {
            flux,
            time,
            entries: values
                .iter()
                .map(|(name, value)| (*name, Argument::Value(value)))
                .collect(),
        }
    }

    fn entry(&self, name: &str) -> RSECOResult<&Argument<'a>> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, a)| a)
            .ok_or_else(|| RSECOError::MissingArgument {
                flux: self.flux.to_string(),
                argument: name.to_string(),
            })
    }

    pub fn time(&self) -> Time {
        self.time
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| *n == name)
    }

    /// Current value of a variable, parameter, forcing or referenced flux
    ///
    /// List inputs are returned stacked into a single array.
    pub fn value(&self, name: &str) -> RSECOResult<&StateValue> {
        match self.entry(name)? {
            Argument::Value(value) => Ok(*value),
            Argument::Stacked { value, .. } => Ok(value),
            Argument::Forcing(sample) => Ok(&sample.value),
            Argument::Group(_) => Err(RSECOError::MissingArgument {
                flux: self.flux.to_string(),
                argument: format!("{name} (a group has no single value)"),
            }),
        }
    }

    /// A scalar argument
    pub fn scalar(&self, name: &str) -> RSECOResult<FloatValue> {
        let value = self.value(name)?;
        value.as_scalar().ok_or_else(|| RSECOError::FluxShapeMismatch {
            flux: self.flux.to_string(),
            target: format!("argument '{name}'"),
            expected: 1,
            found: value.width(),
        })
    }

    /// Time derivative of a forcing argument
    pub fn derivative(&self, name: &str) -> RSECOResult<&StateValue> {
        match self.entry(name)? {
            Argument::Forcing(sample) => Ok(&sample.derivative),
            _ => Err(RSECOError::MissingArgument {
                flux: self.flux.to_string(),
                argument: format!("{name} (derivatives are only available for forcings)"),
            }),
        }
    }

    /// Every output of a group, in producer declaration order
    pub fn group(&self, name: &str) -> RSECOResult<&[StateValue]> {
        match self.entry(name)? {
            Argument::Group(values) => Ok(*values),
            _ => Err(RSECOError::MissingArgument {
                flux: self.flux.to_string(),
                argument: format!("{name} (not a group)"),
            }),
        }
    }

    /// Shapes of the variables stacked into a list input
    pub fn members(&self, name: &str) -> RSECOResult<&[Shape]> {
        match self.entry(name)? {
            Argument::Stacked { members, .. } => Ok(members),
            _ => Err(RSECOError::MissingArgument {
                flux: self.flux.to_string(),
                argument: format!("{name} (not a list input)"),
            }),
        }
    }
}

/// The outcome of evaluating all fluxes for one state
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    /// Flux values in evaluation order
    pub fluxes: Vec<StateValue>,
    /// Rate of change of every state variable
    pub rates: Vec<StateValue>,
}

/// Evaluates the fluxes of a model and routes them into rates of change
#[derive(Debug, Clone)]
pub struct FluxRouter<'a> {
    graph: &'a ModelGraph,
    layout: StateLayout,
    parameters: Option<Vec<StateValue>>,
}

impl<'a> FluxRouter<'a> {
    pub fn new(graph: &'a ModelGraph) -> Self {
        Self {
            graph,
            layout: graph.state_layout(),
            parameters: None,
        }
    }

    /// Evaluate with parameter values held by the caller instead of those in the graph
    ///
    /// One value is needed per parameter of the graph, in graph order and of the same shape.
    pub fn with_parameter_values(mut self, values: Vec<StateValue>) -> RSECOResult<Self> {
        let parameters = self.graph.parameters();
        if values.len() != parameters.len() {
            return Err(RSECOError::Error(format!(
                "expected {} parameter values, found {}",
                parameters.len(),
                values.len()
            )));
        }
        for (parameter, value) in parameters.iter().zip(&values) {
            if parameter.value.shape() != value.shape() {
                return Err(RSECOError::FluxShapeMismatch {
                    flux: "parameter values".to_string(),
                    target: parameter.label.clone(),
                    expected: parameter.value.width(),
                    found: value.width(),
                });
            }
        }
        self.parameters = Some(values);
        Ok(self)
    }

    fn parameter(&self, index: usize) -> &StateValue {
        match &self.parameters {
            Some(values) => &values[index],
            None => &self.graph.parameters()[index].value,
        }
    }

    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }

    pub fn graph(&self) -> &'a ModelGraph {
        self.graph
    }

    /// Evaluate all fluxes and rates for the state at time `t`
    pub fn evaluate(
        &self,
        t: Time,
        state: &[StateValue],
        forcings: ForcingSource,
    ) -> RSECOResult<Evaluation> {
        let samples: Cow<[ForcingSample]> = match forcings {
            ForcingSource::Time => Cow::Owned(sample_forcings(self.graph, t)),
            ForcingSource::Step { index, table } => {
                Cow::Borrowed(table.at(index).ok_or_else(|| {
                    RSECOError::Error(format!("no precomputed forcings for step {index}"))
                })?)
            }
        };

        let mut fluxes: Vec<StateValue> = Vec::with_capacity(self.graph.fluxes().len());
        let mut groups: HashMap<&str, Vec<StateValue>> = HashMap::new();
        for (index, flux) in self.graph.fluxes().iter().enumerate() {
            let value = {
                let args = self.arguments(flux, t, state, &samples, &fluxes, &groups)?;
                flux.component.calculate_flux(&flux.name, &args)?
            };
            self.check_flux_axis(flux, &value)?;
            if let Some(group) = &flux.group {
                groups.entry(group.as_str()).or_default().push(value.clone());
            }
            debug_assert_eq!(fluxes.len(), index);
            fluxes.push(value);
        }

        let rates = self.rates(&fluxes)?;
        Ok(Evaluation { fluxes, rates })
    }

    /// Evaluate using a flat state vector, returning flux values and the flat rates
    pub fn evaluate_flat(
        &self,
        t: Time,
        state: &[FloatValue],
        forcings: ForcingSource,
    ) -> RSECOResult<(Vec<StateValue>, Vec<FloatValue>)> {
        let values = self.layout.unflatten(state);
        let evaluation = self.evaluate(t, &values, forcings)?;
        let rates = self.layout.flatten(&evaluation.rates);
        Ok((evaluation.fluxes, rates))
    }

    fn arguments<'b>(
        &'b self,
        flux: &'b Flux,
        t: Time,
        state: &'b [StateValue],
        forcings: &'b [ForcingSample],
        fluxes: &'b [StateValue],
        groups: &'b HashMap<&str, Vec<StateValue>>,
    ) -> RSECOResult<FluxArguments<'b>>
    where
        'a: 'b,
    {
        let mut entries = Vec::with_capacity(flux.arguments.len() + 1);
        for binding in &flux.arguments {
            let argument = match &binding.source {
                ArgumentSource::Variable(i) => Argument::Value(&state[*i]),
                ArgumentSource::VariableList(members) => {
                    let mut stacked = Vec::new();
                    members
                        .iter()
                        .for_each(|i| stacked.extend(state[*i].iter()));
                    Argument::Stacked {
                        value: StateValue::from(stacked),
                        members: members.iter().map(|i| state[*i].shape()).collect(),
                    }
                }
                ArgumentSource::Parameter(i) => Argument::Value(self.parameter(*i)),
                ArgumentSource::Forcing(i) => Argument::Forcing(&forcings[*i]),
                ArgumentSource::Flux(i) => match fluxes.get(*i) {
                    Some(value) => Argument::Value(value),
                    None => {
                        return Err(RSECOError::EvaluationOrder {
                            consumer: flux.label.clone(),
                            producer: self.graph.fluxes()[*i].label.clone(),
                        })
                    }
                },
            };
            entries.push((binding.name.as_str(), argument));
        }
        if let Some(group) = &flux.group_to_arg {
            let values = groups
                .get(group.as_str())
                .ok_or_else(|| RSECOError::MissingGroupProducer {
                    flux: flux.label.clone(),
                    group: group.clone(),
                })?;
            entries.push((group.as_str(), Argument::Group(values)));
        }
        Ok(FluxArguments {
            flux: &flux.label,
            time: t,
            entries,
        })
    }

    fn check_flux_axis(&self, flux: &Flux, value: &StateValue) -> RSECOResult<()> {
        let expected = flux
            .dims
            .as_deref()
            .and_then(|axis| self.graph.dims().axis_len(axis));
        match (expected, value.shape()) {
            (Some(expected), Shape::Vector(found)) if expected != found => {
                Err(RSECOError::FluxShapeMismatch {
                    flux: flux.label.clone(),
                    target: format!("axis '{}'", flux.dims.as_deref().unwrap_or_default()),
                    expected,
                    found,
                })
            }
            _ => Ok(()),
        }
    }

    fn rates(&self, fluxes: &[StateValue]) -> RSECOResult<Vec<StateValue>> {
        let variables = self.graph.variables();
        let mut rates = Vec::with_capacity(variables.len());
        for (index, variable) in variables.iter().enumerate() {
            let mut rate = StateValue::zeros(variable.shape);
            for route in self.graph.routing().routes(index) {
                let contribution = self.contribution(route, variable.shape, &variable.label, fluxes)?;
                let factor = route.sign.factor();
                rate = rate
                    .zip_with(&contribution, |r, c| r + factor * c)
                    .ok_or_else(|| RSECOError::FluxShapeMismatch {
                        flux: self.graph.fluxes()[route.flux].label.clone(),
                        target: variable.label.clone(),
                        expected: variable.shape.width(),
                        found: contribution.width(),
                    })?;
            }
            rates.push(rate);
        }
        Ok(rates)
    }

    /// The part of a flux output which applies to a single variable, shaped like that variable
    fn contribution(
        &self,
        route: &Route,
        target: Shape,
        label: &str,
        fluxes: &[StateValue],
    ) -> RSECOResult<StateValue> {
        let flux = &self.graph.fluxes()[route.flux];
        let value = &fluxes[route.flux];
        match &route.kind {
            RouteKind::Direct => match (target, value) {
                (Shape::Scalar, StateValue::Scalar(_)) => Ok(value.clone()),
                (Shape::Scalar, StateValue::Array(values)) => Err(RSECOError::FluxShapeMismatch {
                    flux: flux.label.clone(),
                    target: label.to_string(),
                    expected: 1,
                    found: values.len(),
                }),
                (Shape::Vector(n), StateValue::Scalar(v)) => Ok(StateValue::from(vec![*v; n])),
                (Shape::Vector(n), StateValue::Array(values)) if values.len() == n => {
                    Ok(value.clone())
                }
                (Shape::Vector(n), StateValue::Array(values)) => Err(RSECOError::FluxShapeMismatch {
                    flux: flux.label.clone(),
                    target: label.to_string(),
                    expected: n,
                    found: values.len(),
                }),
            },
            RouteKind::ListMember { position, members } => {
                let variables = self.graph.variables();
                let shapes: Vec<Shape> = members.iter().map(|i| variables[*i].shape).collect();
                let output = value.to_vec();
                match classify_list_output(&flux.label, output.len(), &shapes)? {
                    ListSplit::Elementwise => {
                        let offset: usize = shapes[..*position].iter().map(|s| s.width()).sum();
                        Ok(StateValue::from_slice(
                            target,
                            &output[offset..offset + target.width()],
                        ))
                    }
                    ListSplit::PerMember => {
                        let lump = output[*position];
                        Ok(match target {
                            Shape::Scalar => StateValue::Scalar(lump),
                            Shape::Vector(n) => StateValue::from(vec![lump / n as FloatValue; n]),
                        })
                    }
                }
            }
        }
    }
}
