//! The assembled, frozen representation of a model.

use crate::component::{Component, Sign};
use crate::dimensions::DimensionResolver;
use crate::forcing::ForcingFunction;
use crate::state::{Shape, StateLayout, StateValue};
use crate::timeseries_collection::TimeseriesCollection;
use petgraph::dot::{Config, Dot};
use petgraph::Graph;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One biological or chemical pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateVariable {
    pub label: String,
    /// Instance label of the component owning the variable
    pub owner: String,
    pub shape: Shape,
    pub initial_value: StateValue,
}

/// A named constant, keyed by `<component>_<field>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub label: String,
    pub value: StateValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forcing {
    pub label: String,
    pub owner: String,
    pub function: ForcingFunction,
}

/// The model quantity a flux argument is read from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArgumentSource {
    Variable(usize),
    /// Several variables stacked into one array, in declaration order
    VariableList(Vec<usize>),
    Parameter(usize),
    Forcing(usize),
    /// The value of a flux evaluated earlier in the same evaluation
    Flux(usize),
}

/// Binds a component field name to a model quantity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentBinding {
    pub name: String,
    pub source: ArgumentSource,
}

/// A flux bound to concrete model quantities
#[derive(Debug, Clone)]
pub struct Flux {
    /// Model-wide label, `<component>_<flux>`
    pub label: String,
    pub owner: String,
    /// Name of the flux within its component
    pub name: String,
    pub component: Arc<dyn Component>,
    pub arguments: Vec<ArgumentBinding>,
    pub dims: Option<String>,
    pub group: Option<String>,
    pub group_to_arg: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteKind {
    /// The whole flux output applies to the variable
    Direct,
    /// The variable is member `position` of a list input; the flux output is split across
    /// `members`
    ListMember {
        position: usize,
        members: Vec<usize>,
    },
}

/// A single signed flux contribution to a state variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub flux: usize,
    pub sign: Sign,
    pub kind: RouteKind,
}

impl Route {
    pub fn is_list_input(&self) -> bool {
        matches!(self.kind, RouteKind::ListMember { .. })
    }
}

/// For each state variable, the ordered flux contributions summed into its rate of change
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FluxRoutingTable {
    routes: Vec<Vec<Route>>,
}

impl FluxRoutingTable {
    pub(crate) fn add_variable(&mut self) {
        self.routes.push(vec![]);
    }

    pub(crate) fn add_route(&mut self, variable: usize, route: Route) {
        self.routes[variable].push(route);
    }

    pub fn routes(&self, variable: usize) -> &[Route] {
        &self.routes[variable]
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Why one flux has to be evaluated before another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dependency {
    /// The producer writes into a group read by the consumer
    Group(String),
    /// The consumer reads the producer's value through a flux output field
    Reference(String),
}

pub type FluxGraph = Graph<String, Dependency>;

/// A fully assembled model
///
/// Topology is fixed once built.
/// Only the value store changes, when a solver writes its results back.
#[derive(Debug, Clone)]
pub struct ModelGraph {
    pub(crate) variables: Vec<StateVariable>,
    pub(crate) parameters: Vec<Parameter>,
    pub(crate) forcings: Vec<Forcing>,
    pub(crate) fluxes: Vec<Flux>,
    pub(crate) routing: FluxRoutingTable,
    pub(crate) groups: BTreeMap<String, Vec<usize>>,
    pub(crate) dims: DimensionResolver,
    pub(crate) dependencies: FluxGraph,
    pub(crate) values: Option<TimeseriesCollection>,
}

impl ModelGraph {
    pub fn variables(&self) -> &[StateVariable] {
        &self.variables
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn forcings(&self) -> &[Forcing] {
        &self.forcings
    }

    /// Fluxes in evaluation order
    pub fn fluxes(&self) -> &[Flux] {
        &self.fluxes
    }

    pub fn routing(&self) -> &FluxRoutingTable {
        &self.routing
    }

    /// Fluxes contributing to each group, in declaration order
    pub fn groups(&self) -> &BTreeMap<String, Vec<usize>> {
        &self.groups
    }

    pub fn dims(&self) -> &DimensionResolver {
        &self.dims
    }

    pub fn variable_index(&self, label: &str) -> Option<usize> {
        self.variables.iter().position(|v| v.label == label)
    }

    pub fn variable(&self, label: &str) -> Option<&StateVariable> {
        self.variables.iter().find(|v| v.label == label)
    }

    pub fn parameter(&self, label: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.label == label)
    }

    pub fn forcing_index(&self, label: &str) -> Option<usize> {
        self.forcings.iter().position(|f| f.label == label)
    }

    pub fn flux_index(&self, label: &str) -> Option<usize> {
        self.fluxes.iter().position(|f| f.label == label)
    }

    /// Initial values of every state variable in declaration order
    pub fn initial_state(&self) -> Vec<StateValue> {
        self.variables
            .iter()
            .map(|v| v.initial_value.clone())
            .collect()
    }

    /// Layout of the flat state vector used by the solvers
    pub fn state_layout(&self) -> StateLayout {
        StateLayout::from_shapes(self.variables.iter().map(|v| v.shape))
    }

    /// Values written back by the last solve
    pub fn values(&self) -> Option<&TimeseriesCollection> {
        self.values.as_ref()
    }

    pub(crate) fn store_values(&mut self, values: TimeseriesCollection) {
        self.values = Some(values);
    }

    /// Create a diagram of the flux dependencies
    ///
    /// Useful for debugging
    pub fn as_dot(&self) -> Dot<'_, &FluxGraph> {
        Dot::with_attr_getters(
            &self.dependencies,
            &[Config::NodeNoLabel, Config::EdgeNoLabel],
            &|_, er| match er.weight() {
                Dependency::Group(g) => format!("label = \"group {}\"", g),
                Dependency::Reference(f) => format!("label = \"ref {}\"", f),
            },
            &|_, (_, label)| format!("label = \"{}\"", label),
        )
    }
}
