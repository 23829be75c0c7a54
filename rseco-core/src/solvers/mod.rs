//! Solver backends.
//!
//! Every backend drives the same [`FluxRouter`](crate::router::FluxRouter); only the outer
//! time stepping differs.
//! A backend is fed the quantities of an assembled model one at a time, assembles its
//! internal representation, solves over the whole time axis and finally hands back the
//! values it computed.

mod algebraic;
mod odeint;
mod stepwise;

pub use algebraic::AlgebraicSolver;
pub use odeint::ExplicitOdeSolver;
pub use stepwise::StepwiseSolver;

use crate::dimensions::{DimensionResolver, ShapeSource};
use crate::errors::{RSECOError, RSECOResult};
use crate::model::{Flux, Forcing, ModelGraph, Parameter, StateVariable};
use crate::state::{Shape, StateValue};
use crate::timeseries::{FloatValue, TimeAxis, Timeseries};
use crate::timeseries_collection::{TimeseriesCollection, VariableType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Debug;
use std::str::FromStr;
use std::sync::Arc;

/// The interface between a model and a numerical solver
pub trait SolverBackend: Debug {
    fn add_variable(&mut self, variable: &StateVariable) -> RSECOResult<()>;
    fn add_parameter(&mut self, parameter: &Parameter) -> RSECOResult<()>;
    fn add_forcing(&mut self, forcing: &Forcing) -> RSECOResult<()>;
    fn register_flux(&mut self, flux: &Flux) -> RSECOResult<()>;
    /// Build the backend's representation of the model once every quantity is registered
    fn assemble(&mut self, graph: &ModelGraph) -> RSECOResult<()>;
    fn solve(&mut self, graph: &ModelGraph, time_step: FloatValue) -> RSECOResult<()>;
    /// Hand back the computed values
    fn cleanup(&mut self) -> RSECOResult<TimeseriesCollection>;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverKind {
    /// Adaptive explicit ODE integration
    #[serde(rename = "odeint")]
    ExplicitOde,
    /// Implicit collocation solved as a system of nonlinear equations
    #[serde(rename = "gekko")]
    Algebraic,
    /// Forward Euler steps on the time axis
    #[serde(rename = "stepwise")]
    Stepwise,
}

impl SolverKind {
    pub fn name(&self) -> &'static str {
        match self {
            SolverKind::ExplicitOde => "odeint",
            SolverKind::Algebraic => "gekko",
            SolverKind::Stepwise => "stepwise",
        }
    }

    /// Create a backend of this kind
    pub fn backend(
        &self,
        time_axis: Option<Arc<TimeAxis>>,
        options: SolverOptions,
    ) -> Box<dyn SolverBackend> {
        match self {
            SolverKind::ExplicitOde => Box::new(ExplicitOdeSolver::new(time_axis, options)),
            SolverKind::Algebraic => Box::new(AlgebraicSolver::new(time_axis, options)),
            SolverKind::Stepwise => Box::new(StepwiseSolver::new(time_axis)),
        }
    }
}

impl FromStr for SolverKind {
    type Err = RSECOError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "odeint" => Ok(SolverKind::ExplicitOde),
            "gekko" => Ok(SolverKind::Algebraic),
            "stepwise" => Ok(SolverKind::Stepwise),
            _ => Err(RSECOError::UnknownSolver(s.to_string())),
        }
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Tolerances of the numerical backends
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    /// Relative tolerance of the adaptive integrator
    pub rtol: FloatValue,
    /// Absolute tolerance of the adaptive integrator
    pub atol: FloatValue,
    /// Largest residual accepted by the Newton iteration of the algebraic backend
    pub newton_tolerance: FloatValue,
    pub max_newton_iterations: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            rtol: 1e-8,
            atol: 1e-10,
            newton_tolerance: 1e-10,
            max_newton_iterations: 50,
        }
    }
}

/// Output storage shared by the backends
///
/// Holds one timeseries per state variable, flux and forcing.
/// Flux series are allocated after the first evaluation, once their shapes are known.
#[derive(Debug, Default)]
pub(crate) struct ValueStore {
    time_axis: Option<Arc<TimeAxis>>,
    values: TimeseriesCollection,
    resolver: DimensionResolver,
    variables: Vec<String>,
    fluxes: Vec<(String, Option<String>)>,
    flux_shapes: Vec<Shape>,
}

impl ValueStore {
    pub fn new(time_axis: Option<Arc<TimeAxis>>) -> Self {
        Self {
            time_axis,
            ..Default::default()
        }
    }

    pub fn time_axis(&self, action: &str) -> RSECOResult<Arc<TimeAxis>> {
        self.time_axis
            .clone()
            .ok_or_else(|| RSECOError::MissingTimeAxis(action.to_string()))
    }

    pub fn add_variable(&mut self, variable: &StateVariable) -> RSECOResult<Shape> {
        let time_axis = self.time_axis("adding state variables")?;
        let shape = self
            .resolver
            .resolve(&variable.label, ShapeSource::Hint(variable.shape), None)?;
        let mut timeseries = Timeseries::new_empty(time_axis, shape);
        timeseries.set(0, &variable.initial_value);
        self.values
            .add_timeseries(&variable.label, timeseries, VariableType::StateVariable)?;
        self.variables.push(variable.label.clone());
        Ok(shape)
    }

    /// Store the forcing evaluated at every point of the time axis
    pub fn add_forcing(&mut self, forcing: &Forcing) -> RSECOResult<()> {
        let time_axis = self.time_axis("adding forcings")?;
        let shape = self.resolver.resolve(
            &forcing.label,
            ShapeSource::Hint(forcing.function.shape()),
            None,
        )?;
        let mut timeseries = Timeseries::new_empty(time_axis.clone(), shape);
        for (index, t) in time_axis.values().iter().enumerate() {
            timeseries.set(index, &forcing.function.value(*t));
        }
        self.values
            .add_timeseries(&forcing.label, timeseries, VariableType::Forcing)
    }

    pub fn register_flux(&mut self, flux: &Flux) -> RSECOResult<()> {
        self.time_axis("registering fluxes")?;
        self.fluxes.push((flux.label.clone(), flux.dims.clone()));
        Ok(())
    }

    /// Allocate flux series shaped like the values of a first evaluation
    pub fn allocate_fluxes(&mut self, fluxes: &[StateValue]) -> RSECOResult<Vec<Shape>> {
        let time_axis = self.time_axis("evaluating fluxes")?;
        let mut shapes = Vec::with_capacity(fluxes.len());
        for ((label, dims), value) in self.fluxes.iter().zip(fluxes) {
            let shape = self
                .resolver
                .check_flux_output(label, dims.as_deref(), value)?;
            self.values.add_timeseries(
                label,
                Timeseries::new_empty(time_axis.clone(), shape),
                VariableType::Flux,
            )?;
            shapes.push(shape);
        }
        self.flux_shapes = shapes.clone();
        Ok(shapes)
    }

    pub fn store_state(&mut self, index: usize, state: &[StateValue]) -> RSECOResult<()> {
        for (label, value) in self.variables.iter().zip(state) {
            self.values.set_value(label, index, value)?;
        }
        Ok(())
    }

    /// Store flux values, which must keep the shapes seen on the first evaluation
    pub fn store_fluxes(&mut self, index: usize, fluxes: &[StateValue]) -> RSECOResult<()> {
        for (((label, _), shape), value) in self
            .fluxes
            .iter()
            .zip(&self.flux_shapes)
            .zip(fluxes)
        {
            if value.shape() != *shape {
                return Err(RSECOError::FluxShapeMismatch {
                    flux: label.clone(),
                    target: "its first evaluation".to_string(),
                    expected: shape.width(),
                    found: value.width(),
                });
            }
            self.values.set_value(label, index, value)?;
        }
        Ok(())
    }

    pub fn take(&mut self) -> TimeseriesCollection {
        std::mem::take(&mut self.values)
    }
}
