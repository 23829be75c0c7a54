//! Model struct and runtime execution.

use crate::errors::{RSECOError, RSECOResult};
use crate::inputs::ModelInputs;
use crate::solvers::{SolverKind, SolverOptions};
use crate::timeseries::{FloatValue, TimeAxis};
use crate::timeseries_collection::TimeseriesCollection;
use log::{info, warn};
use std::sync::Arc;

use super::builder::ModelBuilder;
use super::graph::ModelGraph;

/// An assembled model paired with the solver and time axis it is solved with.
///
/// A model is solved once.
/// The values computed by the solver are written back into the model graph and are available
/// through [`Model::timeseries`].
#[derive(Debug)]
pub struct Model {
    graph: ModelGraph,
    solver: SolverKind,
    options: SolverOptions,
    time_axis: Arc<TimeAxis>,
    /// Labels kept in the output, everything is kept if empty
    output_vars: Vec<String>,
    solved: bool,
}

impl Model {
    pub fn new(graph: ModelGraph, solver: SolverKind, time_axis: TimeAxis) -> Self {
        Self {
            graph,
            solver,
            options: SolverOptions::default(),
            time_axis: Arc::new(time_axis),
            output_vars: vec![],
            solved: false,
        }
    }

    pub fn with_solver_options(&mut self, options: SolverOptions) -> &mut Self {
        self.options = options;
        self
    }

    /// Restrict the output to the given labels
    pub fn with_output_vars(&mut self, output_vars: Vec<String>) -> &mut Self {
        self.output_vars = output_vars;
        self
    }

    /// Solve the model over its whole time axis
    ///
    /// `time_step` is the forward step of the fixed step solver and the interval the flux
    /// integrals of the explicit ODE solver are differenced over.
    pub fn solve(&mut self, time_step: FloatValue) -> RSECOResult<&TimeseriesCollection> {
        if self.solved {
            return Err(RSECOError::AlreadySolved);
        }
        self.solved = true;

        let mut backend = self
            .solver
            .backend(Some(self.time_axis.clone()), self.options);
        for variable in self.graph.variables() {
            backend.add_variable(variable)?;
        }
        for parameter in self.graph.parameters() {
            backend.add_parameter(parameter)?;
        }
        for forcing in self.graph.forcings() {
            backend.add_forcing(forcing)?;
        }
        for flux in self.graph.fluxes() {
            backend.register_flux(flux)?;
        }
        backend.assemble(&self.graph)?;

        info!(
            "Solving with '{}' from t={} to t={} ({} points)",
            self.solver,
            self.time_axis.first(),
            self.time_axis.last(),
            self.time_axis.len()
        );
        backend.solve(&self.graph, time_step)?;

        let mut values = backend.cleanup()?;
        if !self.output_vars.is_empty() {
            for name in &self.output_vars {
                if values.get_by_name(name).is_none() {
                    warn!("Output variable '{}' does not exist and is skipped", name);
                }
            }
            values.retain_names(&self.output_vars);
        }
        self.graph.store_values(values);
        self.timeseries()
    }

    /// Values computed by the solve
    pub fn timeseries(&self) -> RSECOResult<&TimeseriesCollection> {
        self.graph.values().ok_or(RSECOError::NotSolved)
    }

    pub fn graph(&self) -> &ModelGraph {
        &self.graph
    }

    pub fn solver(&self) -> SolverKind {
        self.solver
    }

    pub fn time_axis(&self) -> &TimeAxis {
        &self.time_axis
    }

    pub fn is_solved(&self) -> bool {
        self.solved
    }
}

/// Assemble a model ready to be solved
///
/// `solver` is one of "odeint", "gekko" or "stepwise".
/// `input_vars` are added to any inputs already registered on `model`.
/// An empty `output_vars` keeps every quantity in the output.
pub fn setup(
    solver: &str,
    model: &ModelBuilder,
    input_vars: ModelInputs,
    output_vars: &[&str],
    time: Option<TimeAxis>,
) -> RSECOResult<Model> {
    let solver: SolverKind = solver.parse()?;
    let time_axis = time.ok_or_else(|| {
        RSECOError::MissingTimeAxis(format!("setting up the '{}' solver", solver))
    })?;

    let mut builder = model.clone();
    builder.with_inputs(input_vars);
    let graph = builder.build()?;

    let mut model = Model::new(graph, solver, time_axis);
    model.with_output_vars(output_vars.iter().map(|s| s.to_string()).collect());
    Ok(model)
}
