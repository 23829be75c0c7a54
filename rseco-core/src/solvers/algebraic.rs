//! Equation based backend.
//!
//! Every state variable contributes one equation per time point,
//! `(y[k] - y[k-1]) / (t[k] - t[k-1]) == rate(t[k], y[k])`, where `rate` is the expression the
//! flux router builds for that variable.
//! The equations of consecutive points only couple neighbouring blocks, so the system for the
//! whole time axis is solved block by block with Newton's method.
//!
//! Quantities are copied into the backend's own `Quantity` table as they are registered and
//! the equations are evaluated from that table: constants supply the parameter values and
//! params supply the forcing value of every time point.

use crate::dimensions::{DimensionResolver, ShapeSource};
use crate::errors::{RSECOError, RSECOResult};
use crate::model::{Flux, Forcing, ModelGraph, Parameter, StateVariable};
use crate::router::{FluxRouter, ForcingSample, ForcingSource, ForcingTable};
use crate::solvers::{SolverBackend, SolverOptions, ValueStore};
use crate::state::{Shape, StateLayout, StateValue};
use crate::timeseries::{FloatValue, Time, TimeAxis};
use crate::timeseries_collection::TimeseriesCollection;
use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use std::ops::Range;
use std::sync::Arc;

/// Quantities as seen by the equation system
#[derive(Debug, Clone)]
enum Quantity {
    /// Solved for at every time point
    Unknown { label: String, shape: Shape },
    /// Fixed for the whole solve
    Constant { label: String, value: StateValue },
    /// Fixed per time point, one sample for each point of the time axis
    Param {
        label: String,
        samples: Vec<ForcingSample>,
    },
    /// Computed from the unknowns while evaluating the equations
    Intermediate { label: String },
}

/// `d(variable)/dt == rate` for one variable, occupying `rows` of the residual
#[derive(Debug, Clone)]
struct Equation {
    variable: String,
    rows: Range<usize>,
}

#[derive(Debug)]
pub struct AlgebraicSolver {
    options: SolverOptions,
    store: ValueStore,
    resolver: DimensionResolver,
    quantities: Vec<Quantity>,
    unknowns: StateLayout,
    equations: Vec<Equation>,
    constants: Vec<StateValue>,
    intermediates: Vec<String>,
    forcings: Option<ForcingTable>,
}

impl AlgebraicSolver {
    pub fn new(time_axis: Option<Arc<TimeAxis>>, options: SolverOptions) -> Self {
        Self {
            options,
            store: ValueStore::new(time_axis),
            resolver: DimensionResolver::new(),
            quantities: vec![],
            unknowns: StateLayout::new(),
            equations: vec![],
            constants: vec![],
            intermediates: vec![],
            forcings: None,
        }
    }

    fn worst_equation(&self, residual: &DVector<FloatValue>) -> Option<&str> {
        let (row, _) = residual
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))?;
        self.equations
            .iter()
            .find(|e| e.rows.contains(&row))
            .map(|e| e.variable.as_str())
    }

    /// Split the quantity table into the pieces the equations are evaluated from
    fn collect_quantities(&mut self, points: usize) -> RSECOResult<ForcingTable> {
        let mut unknowns = StateLayout::new();
        let mut equations = vec![];
        let mut constants = vec![];
        let mut intermediates = vec![];
        let mut params: Vec<&[ForcingSample]> = vec![];
        for quantity in &self.quantities {
            match quantity {
                Quantity::Unknown { label, shape } => {
                    let index = unknowns.push(*shape);
                    equations.push(Equation {
                        variable: label.clone(),
                        rows: unknowns.range(index),
                    });
                }
                Quantity::Constant { value, .. } => constants.push(value.clone()),
                Quantity::Param { label, samples } => {
                    if samples.len() != points {
                        return Err(RSECOError::Error(format!(
                            "forcing '{}' has {} samples for {} time points",
                            label,
                            samples.len(),
                            points
                        )));
                    }
                    params.push(samples);
                }
                Quantity::Intermediate { label } => intermediates.push(label.clone()),
            }
        }
        let forcings = ForcingTable::from_samples(
            (0..points)
                .map(|k| params.iter().map(|samples| samples[k].clone()).collect())
                .collect(),
        );

        self.unknowns = unknowns;
        self.equations = equations;
        self.constants = constants;
        self.intermediates = intermediates;
        Ok(forcings)
    }

    fn router<'a>(&self, graph: &'a ModelGraph) -> RSECOResult<FluxRouter<'a>> {
        let router = FluxRouter::new(graph).with_parameter_values(self.constants.clone())?;
        if router.layout().width() != self.unknowns.width()
            || graph.fluxes().len() != self.intermediates.len()
        {
            return Err(RSECOError::Error(
                "the registered quantities do not match the model".to_string(),
            ));
        }
        Ok(router)
    }
}

/// Residual of the implicit Euler equations of one time point
struct StepResidual<'a> {
    router: &'a FluxRouter<'a>,
    forcings: &'a ForcingTable,
    index: usize,
    t: Time,
    dt: FloatValue,
    previous: &'a DVector<FloatValue>,
}

impl StepResidual<'_> {
    fn evaluate(&self, x: &DVector<FloatValue>) -> RSECOResult<(DVector<FloatValue>, Vec<StateValue>)> {
        let (fluxes, rates) = self.router.evaluate_flat(
            self.t,
            x.as_slice(),
            ForcingSource::Step {
                index: self.index,
                table: self.forcings,
            },
        )?;
        let residual = DVector::from_iterator(
            x.len(),
            x.iter()
                .zip(self.previous.iter())
                .zip(rates.iter())
                .map(|((x, prev), rate)| x - prev - self.dt * rate),
        );
        Ok((residual, fluxes))
    }

    /// Forward difference approximation of the Jacobian
    fn jacobian(
        &self,
        x: &DVector<FloatValue>,
        residual: &DVector<FloatValue>,
    ) -> RSECOResult<DMatrix<FloatValue>> {
        let n = x.len();
        let mut jacobian = DMatrix::zeros(n, n);
        for j in 0..n {
            let h = FloatValue::EPSILON.sqrt() * x[j].abs().max(1.0);
            let mut perturbed = x.clone();
            perturbed[j] += h;
            let (shifted, _) = self.evaluate(&perturbed)?;
            jacobian.set_column(j, &((shifted - residual) / h));
        }
        Ok(jacobian)
    }
}

impl SolverBackend for AlgebraicSolver {
    fn add_variable(&mut self, variable: &StateVariable) -> RSECOResult<()> {
        // Placeholders are sized from the declared shape, no value is needed
        let shape = self.resolver.resolve(
            &variable.label,
            ShapeSource::Hint(variable.shape),
            None,
        )?;
        self.store.add_variable(variable)?;
        self.quantities.push(Quantity::Unknown {
            label: variable.label.clone(),
            shape,
        });
        Ok(())
    }

    fn add_parameter(&mut self, parameter: &Parameter) -> RSECOResult<()> {
        self.quantities.push(Quantity::Constant {
            label: parameter.label.clone(),
            value: parameter.value.clone(),
        });
        Ok(())
    }

    fn add_forcing(&mut self, forcing: &Forcing) -> RSECOResult<()> {
        let time_axis = self.store.time_axis("adding forcings")?;
        self.resolver.resolve(
            &forcing.label,
            ShapeSource::Hint(forcing.function.shape()),
            None,
        )?;
        self.store.add_forcing(forcing)?;
        self.quantities.push(Quantity::Param {
            label: forcing.label.clone(),
            samples: time_axis
                .values()
                .iter()
                .map(|t| ForcingSample {
                    value: forcing.function.value(*t),
                    derivative: forcing.function.derivative(*t),
                })
                .collect(),
        });
        Ok(())
    }

    fn register_flux(&mut self, flux: &Flux) -> RSECOResult<()> {
        self.store.register_flux(flux)?;
        self.quantities.push(Quantity::Intermediate {
            label: flux.label.clone(),
        });
        Ok(())
    }

    fn assemble(&mut self, graph: &ModelGraph) -> RSECOResult<()> {
        let time_axis = self.store.time_axis("assembling the solver")?;
        let forcings = self.collect_quantities(time_axis.len())?;
        debug!(
            "{} constants, {} params and {} intermediates",
            self.constants.len(),
            forcings.at(0).map_or(0, |samples| samples.len()),
            self.intermediates.len()
        );

        let router = self.router(graph)?;
        let evaluation = router.evaluate(
            time_axis.first(),
            &graph.initial_state(),
            ForcingSource::Step {
                index: 0,
                table: &forcings,
            },
        )?;
        self.store.allocate_fluxes(&evaluation.fluxes)?;
        self.store.store_fluxes(0, &evaluation.fluxes)?;
        self.forcings = Some(forcings);
        info!(
            "Assembled {} equations in {} unknowns per time point",
            self.equations.len(),
            self.unknowns.width()
        );
        Ok(())
    }

    fn solve(&mut self, graph: &ModelGraph, _time_step: FloatValue) -> RSECOResult<()> {
        let time_axis = self.store.time_axis("solving")?;
        let forcings = self
            .forcings
            .take()
            .ok_or_else(|| RSECOError::Error("solver has not been assembled".to_string()))?;
        let router = self.router(graph)?;
        let times = time_axis.values();

        let mut previous = DVector::from_vec(self.unknowns.flatten(&graph.initial_state()));
        for index in 1..time_axis.len() {
            let step = StepResidual {
                router: &router,
                forcings: &forcings,
                index,
                t: times[index],
                dt: times[index] - times[index - 1],
                previous: &previous,
            };

            let mut x = previous.clone();
            let mut iterations = 0;
            let fluxes = loop {
                let (residual, fluxes) = step.evaluate(&x)?;
                let norm = residual.amax();
                if norm <= self.options.newton_tolerance * (1.0 + x.amax()) {
                    break fluxes;
                }
                if iterations == self.options.max_newton_iterations {
                    debug!(
                        "largest residual in the equation of '{}'",
                        self.worst_equation(&residual).unwrap_or("?")
                    );
                    for (label, value) in self.intermediates.iter().zip(&fluxes) {
                        if !value.iter().all(|v| v.is_finite()) {
                            debug!("intermediate '{}' is not finite", label);
                        }
                    }
                    return Err(RSECOError::NonConvergence {
                        time: step.t,
                        iterations,
                        residual: norm,
                    });
                }
                let jacobian = step.jacobian(&x, &residual)?;
                let delta = jacobian.lu().solve(&(-residual)).ok_or_else(|| {
                    RSECOError::NonConvergence {
                        time: step.t,
                        iterations,
                        residual: norm,
                    }
                })?;
                x += delta;
                iterations += 1;
            };

            self.store
                .store_state(index, &self.unknowns.unflatten(x.as_slice()))?;
            self.store.store_fluxes(index, &fluxes)?;
            previous = x;
        }
        info!("Solved {} time points", time_axis.len());
        Ok(())
    }

    fn cleanup(&mut self) -> RSECOResult<TimeseriesCollection> {
        Ok(self.store.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::example_components::{
        ExampleDecay, ExampleForcedInput, ExampleForcing, ExampleVariable,
    };
    use crate::inputs::ModelInputs;
    use crate::model::ModelBuilder;
    use is_close::is_close;

    fn register(solver: &mut AlgebraicSolver, graph: &ModelGraph, parameters: &[Parameter]) {
        for variable in graph.variables() {
            solver.add_variable(variable).unwrap();
        }
        for parameter in parameters {
            solver.add_parameter(parameter).unwrap();
        }
        for forcing in graph.forcings() {
            solver.add_forcing(forcing).unwrap();
        }
        for flux in graph.fluxes() {
            solver.register_flux(flux).unwrap();
        }
    }

    fn decay_graph() -> ModelGraph {
        let mut inputs = ModelInputs::new();
        inputs
            .set("N", "value", 5.0)
            .set("decay", "var", "N")
            .set("decay", "rate", 0.1);
        ModelBuilder::new()
            .with_component("N", Arc::new(ExampleVariable {}))
            .with_component("decay", Arc::new(ExampleDecay {}))
            .with_inputs(inputs)
            .build()
            .unwrap()
    }

    #[test]
    fn equations_read_registered_constants() {
        let graph = decay_graph();
        let time_axis = Arc::new(TimeAxis::from_range(0.0, 5.0, 0.5).unwrap());
        let mut solver = AlgebraicSolver::new(Some(time_axis), SolverOptions::default());

        // The registered rate differs from the one stored in the graph
        let parameters: Vec<Parameter> = graph
            .parameters()
            .iter()
            .map(|p| Parameter {
                label: p.label.clone(),
                value: StateValue::Scalar(0.2),
            })
            .collect();
        register(&mut solver, &graph, &parameters);
        solver.assemble(&graph).unwrap();
        solver.solve(&graph, 0.5).unwrap();

        let values = solver.cleanup().unwrap();
        let n = values.get_timeseries_by_name("N").unwrap().scalar_values();
        assert_eq!(n.len(), 11);
        for (k, value) in n.iter().enumerate() {
            let expected = 5.0 / 1.1f64.powi(k as i32);
            assert!(is_close!(*value, expected, rel_tol = 1e-8), "{}", k);
        }
    }

    #[test]
    fn equations_read_forcing_samples() {
        let mut inputs = ModelInputs::new();
        inputs
            .set("N", "value", 0.0)
            .set("supply", "forcing", 2.0)
            .set("input", "var", "N")
            .set("input", "forcing", "supply");
        let graph = ModelBuilder::new()
            .with_component("N", Arc::new(ExampleVariable {}))
            .with_component("supply", Arc::new(ExampleForcing {}))
            .with_component("input", Arc::new(ExampleForcedInput {}))
            .with_inputs(inputs)
            .build()
            .unwrap();
        let time_axis = Arc::new(TimeAxis::from_range(0.0, 4.0, 1.0).unwrap());
        let mut solver = AlgebraicSolver::new(Some(time_axis), SolverOptions::default());
        register(&mut solver, &graph, graph.parameters());
        solver.assemble(&graph).unwrap();
        solver.solve(&graph, 1.0).unwrap();

        let n = solver
            .cleanup()
            .unwrap()
            .get_timeseries_by_name("N")
            .unwrap()
            .scalar_values();
        assert!(is_close!(n[4], 8.0));
    }

    #[test]
    fn missing_parameters_are_rejected() {
        let graph = decay_graph();
        let time_axis = Arc::new(TimeAxis::from_range(0.0, 5.0, 0.5).unwrap());
        let mut solver = AlgebraicSolver::new(Some(time_axis), SolverOptions::default());
        register(&mut solver, &graph, &[]);
        assert!(matches!(
            solver.assemble(&graph),
            Err(RSECOError::Error(_))
        ));
    }
}
