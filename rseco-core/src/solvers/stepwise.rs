use crate::errors::{RSECOError, RSECOResult};
use crate::model::{Flux, Forcing, ModelGraph, Parameter, StateVariable};
use crate::router::{FluxRouter, ForcingSource, ForcingTable};
use crate::solvers::{SolverBackend, ValueStore};
use crate::state::StateValue;
use crate::timeseries::{FloatValue, TimeAxis};
use crate::timeseries_collection::TimeseriesCollection;
use is_close::is_close;
use log::{debug, info, warn};
use std::sync::Arc;

/// Forward Euler on the points of the time axis
///
/// Forcings are evaluated once per point before stepping begins.
/// The state at step `k + 1` is the state at step `k` plus `time_step` times its rate of
/// change; flux values are stored for every step, including the last.
#[derive(Debug)]
pub struct StepwiseSolver {
    store: ValueStore,
    forcings: Option<ForcingTable>,
}

/// Advance every variable by `time_step` times its rate of change
///
/// A rate must have the shape of its variable.
fn euler_step(
    variables: &[StateVariable],
    state: &[StateValue],
    rates: &[StateValue],
    time_step: FloatValue,
) -> RSECOResult<Vec<StateValue>> {
    variables
        .iter()
        .zip(state)
        .zip(rates)
        .map(|((variable, value), rate)| {
            let shape_mismatch = || RSECOError::FluxShapeMismatch {
                flux: "rate of change".to_string(),
                target: variable.label.clone(),
                expected: value.width(),
                found: rate.width(),
            };
            if value.shape() != rate.shape() {
                return Err(shape_mismatch());
            }
            value
                .zip_with(rate, |v, r| v + r * time_step)
                .ok_or_else(shape_mismatch)
        })
        .collect()
}

impl StepwiseSolver {
    pub fn new(time_axis: Option<Arc<TimeAxis>>) -> Self {
        Self {
            store: ValueStore::new(time_axis),
            forcings: None,
        }
    }
}

impl SolverBackend for StepwiseSolver {
    fn add_variable(&mut self, variable: &StateVariable) -> RSECOResult<()> {
        self.store.add_variable(variable)?;
        Ok(())
    }

    fn add_parameter(&mut self, parameter: &Parameter) -> RSECOResult<()> {
        debug!("Parameter '{}' is passed through by value", parameter.label);
        Ok(())
    }

    fn add_forcing(&mut self, forcing: &Forcing) -> RSECOResult<()> {
        self.store.add_forcing(forcing)
    }

    fn register_flux(&mut self, flux: &Flux) -> RSECOResult<()> {
        self.store.register_flux(flux)
    }

    fn assemble(&mut self, graph: &ModelGraph) -> RSECOResult<()> {
        let time_axis = self.store.time_axis("assembling the solver")?;
        let forcings = ForcingTable::precompute(graph, &time_axis);
        let router = FluxRouter::new(graph);
        let evaluation = router.evaluate(
            time_axis.first(),
            &graph.initial_state(),
            ForcingSource::Step {
                index: 0,
                table: &forcings,
            },
        )?;
        self.store.allocate_fluxes(&evaluation.fluxes)?;
        self.forcings = Some(forcings);
        Ok(())
    }

    fn solve(&mut self, graph: &ModelGraph, time_step: FloatValue) -> RSECOResult<()> {
        let time_axis = self.store.time_axis("solving")?;
        let forcings = self
            .forcings
            .take()
            .ok_or_else(|| RSECOError::Error("solver has not been assembled".to_string()))?;
        if let (Some(t0), Some(t1)) = (time_axis.at(0), time_axis.at(1)) {
            if !is_close!(t1 - t0, time_step) {
                warn!(
                    "time_step {} differs from the time axis spacing {}",
                    time_step,
                    t1 - t0
                );
            }
        }
        info!("Stepping {} time points", time_axis.len());

        let router = FluxRouter::new(graph);
        let mut state = graph.initial_state();
        for (index, t) in time_axis.values().iter().enumerate() {
            let evaluation = router.evaluate(
                *t,
                &state,
                ForcingSource::Step {
                    index,
                    table: &forcings,
                },
            )?;
            self.store.store_fluxes(index, &evaluation.fluxes)?;
            if index + 1 < time_axis.len() {
                state = euler_step(graph.variables(), &state, &evaluation.rates, time_step)?;
                self.store.store_state(index + 1, &state)?;
            }
        }
        Ok(())
    }

    fn cleanup(&mut self) -> RSECOResult<TimeseriesCollection> {
        Ok(self.store.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Shape;
    use ndarray::array;

    fn variable(label: &str, shape: Shape) -> StateVariable {
        StateVariable {
            label: label.to_string(),
            owner: label.to_string(),
            shape,
            initial_value: StateValue::zeros(shape),
        }
    }

    #[test]
    fn euler_step_advances_each_variable() {
        let variables = [variable("N", Shape::Scalar), variable("P", Shape::Vector(2))];
        let state = [StateValue::Scalar(1.0), StateValue::Array(array![1.0, 2.0])];
        let rates = [StateValue::Scalar(-0.5), StateValue::Array(array![1.0, -1.0])];
        let next = euler_step(&variables, &state, &rates, 0.5).unwrap();
        assert_eq!(next[0], StateValue::Scalar(0.75));
        assert_eq!(next[1], StateValue::Array(array![1.5, 1.5]));
    }

    #[test]
    fn euler_step_rejects_misshapen_rates() {
        let variables = [variable("P", Shape::Vector(2))];
        let state = [StateValue::Array(array![1.0, 2.0])];
        for rate in [
            StateValue::Array(array![1.0, 2.0, 3.0]),
            StateValue::Scalar(1.0),
        ] {
            match euler_step(&variables, &state, &[rate], 1.0) {
                Err(RSECOError::FluxShapeMismatch { target, expected, .. }) => {
                    assert_eq!(target, "P");
                    assert_eq!(expected, 2);
                }
                other => panic!("expected a shape mismatch, got {:?}", other),
            }
        }
    }
}
