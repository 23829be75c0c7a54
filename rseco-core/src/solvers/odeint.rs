use crate::errors::{RSECOError, RSECOResult};
use crate::ivp::{FlatState, IVPBuilder, IVP};
use crate::model::{Flux, Forcing, ModelGraph, Parameter, StateVariable};
use crate::router::{FluxRouter, ForcingSource};
use crate::solvers::{SolverBackend, SolverOptions, ValueStore};
use crate::state::{StateLayout, StateValue};
use crate::timeseries::{FloatValue, Time, TimeAxis};
use crate::timeseries_collection::TimeseriesCollection;
use log::{debug, info};
use std::cell::RefCell;
use std::sync::Arc;

/// Right hand side of the model with the running integral of every flux appended to the state
///
/// Integrating the fluxes alongside the state lets flux values be recovered on the time axis
/// without evaluating the router again.
struct AugmentedSystem<'a> {
    router: FluxRouter<'a>,
    flux_layout: StateLayout,
    /// First error raised while evaluating, the steppers cannot propagate it
    error: RefCell<Option<RSECOError>>,
}

impl AugmentedSystem<'_> {
    fn state_width(&self) -> usize {
        self.router.layout().width()
    }

    fn evaluate(&self, t: Time, y: &FlatState) -> RSECOResult<Vec<FloatValue>> {
        let width = self.state_width();
        let (fluxes, mut rates) =
            self.router
                .evaluate_flat(t, &y.as_slice()[..width], ForcingSource::Time)?;
        let flux_rates = self.flux_layout.flatten(&fluxes);
        if flux_rates.len() != self.flux_layout.width() {
            return Err(RSECOError::Error(format!(
                "flux outputs changed width at t={t}: expected {}, found {}",
                self.flux_layout.width(),
                flux_rates.len()
            )));
        }
        rates.extend(flux_rates);
        Ok(rates)
    }

    fn take_error(&self) -> Option<RSECOError> {
        self.error.borrow_mut().take()
    }
}

impl IVP<Time, FlatState> for AugmentedSystem<'_> {
    fn calculate_dy_dt(&self, t: Time, y: &FlatState, dy_dt: &mut FlatState) {
        match self.evaluate(t, y) {
            Ok(rates) => rates
                .iter()
                .enumerate()
                .for_each(|(i, rate)| dy_dt[i] = *rate),
            Err(err) => {
                self.error.borrow_mut().get_or_insert(err);
                dy_dt.fill(FloatValue::NAN);
            }
        }
    }
}

/// Adaptive explicit integration (Dormand-Prince) between consecutive points of the time axis
#[derive(Debug)]
pub struct ExplicitOdeSolver {
    options: SolverOptions,
    store: ValueStore,
    flux_layout: Option<StateLayout>,
}

impl ExplicitOdeSolver {
    pub fn new(time_axis: Option<Arc<TimeAxis>>, options: SolverOptions) -> Self {
        Self {
            options,
            store: ValueStore::new(time_axis),
            flux_layout: None,
        }
    }
}

impl SolverBackend for ExplicitOdeSolver {
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
        let router = FluxRouter::new(graph);
        let t0 = time_axis.first();
        let evaluation = router.evaluate(t0, &graph.initial_state(), ForcingSource::Time)?;
        let shapes = self.store.allocate_fluxes(&evaluation.fluxes)?;
        self.store.store_fluxes(0, &evaluation.fluxes)?;
        self.flux_layout = Some(StateLayout::from_shapes(shapes));
        Ok(())
    }

    fn solve(&mut self, graph: &ModelGraph, time_step: FloatValue) -> RSECOResult<()> {
        let time_axis = self.store.time_axis("solving")?;
        let flux_layout = self
            .flux_layout
            .clone()
            .ok_or_else(|| RSECOError::Error("solver has not been assembled".to_string()))?;
        let system = Arc::new(AugmentedSystem {
            router: FluxRouter::new(graph),
            flux_layout,
            error: RefCell::new(None),
        });
        let state_width = system.state_width();
        let flux_width = system.flux_layout.width();

        info!(
            "Integrating {} state values and {} flux integrals over {} time points",
            state_width,
            flux_width,
            time_axis.len()
        );

        let mut initial = system.router.layout().flatten(&graph.initial_state());
        initial.resize(state_width + flux_width, 0.0);
        let mut y = FlatState::from_vec(initial);

        let times = time_axis.values();
        for (index, window) in times
            .iter()
            .zip(times.iter().skip(1))
            .enumerate()
        {
            let (t0, t1) = (*window.0, *window.1);
            let previous = y.clone();
            let result = IVPBuilder::new(system.clone(), y).integrate_dopri5(
                t0,
                t1,
                self.options.rtol,
                self.options.atol,
            );
            if let Some(err) = system.take_error() {
                return Err(err);
            }
            y = result?;

            let values = y.as_slice();
            let state = system.router.layout().unflatten(&values[..state_width]);
            self.store.store_state(index + 1, &state)?;

            // Flux magnitudes from the change in their integrals over the step
            let fluxes: Vec<FloatValue> = values[state_width..]
                .iter()
                .zip(previous.as_slice()[state_width..].iter())
                .map(|(current, last)| (current - last) / time_step)
                .collect();
            let fluxes: Vec<StateValue> = system.flux_layout.unflatten(&fluxes);
            self.store.store_fluxes(index + 1, &fluxes)?;
        }
        info!("Integration finished at t={}", time_axis.last());
        Ok(())
    }

    fn cleanup(&mut self) -> RSECOResult<TimeseriesCollection> {
        Ok(self.store.take())
    }
}
