//! Initial value problems solved with `ode_solvers`.
//!
//! [`IVP`] is the right hand side of a system of ordinary differential equations.
//! [`IVPBuilder`] adapts it to the `ode_solvers` steppers and integrates one segment at a time.

use crate::errors::{RSECOError, RSECOResult};
use crate::timeseries::{FloatValue, Time};
use is_close::is_close;
use ode_solvers::dop_shared::{SolverResult, System};
use nalgebra::DVector;
use ode_solvers::{Dopri5, Rk4};
use std::sync::Arc;

/// Flat state vector passed to the steppers
pub type FlatState = DVector<FloatValue>;

pub trait IVP<T, S> {
    fn calculate_dy_dt(&self, t: T, y: &S, dy_dt: &mut S);
}

pub struct IVPBuilder<C, S> {
    component: Arc<C>,
    pub y0: S,
}

impl<C, S> System<Time, S> for IVPBuilder<C, S>
where
    C: IVP<Time, S>,
{
    fn system(&self, t: Time, y: &S, dy: &mut S) {
        self.component.calculate_dy_dt(t, y, dy)
    }
}

impl<C> IVPBuilder<C, FlatState>
where
    C: IVP<Time, FlatState>,
{
    pub fn new(component: Arc<C>, y0: FlatState) -> Self {
        Self { component, y0 }
    }

    /// Integrate from `t0` to `t1` with an adaptive Dormand-Prince stepper
    pub fn integrate_dopri5(
        self,
        t0: Time,
        t1: Time,
        rtol: FloatValue,
        atol: FloatValue,
    ) -> RSECOResult<FlatState> {
        let y0 = self.y0.clone();
        // A zero output step records every accepted step, the last one lands on `t1`
        let mut solver = Dopri5::new(self, t0, t1, 0.0, y0, rtol, atol);
        solver
            .integrate()
            .map_err(|e| RSECOError::IntegrationFailed {
                time: t0,
                reason: format!("{:?}", e),
            })?;
        get_last_step(solver.results(), t1).cloned()
    }

    /// Integrate from `t0` to `t1` with a fixed step fourth order Runge-Kutta stepper
    pub fn integrate_rk4(self, t0: Time, t1: Time, step: Time) -> RSECOResult<FlatState> {
        let y0 = self.y0.clone();
        let mut solver = Rk4::new(self, t0, y0, t1, step);
        solver
            .integrate()
            .map_err(|e| RSECOError::IntegrationFailed {
                time: t0,
                reason: format!("{:?}", e),
            })?;
        get_last_step(solver.results(), t1).cloned()
    }
}

/// The state at the end of an integration
///
/// The last output of the stepper must lie at `t_expected`.
pub fn get_last_step<S>(results: &SolverResult<Time, S>, t_expected: Time) -> RSECOResult<&S> {
    let (t, y) = results.get();
    match (t.last(), y.last()) {
        (Some(t_last), Some(y_last)) if is_close!(*t_last, t_expected, abs_tol = 1e-9) => {
            Ok(y_last)
        }
        (t_last, _) => Err(RSECOError::IntegrationFailed {
            time: t_expected,
            reason: format!("integration stopped at {:?}", t_last),
        }),
    }
}
