mod decay;
mod exchange;
mod forcing;
mod grazing;
mod growth;
mod input;
mod mixing;
mod variables;

pub use decay::{LinearDecay, QuadraticDecay};
pub use exchange::{LinearExchange, QuadraticExchange};
pub use forcing::{ClimatologyForcing, ConstantForcing, MonthlyForcing};
pub use grazing::{GrossGrowthEfficiency, HollingTypeIIIGrazing};
pub use growth::MonodGrowth;
pub use input::LinearForcingInput;
pub use mixing::{SlabMixing, SlabUpwelling};
pub use variables::{ArrayStateVariable, StateVariable};

use rseco_core::errors::{RSECOError, RSECOResult};
use rseco_core::state::StateValue;
use rseco_core::timeseries::FloatValue;

/// Combine two arguments elementwise, broadcasting scalars
fn combine(
    flux: &str,
    a: &StateValue,
    b: &StateValue,
    f: impl Fn(FloatValue, FloatValue) -> FloatValue,
) -> RSECOResult<StateValue> {
    a.zip_with(b, f)
        .ok_or_else(|| RSECOError::FluxShapeMismatch {
            flux: flux.to_string(),
            target: "arguments".to_string(),
            expected: a.width(),
            found: b.width(),
        })
}
