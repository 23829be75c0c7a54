//! Components defined outside the library take part in models like the built-in ones.

use is_close::is_close;
use rseco::prelude::*;
use serde::{Deserialize, Serialize};

/// Sinking out of a mixed layer of fixed depth at a configured speed
#[derive(Debug, Serialize, Deserialize)]
struct Sinking {
    /// unit: m / d
    speed: FloatValue,
}

#[typetag::serde]
impl Component for Sinking {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(InitStage::Process)
            .with_field(FieldDefinition::foreign_variable("var").with_negative_flux("sinking"))
            .with_field(FieldDefinition::parameter("depth"))
            .with_flux(FluxDefinition::new("sinking"))
    }

    fn calculate_flux(&self, _flux: &str, args: &FluxArguments) -> RSECOResult<StateValue> {
        let rate = self.speed / args.scalar("depth")?;
        Ok(args.value("var")?.map(|v| v * rate))
    }
}

const SETUP: &str = r#"
solver = "odeint"
time = { start = 0.0, end = 10.0, step = 1.0 }

[[components]]
label = "D"
component = { type = "ArrayStateVariable" }

[[components]]
label = "sinking"
component = { type = "Sinking", speed = 5.0 }

[inputs.D]
value = [1.0, 2.0]

[inputs.sinking]
var = "D"
depth = 50.0
"#;

#[test]
fn custom_component_from_toml() {
    let setup = ModelSetup::from_toml_str(SETUP).unwrap();
    let mut model = Model::from_setup(&setup, None).unwrap();
    let values = model.solve(1.0).unwrap();

    let detritus = values.get_timeseries_by_name("D").unwrap().values();
    assert_eq!(detritus.ncols(), 2);
    for (k, row) in detritus.rows().into_iter().enumerate() {
        let decay = (-0.1 * k as FloatValue).exp();
        assert!(is_close!(row[0], decay, rel_tol = 1e-6));
        assert!(is_close!(row[1], 2.0 * decay, rel_tol = 1e-6));
    }

    let sinking = values.get_by_name("sinking_sinking").unwrap();
    assert_eq!(sinking.variable_type, VariableType::Flux);
    assert!(is_close!(sinking.timeseries.values()[[0, 1]], 0.2));
}

#[test]
fn custom_component_in_code() {
    let mut builder = ModelBuilder::new();
    builder
        .with_component("D", std::sync::Arc::new(rseco::components::StateVariable {}))
        .with_component("sinking", std::sync::Arc::new(Sinking { speed: 1.0 }))
        .with_input("D", "value", 4.0)
        .with_input("sinking", "var", "D")
        .with_input("sinking", "depth", 10.0);

    let time = TimeAxis::from_range(0.0, 5.0, 0.5).unwrap();
    let mut model = setup("gekko", &builder, ModelInputs::new(), &["D"], Some(time)).unwrap();
    let d = model
        .solve(0.5)
        .unwrap()
        .get_timeseries_by_name("D")
        .unwrap()
        .scalar_values();
    // Implicit Euler: D[k] = D0 / (1 + r dt)^k
    assert!(is_close!(d[10], 4.0 / 1.05f64.powi(10), rel_tol = 1e-8));
}
