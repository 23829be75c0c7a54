//! Model setups read from TOML.
//!
//! ```toml
//! solver = "odeint"
//! time = { start = 0.0, end = 100.0, step = 1.0 }
//! output_vars = ["N"]
//!
//! [[components]]
//! label = "N"
//! component = { type = "StateVariable" }
//!
//! [[components]]
//! label = "decay"
//! component = { type = "LinearDecay" }
//!
//! [inputs.N]
//! value = 5.0
//!
//! [inputs.decay]
//! var = "N"
//! rate = 0.1
//! ```

use crate::errors::{RSECOError, RSECOResult};
use crate::forcing::ClimatologyProvider;
use crate::inputs::ModelInputs;
use crate::model::{Model, ModelBuilder, C};
use crate::solvers::{SolverKind, SolverOptions};
use crate::timeseries::{FloatValue, Time, TimeAxis};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Points in time the model is solved at
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeConfig {
    Range { start: Time, end: Time, step: Time },
    Values { values: Vec<Time> },
}

impl TimeConfig {
    pub fn to_time_axis(&self) -> RSECOResult<TimeAxis> {
        match self {
            TimeConfig::Range { start, end, step } => TimeAxis::from_range(*start, *end, *step),
            TimeConfig::Values { values } => TimeAxis::from_values(Array1::from(values.clone())),
        }
    }
}

/// A labelled component instance
#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentEntry {
    pub label: String,
    pub component: C,
}

/// Everything needed to assemble and solve a model
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelSetup {
    pub solver: String,
    pub time: Option<TimeConfig>,
    /// Defaults to the spacing of the first two time points
    pub time_step: Option<FloatValue>,
    #[serde(default)]
    pub solver_options: SolverOptions,
    #[serde(default)]
    pub output_vars: Vec<String>,
    #[serde(default)]
    pub components: Vec<ComponentEntry>,
    #[serde(default)]
    pub inputs: ModelInputs,
}

impl ModelSetup {
    pub fn from_toml_str(s: &str) -> RSECOResult<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> RSECOResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            RSECOError::Config(format!("could not read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> RSECOResult<String> {
        toml::to_string(self).map_err(|e| RSECOError::Config(e.to_string()))
    }

    pub fn solver_kind(&self) -> RSECOResult<SolverKind> {
        self.solver.parse()
    }

    pub fn time_axis(&self) -> RSECOResult<TimeAxis> {
        self.time
            .as_ref()
            .ok_or_else(|| {
                RSECOError::MissingTimeAxis(format!("setting up the '{}' solver", self.solver))
            })?
            .to_time_axis()
    }

    /// The configured time step, or the spacing of the time axis
    pub fn time_step(&self) -> RSECOResult<FloatValue> {
        if let Some(step) = self.time_step {
            return Ok(step);
        }
        let time_axis = self.time_axis()?;
        match (time_axis.at(0), time_axis.at(1)) {
            (Some(t0), Some(t1)) => Ok(t1 - t0),
            _ => Ok(1.0),
        }
    }

    /// A model builder holding the configured components and inputs
    pub fn builder(&self) -> ModelBuilder {
        let mut builder = ModelBuilder::new();
        for entry in &self.components {
            builder.with_component(&entry.label, entry.component.clone());
        }
        builder.with_inputs(self.inputs.clone());
        builder
    }
}

impl Model {
    /// Assemble the model described by a setup
    pub fn from_setup(
        setup: &ModelSetup,
        provider: Option<Arc<dyn ClimatologyProvider>>,
    ) -> RSECOResult<Self> {
        let solver = setup.solver_kind()?;
        let time_axis = setup.time_axis()?;
        let mut builder = setup.builder();
        if let Some(provider) = provider {
            builder.with_climatology_provider(provider);
        }
        let mut model = Model::new(builder.build()?, solver, time_axis);
        model
            .with_solver_options(setup.solver_options)
            .with_output_vars(setup.output_vars.clone());
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;

    const SETUP: &str = r#"
        solver = "stepwise"
        time = { start = 0.0, end = 10.0, step = 0.5 }
        output_vars = ["N"]

        [solver_options]
        rtol = 1e-6

        [[components]]
        label = "N"
        component = { type = "ExampleVariable" }

        [[components]]
        label = "decay"
        component = { type = "ExampleDecay" }

        [inputs.N]
        value = 5.0

        [inputs.decay]
        var = "N"
        rate = 0.1
    "#;

    #[test]
    fn read_setup() {
        let setup = ModelSetup::from_toml_str(SETUP).unwrap();
        assert_eq!(setup.solver_kind().unwrap(), SolverKind::Stepwise);
        assert_eq!(setup.time_axis().unwrap().len(), 21);
        assert_eq!(setup.time_step().unwrap(), 0.5);
        assert_eq!(setup.solver_options.rtol, 1e-6);
        assert_eq!(
            setup.solver_options.max_newton_iterations,
            SolverOptions::default().max_newton_iterations
        );
        assert_eq!(setup.components.len(), 2);
        assert_eq!(setup.components[1].label, "decay");
    }

    #[test]
    fn write_and_read_back() {
        let setup = ModelSetup::from_toml_str(SETUP).unwrap();
        let written = setup.to_toml_string().unwrap();
        let restored = ModelSetup::from_toml_str(&written).unwrap();
        assert_eq!(restored.solver, "stepwise");
        assert_eq!(restored.time, setup.time);
        assert_eq!(restored.inputs, setup.inputs);
        assert_eq!(
            restored.components[1].component.descriptor(),
            setup.components[1].component.descriptor()
        );
    }

    #[test]
    fn missing_file_is_a_config_error() {
        assert!(matches!(
            ModelSetup::from_toml_file("does/not/exist.toml"),
            Err(RSECOError::Config(_))
        ));
    }

    #[test]
    fn solve_from_setup() {
        let setup = ModelSetup::from_toml_str(SETUP).unwrap();
        let mut model = Model::from_setup(&setup, None).unwrap();
        let values = model.solve(setup.time_step().unwrap()).unwrap();
        assert_eq!(values.len(), 1);
        let n = values.get_timeseries_by_name("N").unwrap().scalar_values();
        assert_eq!(n[0], 5.0);
        assert!(n[20] < 5.0);
    }

    #[test]
    fn explicit_time_values() {
        let setup = ModelSetup::from_toml_str(
            r#"
            solver = "odeint"
            time = { values = [0.0, 1.0, 3.0] }
            "#,
        )
        .unwrap();
        assert_eq!(setup.time_axis().unwrap().last(), 3.0);
        assert_eq!(setup.time_step().unwrap(), 1.0);
    }

    #[test]
    fn unknown_solver_and_missing_time() {
        let setup = ModelSetup::from_toml_str(r#"solver = "euler""#).unwrap();
        assert!(matches!(
            setup.solver_kind(),
            Err(RSECOError::UnknownSolver(_))
        ));
        assert!(matches!(
            setup.time_axis(),
            Err(RSECOError::MissingTimeAxis(_))
        ));
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        assert!(matches!(
            ModelSetup::from_toml_str("solver = "),
            Err(RSECOError::Config(_))
        ));
    }
}
