//! Composable flux-based models of marine ecosystems
//!
//! A model is assembled from small components (state variables, forcings and processes such
//! as growth, grazing or mixing), each declaring its own fields and fluxes.
//! The assembled model is solved with one of three backends:
//! `odeint` (adaptive Dormand-Prince), `stepwise` (forward Euler) or `gekko` (implicit Euler
//! solved with Newton's method).
//!
//! Models can be built in code with [`model::ModelBuilder`] or read from TOML with
//! [`config::ModelSetup`].

pub use rseco_components as components;
pub use rseco_core::{
    component, config, dimensions, errors, forcing, inputs, ivp, model, router, solvers, state,
    timeseries, timeseries_collection,
};

/// The types needed to set up and solve a model
pub mod prelude {
    pub use rseco_core::component::{
        Component, ComponentDescriptor, FieldDefinition, FluxDefinition, InitStage,
    };
    pub use rseco_core::config::ModelSetup;
    pub use rseco_core::errors::{RSECOError, RSECOResult};
    pub use rseco_core::forcing::{ClimatologyProvider, ClimatologyRequest};
    pub use rseco_core::inputs::ModelInputs;
    pub use rseco_core::model::{setup, Model, ModelBuilder};
    pub use rseco_core::router::FluxArguments;
    pub use rseco_core::state::StateValue;
    pub use rseco_core::timeseries::{FloatValue, TimeAxis};
    pub use rseco_core::timeseries_collection::{TimeseriesCollection, VariableType};
}
