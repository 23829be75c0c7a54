pub mod component;
pub mod config;
pub mod dimensions;
#[cfg(test)]
mod example_components;
pub mod forcing;
pub mod inputs;
pub mod ivp;
pub mod model;
pub mod router;
pub mod solvers;
pub mod state;
pub mod timeseries;
pub mod timeseries_collection;

pub mod errors;
