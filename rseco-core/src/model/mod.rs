//! A model is a set of component instances assembled into one system of coupled ODEs.
//!
//! The builder initialises every component in stage order, resolving the labels each one
//! references and routing each flux into the state variables it changes.
//! The result is a frozen [`ModelGraph`]: its topology never changes, only the value store
//! written back by a solver.
//! [`Model`] pairs a graph with a solver backend and a time axis.

mod builder;
mod graph;
mod runtime;
mod types;
mod validation;

#[cfg(test)]
mod tests;

// Public re-exports
pub use builder::ModelBuilder;
pub use graph::{
    ArgumentBinding, ArgumentSource, Dependency, Flux, FluxGraph, FluxRoutingTable, Forcing,
    ModelGraph, Parameter, Route, RouteKind, StateVariable,
};
pub use runtime::{setup, Model};
pub use types::C;
