//! Reusable components for NPZD-style marine ecosystem models
//!
//! Components are organised by what they contribute to a model:
//! - `variables`: owners of state variables
//! - `forcing`: constant, monthly and climatological forcings
//! - `decay`, `exchange`, `input`: first and second order transfers between pools
//! - `growth`: nutrient limited growth
//! - `grazing`: grazing on a list of resources and the partitioning of what was grazed
//! - `mixing`: exchange between a slab mixed layer and the water below it
//!
//! Every component is registered with `typetag`, so model setups can name them in TOML
//! (`component = { type = "LinearDecay" }`).

pub mod components;

pub use components::*;
