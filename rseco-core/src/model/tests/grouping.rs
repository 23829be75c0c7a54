//! Group producers and consumers.

use crate::errors::RSECOError;
use crate::example_components::{ExampleGroupSum, ExampleGroupedLoss, ExampleVariable};
use crate::model::ModelBuilder;
use crate::router::{FluxRouter, ForcingSource};
use is_close::is_close;
use std::sync::Arc;

fn grouped_builder() -> ModelBuilder {
    let mut builder = ModelBuilder::new();
    builder
        // The consumer is declared first but initialised last
        .with_component("collect", Arc::new(ExampleGroupSum {}))
        .with_component("N", Arc::new(ExampleVariable {}))
        .with_component("P", Arc::new(ExampleVariable {}))
        .with_component("D", Arc::new(ExampleVariable {}))
        .with_component("n_loss", Arc::new(ExampleGroupedLoss {}))
        .with_component("p_loss", Arc::new(ExampleGroupedLoss {}))
        .with_input("N", "value", 2.0)
        .with_input("P", "value", 4.0)
        .with_input("D", "value", 0.0)
        .with_input("n_loss", "var", "N")
        .with_input("n_loss", "rate", 0.1)
        .with_input("p_loss", "var", "P")
        .with_input("p_loss", "rate", 0.5)
        .with_input("collect", "target", "D");
    builder
}

#[test]
fn group_collects_producers_in_order() {
    let graph = grouped_builder().build().unwrap();
    let producers = &graph.groups()["losses"];
    assert_eq!(producers.len(), 2);
    assert_eq!(graph.fluxes()[producers[0]].label, "n_loss_loss");
    assert_eq!(graph.fluxes()[producers[1]].label, "p_loss_loss");
    assert_eq!(graph.fluxes().last().unwrap().label, "collect_collect");
}

#[test]
fn grouped_fluxes_are_summed_by_consumer() {
    let graph = grouped_builder().build().unwrap();
    let router = FluxRouter::new(&graph);
    let evaluation = router
        .evaluate(0.0, &graph.initial_state(), ForcingSource::Time)
        .unwrap();

    let rate = |label: &str| evaluation.rates[graph.variable_index(label).unwrap()].sum();
    assert!(is_close!(rate("N"), -0.2));
    assert!(is_close!(rate("P"), -2.0));
    assert!(is_close!(rate("D"), 2.2));
    assert!(is_close!(rate("N") + rate("P") + rate("D"), 0.0, abs_tol = 1e-12));

    let dot = format!("{:?}", graph.as_dot());
    assert!(dot.contains("group losses"));
}

#[test]
fn group_without_producer() {
    let mut builder = ModelBuilder::new();
    builder
        .with_component("D", Arc::new(ExampleVariable {}))
        .with_component("collect", Arc::new(ExampleGroupSum {}))
        .with_input("D", "value", 0.0)
        .with_input("collect", "target", "D");
    assert!(matches!(
        builder.build(),
        Err(RSECOError::MissingGroupProducer { group, .. }) if group == "losses"
    ));
}
