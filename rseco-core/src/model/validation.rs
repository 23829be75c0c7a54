//! Validation functions for model building.

use crate::errors::{RSECOError, RSECOResult};
use log::warn;
use petgraph::algo::toposort;
use std::collections::BTreeMap;

use super::graph::{ArgumentSource, Dependency, Flux, FluxGraph, ModelGraph};

/// Every flux consuming a group needs at least one flux producing into it
pub(crate) fn validate_groups(
    fluxes: &[Flux],
    groups: &BTreeMap<String, Vec<usize>>,
) -> RSECOResult<()> {
    for flux in fluxes {
        if let Some(group) = &flux.group_to_arg {
            let has_producer = groups.get(group).is_some_and(|p| !p.is_empty());
            if !has_producer {
                return Err(RSECOError::MissingGroupProducer {
                    flux: flux.label.clone(),
                    group: group.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Build the graph of evaluation dependencies between fluxes
///
/// Fluxes are evaluated in declaration order, so every dependency has to point forward.
/// A producer registered after one of its consumers, or a cycle, is an error.
pub(crate) fn build_dependency_graph(
    fluxes: &[Flux],
    groups: &BTreeMap<String, Vec<usize>>,
) -> RSECOResult<FluxGraph> {
    let mut graph = FluxGraph::new();
    let nodes: Vec<_> = fluxes
        .iter()
        .map(|f| graph.add_node(f.label.clone()))
        .collect();

    for (consumer, flux) in fluxes.iter().enumerate() {
        let mut producers = vec![];
        if let Some(group) = &flux.group_to_arg {
            for producer in groups.get(group).into_iter().flatten() {
                producers.push((*producer, Dependency::Group(group.clone())));
            }
        }
        for binding in &flux.arguments {
            if let ArgumentSource::Flux(producer) = binding.source {
                producers.push((producer, Dependency::Reference(binding.name.clone())));
            }
        }

        for (producer, dependency) in producers {
            if producer >= consumer {
                return Err(RSECOError::EvaluationOrder {
                    consumer: flux.label.clone(),
                    producer: fluxes[producer].label.clone(),
                });
            }
            graph.add_edge(nodes[producer], nodes[consumer], dependency);
        }
    }

    toposort(&graph, None).map_err(|cycle| RSECOError::EvaluationOrder {
        consumer: graph[cycle.node_id()].clone(),
        producer: graph[cycle.node_id()].clone(),
    })?;
    Ok(graph)
}

/// A state variable nothing routes into keeps its initial value
pub(crate) fn warn_unrouted_variables(graph: &ModelGraph) {
    for (index, variable) in graph.variables().iter().enumerate() {
        if graph.routing().routes(index).is_empty() {
            warn!(
                "State variable '{}' has no fluxes and will stay at its initial value",
                variable.label
            );
        }
    }
}
