//! Model builder for assembling a model graph from component instances.

use crate::component::{ComponentDescriptor, FieldDefinition, FieldKind, Ownership};
use crate::dimensions::{list_width, DimensionResolver, ShapeSource};
use crate::errors::{RSECOError, RSECOResult};
use crate::forcing::{ClimatologyProvider, ForcingContext};
use crate::inputs::{InputValue, ModelInputs};
use crate::state::Shape;
use log::{debug, info};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use super::graph::{
    ArgumentBinding, ArgumentSource, Flux, FluxRoutingTable, Forcing, ModelGraph, Parameter,
    Route, RouteKind, StateVariable,
};
use super::types::C;
use super::validation::{build_dependency_graph, validate_groups, warn_unrouted_variables};

/// Labels of owned quantities with the instance that will create them
#[derive(Default)]
struct PendingOwners {
    variables: HashMap<String, String>,
    forcings: HashMap<String, String>,
    fluxes: HashMap<String, String>,
}

/// Model-wide label of an owned variable or forcing
///
/// A component owning a single quantity of a kind lends it its instance label, otherwise the
/// label is `<instance>_<field>`.
pub(crate) fn owned_label(
    instance: &str,
    descriptor: &ComponentDescriptor,
    field: &FieldDefinition,
) -> String {
    let same_kind = descriptor
        .fields
        .iter()
        .filter(|f| f.kind == field.kind)
        .count();
    if same_kind == 1 {
        instance.to_string()
    } else {
        format!("{}_{}", instance, field.name)
    }
}

/// Model-wide label of a parameter or flux
pub(crate) fn scoped_label(instance: &str, name: &str) -> String {
    format!("{}_{}", instance, name)
}

/// Build a model graph from a set of component instances.
///
/// Components are initialised in ascending stage, and in insertion order within a stage.
/// Each component creates the quantities it owns, resolves the labels it references and
/// registers its fluxes.
/// Flux evaluation order follows the same ordering.
#[derive(Debug, Default, Clone)]
pub struct ModelBuilder {
    components: Vec<(String, C)>,
    inputs: ModelInputs,
    provider: Option<Arc<dyn ClimatologyProvider>>,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component instance under a unique label
    pub fn with_component(&mut self, label: &str, component: C) -> &mut Self {
        self.components.push((label.to_string(), component));
        self
    }

    /// Supply the input values of the component instances
    ///
    /// Can be called several times, later values replace earlier ones.
    pub fn with_inputs(&mut self, inputs: ModelInputs) -> &mut Self {
        self.inputs.extend(inputs);
        self
    }

    pub fn with_input(
        &mut self,
        component: &str,
        field: &str,
        value: impl Into<InputValue>,
    ) -> &mut Self {
        self.inputs.set(component, field, value);
        self
    }

    /// Register the source used by components which read climatological forcings
    pub fn with_climatology_provider(
        &mut self,
        provider: Arc<dyn ClimatologyProvider>,
    ) -> &mut Self {
        self.provider = Some(provider);
        self
    }

    /// Assemble the model graph
    ///
    /// Returns an error if the components or their inputs are inconsistent.
    pub fn build(&self) -> RSECOResult<ModelGraph> {
        let mut seen = HashSet::new();
        for (label, _) in &self.components {
            if !seen.insert(label.as_str()) {
                return Err(RSECOError::DuplicateLabel(label.clone()));
            }
        }

        let descriptors = self
            .components
            .iter()
            .map(|(label, component)| {
                let descriptor = component.descriptor();
                descriptor.validate(label)?;
                Ok(descriptor)
            })
            .collect::<RSECOResult<Vec<_>>>()?;

        // Stable, so insertion order is kept within a stage
        let mut order: Vec<usize> = (0..self.components.len()).collect();
        order.sort_by_key(|i| descriptors[*i].stage);

        let pending = self.pending_owners(&descriptors);
        let mut assembler = Assembler::new(self.provider.as_deref(), &pending);
        for index in order {
            let (label, component) = &self.components[index];
            assembler.add_component(label, component, &descriptors[index], &self.inputs)?;
        }
        let graph = assembler.finish()?;

        info!(
            "Assembled model with {} state variables, {} parameters, {} forcings and {} fluxes",
            graph.variables.len(),
            graph.parameters.len(),
            graph.forcings.len(),
            graph.fluxes.len()
        );
        Ok(graph)
    }

    fn pending_owners(&self, descriptors: &[ComponentDescriptor]) -> PendingOwners {
        let mut pending = PendingOwners::default();
        for ((label, _), descriptor) in self.components.iter().zip(descriptors) {
            for field in &descriptor.fields {
                match field.kind {
                    FieldKind::Variable(Ownership::Owned) => {
                        pending
                            .variables
                            .insert(owned_label(label, descriptor, field), label.clone());
                    }
                    FieldKind::Forcing(Ownership::Owned) => {
                        pending
                            .forcings
                            .insert(owned_label(label, descriptor, field), label.clone());
                    }
                    _ => {}
                }
            }
            for flux in &descriptor.fluxes {
                pending
                    .fluxes
                    .insert(scoped_label(label, &flux.name), label.clone());
            }
        }
        pending
    }
}

/// Mutable state while components are being initialised
struct Assembler<'a> {
    provider: Option<&'a dyn ClimatologyProvider>,
    pending: &'a PendingOwners,
    variables: Vec<StateVariable>,
    parameters: Vec<Parameter>,
    forcings: Vec<Forcing>,
    fluxes: Vec<Flux>,
    routing: FluxRoutingTable,
    groups: BTreeMap<String, Vec<usize>>,
    dims: DimensionResolver,
}

impl<'a> Assembler<'a> {
    fn new(provider: Option<&'a dyn ClimatologyProvider>, pending: &'a PendingOwners) -> Self {
        Self {
            provider,
            pending,
            variables: vec![],
            parameters: vec![],
            forcings: vec![],
            fluxes: vec![],
            routing: FluxRoutingTable::default(),
            groups: BTreeMap::new(),
            dims: DimensionResolver::new(),
        }
    }

    fn check_unique(&self, label: &str) -> RSECOResult<()> {
        let taken = self.variables.iter().any(|v| v.label == label)
            || self.parameters.iter().any(|p| p.label == label)
            || self.forcings.iter().any(|f| f.label == label)
            || self.fluxes.iter().any(|f| f.label == label);
        if taken {
            return Err(RSECOError::DuplicateLabel(label.to_string()));
        }
        Ok(())
    }

    /// Error for a label which cannot be found among the quantities created so far
    fn unresolved(
        component: &str,
        field: &str,
        label: &str,
        owners: &HashMap<String, String>,
    ) -> RSECOError {
        match owners.get(label) {
            Some(owner) => RSECOError::NotYetInitialised {
                component: component.to_string(),
                field: field.to_string(),
                label: label.to_string(),
                owner: owner.clone(),
            },
            None => RSECOError::UnknownLabel {
                component: component.to_string(),
                field: field.to_string(),
                label: label.to_string(),
            },
        }
    }

    fn lookup_variable(&self, component: &str, field: &str, label: &str) -> RSECOResult<usize> {
        self.variables
            .iter()
            .position(|v| v.label == label)
            .ok_or_else(|| Self::unresolved(component, field, label, &self.pending.variables))
    }

    fn add_component(
        &mut self,
        instance: &str,
        component: &C,
        descriptor: &ComponentDescriptor,
        inputs: &ModelInputs,
    ) -> RSECOResult<()> {
        debug!(
            "Initialising '{}' ({:?}) at stage {:?}",
            instance, component, descriptor.stage
        );
        let inputs = inputs.for_component(instance);
        let context = ForcingContext::new(self.provider);
        let mut bindings = Vec::with_capacity(descriptor.fields.len());

        for field in &descriptor.fields {
            let axis = field.dims.as_deref();
            let source = match field.kind {
                FieldKind::Variable(Ownership::Owned) => {
                    let label = owned_label(instance, descriptor, field);
                    self.check_unique(&label)?;
                    let value = inputs.value(&field.name)?;
                    let shape = self.dims.resolve(&label, ShapeSource::Value(&value), axis)?;
                    self.variables.push(StateVariable {
                        label,
                        owner: instance.to_string(),
                        shape,
                        initial_value: value,
                    });
                    self.routing.add_variable();
                    ArgumentSource::Variable(self.variables.len() - 1)
                }
                FieldKind::Variable(Ownership::Foreign) if field.list_input => {
                    let members = inputs
                        .labels(&field.name)?
                        .into_iter()
                        .map(|label| self.lookup_variable(instance, &field.name, label))
                        .collect::<RSECOResult<Vec<_>>>()?;
                    if let Some(axis) = axis {
                        let shapes: Vec<Shape> =
                            members.iter().map(|i| self.variables[*i].shape).collect();
                        self.dims.register_axis(
                            axis,
                            &scoped_label(instance, &field.name),
                            list_width(&shapes),
                        )?;
                    }
                    ArgumentSource::VariableList(members)
                }
                FieldKind::Variable(Ownership::Foreign) => {
                    let label = inputs.label(&field.name)?;
                    let index = self.lookup_variable(instance, &field.name, label)?;
                    if let (Some(axis), Shape::Vector(n)) = (axis, self.variables[index].shape) {
                        self.dims.register_axis(axis, label, n)?;
                    }
                    ArgumentSource::Variable(index)
                }
                FieldKind::Parameter => {
                    let label = scoped_label(instance, &field.name);
                    self.check_unique(&label)?;
                    let value = inputs.value(&field.name)?;
                    self.dims.resolve(&label, ShapeSource::Value(&value), axis)?;
                    self.parameters.push(Parameter { label, value });
                    ArgumentSource::Parameter(self.parameters.len() - 1)
                }
                FieldKind::Forcing(Ownership::Owned) => {
                    let label = owned_label(instance, descriptor, field);
                    self.check_unique(&label)?;
                    let function = component.setup_forcing(&field.name, &inputs, &context)?;
                    self.dims
                        .resolve(&label, ShapeSource::Hint(function.shape()), axis)?;
                    self.forcings.push(Forcing {
                        label,
                        owner: instance.to_string(),
                        function,
                    });
                    ArgumentSource::Forcing(self.forcings.len() - 1)
                }
                FieldKind::Forcing(Ownership::Foreign) => {
                    let label = inputs.label(&field.name)?;
                    let index = self
                        .forcings
                        .iter()
                        .position(|f| f.label == label)
                        .ok_or_else(|| {
                            Self::unresolved(instance, &field.name, label, &self.pending.forcings)
                        })?;
                    ArgumentSource::Forcing(index)
                }
                FieldKind::FluxOutput => {
                    let label = inputs.label(&field.name)?;
                    let index = self
                        .fluxes
                        .iter()
                        .position(|f| f.label == label)
                        .ok_or_else(|| {
                            Self::unresolved(instance, &field.name, label, &self.pending.fluxes)
                        })?;
                    ArgumentSource::Flux(index)
                }
            };
            bindings.push(ArgumentBinding {
                name: field.name.clone(),
                source,
            });
        }

        let first_flux = self.fluxes.len();
        for flux in &descriptor.fluxes {
            let label = scoped_label(instance, &flux.name);
            self.check_unique(&label)?;
            if let Some(group) = &flux.group {
                self.groups
                    .entry(group.clone())
                    .or_default()
                    .push(self.fluxes.len());
            }
            self.fluxes.push(Flux {
                label,
                owner: instance.to_string(),
                name: flux.name.clone(),
                component: component.clone(),
                arguments: bindings.clone(),
                dims: flux.dims.clone(),
                group: flux.group.clone(),
                group_to_arg: flux.group_to_arg.clone(),
            });
        }

        for (field, binding) in descriptor.fields.iter().zip(&bindings) {
            for route in &field.routes {
                // Validated against the descriptor, so the flux exists
                let flux = first_flux
                    + descriptor
                        .fluxes
                        .iter()
                        .position(|f| f.name == route.flux)
                        .unwrap_or_default();
                match &binding.source {
                    ArgumentSource::Variable(variable) => self.routing.add_route(
                        *variable,
                        Route {
                            flux,
                            sign: route.sign,
                            kind: RouteKind::Direct,
                        },
                    ),
                    ArgumentSource::VariableList(members) => {
                        for (position, variable) in members.iter().enumerate() {
                            self.routing.add_route(
                                *variable,
                                Route {
                                    flux,
                                    sign: route.sign,
                                    kind: RouteKind::ListMember {
                                        position,
                                        members: members.clone(),
                                    },
                                },
                            );
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> RSECOResult<ModelGraph> {
        validate_groups(&self.fluxes, &self.groups)?;
        let dependencies = build_dependency_graph(&self.fluxes, &self.groups)?;
        let graph = ModelGraph {
            variables: self.variables,
            parameters: self.parameters,
            forcings: self.forcings,
            fluxes: self.fluxes,
            routing: self.routing,
            groups: self.groups,
            dims: self.dims,
            dependencies,
            values: None,
        };
        warn_unrouted_variables(&graph);
        Ok(graph)
    }
}
