//! Components are the building blocks of a model.
//!
//! A component is authored in isolation.
//! It declares typed fields (state variables, parameters, forcings and references to other
//! fluxes) and the fluxes it computes, using only its own local field names.
//! The model builder resolves those names to concrete model quantities.

use crate::errors::{RSECOError, RSECOResult};
use crate::forcing::{ForcingContext, ForcingFunction};
use crate::inputs::ComponentInputs;
use crate::router::FluxArguments;
use crate::state::StateValue;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Debug;

/// Ordinal controlling the order in which components are initialised
///
/// Components are initialised in ascending stage and, within a stage, in the order they
/// were added to the model.
/// A component may only reference quantities owned by components initialised before it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum InitStage {
    /// Components which own the state variables referenced by others
    Label = 1,
    /// Components which own forcings
    Forcing = 2,
    /// Ordinary fluxes
    Process = 3,
    /// Fluxes which consume the grouped outputs of `Process` fluxes
    GroupConsumer = 4,
}

/// Whether a field creates a new quantity or points at one owned elsewhere
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ownership {
    /// The component creates the quantity from its input value
    Owned,
    /// The input value is the label of a quantity owned by another component
    Foreign,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    Variable(Ownership),
    Parameter,
    Forcing(Ownership),
    /// A reference to the value of a flux computed by another component
    FluxOutput,
}

/// Direction in which a flux contributes to a state variable
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sign {
    Positive,
    Negative,
}

impl Sign {
    pub fn from_negative(negative: bool) -> Self {
        if negative {
            Sign::Negative
        } else {
            Sign::Positive
        }
    }

    pub fn factor(&self) -> f64 {
        match self {
            Sign::Positive => 1.0,
            Sign::Negative => -1.0,
        }
    }
}

/// Routes the value of one of the component's fluxes into the variable(s) held by a field
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FluxRoute {
    pub flux: String,
    pub sign: Sign,
}

/// A typed field of a component
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub kind: FieldKind,
    /// Name of the logical axis this field is array valued along
    pub dims: Option<String>,
    pub routes: Vec<FluxRoute>,
    /// The field holds a list of foreign variables which are stacked into a single argument
    pub list_input: bool,
    pub description: String,
}

impl FieldDefinition {
    fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            dims: None,
            routes: vec![],
            list_input: false,
            description: String::new(),
        }
    }

    /// A state variable created and owned by this component
    pub fn owned_variable(name: &str) -> Self {
        Self::new(name, FieldKind::Variable(Ownership::Owned))
    }

    /// A state variable owned by another component, referenced by label
    pub fn foreign_variable(name: &str) -> Self {
        Self::new(name, FieldKind::Variable(Ownership::Foreign))
    }

    pub fn parameter(name: &str) -> Self {
        Self::new(name, FieldKind::Parameter)
    }

    pub fn owned_forcing(name: &str) -> Self {
        Self::new(name, FieldKind::Forcing(Ownership::Owned))
    }

    pub fn foreign_forcing(name: &str) -> Self {
        Self::new(name, FieldKind::Forcing(Ownership::Foreign))
    }

    /// The value of a flux computed by another component
    pub fn flux_output(name: &str) -> Self {
        Self::new(name, FieldKind::FluxOutput)
    }

    pub fn with_dims(mut self, axis: &str) -> Self {
        self.dims = Some(axis.to_string());
        self
    }

    /// Add the value of `flux` to the variable(s) held by this field
    pub fn with_flux(mut self, flux: &str) -> Self {
        self.routes.push(FluxRoute {
            flux: flux.to_string(),
            sign: Sign::Positive,
        });
        self
    }

    /// Subtract the value of `flux` from the variable(s) held by this field
    pub fn with_negative_flux(mut self, flux: &str) -> Self {
        self.routes.push(FluxRoute {
            flux: flux.to_string(),
            sign: Sign::Negative,
        });
        self
    }

    pub fn as_list_input(mut self) -> Self {
        self.list_input = true;
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.kind, FieldKind::Variable(_))
    }
}

/// A flux computed by a component
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FluxDefinition {
    pub name: String,
    /// Name of the logical axis the flux output is array valued along
    pub dims: Option<String>,
    /// Collect the output into a named group instead of only routing it to variables
    pub group: Option<String>,
    /// Receive every output of the named group as an argument of the same name
    pub group_to_arg: Option<String>,
    pub description: String,
}

impl FluxDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            dims: None,
            group: None,
            group_to_arg: None,
            description: String::new(),
        }
    }

    pub fn with_dims(mut self, axis: &str) -> Self {
        self.dims = Some(axis.to_string());
        self
    }

    pub fn in_group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }

    pub fn consuming_group(mut self, group: &str) -> Self {
        self.group_to_arg = Some(group.to_string());
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

/// Static description of a component type
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    pub stage: InitStage,
    pub fields: Vec<FieldDefinition>,
    pub fluxes: Vec<FluxDefinition>,
}

impl ComponentDescriptor {
    pub fn new(stage: InitStage) -> Self {
        Self {
            stage,
            fields: vec![],
            fluxes: vec![],
        }
    }

    pub fn with_field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_flux(mut self, flux: FluxDefinition) -> Self {
        self.fluxes.push(flux);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn flux(&self, name: &str) -> Option<&FluxDefinition> {
        self.fluxes.iter().find(|f| f.name == name)
    }

    /// Check the descriptor is internally consistent
    ///
    /// `label` is the instance label and is only used in error messages.
    pub fn validate(&self, label: &str) -> RSECOResult<()> {
        let invalid = |field: &str, reason: String| RSECOError::InvalidInput {
            component: label.to_string(),
            field: field.to_string(),
            reason,
        };

        let mut names = HashSet::new();
        for name in self
            .fields
            .iter()
            .map(|f| &f.name)
            .chain(self.fluxes.iter().map(|f| &f.name))
        {
            if !names.insert(name.as_str()) {
                return Err(RSECOError::DuplicateLabel(format!("{label}.{name}")));
            }
        }

        for flux in &self.fluxes {
            if flux.group.is_some() && flux.group_to_arg.is_some() {
                return Err(RSECOError::ConflictingGroup {
                    component: label.to_string(),
                    flux: flux.name.clone(),
                });
            }
        }

        for field in &self.fields {
            if !field.routes.is_empty() && !field.is_variable() {
                return Err(invalid(
                    &field.name,
                    "only state variable fields can receive fluxes".to_string(),
                ));
            }
            if field.list_input && field.kind != FieldKind::Variable(Ownership::Foreign) {
                return Err(invalid(
                    &field.name,
                    "list input is only supported on foreign state variables".to_string(),
                ));
            }
            for route in &field.routes {
                if self.flux(&route.flux).is_none() {
                    return Err(invalid(
                        &field.name,
                        format!("routes undeclared flux '{}'", route.flux),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// A reusable model building block
///
/// Implementors describe their fields and fluxes through [`Component::descriptor`] and compute
/// flux magnitudes in [`Component::calculate_flux`].
/// Flux values are always magnitudes; the direction in which they are applied is part of the
/// field definitions.
#[typetag::serde(tag = "type")]
pub trait Component: Debug + Send + Sync {
    fn descriptor(&self) -> ComponentDescriptor;

    /// Compute the value of the flux named `flux`
    fn calculate_flux(&self, flux: &str, _args: &FluxArguments) -> RSECOResult<StateValue> {
        Err(RSECOError::Error(format!(
            "{:?} does not compute a flux named '{}'",
            self, flux
        )))
    }

    /// Build the forcing function for an owned forcing field
    ///
    /// By default the field's input value is used as a constant.
    fn setup_forcing(
        &self,
        field: &str,
        inputs: &ComponentInputs,
        _context: &ForcingContext,
    ) -> RSECOResult<ForcingFunction> {
        Ok(ForcingFunction::Constant(inputs.value(field)?))
    }
}
