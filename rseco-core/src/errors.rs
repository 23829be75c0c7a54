use thiserror::Error;

/// Error type for invalid operations.
///
/// Variants fall into three families.
/// Configuration errors are raised while a model is being assembled and mean the model
/// definition itself is invalid.
/// Routing errors are raised the first time fluxes are evaluated and the shapes of
/// their outputs cannot be reconciled with the variables they target.
/// Numerical errors come from the solver backends and are passed through untouched.
#[derive(Error, Debug)]
pub enum RSECOError {
    #[error("{0}")]
    Error(String),

    // Configuration errors
    #[error("Component '{component}' field '{field}' references unknown label '{label}'")]
    UnknownLabel {
        component: String,
        field: String,
        label: String,
    },
    #[error("Component '{component}' field '{field}' references '{label}' which is owned by '{owner}' and has not been initialised yet. Move '{owner}' to an earlier stage or declare it first")]
    NotYetInitialised {
        component: String,
        field: String,
        label: String,
        owner: String,
    },
    #[error("Label '{0}' is defined more than once")]
    DuplicateLabel(String),
    #[error("Unknown solver '{0}'. Expected one of 'odeint', 'gekko' or 'stepwise'")]
    UnknownSolver(String),
    #[error("A time axis must be supplied before {0}")]
    MissingTimeAxis(String),
    #[error("Flux '{flux}' of component '{component}' declares both group and group_to_arg")]
    ConflictingGroup { component: String, flux: String },
    #[error("Flux '{flux}' consumes group '{group}' but no flux produces into that group")]
    MissingGroupProducer { flux: String, group: String },
    #[error("No input value supplied for field '{field}' of component '{component}'")]
    MissingInput { component: String, field: String },
    #[error("Invalid input for field '{field}' of component '{component}': {reason}")]
    InvalidInput {
        component: String,
        field: String,
        reason: String,
    },
    #[error("Axis '{axis}' has length {existing} but '{label}' implies length {found}")]
    InconsistentAxis {
        axis: String,
        label: String,
        existing: usize,
        found: usize,
    },
    #[error("Flux '{consumer}' depends on '{producer}' which is evaluated after it")]
    EvaluationOrder { consumer: String, producer: String },
    #[error("Component '{0}' needs a climatology provider but none was registered")]
    MissingClimatologyProvider(String),
    #[error("Invalid spline: {0}")]
    InvalidSpline(String),
    #[error("Invalid model configuration: {0}")]
    Config(String),

    // Routing errors
    #[error("ERROR: list input vars dims and flux output dims do not match. Flux '{flux}' returned {output_len} values for {members} list members with a total width of {total_width}")]
    ListInputShapeMismatch {
        flux: String,
        output_len: usize,
        members: usize,
        total_width: usize,
    },
    #[error("Flux '{flux}' produced {found} values but '{target}' expects {expected}")]
    FluxShapeMismatch {
        flux: String,
        target: String,
        expected: usize,
        found: usize,
    },
    #[error("Flux '{flux}' requested argument '{argument}' which is not available")]
    MissingArgument { flux: String, argument: String },

    // Numerical errors
    #[error("Integration failed at t={time}: {reason}")]
    IntegrationFailed { time: f64, reason: String },
    #[error("Newton iteration did not converge at t={time} after {iterations} iterations (residual={residual})")]
    NonConvergence {
        time: f64,
        iterations: usize,
        residual: f64,
    },

    // Lifecycle errors
    #[error("Model has already been solved. Assemble a new model to solve again")]
    AlreadySolved,
    #[error("Model has not been solved yet")]
    NotSolved,
}

impl From<toml::de::Error> for RSECOError {
    fn from(value: toml::de::Error) -> Self {
        RSECOError::Config(value.to_string())
    }
}

/// Convenience type for `Result<T, RSECOError>`.
pub type RSECOResult<T> = Result<T, RSECOError>;
