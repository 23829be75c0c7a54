//! Type definitions for the model module.

use crate::component::Component;
use std::sync::Arc;

/// Type alias for a component wrapped in an Arc for shared ownership.
pub type C = Arc<dyn Component>;
