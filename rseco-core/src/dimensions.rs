//! Shape resolution for state variables, parameters, forcings and flux outputs.
//!
//! Shapes come either from a concrete value or, when no value exists yet, from a declared hint.
//! Fields and fluxes may name a logical axis (`dims`); every quantity along the same axis
//! must agree on its length.

use crate::errors::{RSECOError, RSECOResult};
use crate::state::{Shape, StateValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where the shape of a quantity is read from
#[derive(Clone, Copy, Debug)]
pub enum ShapeSource<'a> {
    Value(&'a StateValue),
    Hint(Shape),
}

impl ShapeSource<'_> {
    fn shape(&self) -> Shape {
        match self {
            ShapeSource::Value(value) => value.shape(),
            ShapeSource::Hint(shape) => *shape,
        }
    }
}

/// How the output of a list input flux is split across the listed variables
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListSplit {
    /// One element per listed variable
    PerMember,
    /// Contiguous slices, one per listed variable, each as wide as that variable
    Elementwise,
}

/// Total width of a stacked list of quantities
pub fn list_width(shapes: &[Shape]) -> usize {
    shapes.iter().map(|s| s.width()).sum()
}

/// Decide how a list input flux output of `output_len` elements maps onto `members`
pub fn classify_list_output(
    flux: &str,
    output_len: usize,
    members: &[Shape],
) -> RSECOResult<ListSplit> {
    let total_width = list_width(members);
    if output_len == total_width {
        Ok(ListSplit::Elementwise)
    } else if output_len == members.len() {
        Ok(ListSplit::PerMember)
    } else {
        Err(RSECOError::ListInputShapeMismatch {
            flux: flux.to_string(),
            output_len,
            members: members.len(),
            total_width,
        })
    }
}

/// Records the resolved shape of every named quantity and the length of every named axis
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DimensionResolver {
    axes: HashMap<String, usize>,
    shapes: HashMap<String, Shape>,
}

impl DimensionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve and record the shape of `label`
    ///
    /// If `axis` is given and the quantity is array valued, the axis length is checked against
    /// (or registered for) other quantities along the same axis.
    pub fn resolve(
        &mut self,
        label: &str,
        source: ShapeSource,
        axis: Option<&str>,
    ) -> RSECOResult<Shape> {
        let shape = source.shape();
        if let (Some(axis), Shape::Vector(n)) = (axis, shape) {
            self.register_axis(axis, label, n)?;
        }
        self.shapes.insert(label.to_string(), shape);
        Ok(shape)
    }

    pub fn register_axis(&mut self, axis: &str, label: &str, len: usize) -> RSECOResult<()> {
        match self.axes.get(axis) {
            Some(existing) if *existing != len => Err(RSECOError::InconsistentAxis {
                axis: axis.to_string(),
                label: label.to_string(),
                existing: *existing,
                found: len,
            }),
            Some(_) => Ok(()),
            None => {
                self.axes.insert(axis.to_string(), len);
                Ok(())
            }
        }
    }

    /// Check a computed flux output against its declared axis and record its shape
    pub fn check_flux_output(
        &mut self,
        flux: &str,
        axis: Option<&str>,
        output: &StateValue,
    ) -> RSECOResult<Shape> {
        if let (Some(axis), Shape::Vector(found)) = (axis, output.shape()) {
            if let Some(expected) = self.axes.get(axis) {
                if *expected != found {
                    return Err(RSECOError::FluxShapeMismatch {
                        flux: flux.to_string(),
                        target: format!("axis '{axis}'"),
                        expected: *expected,
                        found,
                    });
                }
            }
        }
        self.resolve(flux, ShapeSource::Value(output), axis)
    }

    pub fn axis_len(&self, axis: &str) -> Option<usize> {
        self.axes.get(axis).copied()
    }

    pub fn shape(&self, label: &str) -> Option<Shape> {
        self.shapes.get(label).copied()
    }

    pub fn shapes(&self) -> &HashMap<String, Shape> {
        &self.shapes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn scalar_and_vector_detection() {
        let mut resolver = DimensionResolver::new();
        let scalar = StateValue::Scalar(1.0);
        let vector = StateValue::Array(array![1.0, 2.0, 3.0, 4.0, 5.0]);

        assert_eq!(
            resolver
                .resolve("N", ShapeSource::Value(&scalar), None)
                .unwrap(),
            Shape::Scalar
        );
        assert_eq!(
            resolver
                .resolve("P", ShapeSource::Value(&vector), Some("var"))
                .unwrap(),
            Shape::Vector(5)
        );
        assert_eq!(resolver.shape("N").unwrap().dims(), None);
        assert_eq!(resolver.shape("P").unwrap().dims(), Some(5));
        assert_eq!(resolver.axis_len("var"), Some(5));
    }

    #[test]
    fn hints_resolve_without_values() {
        let mut resolver = DimensionResolver::new();
        let shape = resolver
            .resolve("P", ShapeSource::Hint(Shape::Vector(3)), Some("size"))
            .unwrap();
        assert_eq!(shape, Shape::Vector(3));
        assert_eq!(resolver.axis_len("size"), Some(3));
    }

    #[test]
    fn shared_axis_must_agree() {
        let mut resolver = DimensionResolver::new();
        resolver
            .resolve("P", ShapeSource::Hint(Shape::Vector(3)), Some("size"))
            .unwrap();
        let res = resolver.resolve("Z", ShapeSource::Hint(Shape::Vector(4)), Some("size"));
        assert!(matches!(res, Err(RSECOError::InconsistentAxis { .. })));
    }

    #[test]
    fn flux_output_checked_against_axis() {
        let mut resolver = DimensionResolver::new();
        resolver.register_axis("size", "P", 3).unwrap();

        let ok = StateValue::Array(array![1.0, 2.0, 3.0]);
        assert!(resolver
            .check_flux_output("growth", Some("size"), &ok)
            .is_ok());

        let bad = StateValue::Array(array![1.0, 2.0]);
        assert!(matches!(
            resolver.check_flux_output("growth", Some("size"), &bad),
            Err(RSECOError::FluxShapeMismatch { .. })
        ));
    }

    #[test]
    fn list_output_classification() {
        let members = [Shape::Vector(2), Shape::Scalar, Shape::Vector(3)];
        assert_eq!(list_width(&members), 6);
        assert_eq!(
            classify_list_output("g", 6, &members).unwrap(),
            ListSplit::Elementwise
        );
        assert_eq!(
            classify_list_output("g", 3, &members).unwrap(),
            ListSplit::PerMember
        );
        let err = classify_list_output("g", 4, &members).unwrap_err();
        assert!(err
            .to_string()
            .contains("list input vars dims and flux output dims do not match"));
    }
}
