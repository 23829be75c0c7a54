use crate::timeseries::FloatValue;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shape of a state variable, parameter, forcing or flux output
///
/// Quantities are either scalars or one-dimensional arrays along a named axis
/// (for example a set of phytoplankton size classes).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shape {
    Scalar,
    Vector(usize),
}

impl Shape {
    /// Number of elements a quantity of this shape occupies in a flat state vector
    pub fn width(&self) -> usize {
        match self {
            Shape::Scalar => 1,
            Shape::Vector(n) => *n,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Shape::Scalar)
    }

    /// The array length, or `None` for scalars
    pub fn dims(&self) -> Option<usize> {
        match self {
            Shape::Scalar => None,
            Shape::Vector(n) => Some(*n),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Scalar => write!(f, "scalar"),
            Shape::Vector(n) => write!(f, "[{}]", n),
        }
    }
}

/// Represents a value that can be either scalar or array valued
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateValue {
    /// A single value
    Scalar(FloatValue),
    /// Values along a one-dimensional axis
    Array(Array1<FloatValue>),
}

impl StateValue {
    pub fn zeros(shape: Shape) -> Self {
        match shape {
            Shape::Scalar => StateValue::Scalar(0.0),
            Shape::Vector(n) => StateValue::Array(Array1::zeros(n)),
        }
    }

    /// Rebuild a value of the given shape from a flat slice
    pub fn from_slice(shape: Shape, values: &[FloatValue]) -> Self {
        match shape {
            Shape::Scalar => StateValue::Scalar(values[0]),
            Shape::Vector(_) => StateValue::Array(Array1::from(values.to_vec())),
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            StateValue::Scalar(_) => Shape::Scalar,
            StateValue::Array(values) => Shape::Vector(values.len()),
        }
    }

    pub fn width(&self) -> usize {
        self.shape().width()
    }

    /// Check if this is a scalar value
    pub fn is_scalar(&self) -> bool {
        matches!(self, StateValue::Scalar(_))
    }

    /// Get the scalar value if this is a Scalar variant
    pub fn as_scalar(&self) -> Option<FloatValue> {
        match self {
            StateValue::Scalar(v) => Some(*v),
            StateValue::Array(_) => None,
        }
    }

    /// Sum of all elements
    ///
    /// Used when an array valued quantity has to be treated as a lump sum.
    pub fn sum(&self) -> FloatValue {
        match self {
            StateValue::Scalar(v) => *v,
            StateValue::Array(values) => values.sum(),
        }
    }

    /// Element `index`, with scalars answering for every index
    pub fn get(&self, index: usize) -> Option<FloatValue> {
        match self {
            StateValue::Scalar(v) => Some(*v),
            StateValue::Array(values) => values.get(index).copied(),
        }
    }

    /// The values as a one-dimensional array (a scalar becomes a length one array)
    pub fn to_array(&self) -> Array1<FloatValue> {
        match self {
            StateValue::Scalar(v) => Array1::from_elem(1, *v),
            StateValue::Array(values) => values.clone(),
        }
    }

    pub fn to_vec(&self) -> Vec<FloatValue> {
        match self {
            StateValue::Scalar(v) => vec![*v],
            StateValue::Array(values) => values.to_vec(),
        }
    }

    pub fn map(&self, f: impl Fn(FloatValue) -> FloatValue) -> Self {
        match self {
            StateValue::Scalar(v) => StateValue::Scalar(f(*v)),
            StateValue::Array(values) => StateValue::Array(values.mapv(f)),
        }
    }

    /// Combine two values elementwise, broadcasting scalars
    ///
    /// Returns `None` if both values are arrays of different lengths.
    pub fn zip_with(
        &self,
        other: &StateValue,
        f: impl Fn(FloatValue, FloatValue) -> FloatValue,
    ) -> Option<Self> {
        match (self, other) {
            (StateValue::Scalar(a), StateValue::Scalar(b)) => Some(StateValue::Scalar(f(*a, *b))),
            (StateValue::Scalar(a), StateValue::Array(b)) => {
                Some(StateValue::Array(b.mapv(|b| f(*a, b))))
            }
            (StateValue::Array(a), StateValue::Scalar(b)) => {
                Some(StateValue::Array(a.mapv(|a| f(a, *b))))
            }
            (StateValue::Array(a), StateValue::Array(b)) => {
                if a.len() != b.len() {
                    return None;
                }
                Some(StateValue::Array(
                    a.iter().zip(b.iter()).map(|(a, b)| f(*a, *b)).collect(),
                ))
            }
        }
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = FloatValue> + '_> {
        match self {
            StateValue::Scalar(v) => Box::new(std::iter::once(*v)),
            StateValue::Array(values) => Box::new(values.iter().copied()),
        }
    }
}

impl From<FloatValue> for StateValue {
    fn from(value: FloatValue) -> Self {
        StateValue::Scalar(value)
    }
}

impl From<Array1<FloatValue>> for StateValue {
    fn from(value: Array1<FloatValue>) -> Self {
        StateValue::Array(value)
    }
}

impl From<Vec<FloatValue>> for StateValue {
    fn from(value: Vec<FloatValue>) -> Self {
        StateValue::Array(Array1::from(value))
    }
}

/// Mapping between a list of shaped values and one flat vector
///
/// Solvers operate on flat vectors.
/// The layout records where each quantity lives in that vector so the conversion
/// is lossless in both directions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateLayout {
    entries: Vec<(usize, Shape)>,
    width: usize,
}

impl StateLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_shapes(shapes: impl IntoIterator<Item = Shape>) -> Self {
        let mut layout = Self::new();
        shapes.into_iter().for_each(|shape| {
            layout.push(shape);
        });
        layout
    }

    /// Append a quantity, returning its offset in the flat vector
    pub fn push(&mut self, shape: Shape) -> usize {
        let offset = self.width;
        self.entries.push((offset, shape));
        self.width += shape.width();
        offset
    }

    /// Total number of elements
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn offset(&self, index: usize) -> usize {
        self.entries[index].0
    }

    pub fn shape(&self, index: usize) -> Shape {
        self.entries[index].1
    }

    /// The range of the flat vector occupied by quantity `index`
    pub fn range(&self, index: usize) -> std::ops::Range<usize> {
        let (offset, shape) = self.entries[index];
        offset..offset + shape.width()
    }

    pub fn flatten(&self, values: &[StateValue]) -> Vec<FloatValue> {
        let mut flat = Vec::with_capacity(self.width);
        values.iter().for_each(|v| flat.extend(v.iter()));
        flat
    }

    pub fn unflatten(&self, flat: &[FloatValue]) -> Vec<StateValue> {
        self.entries
            .iter()
            .map(|(offset, shape)| {
                StateValue::from_slice(*shape, &flat[*offset..*offset + shape.width()])
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_state_value_scalar() {
        let sv = StateValue::Scalar(42.0);
        assert!(sv.is_scalar());
        assert_eq!(sv.as_scalar(), Some(42.0));
        assert_eq!(sv.shape(), Shape::Scalar);
        assert_eq!(sv.sum(), 42.0);
        assert_eq!(sv.get(3), Some(42.0));
    }

    #[test]
    fn test_state_value_array() {
        let sv = StateValue::Array(array![1.0, 2.0, 3.0, 4.0]);
        assert!(!sv.is_scalar());
        assert_eq!(sv.as_scalar(), None);
        assert_eq!(sv.shape(), Shape::Vector(4));
        assert_eq!(sv.sum(), 10.0);
        assert_eq!(sv.get(4), None);
    }

    #[test]
    fn test_zip_with_broadcasts_scalars() {
        let a = StateValue::Array(array![1.0, 2.0]);
        let b = StateValue::Scalar(3.0);
        assert_eq!(
            a.zip_with(&b, |x, y| x * y),
            Some(StateValue::Array(array![3.0, 6.0]))
        );
        assert_eq!(
            a.zip_with(&StateValue::Array(array![1.0, 2.0, 3.0]), |x, y| x + y),
            None
        );
    }

    #[test]
    fn test_zeros_match_shape() {
        assert_eq!(StateValue::zeros(Shape::Scalar), StateValue::Scalar(0.0));
        assert_eq!(
            StateValue::zeros(Shape::Vector(3)),
            StateValue::Array(array![0.0, 0.0, 0.0])
        );
    }

    #[test]
    fn test_layout_round_trip() {
        let values = vec![
            StateValue::Scalar(1.0),
            StateValue::Array(array![2.0, 3.0, 4.0]),
            StateValue::Scalar(5.0),
        ];
        let layout = StateLayout::from_shapes(values.iter().map(|v| v.shape()));

        assert_eq!(layout.width(), 5);
        assert_eq!(layout.range(1), 1..4);
        assert_eq!(layout.offset(2), 4);

        let flat = layout.flatten(&values);
        assert_eq!(flat, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(layout.unflatten(&flat), values);
    }
}
