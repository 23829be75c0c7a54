use crate::errors::{RSECOError, RSECOResult};
use crate::state::{Shape, StateValue};
use ndarray::{Array, Array1, Array2};
use num::Float;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type FloatValue = f64;
pub type Time = f64;

/// The points in time at which a model is solved.
///
/// Values must be strictly increasing.
/// The first value is the time at which the initial values are defined.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeAxis {
    values: Array1<Time>,
}

impl TimeAxis {
    pub fn from_values(values: Array1<Time>) -> RSECOResult<Self> {
        if values.is_empty() {
            return Err(RSECOError::Config(
                "time axis must contain at least one value".to_string(),
            ));
        }
        if values.iter().zip(values.iter().skip(1)).any(|(a, b)| b <= a) {
            return Err(RSECOError::Config(
                "time axis values must be strictly increasing".to_string(),
            ));
        }
        Ok(Self { values })
    }

    /// Evenly spaced points from `start` up to and including `end`
    pub fn from_range(start: Time, end: Time, step: Time) -> RSECOResult<Self> {
        if step <= 0.0 || end < start {
            return Err(RSECOError::Config(format!(
                "invalid time range start={start}, end={end}, step={step}"
            )));
        }
        let n = ((end - start) / step + 1e-9).floor() as usize + 1;
        Self::from_values(Array::range(0.0, n as Time, 1.0).mapv(|i| start + i * step))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn at(&self, index: usize) -> Option<Time> {
        self.values.get(index).copied()
    }

    pub fn values(&self) -> &Array1<Time> {
        &self.values
    }

    pub fn first(&self) -> Time {
        self.values[0]
    }

    pub fn last(&self) -> Time {
        self.values[self.values.len() - 1]
    }
}

/// Values of one named quantity over a time axis
///
/// The data is stored as a `(time, width)` array so scalar and array valued quantities
/// share a single representation.
/// Rows which have not been written yet are NaN.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Timeseries {
    values: Array2<FloatValue>,
    shape: Shape,
    time_axis: Arc<TimeAxis>,
}

impl Timeseries {
    pub fn new_empty(time_axis: Arc<TimeAxis>, shape: Shape) -> Self {
        Self {
            values: Array2::from_elem((time_axis.len(), shape.width()), FloatValue::nan()),
            shape,
            time_axis,
        }
    }

    pub fn from_rows(time_axis: Arc<TimeAxis>, shape: Shape, rows: &[Vec<FloatValue>]) -> Self {
        let mut ts = Self::new_empty(time_axis, shape);
        for (index, row) in rows.iter().enumerate() {
            ts.set_slice(index, row);
        }
        ts
    }

    pub fn set(&mut self, index: usize, value: &StateValue) {
        self.set_slice(index, &value.to_vec());
    }

    pub fn set_slice(&mut self, index: usize, values: &[FloatValue]) {
        let mut row = self.values.row_mut(index);
        row.iter_mut()
            .zip(values.iter())
            .for_each(|(dst, src)| *dst = *src);
    }

    pub fn at(&self, index: usize) -> Option<StateValue> {
        if index >= self.values.nrows() {
            return None;
        }
        let row = self.values.row(index);
        Some(match self.shape {
            Shape::Scalar => StateValue::Scalar(row[0]),
            Shape::Vector(_) => StateValue::Array(row.to_owned()),
        })
    }

    /// The scalar series, or the series of the first element of an array quantity
    pub fn scalar_values(&self) -> Array1<FloatValue> {
        self.values.column(0).to_owned()
    }

    pub fn values(&self) -> &Array2<FloatValue> {
        &self.values
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn time_axis(&self) -> &TimeAxis {
        &self.time_axis
    }

    pub fn len(&self) -> usize {
        self.values.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.values.nrows() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn range_includes_end() {
        let axis = TimeAxis::from_range(0.0, 100.0, 1.0).unwrap();
        assert_eq!(axis.len(), 101);
        assert_eq!(axis.first(), 0.0);
        assert_eq!(axis.last(), 100.0);
    }

    #[test]
    fn non_increasing_axis_is_rejected() {
        assert!(TimeAxis::from_values(array![0.0, 1.0, 1.0]).is_err());
        assert!(TimeAxis::from_values(Array1::zeros(0)).is_err());
    }

    #[test]
    fn empty_timeseries_is_nan() {
        let axis = Arc::new(TimeAxis::from_values(array![0.0, 1.0, 2.0]).unwrap());
        let mut ts = Timeseries::new_empty(axis, Shape::Vector(2));
        assert!(ts.values().iter().all(|v| v.is_nan()));

        ts.set(1, &StateValue::Array(array![1.0, 2.0]));
        assert_eq!(ts.at(1), Some(StateValue::Array(array![1.0, 2.0])));
        assert!(ts.at(0).unwrap().to_vec().iter().all(|v| v.is_nan()));
        assert_eq!(ts.at(3), None);
    }
}
