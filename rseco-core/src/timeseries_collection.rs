use crate::errors::{RSECOError, RSECOResult};
use crate::state::StateValue;
use crate::timeseries::Timeseries;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, PartialOrd, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum VariableType {
    /// Values integrated by the solver
    StateVariable,
    /// Flux magnitudes at each point in time
    Flux,
    /// Values prescribed as a function of time
    Forcing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeseriesItem {
    pub timeseries: Timeseries,
    pub name: String,
    pub variable_type: VariableType,
}

/// The results of a model run.
/// Allows for easy access to time series data by label across the whole model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeseriesCollection {
    items: Vec<TimeseriesItem>,
}

impl TimeseriesCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new timeseries to the collection
    ///
    /// Labels are unique across state variables, fluxes and forcings.
    pub fn add_timeseries(
        &mut self,
        name: &str,
        timeseries: Timeseries,
        variable_type: VariableType,
    ) -> RSECOResult<()> {
        if self.get_by_name(name).is_some() {
            return Err(RSECOError::DuplicateLabel(name.to_string()));
        }
        self.items.push(TimeseriesItem {
            timeseries,
            name: name.to_string(),
            variable_type,
        });
        Ok(())
    }

    pub fn get_by_name(&self, name: &str) -> Option<&TimeseriesItem> {
        self.items.iter().find(|x| x.name == name)
    }

    pub fn get_timeseries_by_name(&self, name: &str) -> Option<&Timeseries> {
        self.get_by_name(name).map(|item| &item.timeseries)
    }

    fn get_timeseries_by_name_mut(&mut self, name: &str) -> RSECOResult<&mut Timeseries> {
        self.items
            .iter_mut()
            .find(|x| x.name == name)
            .map(|item| &mut item.timeseries)
            .ok_or_else(|| RSECOError::Error(format!("timeseries {} not found", name)))
    }

    pub fn set_value(&mut self, name: &str, time_index: usize, value: &StateValue) -> RSECOResult<()> {
        self.get_timeseries_by_name_mut(name)?.set(time_index, value);
        Ok(())
    }

    pub fn set_slice(&mut self, name: &str, time_index: usize, values: &[f64]) -> RSECOResult<()> {
        self.get_timeseries_by_name_mut(name)?
            .set_slice(time_index, values);
        Ok(())
    }

    /// Keep only the named timeseries
    ///
    /// Unknown names are ignored.
    pub fn retain_names(&mut self, names: &[String]) {
        self.items.retain(|item| names.contains(&item.name));
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimeseriesItem> {
        self.items.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl IntoIterator for TimeseriesCollection {
    type Item = TimeseriesItem;
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
