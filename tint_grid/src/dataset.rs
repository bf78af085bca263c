//! In-memory view of a gridded or tracked dataset.
//!
//! The model follows NetCDF closely enough to carry the files the tracker
//! reads and writes: named dimensions, flattened numeric variables, and
//! text/numeric attributes. Each variable also records the [`Encoding`] it
//! should be stored with when the dataset is written back out.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Attribute payload attached to a dataset or a variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Text(String),
    Numbers(Vec<f64>),
}

impl AttrValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(text) => Some(text.as_str()),
            AttrValue::Numbers(_) => None,
        }
    }

    /// First value of a numeric attribute.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttrValue::Numbers(values) => values.first().copied(),
            AttrValue::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub len: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableRole {
    Coordinate,
    #[default]
    Data,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageLayout {
    /// Leave the choice to the writer.
    #[default]
    Default,
    Contiguous,
    Chunked,
}

/// Storage settings applied when a variable is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encoding {
    pub deflate_level: Option<u8>,
    pub layout: StorageLayout,
}

impl Encoding {
    pub fn is_compressed(&self) -> bool {
        self.deflate_level.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub dims: Vec<String>,
    /// Row-major values; a scalar holds exactly one.
    pub data: Vec<f64>,
    pub attributes: Vec<(String, AttrValue)>,
    pub role: VariableRole,
    #[serde(default)]
    pub encoding: Encoding,
}

impl Variable {
    pub fn new(name: impl Into<String>, dims: Vec<String>, data: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            dims,
            data,
            attributes: Vec::new(),
            role: VariableRole::Data,
            encoding: Encoding::default(),
        }
    }

    /// One-dimensional coordinate variable indexed by a dimension of the same name.
    pub fn coordinate(name: impl Into<String>, data: Vec<f64>) -> Self {
        let name = name.into();
        let mut variable = Self::new(name.clone(), vec![name], data);
        variable.role = VariableRole::Coordinate;
        variable
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: AttrValue) -> Self {
        self.attributes.push((name.into(), value));
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn ndims(&self) -> usize {
        self.dims.len()
    }

    pub fn is_data(&self) -> bool {
        self.role == VariableRole::Data
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum DatasetError {
    #[error("dimension `{name}` already defined with length {existing}, cannot redefine as {requested}")]
    ConflictingDimension {
        name: String,
        existing: usize,
        requested: usize,
    },
    #[error("variable `{0}` is already defined")]
    DuplicateVariable(String),
    #[error("variable `{variable}` references unknown dimension `{dimension}`")]
    UnknownDimension { variable: String, dimension: String },
    #[error("variable `{variable}` holds {actual} values but its shape needs {expected}")]
    ShapeMismatch {
        variable: String,
        expected: usize,
        actual: usize,
    },
    #[error("no datasets to concatenate")]
    NothingToConcatenate,
    #[error("part {part} has no `{dimension}` dimension")]
    MissingDimension { part: usize, dimension: String },
    #[error("variable `{variable}` must have `{dimension}` as its leading dimension")]
    NotLeading { variable: String, dimension: String },
    #[error("part {part} is missing variable `{variable}`")]
    MissingVariable { part: usize, variable: String },
    #[error("variable `{variable}` in part {part} has shape {actual:?}, expected {expected:?}")]
    IncompatibleShape {
        part: usize,
        variable: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    dims: Vec<Dimension>,
    variables: Vec<Variable>,
    attributes: Vec<(String, AttrValue)>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines a dimension. Re-adding an existing name with the same length is a no-op.
    pub fn add_dimension(&mut self, name: impl Into<String>, len: usize) -> Result<(), DatasetError> {
        let name = name.into();
        if let Some(existing) = self.dims.iter().find(|dim| dim.name == name) {
            if existing.len == len {
                return Ok(());
            }
            return Err(DatasetError::ConflictingDimension {
                name,
                existing: existing.len,
                requested: len,
            });
        }
        self.dims.push(Dimension { name, len });
        Ok(())
    }

    pub fn add_variable(&mut self, variable: Variable) -> Result<(), DatasetError> {
        if self.variable(&variable.name).is_some() {
            return Err(DatasetError::DuplicateVariable(variable.name));
        }
        let mut expected = 1usize;
        for dim in &variable.dims {
            let len = self
                .dimension_len(dim)
                .ok_or_else(|| DatasetError::UnknownDimension {
                    variable: variable.name.clone(),
                    dimension: dim.clone(),
                })?;
            expected = expected.saturating_mul(len);
        }
        if variable.data.len() != expected {
            return Err(DatasetError::ShapeMismatch {
                variable: variable.name,
                expected,
                actual: variable.data.len(),
            });
        }
        self.variables.push(variable);
        Ok(())
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: AttrValue) {
        let name = name.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => *slot = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dims
    }

    pub fn dimension_len(&self, name: &str) -> Option<usize> {
        self.dims.iter().find(|dim| dim.name == name).map(|dim| dim.len)
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> std::slice::IterMut<'_, Variable> {
        self.variables.iter_mut()
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|var| var.name == name)
    }

    pub fn data_variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter().filter(|var| var.is_data())
    }

    pub fn attributes(&self) -> &[(String, AttrValue)] {
        &self.attributes
    }

    pub fn shape_of(&self, variable: &Variable) -> Vec<usize> {
        variable
            .dims
            .iter()
            .map(|dim| self.dimension_len(dim).unwrap_or(0))
            .collect()
    }

    /// Marks dimension-named 1-D variables and variables listed in any
    /// `coordinates` attribute as coordinates.
    pub fn classify_roles(&mut self) {
        let listed: Vec<String> = self
            .variables
            .iter()
            .filter_map(|var| var.attribute("coordinates").and_then(AttrValue::as_text))
            .flat_map(|names| names.split_whitespace().map(str::to_string))
            .collect();

        for var in &mut self.variables {
            let indexes_itself = var.dims.len() == 1 && var.dims[0] == var.name;
            if indexes_itself || listed.iter().any(|name| *name == var.name) {
                var.role = VariableRole::Coordinate;
            }
        }
    }
}

/// Joins datasets read from consecutive files along `dim`.
///
/// Variables that carry `dim` must carry it first; their values are appended
/// in part order. Everything else is taken from the first part.
pub fn concat_along(parts: Vec<Dataset>, dim: &str) -> Result<Dataset, DatasetError> {
    let mut parts = parts.into_iter();
    let mut merged = parts.next().ok_or(DatasetError::NothingToConcatenate)?;
    let rest: Vec<Dataset> = parts.collect();
    if rest.is_empty() {
        return Ok(merged);
    }

    let mut total = merged
        .dimension_len(dim)
        .ok_or_else(|| DatasetError::MissingDimension {
            part: 0,
            dimension: dim.to_string(),
        })?;

    let mut along = Vec::new();
    for (index, var) in merged.variables.iter().enumerate() {
        match var.dims.iter().position(|name| name == dim) {
            Some(0) => along.push((index, merged.shape_of(var))),
            Some(_) => {
                return Err(DatasetError::NotLeading {
                    variable: var.name.clone(),
                    dimension: dim.to_string(),
                });
            }
            None => {}
        }
    }

    for (offset, part) in rest.iter().enumerate() {
        let part_index = offset + 1;
        let part_len = part
            .dimension_len(dim)
            .ok_or_else(|| DatasetError::MissingDimension {
                part: part_index,
                dimension: dim.to_string(),
            })?;

        for (index, expected) in &along {
            let name = &merged.variables[*index].name;
            let incoming = part
                .variable(name)
                .ok_or_else(|| DatasetError::MissingVariable {
                    part: part_index,
                    variable: name.clone(),
                })?;
            let actual = part.shape_of(incoming);
            let same_dims = incoming.dims == merged.variables[*index].dims;
            if !same_dims || actual.get(1..) != expected.get(1..) {
                return Err(DatasetError::IncompatibleShape {
                    part: part_index,
                    variable: name.clone(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        for (index, _) in &along {
            let name = merged.variables[*index].name.clone();
            if let Some(incoming) = part.variable(&name) {
                merged.variables[*index]
                    .data
                    .extend_from_slice(&incoming.data);
            }
        }
        total += part_len;
    }

    if let Some(slot) = merged.dims.iter_mut().find(|d| d.name == dim) {
        slot.len = total;
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(times: &[f64]) -> Dataset {
        let mut ds = Dataset::new();
        ds.add_dimension("time", times.len()).unwrap();
        ds.add_dimension("y", 2).unwrap();
        ds.add_dimension("x", 2).unwrap();
        ds.add_variable(Variable::coordinate("time", times.to_vec()))
            .unwrap();
        ds.add_variable(Variable::new("x", vec!["x".into()], vec![0.0, 1000.0]))
            .unwrap();
        let values = times
            .iter()
            .flat_map(|t| std::iter::repeat(*t).take(4))
            .collect();
        ds.add_variable(Variable::new(
            "reflectivity",
            vec!["time".into(), "y".into(), "x".into()],
            values,
        ))
        .unwrap();
        ds
    }

    #[test]
    fn rejects_data_that_does_not_fit_the_shape() {
        let mut ds = Dataset::new();
        ds.add_dimension("y", 3).unwrap();
        let err = ds
            .add_variable(Variable::new("z", vec!["y".into()], vec![1.0, 2.0]))
            .unwrap_err();
        assert_eq!(
            err,
            DatasetError::ShapeMismatch {
                variable: "z".into(),
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn rejects_unknown_dimensions_and_conflicting_lengths() {
        let mut ds = Dataset::new();
        ds.add_dimension("y", 3).unwrap();
        assert!(ds.add_dimension("y", 3).is_ok());
        assert!(matches!(
            ds.add_dimension("y", 4),
            Err(DatasetError::ConflictingDimension { .. })
        ));
        assert!(matches!(
            ds.add_variable(Variable::new("v", vec!["q".into()], vec![1.0])),
            Err(DatasetError::UnknownDimension { .. })
        ));
    }

    #[test]
    fn scalar_variables_hold_one_value() {
        let mut ds = Dataset::new();
        ds.add_variable(Variable::new("origin_altitude", Vec::new(), vec![120.0]))
            .unwrap();
        assert_eq!(ds.variable("origin_altitude").unwrap().ndims(), 0);
    }

    #[test]
    fn classify_roles_picks_up_dimension_and_listed_coordinates() {
        let mut ds = Dataset::new();
        ds.add_dimension("time", 1).unwrap();
        ds.add_dimension("y", 1).unwrap();
        ds.add_variable(Variable::new("time", vec!["time".into()], vec![0.0]))
            .unwrap();
        ds.add_variable(Variable::new("lat", vec!["y".into()], vec![35.0]))
            .unwrap();
        ds.add_variable(
            Variable::new("field", vec!["time".into(), "y".into()], vec![1.0])
                .with_attribute("coordinates", AttrValue::Text("lat".into())),
        )
        .unwrap();

        ds.classify_roles();

        let data: Vec<&str> = ds.data_variables().map(|v| v.name.as_str()).collect();
        assert_eq!(data, vec!["field"]);
    }

    #[test]
    fn concatenates_time_slices_in_order() {
        let merged = concat_along(vec![frame(&[0.0]), frame(&[300.0, 600.0])], "time").unwrap();

        assert_eq!(merged.dimension_len("time"), Some(3));
        assert_eq!(merged.variable("time").unwrap().data, vec![0.0, 300.0, 600.0]);
        let field = merged.variable("reflectivity").unwrap();
        assert_eq!(field.data.len(), 12);
        assert_eq!(field.data[4..8], [300.0; 4]);
        assert_eq!(merged.variable("x").unwrap().data, vec![0.0, 1000.0]);
    }

    #[test]
    fn concatenation_checks_grid_shapes() {
        let mut odd = Dataset::new();
        odd.add_dimension("time", 1).unwrap();
        odd.add_dimension("y", 3).unwrap();
        odd.add_dimension("x", 2).unwrap();
        odd.add_variable(Variable::coordinate("time", vec![900.0]))
            .unwrap();
        odd.add_variable(Variable::new(
            "reflectivity",
            vec!["time".into(), "y".into(), "x".into()],
            vec![0.0; 6],
        ))
        .unwrap();

        let err = concat_along(vec![frame(&[0.0]), odd], "time").unwrap_err();
        assert!(matches!(err, DatasetError::IncompatibleShape { part: 1, .. }));
    }

    #[test]
    fn concatenation_of_nothing_fails() {
        assert_eq!(
            concat_along(Vec::new(), "time").unwrap_err(),
            DatasetError::NothingToConcatenate
        );
    }
}
