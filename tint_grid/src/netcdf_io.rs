//! NetCDF reading and writing for [`Dataset`].

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use netcdf::AttributeValue;

use crate::compress::chunk_shape;
use crate::dataset::{concat_along, AttrValue, Dataset, StorageLayout, Variable};
use crate::time::TIME_DIM;

/// Reads every dimension, attribute and numeric variable of a NetCDF file.
///
/// Values are widened to `f64`; character and string variables are skipped.
pub fn read_dataset(path: &Path) -> Result<Dataset> {
    let file = netcdf::open(path)
        .with_context(|| format!("opening NetCDF file {}", path.display()))?;

    let mut dataset = Dataset::new();
    for dim in file.dimensions() {
        dataset.add_dimension(dim.name(), dim.len())?;
    }

    for attr in file.attributes() {
        if let Some(value) = read_attribute(&attr, path) {
            dataset.set_attribute(attr.name(), value);
        }
    }

    for var in file.variables() {
        let name = var.name().to_string();
        let Some(values) = read_numeric(&var) else {
            log::warn!(
                "skipping non-numeric variable `{name}` in {}",
                path.display()
            );
            continue;
        };
        let dims = var.dimensions().iter().map(|dim| dim.name()).collect();
        let mut variable = Variable::new(name.clone(), dims, values);
        for attr in var.attributes() {
            if let Some(value) = read_attribute(&attr, path) {
                variable.attributes.push((attr.name().to_string(), value));
            }
        }
        dataset
            .add_variable(variable)
            .with_context(|| format!("reading variable `{name}` from {}", path.display()))?;
    }

    dataset.classify_roles();
    Ok(dataset)
}

/// Loads gridded files and joins them along `time` in the order given.
pub fn load_grids(paths: &[PathBuf]) -> Result<Dataset> {
    if paths.is_empty() {
        bail!("no input grid files given");
    }

    let mut parts = Vec::with_capacity(paths.len());
    for path in paths {
        parts.push(read_dataset(path)?);
    }
    let dataset = concat_along(parts, TIME_DIM)
        .with_context(|| format!("joining {} grid files along `{TIME_DIM}`", paths.len()))?;
    Ok(dataset)
}

/// Writes `dataset` to `path`, replacing any existing file.
pub fn write_dataset(dataset: &Dataset, path: &Path) -> Result<()> {
    let mut file = netcdf::create(path)
        .with_context(|| format!("creating NetCDF file {}", path.display()))?;

    for dim in dataset.dimensions() {
        file.add_dimension(&dim.name, dim.len)
            .with_context(|| format!("defining dimension `{}`", dim.name))?;
    }

    for (name, value) in dataset.attributes() {
        file.add_attribute(name, to_netcdf(value))
            .with_context(|| format!("writing global attribute `{name}`"))?;
    }

    for variable in dataset.variables() {
        let dims: Vec<&str> = variable.dims.iter().map(String::as_str).collect();
        let mut var = file
            .add_variable::<f64>(&variable.name, &dims)
            .with_context(|| format!("defining variable `{}`", variable.name))?;

        if !dims.is_empty() && variable.encoding.layout == StorageLayout::Chunked {
            let chunks = chunk_shape(&dataset.shape_of(variable));
            var.set_chunking(&chunks)
                .with_context(|| format!("chunking variable `{}`", variable.name))?;
        }
        if let Some(level) = variable.encoding.deflate_level {
            var.set_compression(i32::from(level), false)
                .with_context(|| format!("compressing variable `{}`", variable.name))?;
        }

        for (name, value) in &variable.attributes {
            var.put_attribute(name, to_netcdf(value))
                .with_context(|| format!("writing attribute `{name}` of `{}`", variable.name))?;
        }

        if !variable.data.is_empty() {
            var.put_values(variable.data.as_slice(), ..)
                .with_context(|| format!("writing values of `{}`", variable.name))?;
        }
    }

    Ok(())
}

fn read_numeric(var: &netcdf::Variable<'_>) -> Option<Vec<f64>> {
    if let Ok(values) = var.get_values::<f64, _>(..) {
        return Some(values);
    }
    if let Ok(values) = var.get_values::<f32, _>(..) {
        return Some(values.into_iter().map(f64::from).collect());
    }
    if let Ok(values) = var.get_values::<i64, _>(..) {
        return Some(values.into_iter().map(|v| v as f64).collect());
    }
    if let Ok(values) = var.get_values::<i32, _>(..) {
        return Some(values.into_iter().map(f64::from).collect());
    }
    if let Ok(values) = var.get_values::<i16, _>(..) {
        return Some(values.into_iter().map(f64::from).collect());
    }
    if let Ok(values) = var.get_values::<i8, _>(..) {
        return Some(values.into_iter().map(f64::from).collect());
    }
    if let Ok(values) = var.get_values::<u8, _>(..) {
        return Some(values.into_iter().map(f64::from).collect());
    }
    None
}

fn read_attribute(attr: &netcdf::Attribute<'_>, path: &Path) -> Option<AttrValue> {
    let value = match attr.value() {
        Ok(value) => value,
        Err(err) => {
            log::warn!(
                "skipping unreadable attribute `{}` in {}: {err}",
                attr.name(),
                path.display()
            );
            return None;
        }
    };

    let numbers: Vec<f64> = match value {
        AttributeValue::Str(text) => return Some(AttrValue::Text(text)),
        AttributeValue::Strs(texts) => return Some(AttrValue::Text(texts.join(" "))),
        AttributeValue::Double(v) => vec![v],
        AttributeValue::Doubles(v) => v,
        AttributeValue::Float(v) => vec![f64::from(v)],
        AttributeValue::Floats(v) => v.into_iter().map(f64::from).collect(),
        AttributeValue::Schar(v) => vec![f64::from(v)],
        AttributeValue::Schars(v) => v.into_iter().map(f64::from).collect(),
        AttributeValue::Uchar(v) => vec![f64::from(v)],
        AttributeValue::Uchars(v) => v.into_iter().map(f64::from).collect(),
        AttributeValue::Short(v) => vec![f64::from(v)],
        AttributeValue::Shorts(v) => v.into_iter().map(f64::from).collect(),
        AttributeValue::Ushort(v) => vec![f64::from(v)],
        AttributeValue::Ushorts(v) => v.into_iter().map(f64::from).collect(),
        AttributeValue::Int(v) => vec![f64::from(v)],
        AttributeValue::Ints(v) => v.into_iter().map(f64::from).collect(),
        AttributeValue::Uint(v) => vec![f64::from(v)],
        AttributeValue::Uints(v) => v.into_iter().map(f64::from).collect(),
        AttributeValue::Longlong(v) => vec![v as f64],
        AttributeValue::Longlongs(v) => v.into_iter().map(|x| x as f64).collect(),
        AttributeValue::Ulonglong(v) => vec![v as f64],
        AttributeValue::Ulonglongs(v) => v.into_iter().map(|x| x as f64).collect(),
    };
    Some(AttrValue::Numbers(numbers))
}

fn to_netcdf(value: &AttrValue) -> AttributeValue {
    match value {
        AttrValue::Text(text) => AttributeValue::Str(text.clone()),
        AttrValue::Numbers(values) if values.len() == 1 => AttributeValue::Double(values[0]),
        AttrValue::Numbers(values) => AttributeValue::Doubles(values.clone()),
    }
}
