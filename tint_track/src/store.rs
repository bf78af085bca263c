use std::path::{Path, PathBuf};

use anyhow::Result;
use tint_grid::netcdf_io::{load_grids, write_dataset};
use tint_grid::Dataset;

use crate::driver::{DatasetWriter, GridLoader};

/// Reads and writes datasets as NetCDF files.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetcdfStore;

impl GridLoader for NetcdfStore {
    fn load(&self, filenames: &[PathBuf]) -> Result<Dataset> {
        load_grids(filenames)
    }
}

impl DatasetWriter for NetcdfStore {
    fn write(&self, dataset: &Dataset, path: &Path) -> Result<()> {
        write_dataset(dataset, path)
    }
}
