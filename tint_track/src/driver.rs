//! Single-pass load, track, and write pipeline.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tint_grid::{compress_all, Dataset, DEFAULT_MIN_DIMS, TIME_DIM};

use crate::naming;
use crate::params::TrackParams;

/// Reads gridded input files into one dataset.
pub trait GridLoader {
    fn load(&self, filenames: &[PathBuf]) -> Result<Dataset>;
}

/// Turns a gridded dataset into a tracked cell dataset.
pub trait Tracker {
    fn track(&self, grids: &Dataset, field: &str, params: &TrackParams) -> Result<Dataset>;
}

pub trait DatasetWriter {
    fn write(&self, dataset: &Dataset, path: &Path) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct TrackRequest<'a> {
    pub filenames: &'a [PathBuf],
    pub field: &'a str,
    pub params: &'a TrackParams,
    /// Output path, optionally containing `{start}`/`{end}`.
    pub outfile: &'a str,
}

/// Runs one tracking job and returns the path that was written.
///
/// Every step is fatal; nothing is written unless loading and tracking both
/// succeed.
pub fn run<L, T, W>(request: &TrackRequest<'_>, loader: &L, tracker: &T, writer: &W) -> Result<PathBuf>
where
    L: GridLoader + ?Sized,
    T: Tracker + ?Sized,
    W: DatasetWriter + ?Sized,
{
    let grids = loader
        .load(request.filenames)
        .context("loading input grids")?;
    log::info!(
        "loaded {} file(s), {} time step(s)",
        request.filenames.len(),
        grids.dimension_len(TIME_DIM).unwrap_or(0)
    );

    let mut tracks = tracker
        .track(&grids, request.field, request.params)
        .with_context(|| format!("tracking field `{}`", request.field))?;
    drop(grids);

    let path = naming::output_path(request.outfile, &tracks)?;

    let compressed = compress_all(&mut tracks, DEFAULT_MIN_DIMS);
    log::info!("compressing {compressed} variable(s)");

    writer
        .write(&tracks, &path)
        .with_context(|| format!("writing tracked dataset to {}", path.display()))?;
    log::info!("wrote {}", path.display());
    Ok(path)
}
