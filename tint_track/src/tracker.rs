//! Bridge to the external cell-tracking engine.
//!
//! The engine runs as a child process. Grids are staged to a scratch file
//! through the configured store, the engine is pointed at that file, and the
//! tracks it writes are read back through the same store.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use anyhow::{Context, Result};
use thiserror::Error;
use tint_grid::Dataset;

use crate::driver::{DatasetWriter, GridLoader, Tracker};
use crate::params::TrackParams;

pub const DEFAULT_TRACKER: &str = "tint-make-tracks";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("tracking engine `{program}` exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("tracking engine `{program}` did not produce {}", .output.display())]
    MissingOutput { program: String, output: PathBuf },
}

pub struct CommandTracker<S> {
    program: OsString,
    leading_args: Vec<OsString>,
    store: S,
}

impl<S> CommandTracker<S> {
    pub fn new(program: impl Into<OsString>, store: S) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            store,
        }
    }

    /// Arguments placed before the engine arguments, e.g. an interpreter's script path.
    pub fn with_leading_args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }
}

/// Arguments passed to the engine for one run.
pub fn engine_args(
    field: &str,
    params: &TrackParams,
    input: &Path,
    output: &Path,
) -> Result<Vec<OsString>> {
    let params_json =
        serde_json::to_string(params).context("serializing tracking parameters")?;
    Ok(vec![
        "--field".into(),
        field.into(),
        "--params".into(),
        params_json.into(),
        "--input".into(),
        input.as_os_str().to_owned(),
        "--output".into(),
        output.as_os_str().to_owned(),
    ])
}

impl<S> Tracker for CommandTracker<S>
where
    S: GridLoader + DatasetWriter,
{
    fn track(&self, grids: &Dataset, field: &str, params: &TrackParams) -> Result<Dataset> {
        let scratch = tempfile::Builder::new()
            .prefix("tint_track")
            .tempdir()
            .context("creating scratch directory for the tracking engine")?;
        let input = scratch.path().join("grids.nc");
        let output = scratch.path().join("tracks.nc");

        self.store
            .write(grids, &input)
            .context("staging grids for the tracking engine")?;

        let args = engine_args(field, params, &input, &output)?;
        log::debug!("running {} {:?} {:?}", self.program_name(), self.leading_args, args);
        let result = Command::new(&self.program)
            .args(&self.leading_args)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("launching tracking engine `{}`", self.program_name()))?;

        for line in String::from_utf8_lossy(&result.stdout).lines() {
            log::info!("[{}] {line}", self.program_name());
        }
        let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
        if !result.status.success() {
            return Err(EngineError::Failed {
                program: self.program_name(),
                status: result.status,
                stderr,
            }
            .into());
        }
        for line in stderr.lines() {
            log::debug!("[{}] {line}", self.program_name());
        }

        if !output.is_file() {
            return Err(EngineError::MissingOutput {
                program: self.program_name(),
                output,
            }
            .into());
        }

        self.store
            .load(&[output])
            .context("reading tracks written by the tracking engine")
    }
}
