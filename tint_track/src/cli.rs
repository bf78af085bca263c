use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::params::{resolve, ParamKey, ParamOverrides, TrackParams};
use crate::tracker::DEFAULT_TRACKER;

pub const DEFAULT_OUTFILE: &str = "track_{start}_{end}.nc";

/// Create a tracked cell dataset using TINT from gridded NetCDF data.
#[derive(Parser, Debug)]
#[command(
    about = "Create a tracked cell dataset using TINT from gridded NetCDF data",
    long_about = "Create a tracked cell dataset using TINT from gridded NetCDF data. Saves a new NetCDF file.",
    version
)]
pub struct Args {
    /// Gridded NetCDF files to track, in time order
    #[arg(value_name = "filename")]
    pub filenames: Vec<PathBuf>,

    /// NetCDF variable to use for tracking
    #[arg(short = 'f', long = "field", value_name = "variable")]
    pub field: String,

    /// Filename, including path, to use when writing data. {start} and {end} are replaced with the min and max times of the tracked dataset
    #[arg(short = 'o', long = "outfile", value_name = "filename", default_value = DEFAULT_OUTFILE)]
    pub outfile: String,

    /// Threshold value for tracking field, default=32
    #[arg(short = 't', long = "threshold", value_name = "value", value_parser = parse_finite, allow_negative_numbers = true)]
    pub threshold: Option<f64>,

    /// Isolation threshold for tracking field, default=8
    #[arg(long = "isothresh", value_name = "value", value_parser = parse_finite, allow_negative_numbers = true)]
    pub iso_thresh: Option<f64>,

    /// Isolation smoothing for tracking field, default=3
    #[arg(long = "isosmooth", value_name = "value", value_parser = parse_finite, allow_negative_numbers = true)]
    pub iso_smooth: Option<f64>,

    /// Minimum size, default=8
    #[arg(long = "minsize", value_name = "value", value_parser = parse_finite, allow_negative_numbers = true)]
    pub min_size: Option<f64>,

    /// Search margin (m), default=4000
    #[arg(short = 'd', long = "searchmargin", value_name = "value", value_parser = parse_finite, allow_negative_numbers = true)]
    pub search_margin: Option<f64>,

    /// Flow margin (m), default=10000
    #[arg(long = "flowmargin", value_name = "value", value_parser = parse_finite, allow_negative_numbers = true)]
    pub flow_margin: Option<f64>,

    /// Maximum disparity, default=999
    #[arg(long = "disparitymax", value_name = "value", value_parser = parse_finite, allow_negative_numbers = true)]
    pub max_disparity: Option<f64>,

    /// Maximum shift disp., default=15
    #[arg(long = "shiftdispmax", value_name = "value", value_parser = parse_finite, allow_negative_numbers = true)]
    pub max_shift_disp: Option<f64>,

    /// Maximum flow magnitude, default=50
    #[arg(long = "flowmax", value_name = "value", value_parser = parse_finite, allow_negative_numbers = true)]
    pub max_flow_mag: Option<f64>,

    /// Altitude to use for tracking (m), default=1500
    #[arg(short = 'z', long = "altitude", value_name = "value", value_parser = parse_finite, allow_negative_numbers = true)]
    pub altitude: Option<f64>,

    /// JSON file of parameter overrides keyed by engine name (e.g. {"FIELD_THRESH": 35}); flags take precedence
    #[arg(long, value_name = "FILE")]
    pub params_file: Option<PathBuf>,

    /// Tracking engine executable
    #[arg(long, value_name = "PROGRAM", default_value = DEFAULT_TRACKER)]
    pub tracker: String,

    /// Extra argument placed before the engine arguments (may repeat)
    #[arg(long = "tracker-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub tracker_args: Vec<String>,
}

impl Args {
    /// Overrides given as individual flags.
    pub fn overrides(&self) -> ParamOverrides {
        let mut overrides = ParamOverrides::default();
        overrides.set(ParamKey::FieldThresh, self.threshold);
        overrides.set(ParamKey::IsoThresh, self.iso_thresh);
        overrides.set(ParamKey::IsoSmooth, self.iso_smooth);
        overrides.set(ParamKey::MinSize, self.min_size);
        overrides.set(ParamKey::SearchMargin, self.search_margin);
        overrides.set(ParamKey::FlowMargin, self.flow_margin);
        overrides.set(ParamKey::MaxDisparity, self.max_disparity);
        overrides.set(ParamKey::MaxShiftDisp, self.max_shift_disp);
        overrides.set(ParamKey::MaxFlowMag, self.max_flow_mag);
        overrides.set(ParamKey::GsAlt, self.altitude);
        overrides
    }

    /// Defaults, then the parameter file, then individual flags.
    pub fn resolve_params(&self) -> Result<TrackParams> {
        let mut overrides = ParamOverrides::default();
        if let Some(path) = self.params_file.as_deref() {
            let from_file = ParamOverrides::from_json_file(path)?;
            if from_file.is_empty() {
                log::warn!("parameter file {} overrides nothing", path.display());
            }
            overrides = overrides.overlay(&from_file);
        }
        overrides = overrides.overlay(&self.overrides());
        Ok(resolve(&TrackParams::DEFAULT, &overrides))
    }
}

fn parse_finite(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|err| format!("`{raw}` is not a number: {err}"))?;
    if !value.is_finite() {
        return Err(format!("`{raw}` is not a finite number"));
    }
    Ok(value)
}
