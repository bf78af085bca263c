//! Command-line front end that hands gridded radar data to the TINT cell
//! tracker and stores the resulting tracks.

pub mod cli;
pub mod driver;
pub mod naming;
pub mod params;
#[cfg(feature = "netcdf")]
pub mod store;
pub mod tracker;

pub use driver::{run, DatasetWriter, GridLoader, TrackRequest, Tracker};
pub use params::{resolve, ParamKey, ParamOverrides, TrackParams};
