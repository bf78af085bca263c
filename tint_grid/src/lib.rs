//! Dataset model and NetCDF plumbing for gridded radar fields and the cell
//! tracks produced from them.

pub mod compress;
pub mod dataset;
#[cfg(feature = "netcdf")]
pub mod netcdf_io;
pub mod time;

pub use compress::{chunk_shape, compress_all, DEFAULT_MIN_DIMS, DEFLATE_LEVEL, MAX_CHUNK_BYTES};
pub use dataset::{
    concat_along, AttrValue, Dataset, DatasetError, Dimension, Encoding, StorageLayout, Variable,
    VariableRole,
};
pub use time::{format_stamp, time_bounds, Calendar, CfTimeUnits, TimeError, TIME_DIM};
