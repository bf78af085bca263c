use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tint_grid::netcdf_io::read_dataset;
use tint_grid::{format_stamp, time_bounds, VariableRole, TIME_DIM};

fn main() -> Result<()> {
    let path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: grid_dump <NetCDF file>")?;
    let dataset = read_dataset(&path)?;

    println!("{}", path.display());
    println!("dimensions:");
    for dim in dataset.dimensions() {
        println!("  {name:<24} {len:>8}", name = dim.name, len = dim.len);
    }

    println!("variables:");
    for var in dataset.variables() {
        let role = match var.role {
            VariableRole::Coordinate => "coord",
            VariableRole::Data => "data",
        };
        let deflate = var
            .encoding
            .deflate_level
            .map(|level| format!("zlib({level})"))
            .unwrap_or_else(|| String::from("-"));
        println!(
            "  {name:<24} {role:<5} {shape:<20} {deflate}",
            name = var.name,
            shape = format!("{:?}", dataset.shape_of(var)),
        );
    }

    match time_bounds(&dataset, TIME_DIM) {
        Ok((start, end)) => println!(
            "time: {} .. {}",
            format_stamp(&start),
            format_stamp(&end)
        ),
        Err(err) => println!("time: unavailable ({err})"),
    }
    Ok(())
}
