use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tint_track::cli::Args;
use tint_track::TrackParams;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let params = args.resolve_params()?;
    log::info!("tracking parameters: {params}");

    let written = track(&args, &params)?;
    println!("[tint_track] wrote {}", written.display());
    Ok(())
}

#[cfg(feature = "netcdf")]
fn track(args: &Args, params: &TrackParams) -> Result<PathBuf> {
    use tint_track::store::NetcdfStore;
    use tint_track::tracker::CommandTracker;
    use tint_track::TrackRequest;

    let tracker =
        CommandTracker::new(&args.tracker, NetcdfStore).with_leading_args(&args.tracker_args);
    log::info!(
        "tracking engine: {}",
        tracker.program().to_string_lossy()
    );
    let request = TrackRequest {
        filenames: &args.filenames,
        field: &args.field,
        params,
        outfile: &args.outfile,
    };
    tint_track::run(&request, &NetcdfStore, &tracker, &NetcdfStore)
}

#[cfg(not(feature = "netcdf"))]
fn track(_args: &Args, _params: &TrackParams) -> Result<PathBuf> {
    anyhow::bail!("tint_track was built without NetCDF support; enable the `netcdf` feature")
}
