//! Output filename templating.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tint_grid::{format_stamp, time_bounds, Dataset, TIME_DIM};

pub const START_TOKEN: &str = "{start}";
pub const END_TOKEN: &str = "{end}";

pub fn has_placeholders(template: &str) -> bool {
    template.contains(START_TOKEN) || template.contains(END_TOKEN)
}

/// Substitutes the `{start}`/`{end}` tokens; any other text is kept as-is.
pub fn render(template: &str, start: &str, end: &str) -> String {
    template.replace(START_TOKEN, start).replace(END_TOKEN, end)
}

/// Resolves the output path for a tracked dataset.
///
/// The time coordinate is only consulted when the template asks for it.
pub fn output_path(template: &str, tracks: &Dataset) -> Result<PathBuf> {
    if !has_placeholders(template) {
        return Ok(PathBuf::from(template));
    }
    let (start, end) = time_bounds(tracks, TIME_DIM)
        .context("computing time bounds for the output filename")?;
    Ok(PathBuf::from(render(
        template,
        &format_stamp(&start),
        &format_stamp(&end),
    )))
}
