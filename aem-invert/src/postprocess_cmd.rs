use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tracing::info;

use aem_postprocess::{PostprocessConfig, Postprocessor};
use aem_wavelet_tree::Kernel2D;

use crate::cli::PostprocessArgs;
use crate::errors::{InversionError, Result};

/// Replays every `--chain-file` into a pooled per-pixel posterior and
/// writes `mean.txt`, `credible-min.txt`/`credible-max.txt`, and
/// `hpd-min.txt`/`hpd-max.txt` under the output prefix (spec §8 scenario 5:
/// "the produced `mean.txt` and `credible-min/max` files have dimensions
/// `W x H` matching the run").
pub fn run(args: &PostprocessArgs) -> Result<()> {
    let max_depth = args.max_depth.unwrap_or(args.degree_depth.max(args.degree_lateral));
    let kernel = Kernel2D::new(&args.wavelet_horizontal, &args.wavelet_vertical)?;

    let config = PostprocessConfig {
        dx: args.degree_lateral,
        dy: args.degree_depth,
        max_depth,
        kernel,
        exponentiate: args.exponentiate,
        skip: args.skip,
        thin: args.thin,
        hist_bins: args.bins,
        hist_vmin: args.vmin,
        hist_vmax: args.vmax,
    };
    let mut postprocessor = Postprocessor::new(config);
    for path in &args.chain_file {
        let steps = postprocessor.ingest_file(path)?;
        info!(path = %path.display(), steps, "replayed chain-history file");
    }

    let summary = postprocessor.finalize(args.credible_p);
    write_grid(&path_for(&args.output, "mean"), summary.width, summary.height, |p| p.mean, &summary.pixels)?;
    write_grid(&path_for(&args.output, "stddev"), summary.width, summary.height, |p| p.stddev, &summary.pixels)?;
    write_grid(&path_for(&args.output, "mode"), summary.width, summary.height, |p| p.mode, &summary.pixels)?;
    write_grid(&path_for(&args.output, "median"), summary.width, summary.height, |p| p.median, &summary.pixels)?;
    write_grid(
        &path_for(&args.output, "credible-min"),
        summary.width,
        summary.height,
        |p| p.credible_min,
        &summary.pixels,
    )?;
    write_grid(
        &path_for(&args.output, "credible-max"),
        summary.width,
        summary.height,
        |p| p.credible_max,
        &summary.pixels,
    )?;
    write_grid(&path_for(&args.output, "hpd-min"), summary.width, summary.height, |p| p.hpd_min, &summary.pixels)?;
    write_grid(&path_for(&args.output, "hpd-max"), summary.width, summary.height, |p| p.hpd_max, &summary.pixels)?;

    info!(samples = summary.samples, width = summary.width, height = summary.height, "postprocess complete");
    Ok(())
}

fn path_for(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = prefix.file_name().and_then(|n| n.to_str()).unwrap_or("post").to_string();
    name.push('-');
    name.push_str(suffix);
    name.push_str(".txt");
    prefix.with_file_name(name)
}

fn write_grid(
    path: &Path,
    width: usize,
    height: usize,
    select: impl Fn(&aem_postprocess::PixelSummary) -> f64,
    pixels: &[aem_postprocess::PixelSummary],
) -> Result<()> {
    let mut out = String::new();
    writeln!(out, "{height} {width}").ok();
    for row in pixels.chunks(width) {
        let line = row.iter().map(|p| format!("{:.10e}", select(p))).collect::<Vec<_>>().join(" ");
        out.push_str(&line);
        out.push('\n');
    }
    std::fs::write(path, out).map_err(|source| InversionError::Io { path: path.to_path_buf(), source })
}
