use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Trans-dimensional RJ-MCMC inversion of airborne electromagnetic survey
/// data (spec §6 "External interfaces: CLI surface").
#[derive(Debug, Parser)]
#[command(name = "aem-invert", about = "RJ-MCMC inversion of AEM survey data", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Runs the PT/RJ-MCMC sampler and writes chain-history segments plus
    /// the per-run diagnostic files (spec §6 output list).
    Invert(InvertArgs),
    /// Replays one or more chain-history files and writes per-pixel
    /// posterior summaries (spec §4.7, §8 scenario 5).
    Postprocess(PostprocessArgs),
}

#[derive(Debug, Parser)]
pub struct InvertArgs {
    /// Observation file (spec §6 "Observation file").
    #[arg(long)]
    pub input: PathBuf,

    /// Initial model image file; a uniform image seeds the tree's root
    /// coefficient (spec §8 scenario 1: "constant initial model").
    #[arg(long)]
    pub initial: PathBuf,

    /// STM forward-model descriptor, one per survey system, in
    /// observation order (spec §6 "STM forward-model descriptor").
    #[arg(long = "stm", required = true)]
    pub stm: Vec<PathBuf>,

    /// Hierarchical-noise file, one per survey system, in the same order
    /// as `--stm` (spec §6 "Hierarchical-noise file").
    #[arg(long = "hierarchical", required = true)]
    pub hierarchical: Vec<PathBuf>,

    /// Prior/proposal configuration file (spec §4.2).
    #[arg(long = "prior-file")]
    pub prior_file: PathBuf,

    /// Output path prefix; per-chain files are suffixed `-NNN`.
    #[arg(long)]
    pub output: PathBuf,

    /// `dy`: wavelet-tree grid exponent along the vertical (depth) axis.
    #[arg(long = "degree-depth")]
    pub degree_depth: u32,

    /// `dx`: wavelet-tree grid exponent along the lateral axis.
    #[arg(long = "degree-lateral")]
    pub degree_lateral: u32,

    /// Total physical depth (metres) spanned by the derived log-spaced
    /// layer thicknesses (spec §3).
    #[arg(long)]
    pub depth: f64,

    /// Total number of driver steps per replica.
    #[arg(long)]
    pub total: u64,

    /// Base RNG seed; rank `r`'s seed is `seed + r * seed_mult` (spec §5).
    #[arg(long, default_value_t = 1)]
    pub seed: u64,

    /// `kmax`: maximum live coefficient count (spec §4.1).
    #[arg(long)]
    pub kmax: usize,

    /// Combined birth+death move probability (spec §6 `--birth-probability`).
    #[arg(long = "birth-probability", default_value_t = 0.1)]
    pub birth_probability: f64,

    /// Hierarchical (`lambda_scale`) move probability.
    #[arg(long = "hierarchical-probability", default_value_t = 0.05)]
    pub hierarchical_probability: f64,

    /// Hierarchical-prior-width move probability.
    #[arg(long = "hierarchical-prior-probability", default_value_t = 0.05)]
    pub hierarchical_prior_probability: f64,

    /// Named vertical 1-D wavelet kernel (`haar` or `cdf53`).
    #[arg(long = "wavelet-vertical", default_value = "haar")]
    pub wavelet_vertical: String,

    /// Named horizontal 1-D wavelet kernel (`haar` or `cdf53`).
    #[arg(long = "wavelet-horizontal", default_value = "haar")]
    pub wavelet_horizontal: String,

    /// `chains_per_T`: replicas sharing each temperature rung (spec §4.5).
    #[arg(long, default_value_t = 1)]
    pub chains: usize,

    /// `M`: number of temperature-ladder rungs (spec §4.5).
    #[arg(long, default_value_t = 1)]
    pub temperatures: usize,

    /// Hottest rung's temperature; ignored when `--temperatures 1`.
    #[arg(long = "max-temperature", default_value_t = 10.0)]
    pub max_temperature: f64,

    /// Driver steps between PT swap rounds (spec §4.5).
    #[arg(long = "exchange-rate", default_value_t = 10)]
    pub exchange_rate: u64,

    /// Enables periodic resampling (spec §4.5 "Resampling").
    #[arg(long, default_value_t = false)]
    pub resample: bool,

    /// Driver steps between resample rounds; defaults to `--exchange-rate`.
    #[arg(long = "resample-rate")]
    pub resample_rate: Option<u64>,

    /// Log-random-walk step size for the hierarchical `lambda_scale` move.
    #[arg(long = "lambda-std", default_value_t = 0.1)]
    pub lambda_std: f64,

    /// Log-random-walk step size for the hierarchical prior-width move.
    #[arg(long = "prior-std", default_value_t = 0.1)]
    pub prior_std: f64,

    /// Ring-buffer capacity (records) for each chain's `ch.dat` segment.
    #[arg(long = "history-capacity", default_value_t = 4096)]
    pub history_capacity: usize,

    /// Residual diagnostic histogram bin count.
    #[arg(long = "residual-hist-bins", default_value_t = 200)]
    pub residual_hist_bins: usize,

    /// Residual diagnostic histogram lower bound.
    #[arg(long = "residual-vmin", default_value_t = -10.0)]
    pub residual_vmin: f64,

    /// Residual diagnostic histogram upper bound.
    #[arg(long = "residual-vmax", default_value_t = 10.0)]
    pub residual_vmax: f64,

    /// Disables likelihood evaluation for pure-prior diagnostics (spec §6
    /// "Posterior-k mode").
    #[arg(long, default_value_t = false)]
    pub posteriork: bool,

    /// `tracing_subscriber::EnvFilter` level (e.g. `info`, `debug`).
    #[arg(long, default_value = "info")]
    pub verbosity: String,
}

#[derive(Debug, Parser)]
pub struct PostprocessArgs {
    /// One or more chain-history files to replay and pool together.
    #[arg(long = "chain-file", required = true)]
    pub chain_file: Vec<PathBuf>,

    /// `dy`: grid exponent along the vertical axis (must match the run
    /// that produced the chain-history files).
    #[arg(long = "degree-depth")]
    pub degree_depth: u32,

    /// `dx`: grid exponent along the lateral axis.
    #[arg(long = "degree-lateral")]
    pub degree_lateral: u32,

    /// Maximum coefficient depth used by the originating run; defaults to
    /// the grid's natural maximum (`max(degree_depth, degree_lateral)`).
    #[arg(long = "max-depth")]
    pub max_depth: Option<u32>,

    /// Named vertical 1-D wavelet kernel used by the originating run.
    #[arg(long = "wavelet-vertical", default_value = "haar")]
    pub wavelet_vertical: String,

    /// Named horizontal 1-D wavelet kernel used by the originating run.
    #[arg(long = "wavelet-horizontal", default_value = "haar")]
    pub wavelet_horizontal: String,

    /// Exponentiates the reconstructed image back out of log-conductivity
    /// space before accumulating statistics.
    #[arg(long, default_value_t = false)]
    pub exponentiate: bool,

    /// Number of leading steps to discard (spec §8 scenario 5).
    #[arg(long, default_value_t = 0)]
    pub skip: u64,

    /// Keep every `thin`-th step after `--skip` (spec §8 scenario 5).
    #[arg(long, default_value_t = 1)]
    pub thin: u64,

    /// Per-pixel posterior histogram bin count.
    #[arg(long, default_value_t = 1000)]
    pub bins: usize,

    /// Per-pixel posterior histogram lower bound.
    #[arg(long, default_value_t = 0.001)]
    pub vmin: f64,

    /// Per-pixel posterior histogram upper bound.
    #[arg(long, default_value_t = 1.0)]
    pub vmax: f64,

    /// Credible/HPD interval mass fraction (e.g. `0.9` for a 90% interval).
    #[arg(long = "credible-p", default_value_t = 0.9)]
    pub credible_p: f64,

    /// Output path prefix; writes `<prefix>mean.txt`, `<prefix>credible-min.txt`,
    /// etc.
    #[arg(long)]
    pub output: PathBuf,
}
