use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tracing::info;

use aem_forward_model::{log_spaced_thicknesses, ForwardModel, ImageFile, ObservationFile, StmDescriptor, StmForwardModel};
use aem_noise_model::NoiseModel;
use aem_prior::PriorProposal;
use aem_pt::{Driver, TemperatureLadder};
use aem_sampler::{ChainHistory, ChainState, MoveProbabilities, ProposalEngine, Survey};
use aem_wavelet_tree::{GridShape, Kernel2D, WaveletTree};

use crate::cli::InvertArgs;
use crate::errors::{InversionError, Result};

/// Builds every input artefact, drives the PT/RJ-MCMC loop for
/// `args.total` steps, and writes the spec §6 output surface.
pub fn run(args: &InvertArgs) -> Result<()> {
    if args.stm.len() != args.hierarchical.len() {
        return Err(InversionError::Validation(format!(
            "--stm was given {} paths but --hierarchical was given {}; they pair up one-to-one by system",
            args.stm.len(),
            args.hierarchical.len()
        )));
    }
    let total_replicas = args.temperatures * args.chains;
    if total_replicas == 0 || total_replicas % 2 != 0 {
        return Err(InversionError::Validation(format!(
            "temperatures x chains must be even and nonzero, got {}x{}={}",
            args.temperatures, args.chains, total_replicas
        )));
    }

    let shape = GridShape::new(args.degree_lateral, args.degree_depth);
    let thicknesses = log_spaced_thicknesses(shape.height(), args.depth);

    let obs = ObservationFile::load(&args.input)?;
    let initial = ImageFile::load(&args.initial)?;
    let prior = PriorProposal::load(&args.prior_file)?;

    let mut models: Vec<Box<dyn ForwardModel>> = Vec::with_capacity(args.stm.len());
    let mut window_times = Vec::with_capacity(args.stm.len());
    for (i, stm_path) in args.stm.iter().enumerate() {
        let descriptor = StmDescriptor::load(stm_path)?;
        window_times.push(descriptor.windows.iter().map(|w| w.centre()).collect());
        models.push(Box::new(StmForwardModel::new(
            format!("system{i}"),
            &descriptor,
            thicknesses.clone(),
        )) as Box<dyn ForwardModel>);
    }
    let noise: Vec<NoiseModel> = args
        .hierarchical
        .iter()
        .map(NoiseModel::load)
        .collect::<std::result::Result<_, _>>()?;

    let survey = Survey::build(shape, thicknesses, &obs, models, noise, window_times)?;
    let system_sizes = survey.system_sizes();

    let kernel = Kernel2D::new(&args.wavelet_horizontal, &args.wavelet_vertical)?;
    let max_depth = shape.max_depth();
    let root_value = initial.data.iter().sum::<f64>() / initial.data.len().max(1) as f64;

    let ladder = TemperatureLadder::new(args.temperatures, args.chains, args.max_temperature)?;
    let n_replicas = ladder.total_replicas();
    let move_probs = MoveProbabilities::new(
        args.birth_probability,
        args.hierarchical_probability,
        args.hierarchical_prior_probability,
    );

    let mut chains = Vec::with_capacity(n_replicas);
    let mut engines = Vec::with_capacity(n_replicas);
    let mut histories = Vec::with_capacity(n_replicas);
    for r in 0..n_replicas {
        let mut tree = WaveletTree::with_max_depth(shape.dx, shape.dy, max_depth);
        tree.init(root_value);
        let temperature = ladder.temperature_of(r);
        let seed = args.seed.wrapping_add(r as u64);

        let mut chain = ChainState::new(
            tree,
            kernel.clone(),
            survey.n_systems(),
            survey.n_data(),
            &system_sizes,
            seed,
            temperature,
            args.kmax,
            args.residual_hist_bins,
            args.residual_vmin,
            args.residual_vmax,
        );
        chain.recompute_likelihood(&survey)?;

        let history = ChainHistory::create(
            chain_path(&args.output, r),
            args.history_capacity,
            &chain.tree,
            &chain.lambda_scale,
            chain.temperature,
            chain.likelihood,
            chain.log_normalization,
        )?;

        chains.push(chain);
        engines.push(ProposalEngine::new(
            max_depth,
            args.kmax,
            args.posteriork,
            args.lambda_std,
            args.prior_std,
        ));
        histories.push(history);
    }

    let resample_rate = args.resample.then(|| args.resample_rate.unwrap_or(args.exchange_rate));

    let mut driver = Driver::new(
        ladder,
        &survey,
        &prior,
        move_probs,
        chains,
        engines,
        histories,
        args.exchange_rate,
        resample_rate,
        args.seed ^ 0x9e37_79b9_7f4a_7c15,
    );

    driver.run(args.total)?;
    write_outputs(&driver, args)?;
    info!(output = %args.output.display(), total = args.total, replicas = n_replicas, "inversion run complete");
    Ok(())
}

fn chain_path(prefix: &Path, replica: usize) -> PathBuf {
    suffixed(prefix, replica, "dat")
}

fn suffixed(prefix: &Path, replica: usize, ext: &str) -> PathBuf {
    let mut name = prefix.file_name().and_then(|n| n.to_str()).unwrap_or("ch").to_string();
    write!(name, "-{replica:03}.{ext}").ok();
    prefix.with_file_name(name)
}

/// Writes every per-replica diagnostic file plus the shared `acceptance.txt`
/// (spec §6's output list, §4 SPEC_FULL.md "khistogram"/"residuals_cov.txt"
/// supplemented features).
fn write_outputs(driver: &Driver, args: &InvertArgs) -> Result<()> {
    driver.write_acceptance_report(acceptance_path(&args.output))?;

    let shape = GridShape::new(args.degree_lateral, args.degree_depth);
    for (r, chain) in driver.chains().iter().enumerate() {
        write_final_model(chain, &shape, args, r)?;
        write_residuals(chain, args, r)?;
        write_residuals_normed(chain, args, r)?;
        write_residuals_hist(chain, args, r)?;
        write_residuals_cov(chain, args, r)?;
        write_khistogram(chain, args, r)?;
    }
    Ok(())
}

fn acceptance_path(prefix: &Path) -> PathBuf {
    let mut name = prefix.file_name().and_then(|n| n.to_str()).unwrap_or("ch").to_string();
    name.push_str("-acceptance.txt");
    prefix.with_file_name(name)
}

fn write_final_model(chain: &ChainState, shape: &GridShape, args: &InvertArgs, r: usize) -> Result<()> {
    let mut image = vec![0.0; shape.n_coeff()];
    chain.tree.map_to_array(&mut image);
    let kernel = Kernel2D::new(&args.wavelet_horizontal, &args.wavelet_vertical)?;
    kernel.inverse_2d(&mut image, shape.width(), shape.height())?;
    let path = suffixed(&args.output, r, "final_model.txt");
    let file = ImageFile::new(shape.height(), shape.width(), args.depth, image);
    file.save(&path).map_err(|source| match source {
        aem_forward_model::FormatError::Io { path, source } => InversionError::Io { path, source },
        other => InversionError::Format(other),
    })
}

fn write_plain_column(path: &Path, values: &[f64]) -> Result<()> {
    let mut out = String::with_capacity(values.len() * 16);
    for v in values {
        writeln!(out, "{v:.10e}").ok();
    }
    std::fs::write(path, out).map_err(|source| InversionError::Io { path: path.to_path_buf(), source })
}

fn write_residuals(chain: &ChainState, args: &InvertArgs, r: usize) -> Result<()> {
    write_plain_column(&suffixed(&args.output, r, "residuals.txt"), &chain.residual)
}

fn write_residuals_normed(chain: &ChainState, args: &InvertArgs, r: usize) -> Result<()> {
    write_plain_column(&suffixed(&args.output, r, "residuals_normed.txt"), &chain.residual_normed)
}

fn write_residuals_hist(chain: &ChainState, args: &InvertArgs, r: usize) -> Result<()> {
    let (vmin, vmax) = chain.residual_histogram.bin_edges();
    let mut out = String::new();
    writeln!(out, "{vmin:.10e} {vmax:.10e} {}", chain.residual_histogram.bins().len()).ok();
    for count in chain.residual_histogram.bins() {
        writeln!(out, "{count}").ok();
    }
    let path = suffixed(&args.output, r, "residuals_hist.txt");
    std::fs::write(&path, out).map_err(|source| InversionError::Io { path, source })
}

fn write_residuals_cov(chain: &ChainState, args: &InvertArgs, r: usize) -> Result<()> {
    let mut out = String::new();
    for (s, acc) in chain.system_covariance.iter().enumerate() {
        let n = acc.n();
        writeln!(out, "system{s} {n}").ok();
        let cov = acc.covariance();
        for row in cov.chunks(n) {
            let line = row.iter().map(|v| format!("{v:.10e}")).collect::<Vec<_>>().join(" ");
            out.push_str(&line);
            out.push('\n');
        }
    }
    let path = suffixed(&args.output, r, "residuals_cov.txt");
    std::fs::write(&path, out).map_err(|source| InversionError::Io { path, source })
}

fn write_khistogram(chain: &ChainState, args: &InvertArgs, r: usize) -> Result<()> {
    let mut out = String::new();
    for count in &chain.khistogram {
        writeln!(out, "{count}").ok();
    }
    let path = suffixed(&args.output, r, "khistogram.txt");
    std::fs::write(&path, out).map_err(|source| InversionError::Io { path, source })
}
