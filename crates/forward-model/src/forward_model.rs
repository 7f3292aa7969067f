use crate::errors::Result;
use crate::geometry::Geometry;

/// External-collaborator contract for the forward EM solver (spec §1/§4.3):
/// a deterministic map from flight-path geometry and a 1-D layered
/// conductivity column to a per-window response vector. The core treats
/// this as a black box; no geophysical forward solver is reimplemented
/// here (spec §1 Non-goals).
///
/// `eval` must be a pure function of its arguments: the proposal engine
/// relies on re-evaluating the same `(geometry, conductivity)` pair
/// producing bit-identical responses across accept/reject bookkeeping and
/// PT exchanges.
pub trait ForwardModel: Send + Sync {
    /// A short identifier used in log output and `residuals_cov.txt`.
    fn name(&self) -> &str;

    /// Number of response values this system contributes per observation
    /// point; used to validate residual buffer sizing up front.
    fn n_response(&self) -> usize;

    /// Maps `(geometry, layered_conductivity[0..H))` to a response vector
    /// of length `n_response()`.
    fn eval(&self, geometry: &Geometry, layered_conductivity: &[f64]) -> Result<Vec<f64>>;
}

/// Concatenates the responses of several independent forward models (one
/// per survey system) in observation order (spec §4.3: "the core combines
/// their responses in observation order").
pub fn eval_all(
    models: &[Box<dyn ForwardModel>],
    geometry: &Geometry,
    layered_conductivity: &[f64],
) -> Result<Vec<f64>> {
    let mut out = Vec::with_capacity(models.iter().map(|m| m.n_response()).sum());
    for model in models {
        out.extend(model.eval(geometry, layered_conductivity)?);
    }
    Ok(out)
}
