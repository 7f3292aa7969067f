use std::ops::Range;

use aem_forward_model::{ForwardModel, Geometry, ObservationFile};
use aem_noise_model::NoiseModel;
use aem_wavelet_tree::GridShape;

use crate::errors::{Result, SamplerError};

/// Everything needed to turn a dense log-conductivity image into a
/// predicted response vector and score it against observations: the
/// per-system forward models (spec §4.3, "the core combines their
/// responses in observation order"), the matching noise models, and the
/// geometry/window-time bookkeeping that ties flattened data-vector
/// indices back to the system they came from.
pub struct Survey {
    shape: GridShape,
    thicknesses: Vec<f64>,
    geometries: Vec<Geometry>,
    models: Vec<Box<dyn ForwardModel>>,
    noise: Vec<NoiseModel>,
    observed: Vec<f64>,
    times: Vec<f64>,
    /// Per system, the list of contiguous index ranges in the flattened
    /// data vector that belong to it (one range per observation point).
    system_ranges: Vec<Vec<Range<usize>>>,
    n_data: usize,
}

impl Survey {
    /// `models`, `noise`, and `window_times` must be in the same per-system
    /// order as each observation point's sub-records (spec §4.3's
    /// "observation order"); every point must carry exactly
    /// `models.len()` systems.
    pub fn build(
        shape: GridShape,
        thicknesses: Vec<f64>,
        obs: &ObservationFile,
        models: Vec<Box<dyn ForwardModel>>,
        noise: Vec<NoiseModel>,
        window_times: Vec<Vec<f64>>,
    ) -> Result<Self> {
        assert_eq!(models.len(), noise.len());
        assert_eq!(models.len(), window_times.len());
        assert_eq!(thicknesses.len(), shape.height());

        let n_systems = models.len();
        let mut geometries = Vec::with_capacity(obs.points.len());
        let mut observed = Vec::new();
        let mut times = Vec::new();
        let mut system_ranges: Vec<Vec<Range<usize>>> = vec![Vec::new(); n_systems];
        let mut cursor = 0usize;

        for point in &obs.points {
            geometries.push(point.geometry);
            if point.systems.len() != n_systems {
                return Err(SamplerError::ResponseLengthMismatch {
                    system: "observation point".to_string(),
                    expected: n_systems,
                    got: point.systems.len(),
                });
            }
            for (s, sys) in point.systems.iter().enumerate() {
                let n = sys.values.len();
                if n != models[s].n_response() {
                    return Err(SamplerError::ResponseLengthMismatch {
                        system: models[s].name().to_string(),
                        expected: models[s].n_response(),
                        got: n,
                    });
                }
                observed.extend_from_slice(&sys.values);
                times.extend_from_slice(&window_times[s]);
                system_ranges[s].push(cursor..cursor + n);
                cursor += n;
            }
        }

        let n_data = cursor;
        Ok(Self {
            shape,
            thicknesses,
            geometries,
            models,
            noise,
            observed,
            times,
            system_ranges,
            n_data,
        })
    }

    pub fn n_data(&self) -> usize {
        self.n_data
    }

    pub fn n_systems(&self) -> usize {
        self.models.len()
    }

    pub fn observed(&self) -> &[f64] {
        &self.observed
    }

    pub fn system_sizes(&self) -> Vec<usize> {
        self.models.iter().map(|m| m.n_response()).collect()
    }

    /// Returns `data`'s per-observation-point block for `system`, one
    /// `Vec` of length `system_sizes()[system]` per point (the sample unit
    /// [`crate::stats::CovarianceAccumulator`] accumulates over).
    pub fn system_point_blocks(&self, system: usize, data: &[f64]) -> Vec<Vec<f64>> {
        self.system_ranges[system].iter().map(|r| data[r.clone()].to_vec()).collect()
    }

    /// Evaluates every observation point's forward response against a
    /// dense, already-inverse-transformed log-conductivity image
    /// (row-major `width x height`, spec §4.7's reconstruction order) and
    /// writes `observed - predicted` into `residual`.
    pub fn compute_residual(&self, image: &[f64], residual: &mut [f64]) -> Result<()> {
        assert_eq!(image.len(), self.shape.n_coeff());
        assert_eq!(residual.len(), self.n_data);

        let w = self.shape.width();
        let h = self.shape.height();
        let mut column = vec![0.0; h];
        let mut cursor = 0usize;
        for (p, geometry) in self.geometries.iter().enumerate() {
            for (row, slot) in column.iter_mut().enumerate() {
                *slot = image[row * w + p].exp();
            }
            for model in self.models.iter() {
                let predicted = model.eval(geometry, &column).map_err(|source| {
                    SamplerError::Forward { system: model.name().to_string(), source }
                })?;
                if predicted.len() != model.n_response() {
                    return Err(SamplerError::ResponseLengthMismatch {
                        system: model.name().to_string(),
                        expected: model.n_response(),
                        got: predicted.len(),
                    });
                }
                let n = predicted.len();
                for (k, pred) in predicted.into_iter().enumerate() {
                    residual[cursor + k] = self.observed[cursor + k] - pred;
                }
                cursor += n;
            }
        }
        debug_assert_eq!(cursor, self.n_data);
        Ok(())
    }

    /// Scores a residual vector under the current hierarchical noise
    /// parameters, one system at a time (each system's block may be
    /// scattered across points, hence the per-system range list), writing
    /// the whitened residual into `normed` and returning the summed
    /// negative log-likelihood and log-normalization (spec §4.3).
    pub fn nll(&self, residual: &[f64], lambda_scale: &[f64], normed: &mut [f64]) -> (f64, f64) {
        assert_eq!(residual.len(), self.n_data);
        assert_eq!(normed.len(), self.n_data);
        assert_eq!(lambda_scale.len(), self.models.len());

        let mut total_nll = 0.0;
        let mut total_log_norm = 0.0;
        for (s, ranges) in self.system_ranges.iter().enumerate() {
            let n: usize = ranges.iter().map(|r| r.len()).sum();
            let mut obs_block = Vec::with_capacity(n);
            let mut time_block = Vec::with_capacity(n);
            let mut res_block = Vec::with_capacity(n);
            for r in ranges {
                obs_block.extend_from_slice(&self.observed[r.clone()]);
                time_block.extend_from_slice(&self.times[r.clone()]);
                res_block.extend_from_slice(&residual[r.clone()]);
            }
            let mut normed_block = vec![0.0; n];
            let (nll, log_norm) =
                self.noise[s].nll(&obs_block, &time_block, &res_block, lambda_scale[s], &mut normed_block);
            total_nll += nll;
            total_log_norm += log_norm;

            let mut i = 0usize;
            for r in ranges {
                normed[r.clone()].copy_from_slice(&normed_block[i..i + r.len()]);
                i += r.len();
            }
        }
        (total_nll, total_log_norm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aem_forward_model::{Direction, ObservationPoint, SystemResponse};

    struct ConstModel {
        name: String,
        n: usize,
        value: f64,
    }

    impl ForwardModel for ConstModel {
        fn name(&self) -> &str {
            &self.name
        }
        fn n_response(&self) -> usize {
            self.n
        }
        fn eval(&self, _geometry: &Geometry, _cond: &[f64]) -> aem_forward_model::Result<Vec<f64>> {
            Ok(vec![self.value; self.n])
        }
    }

    fn geometry() -> Geometry {
        Geometry::from_fields(&[0.0; 10])
    }

    #[test]
    fn residual_is_observed_minus_predicted() {
        let shape = GridShape::new(1, 1); // 2x2
        let obs = ObservationFile {
            points: vec![
                ObservationPoint {
                    geometry: geometry(),
                    systems: vec![SystemResponse { direction: Direction::Z, values: vec![5.0, 6.0] }],
                },
                ObservationPoint {
                    geometry: geometry(),
                    systems: vec![SystemResponse { direction: Direction::Z, values: vec![1.0, 2.0] }],
                },
            ],
        };
        let models: Vec<Box<dyn ForwardModel>> =
            vec![Box::new(ConstModel { name: "sys0".into(), n: 2, value: 3.0 })];
        let noise = vec![aem_noise_model::NoiseModel::IidGaussian(
            aem_noise_model::IidGaussianNoise { sigma0: 1.0 },
        )];
        let survey =
            Survey::build(shape, vec![1.0, 1.0], &obs, models, noise, vec![vec![1.0, 2.0]]).unwrap();
        assert_eq!(survey.n_data(), 4);

        let image = vec![0.0; 4];
        let mut residual = vec![0.0; 4];
        survey.compute_residual(&image, &mut residual).unwrap();
        assert_eq!(residual, vec![2.0, 3.0, -2.0, -1.0]);

        let mut normed = vec![0.0; 4];
        let (nll, log_norm) = survey.nll(&residual, &[1.0], &mut normed);
        assert!(nll > 0.0);
        assert!(log_norm.is_finite());
    }
}
