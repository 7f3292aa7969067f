use std::f64::consts::TAU;
use std::fs;
use std::path::Path;

use aem_forward_model::FormatError;
use serde::{Deserialize, Serialize};

type Result<T> = std::result::Result<T, FormatError>;

/// IID Gaussian noise: a single base standard deviation, scaled by the
/// hierarchical parameter `lambda_scale`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IidGaussianNoise {
    pub sigma0: f64,
}

/// Hyperbolic noise: standard deviation decays with a power of time and
/// grows with signal magnitude, `sigma_i = A * time_i^(-C) + B * |observed_i|`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HyperbolicNoise {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

/// Additive-plus-multiplicative ("Brodie") noise:
/// `sigma_i = sqrt(additive^2 + (multiplicative * observed_i)^2)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrodieNoise {
    pub additive: f64,
    pub multiplicative: f64,
}

/// Full covariance-matrix noise model, eigendecomposed offline:
/// `Sigma = V diag(eigenvalues) V^T`. `lambda_scale` multiplies every
/// eigenvalue uniformly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CovarianceNoise {
    pub eigenvalues: Vec<f64>,
    /// Row-major `n x n` eigenvector matrix, columns are eigenvectors.
    pub eigenvectors: Vec<f64>,
}

impl CovarianceNoise {
    fn n(&self) -> usize {
        self.eigenvalues.len()
    }

    /// `V^T residual`, i.e. residual expressed in the eigenbasis.
    fn project(&self, residual: &[f64]) -> Vec<f64> {
        let n = self.n();
        let mut out = vec![0.0; n];
        for (k, slot) in out.iter_mut().enumerate() {
            let mut acc = 0.0;
            for i in 0..n {
                acc += self.eigenvectors[i * n + k] * residual[i];
            }
            *slot = acc;
        }
        out
    }
}

/// Sum type collapsing the source's noise-model inheritance hierarchy
/// (spec §9 Design Notes) into one enum with a uniform `nll` operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NoiseModel {
    IidGaussian(IidGaussianNoise),
    Hyperbolic(HyperbolicNoise),
    Brodie(BrodieNoise),
    Covariance(CovarianceNoise),
}

impl NoiseModel {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::IidGaussian(_) => "iidgaussian",
            Self::Hyperbolic(_) => "hyperbolic",
            Self::Brodie(_) => "brodie",
            Self::Covariance(_) => "covariance",
        }
    }

    /// Negative log-likelihood and log-normalization term for a residual
    /// vector under the current `lambda_scale`, also filling `out_normed`
    /// with the per-sample whitened residual (spec §4.3).
    pub fn nll(
        &self,
        observed: &[f64],
        time: &[f64],
        residual: &[f64],
        lambda_scale: f64,
        out_normed: &mut [f64],
    ) -> (f64, f64) {
        assert_eq!(residual.len(), out_normed.len());
        match self {
            Self::IidGaussian(m) => {
                let n = residual.len();
                let sigma = lambda_scale * m.sigma0;
                let mut nll = 0.0;
                for i in 0..n {
                    out_normed[i] = residual[i] / sigma;
                    nll += 0.5 * out_normed[i] * out_normed[i];
                }
                let log_norm = n as f64 * (sigma.ln() + 0.5 * TAU.ln());
                (nll, log_norm)
            }
            Self::Hyperbolic(m) => {
                assert_eq!(time.len(), residual.len());
                let mut nll = 0.0;
                let mut log_norm = 0.0;
                for i in 0..residual.len() {
                    let base_sigma = m.a * time[i].powf(-m.c) + m.b * observed[i].abs();
                    let sigma = lambda_scale * base_sigma;
                    out_normed[i] = residual[i] / sigma;
                    nll += 0.5 * out_normed[i] * out_normed[i];
                    log_norm += sigma.ln() + 0.5 * TAU.ln();
                }
                (nll, log_norm)
            }
            Self::Brodie(m) => {
                let mut nll = 0.0;
                let mut log_norm = 0.0;
                for i in 0..residual.len() {
                    let base_sigma =
                        (m.additive.powi(2) + (m.multiplicative * observed[i]).powi(2)).sqrt();
                    let sigma = lambda_scale * base_sigma;
                    out_normed[i] = residual[i] / sigma;
                    nll += 0.5 * out_normed[i] * out_normed[i];
                    log_norm += sigma.ln() + 0.5 * TAU.ln();
                }
                (nll, log_norm)
            }
            Self::Covariance(m) => {
                let projected = m.project(residual);
                let mut nll = 0.0;
                let mut log_norm = 0.0;
                for (k, &p) in projected.iter().enumerate() {
                    let eig = lambda_scale * m.eigenvalues[k];
                    out_normed[k] = p / eig.sqrt();
                    nll += 0.5 * out_normed[k] * out_normed[k];
                    log_norm += 0.5 * (eig.ln() + TAU.ln());
                }
                (nll, log_norm)
            }
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|source| FormatError::Io { path: path.to_path_buf(), source })?;
        Self::parse(&text, path)
    }

    fn parse(text: &str, path: &Path) -> Result<Self> {
        let mut tokens = text.split_whitespace();
        let tag = tokens.next().ok_or_else(|| FormatError::Parse {
            path: path.to_path_buf(),
            line: 1,
            message: "empty hierarchical-noise file".to_string(),
        })?;

        let parse_f64 = |tokens: &mut std::str::SplitWhitespace, what: &str| -> Result<f64> {
            tokens
                .next()
                .and_then(|t| t.parse().ok())
                .ok_or_else(|| FormatError::Parse {
                    path: path.to_path_buf(),
                    line: 1,
                    message: format!("expected a float for '{what}'"),
                })
        };

        match tag.to_ascii_lowercase().as_str() {
            "iidgaussian" => {
                let sigma0 = parse_f64(&mut tokens, "sigma0")?;
                Ok(Self::IidGaussian(IidGaussianNoise { sigma0 }))
            }
            "hyperbolic" => {
                let a = parse_f64(&mut tokens, "A")?;
                let b = parse_f64(&mut tokens, "B")?;
                let c = parse_f64(&mut tokens, "C")?;
                Ok(Self::Hyperbolic(HyperbolicNoise { a, b, c }))
            }
            "brodie" => {
                let additive = parse_f64(&mut tokens, "additive")?;
                let multiplicative = parse_f64(&mut tokens, "multiplicative")?;
                Ok(Self::Brodie(BrodieNoise { additive, multiplicative }))
            }
            "covariance" => {
                let n: usize = tokens
                    .next()
                    .and_then(|t| t.parse().ok())
                    .ok_or_else(|| FormatError::Parse {
                        path: path.to_path_buf(),
                        line: 1,
                        message: "expected eigenbasis dimension".to_string(),
                    })?;
                let mut eigenvalues = Vec::with_capacity(n);
                for _ in 0..n {
                    eigenvalues.push(parse_f64(&mut tokens, "eigenvalue")?);
                }
                let mut eigenvectors = Vec::with_capacity(n * n);
                for _ in 0..(n * n) {
                    eigenvectors.push(parse_f64(&mut tokens, "eigenvector component")?);
                }
                Ok(Self::Covariance(CovarianceNoise { eigenvalues, eigenvectors }))
            }
            other => Err(FormatError::UnknownNoiseModel(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iid_gaussian_whitens_and_scales_with_lambda() {
        let m = NoiseModel::IidGaussian(IidGaussianNoise { sigma0: 2.0 });
        let residual = vec![2.0, -4.0];
        let mut out = vec![0.0; 2];
        let (nll, _) = m.nll(&[], &[], &residual, 1.0, &mut out);
        assert!((out[0] - 1.0).abs() < 1e-12);
        assert!((out[1] + 2.0).abs() < 1e-12);
        assert!(nll > 0.0);

        let (nll_scaled, _) = m.nll(&[], &[], &residual, 2.0, &mut out);
        assert!(nll_scaled < nll, "doubling sigma should reduce the nll term");
    }

    #[test]
    fn covariance_model_diagonalizes_identity() {
        let m = NoiseModel::Covariance(CovarianceNoise {
            eigenvalues: vec![1.0, 4.0],
            eigenvectors: vec![1.0, 0.0, 0.0, 1.0],
        });
        let residual = vec![3.0, 4.0];
        let mut out = vec![0.0; 2];
        let (_, log_norm) = m.nll(&[], &[], &residual, 1.0, &mut out);
        assert!(log_norm.is_finite());
        assert!((out[0] - 3.0).abs() < 1e-9);
        assert!((out[1] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn parse_dispatches_on_tag() {
        let m = NoiseModel::parse("iidgaussian 0.5", Path::new("n.txt")).unwrap();
        assert_eq!(m.tag(), "iidgaussian");
        let err = NoiseModel::parse("bogus 1 2 3", Path::new("n.txt")).unwrap_err();
        assert!(matches!(err, FormatError::UnknownNoiseModel(_)));
    }
}
