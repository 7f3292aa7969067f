//! Pluggable hierarchical noise models (spec §4.3): IID Gaussian, hyperbolic,
//! Brodie additive+multiplicative, and eigendecomposed covariance, unified
//! behind the `NoiseModel` sum type's `nll()`.

mod model;

pub use model::{BrodieNoise, CovarianceNoise, HyperbolicNoise, IidGaussianNoise, NoiseModel};
