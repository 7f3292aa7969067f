//! Sparse 2D wavelet-coefficient quadtree: the trans-dimensional model
//! representation sampled by the RJ-MCMC proposal engine.

mod change;
mod errors;
mod index;
mod kernels;
mod tree;

pub use change::{ChangeKind, ChangeRecord};
pub use errors::{Result, WaveletTreeError};
pub use index::GridShape;
pub use kernels::{Kernel2D, KernelKind};
pub use tree::{SerializedTree, WaveletTree};
