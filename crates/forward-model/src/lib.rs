//! Geometry types, the `ForwardModel` external-collaborator contract, and
//! text-format readers/writers for observation files, image files, and STM
//! forward-model descriptors (spec §6).

mod errors;
mod forward_model;
mod geometry;
mod image;
mod layers;
mod obs;
mod stm;
mod stm_model;

pub use errors::{FormatError, Result};
pub use forward_model::{eval_all, ForwardModel};
pub use geometry::{Direction, Geometry};
pub use image::ImageFile;
pub use layers::{layer_bottoms, log_spaced_thicknesses};
pub use obs::{ObservationFile, ObservationPoint, SystemResponse};
pub use stm::{Section, StmDescriptor, Window};
pub use stm_model::StmForwardModel;
