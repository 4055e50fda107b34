//! NIfTI volume primitives for region-of-interest statistics.
//!
//! Volumes are read into `f64` arrays of exactly three spatial axes, masks are
//! binarized to {0, 1}, and a mask can be moved onto another voxel grid with
//! nearest-neighbour resampling before it is applied to a statistical map.

pub mod error;
pub mod prelude;
pub mod prep;

pub use error::{Result, VolumeError};
