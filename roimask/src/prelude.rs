pub use super::error::{Result, VolumeError};
pub use super::prep::affine::{Affine, AFFINE_TOLERANCE};
pub use super::prep::improc::{masked_mean, masked_values, resample_nearest};
pub use super::prep::iter::VoxelIter;
pub use super::prep::pos::VoxelPos;
pub use super::prep::timer::AccTimer;
pub use super::prep::volume::{read_grid, Grid, Volume, MASK_THRESHOLD};
