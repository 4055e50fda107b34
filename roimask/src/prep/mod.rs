pub mod affine;
pub mod improc;
pub mod iter;
pub mod pos;
pub mod timer;
pub mod volume;

pub use affine::Affine;
pub use improc::{masked_mean, masked_values, resample_nearest};
pub use iter::VoxelIter;
pub use pos::VoxelPos;
pub use timer::AccTimer;
pub use volume::{read_grid, Grid, Volume};
