use std::path::PathBuf;
use thiserror::Error;

/// Result alias for volume operations.
pub type Result<T> = std::result::Result<T, VolumeError>;

#[derive(Error, Debug)]
pub enum VolumeError {
    #[error("failed to read NIfTI file `{}`", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: nifti::NiftiError,
    },

    #[error("failed to write NIfTI file `{}`", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: nifti::NiftiError,
    },

    /// The volume has fewer than three dimensions, or a non-singleton axis past the third.
    #[error("volume of shape {shape:?} is not a 3D spatial volume")]
    NotSpatial { shape: Vec<usize> },

    #[error("grid mismatch: {left:?} against {right:?}")]
    ShapeMismatch { left: [usize; 3], right: [usize; 3] },

    #[error("voxel-to-world affine is singular")]
    SingularAffine,
}
