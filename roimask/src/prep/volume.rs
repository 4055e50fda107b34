//! Reading, writing and binarizing 3D volumes.

use super::affine::{Affine, AFFINE_TOLERANCE};
use crate::error::{Result, VolumeError};
use ndarray::{Array3, ArrayD, Axis, Ix3};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use std::path::Path;

/// Mask voxels at or above this value become 1, all others 0.
pub const MASK_THRESHOLD: f64 = 1.0;

/// The spatial voxel grid of a volume: its shape and voxel-to-world affine.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Grid {
    pub shape: [usize; 3],
    pub affine: Affine,
}

impl Grid {
    #[inline]
    pub fn new(shape: [usize; 3], affine: Affine) -> Self {
        Self { shape, affine }
    }

    /// Spatial grid of a header. Axes past the third (time, for BOLD series) are ignored.
    pub fn from_header(header: &NiftiHeader) -> Result<Self> {
        let ndim = header.dim[0] as usize;
        if !(3..=7).contains(&ndim) {
            return Err(VolumeError::NotSpatial {
                shape: header.dim[1..=ndim.min(7)]
                    .iter()
                    .map(|&d| d as usize)
                    .collect(),
            });
        }
        let d = &header.dim;
        Ok(Self {
            shape: [d[1] as usize, d[2] as usize, d[3] as usize],
            affine: Affine::from_header(header),
        })
    }

    #[inline]
    pub fn same_shape(&self, other: &Grid) -> bool {
        self.shape == other.shape
    }

    /// Same shape and the same affine within `AFFINE_TOLERANCE`.
    #[inline]
    pub fn matches(&self, other: &Grid) -> bool {
        self.same_shape(other) && self.affine.approx_eq(&other.affine, AFFINE_TOLERANCE)
    }

    #[inline]
    pub(crate) fn shape_tuple(&self) -> (usize, usize, usize) {
        (self.shape[0], self.shape[1], self.shape[2])
    }
}

/// Reads only the header of a NIfTI file and returns its spatial grid.
pub fn read_grid<P: AsRef<Path>>(path: P) -> Result<Grid> {
    let path = path.as_ref();
    let header = NiftiHeader::from_file(path).map_err(|source| VolumeError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Grid::from_header(&header)
}

/// A 3D volume of `f64` voxels on a known grid.
#[derive(Clone, Debug)]
pub struct Volume {
    data: Array3<f64>,
    grid: Grid,
}

impl Volume {
    pub fn from_parts(data: Array3<f64>, affine: Affine) -> Self {
        let (nx, ny, nz) = data.dim();
        Self {
            data,
            grid: Grid::new([nx, ny, nz], affine),
        }
    }

    /// Reads a `.nii` / `.nii.gz` file. Scaling is applied and trailing singleton axes are
    /// dropped; anything that is not spatially 3D after that is rejected.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let read_err = |source| VolumeError::Read {
            path: path.to_path_buf(),
            source,
        };
        let obj = ReaderOptions::new().read_file(path).map_err(read_err)?;
        let affine = Affine::from_header(obj.header());
        let data = obj
            .into_volume()
            .into_ndarray::<f64>()
            .map_err(read_err)?;
        Ok(Self::from_parts(into_spatial(data)?, affine))
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let header = self.header();
        WriterOptions::new(path)
            .reference_header(&header)
            .write_nifti(&self.data)
            .map_err(|source| VolumeError::Write {
                path: path.to_path_buf(),
                source,
            })
    }

    #[inline]
    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    #[inline]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Sets voxels `>= MASK_THRESHOLD` to 1 and everything else (NaN included) to 0.
    pub fn binarize(&mut self) {
        self.data
            .mapv_inplace(|v| if v >= MASK_THRESHOLD { 1.0 } else { 0.0 });
    }

    #[inline]
    pub fn binarized(mut self) -> Self {
        self.binarize();
        self
    }

    pub fn count_nonzero(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0.0).count()
    }

    /// A minimal NIfTI-1 header carrying this volume's grid as an sform.
    fn header(&self) -> NiftiHeader {
        let [nx, ny, nz] = self.grid.shape;
        let zooms = self.grid.affine.zooms();
        let [srow_x, srow_y, srow_z] = self.grid.affine.to_srows();
        NiftiHeader {
            dim: [3, nx as u16, ny as u16, nz as u16, 1, 1, 1, 1],
            pixdim: [
                1.0,
                zooms[0] as f32,
                zooms[1] as f32,
                zooms[2] as f32,
                1.0,
                1.0,
                1.0,
                1.0,
            ],
            scl_slope: 1.0,
            scl_inter: 0.0,
            qform_code: 0,
            sform_code: 2,
            srow_x,
            srow_y,
            srow_z,
            ..NiftiHeader::default()
        }
    }
}

fn into_spatial(mut data: ArrayD<f64>) -> Result<Array3<f64>> {
    let shape = data.shape().to_vec();
    let not_spatial = || VolumeError::NotSpatial {
        shape: shape.clone(),
    };
    if data.ndim() < 3 {
        return Err(not_spatial());
    }
    while data.ndim() > 3 {
        let last = Axis(data.ndim() - 1);
        if data.len_of(last) != 1 {
            return Err(not_spatial());
        }
        data = data.index_axis_move(last, 0);
    }
    data.into_dimensionality::<Ix3>().map_err(|_| not_spatial())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, IxDyn};

    fn cube() -> Array3<f64> {
        Array3::from_shape_fn((2, 3, 4), |(i, j, k)| (i * 100 + j * 10 + k) as f64)
    }

    #[test]
    fn test_binarize() {
        let data = array![[[0.2, 1.0], [3.5, f64::NAN]], [[-2.0, 0.999], [1.0, 0.0]]];
        let v = Volume::from_parts(data, Affine::identity()).binarized();
        let expected = array![[[0.0, 1.0], [1.0, 0.0]], [[0.0, 0.0], [1.0, 0.0]]];
        assert_eq!(v.data(), &expected);
        assert_eq!(v.count_nonzero(), 3);
    }

    #[test]
    fn test_into_spatial_drops_singleton_axes() {
        let data = ArrayD::from_shape_fn(IxDyn(&[2, 3, 4, 1, 1]), |ix| {
            (ix[0] * 100 + ix[1] * 10 + ix[2]) as f64
        });
        assert_eq!(into_spatial(data).unwrap(), cube());
    }

    #[test]
    fn test_into_spatial_rejects_time_series() {
        let data = ArrayD::<f64>::zeros(IxDyn(&[2, 2, 2, 5]));
        assert!(matches!(
            into_spatial(data),
            Err(VolumeError::NotSpatial { shape }) if shape == vec![2, 2, 2, 5]
        ));
    }

    #[test]
    fn test_into_spatial_rejects_2d() {
        let data = ArrayD::<f64>::zeros(IxDyn(&[4, 4]));
        assert!(into_spatial(data).is_err());
    }

    #[test]
    fn test_grid_matches() {
        let a = Grid::new([4, 4, 4], Affine::scaling([2.0; 3]));
        let b = Grid::new([4, 4, 4], Affine::scaling([2.0, 2.0, 2.00001]));
        let c = Grid::new([4, 4, 4], Affine::scaling([3.0; 3]));
        let d = Grid::new([4, 4, 5], Affine::scaling([2.0; 3]));
        assert!(a.matches(&b));
        assert!(!a.matches(&c));
        assert!(a.same_shape(&c));
        assert!(!a.matches(&d));
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.nii.gz");
        let affine = Affine::from_rows([
            [-2.0, 0.0, 0.0, 90.0],
            [0.0, 2.0, 0.0, -126.0],
            [0.0, 0.0, 2.0, -72.0],
        ]);
        Volume::from_parts(cube(), affine).write(&path).unwrap();

        let v = Volume::read(&path).unwrap();
        assert_eq!(v.data(), &cube());
        assert!(v.grid().affine.approx_eq(&affine, 1e-6));

        let grid = read_grid(&path).unwrap();
        assert_eq!(grid.shape, [2, 3, 4]);
        assert!(grid.matches(v.grid()));
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Volume::read(dir.path().join("absent.nii.gz")).unwrap_err();
        assert!(matches!(err, VolumeError::Read { .. }));
    }
}
