//! Masking, reduction and resampling.

use super::iter::VoxelIter;
use super::pos::VoxelPos;
use super::volume::{Grid, Volume};
use crate::error::{Result, VolumeError};
use ndarray::{Array3, Zip};

#[inline]
fn ensure_same_shape(left: &Grid, right: &Grid) -> Result<()> {
    if left.same_shape(right) {
        Ok(())
    } else {
        Err(VolumeError::ShapeMismatch {
            left: left.shape,
            right: right.shape,
        })
    }
}

/// Mean of the masked image `map * mask` over the whole volume, skipping NaN.
///
/// Voxels outside the mask contribute a zero, so the result scales with the mask's share
/// of the volume. Returns `None` when every voxel of the product is NaN.
pub fn masked_mean(map: &Volume, mask: &Volume) -> Result<Option<f64>> {
    ensure_same_shape(map.grid(), mask.grid())?;
    let (sum, n) = Zip::from(map.data())
        .and(mask.data())
        .fold((0.0f64, 0usize), |(sum, n), &v, &m| {
            let p = v * m;
            if p.is_nan() {
                (sum, n)
            } else {
                (sum + p, n + 1)
            }
        });
    Ok((n > 0).then(|| sum / n as f64))
}

/// Values of `map` at every non-zero voxel of `mask`, in C order. NaN is kept.
pub fn masked_values(map: &Volume, mask: &Volume) -> Result<Vec<f64>> {
    ensure_same_shape(map.grid(), mask.grid())?;
    let (m, v) = (mask.data(), map.data());
    Ok(VoxelIter::from(mask.grid())
        .filter(|p| m[p.index()] != 0.0)
        .map(|p| v[p.index()])
        .collect())
}

/// Nearest-neighbour resampling of `volume` onto `target`.
///
/// Target voxels whose centre maps outside the source volume are set to 0.
pub fn resample_nearest(volume: &Volume, target: &Grid) -> Result<Volume> {
    // target voxel -> world -> source voxel
    let to_source = volume.grid().affine.inverse()?.compose(&target.affine);
    let src = volume.data();
    let src_shape = volume.grid().shape;
    let data = Array3::from_shape_fn(target.shape_tuple(), |(i, j, k)| {
        VoxelPos::nearest(to_source.apply([i as f64, j as f64, k as f64]), src_shape)
            .map_or(0.0, |p| src[p.index()])
    });
    log::debug!(
        "resampled {:?} grid onto {:?} grid",
        volume.grid().shape,
        target.shape
    );
    Ok(Volume::from_parts(data, target.affine))
}
