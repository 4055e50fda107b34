//! On-disk cache of masks resampled to the functional grid.

use anyhow::{Context, Result};
use log::{info, warn};
use roimask::prelude::{resample_nearest, Grid, Volume};
use std::fs;
use std::path::Path;

/// Returns `mask` on the `reference` grid, reusing `cached` when it already holds a
/// resampled copy on that grid and refreshing it otherwise.
pub fn load_or_resample(cached: &Path, mask: &Volume, reference: &Grid) -> Result<Volume> {
    if cached.is_file() {
        match Volume::read(cached) {
            Ok(v) if v.grid().matches(reference) => {
                info!("found previously resampled ROI `{}`", cached.display());
                return Ok(v.binarized());
            }
            Ok(_) => warn!(
                "cached ROI `{}` is on a different grid; resampling again",
                cached.display()
            ),
            Err(e) => warn!("ignoring unreadable cached ROI: {e}"),
        }
    }

    info!(
        "resampling search space to match functional data ({:?} -> {:?})",
        mask.grid().shape,
        reference.shape
    );
    let resampled = resample_nearest(mask, reference)?.binarized();
    store(cached, &resampled)?;
    Ok(resampled)
}

/// Writes through a temporary file in the same directory, then renames it into place.
fn store(path: &Path, volume: &Volume) -> Result<()> {
    let dir = path
        .parent()
        .with_context(|| format!("`{}` has no parent directory", path.display()))?;
    fs::create_dir_all(dir)
        .with_context(|| format!("cannot create `{}`", dir.display()))?;
    let tmp = tempfile::Builder::new()
        .prefix(".resampled-")
        .suffix(".nii.gz")
        .tempfile_in(dir)?;
    volume.write(tmp.path())?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("cannot store resampled ROI at `{}`", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use roimask::prelude::Affine;

    fn atlas_1mm() -> Volume {
        let mut data = Array3::zeros((6, 6, 6));
        data[[2, 2, 2]] = 1.0;
        data[[4, 4, 4]] = 3.0;
        Volume::from_parts(data, Affine::identity())
    }

    #[test]
    fn test_resample_then_reuse() {
        let dir = tempfile::tempdir().unwrap();
        let cached = dir.path().join("resampled_rois").join("atlas_resampled.nii.gz");
        let reference = Grid::new([3, 3, 3], Affine::scaling([2.0; 3]));

        let first = load_or_resample(&cached, &atlas_1mm(), &reference).unwrap();
        assert!(cached.is_file());
        assert_eq!(first.grid().shape, [3, 3, 3]);
        assert_eq!(first.data()[[1, 1, 1]], 1.0);
        assert_eq!(first.data()[[2, 2, 2]], 1.0);
        assert_eq!(first.count_nonzero(), 2);

        // a cached copy on the right grid is used as is, whatever the source says
        let empty = Volume::from_parts(Array3::zeros((6, 6, 6)), Affine::identity());
        let second = load_or_resample(&cached, &empty, &reference).unwrap();
        assert_eq!(second.data(), first.data());
    }

    #[test]
    fn test_stale_cache_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let cached = dir.path().join("atlas_resampled.nii.gz");
        Volume::from_parts(Array3::ones((2, 2, 2)), Affine::scaling([3.0; 3]))
            .write(&cached)
            .unwrap();

        let reference = Grid::new([3, 3, 3], Affine::scaling([2.0; 3]));
        let out = load_or_resample(&cached, &atlas_1mm(), &reference).unwrap();
        assert_eq!(out.count_nonzero(), 2);
        assert!(Volume::read(&cached).unwrap().grid().matches(&reference));
    }
}
