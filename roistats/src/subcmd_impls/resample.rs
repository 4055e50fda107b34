use anyhow::{Context, Result};
use clap::Args;
use log::info;
use roimask::prelude::{read_grid, resample_nearest, Volume};
use std::fs;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct Resample {
    /// ROI volume to resample.
    #[arg(long, short = 'i')]
    roi: PathBuf,
    /// Volume whose voxel grid the ROI is moved onto (e.g. a preprocessed BOLD series).
    #[arg(long, short = 'r')]
    reference: PathBuf,
    /// Output `.nii` / `.nii.gz` file.
    #[arg(long, short = 'o')]
    output: PathBuf,
}

impl Resample {
    pub fn run(&mut self) -> Result<()> {
        let mask = Volume::read(&self.roi)?.binarized();
        let grid = read_grid(&self.reference)?;
        if mask.grid().matches(&grid) {
            info!("`{}` is already on the reference grid", self.roi.display());
        }

        let out = resample_nearest(&mask, &grid)?.binarized();
        if let Some(parent) = self.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("cannot create `{}`", parent.display()))?;
        }
        out.write(&self.output)?;
        info!(
            "wrote `{}`: {:?} -> {:?}, {} -> {} voxels in mask",
            self.output.display(),
            mask.grid().shape,
            out.grid().shape,
            mask.count_nonzero(),
            out.count_nonzero()
        );
        Ok(())
    }
}
