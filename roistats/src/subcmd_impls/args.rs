use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "roistats")]
#[command(about = "Extract region-of-interest statistics from first-level fMRI contrast maps.")]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    pub fn run_program(&mut self) -> anyhow::Result<()> {
        match self.command {
            Commands::Extract(ref mut v) => v.run(),
            Commands::Verify(ref mut v) => v.run(),
            Commands::Resample(ref mut v) => v.run(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Mask each contrast map with each ROI and write mean or voxelwise stats per subject.
    Extract(crate::subcmd_impls::extract::Extract),
    /// Resolve every input an extraction would read, without writing anything.
    Verify(crate::subcmd_impls::verify::Verify),
    /// Binarize a ROI and resample it onto the grid of a reference volume.
    Resample(crate::subcmd_impls::resample::Resample),
}
