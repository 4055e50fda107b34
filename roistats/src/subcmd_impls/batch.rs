use super::utils::{parse_runs, RunList};
use crate::pipeline::ExtractConfig;
use anyhow::{bail, ensure, Result};
use clap::Args;
use std::path::PathBuf;

/// Inputs shared by every command that walks subjects and runs.
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Project directory.
    #[arg(long = "project-dir", short = 'p')]
    project_dir: PathBuf,
    /// Tab-separated configuration file.
    #[arg(long, short = 'c')]
    config: PathBuf,
    /// Subjects to process.
    #[arg(long, short = 's', num_args = 1.., required = true)]
    subjects: Vec<String>,
    /// Runs of each subject, e.g. `1,2`, `1-3` or `NA`; one entry per subject, or a
    /// single entry used for all of them.
    #[arg(long, short = 'r', num_args = 1.., required = true, value_parser = parse_runs)]
    runs: Vec<RunList>,
}

/// A validated configuration and the runs of every subject.
pub struct Batch {
    pub config: ExtractConfig,
    pub subjects: Vec<(String, Vec<u32>)>,
}

impl BatchArgs {
    pub fn load(&self) -> Result<Batch> {
        if !self.project_dir.is_dir() {
            bail!(
                "project directory `{}` not found",
                self.project_dir.display()
            );
        }
        let config = ExtractConfig::from_file(&self.config)?;
        config.check_results_dir()?;

        let runs: Vec<Vec<u32>> = match self.runs.len() {
            1 => vec![self.runs[0].0.clone(); self.subjects.len()],
            n => {
                ensure!(
                    n == self.subjects.len(),
                    "got {} run lists for {} subjects",
                    n,
                    self.subjects.len()
                );
                self.runs.iter().map(|r| r.0.clone()).collect()
            }
        };
        let subjects = self.subjects.iter().cloned().zip(runs).collect();
        Ok(Batch { config, subjects })
    }
}
