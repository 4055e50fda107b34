use super::batch::BatchArgs;
use crate::pipeline::{ExtractConfig, Layout, Scan};
use anyhow::{bail, Result};
use clap::Args;
use log::{info, warn};
use roimask::prelude::{read_grid, Grid, Volume};
use std::fmt::Display;

#[derive(Args, Debug)]
pub struct Verify {
    #[command(flatten)]
    batch: BatchArgs,
}

impl Verify {
    pub fn run(&mut self) -> Result<()> {
        let batch = self.batch.load()?;
        let mut program = Program::new(&batch.config);
        for (subject, runs) in &batch.subjects {
            info!("checking inputs of {subject}");
            for &run in runs {
                for half in batch.config.halves() {
                    program.run_scan(&Scan::new(subject, run, half));
                }
            }
        }
        match program.problems {
            0 => {
                info!("all inputs found");
                Ok(())
            }
            n => bail!("{n} problems found"),
        }
    }
}

struct Program<'a> {
    config: &'a ExtractConfig,
    layout: Layout<'a>,
    problems: usize,
}

impl<'a> Program<'a> {
    #[inline]
    pub fn new(config: &'a ExtractConfig) -> Self {
        Self {
            config,
            layout: Layout::new(config),
            problems: 0,
        }
    }

    #[inline]
    fn print_failed_info(&mut self, scan: &Scan, what: &str, err: impl Display) {
        warn!("{scan}: {what}: {err}");
        self.problems += 1;
    }

    fn run_scan(&mut self, scan: &Scan) {
        let config = self.config;
        let reference = match self.layout.reference_file(scan) {
            Ok(path) => match read_grid(&path) {
                Ok(grid) => Some(grid),
                Err(e) => {
                    self.print_failed_info(scan, "reference volume", e);
                    None
                }
            },
            Err(e) => {
                self.print_failed_info(scan, "reference volume", e);
                None
            }
        };

        for mask in &config.masks {
            match self.layout.roi_file(scan, mask) {
                Ok(path) => match Volume::read(&path) {
                    Ok(v) => self.check_mask(scan, &mask.to_string(), v, reference.as_ref()),
                    Err(e) => self.print_failed_info(scan, mask.label(), e),
                },
                Err(e) => self.print_failed_info(scan, mask.label(), e),
            }
        }

        for contrast in &config.contrasts {
            if !config.masks.iter().any(|m| config.applies(m, contrast)) {
                info!("{scan}: no mask uses the {contrast} contrast");
                continue;
            }
            let grid = self
                .layout
                .contrast_file(scan, contrast)
                .map_err(anyhow::Error::from)
                .and_then(|path| Ok(read_grid(path)?));
            match grid {
                Ok(g) => {
                    if let Some(r) = &reference {
                        if !g.same_shape(r) {
                            let msg = format!("shape {:?} differs from {:?}", g.shape, r.shape);
                            self.print_failed_info(scan, contrast, msg);
                        }
                    }
                }
                Err(e) => self.print_failed_info(scan, contrast, e),
            }
        }
    }

    fn check_mask(&mut self, scan: &Scan, name: &str, mask: Volume, reference: Option<&Grid>) {
        let mask = mask.binarized();
        let voxels = mask.count_nonzero();
        if voxels == 0 {
            self.print_failed_info(scan, name, "mask is empty");
            return;
        }
        match reference {
            Some(r) if !mask.grid().matches(r) => info!(
                "{scan}: {name}: {voxels} voxels, will be resampled from {:?} to {:?}",
                mask.grid().shape,
                r.shape
            ),
            _ => info!("{scan}: {name}: {voxels} voxels"),
        }
    }
}
