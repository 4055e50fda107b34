use super::batch::BatchArgs;
use crate::pipeline::{cache, ExtractConfig, ExtractMode, Layout, MaskSpec, RowKey, Scan, StatsTable};
use anyhow::{bail, Context, Result};
use clap::Args;
use log::{error, info, warn};
use roimask::prelude::{
    masked_mean, masked_values, read_grid, AccTimer, Grid, Volume, AFFINE_TOLERANCE,
};
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::sync::Arc;
use threadpool::ThreadPool;

#[derive(Args, Debug)]
pub struct Extract {
    #[command(flatten)]
    batch: BatchArgs,
    /// Subjects processed at once; 0 uses every logical CPU.
    #[arg(long, short = 'j', default_value_t = 1)]
    jobs: usize,
}

impl Extract {
    pub fn run(&mut self) -> Result<()> {
        let batch = self.batch.load()?;
        let config = Arc::new(batch.config);
        let total = batch.subjects.len();
        let jobs = match self.jobs {
            0 => num_cpus::get(),
            n => n,
        };
        let mut timer = AccTimer::new();

        match jobs.min(total) {
            0 | 1 => {
                for (subject, runs) in &batch.subjects {
                    Program::new(&config, subject, runs).run()?;
                }
            }
            workers => {
                let pool = ThreadPool::new(workers);
                let (tx, rx) = channel();
                for (subject, runs) in batch.subjects {
                    let tx = tx.clone();
                    let config = Arc::clone(&config);
                    pool.execute(move || {
                        let res = Program::new(&config, &subject, &runs).run();
                        // the receiver outlives every job
                        let _ = tx.send((subject, res));
                    });
                }
                drop(tx);
                let mut failed = 0;
                let mut finished = 0;
                for (subject, res) in rx.iter() {
                    finished += 1;
                    if let Err(e) = res {
                        error!("{subject}: {e:#}");
                        failed += 1;
                    }
                }
                // a panicking job never reports back
                failed += total - finished;
                if failed > 0 {
                    bail!("stats extraction failed for {failed} of {total} subjects");
                }
            }
        }

        timer.elapsed();
        info!(
            "extracted stats for {} subjects in {:.1}s",
            total,
            timer.get_total_secs()
        );
        Ok(())
    }
}

/// Extraction for a single subject.
struct Program<'a> {
    config: &'a ExtractConfig,
    layout: Layout<'a>,
    subject: &'a str,
    runs: &'a [u32],
}

impl<'a> Program<'a> {
    #[inline]
    pub fn new(config: &'a ExtractConfig, subject: &'a str, runs: &'a [u32]) -> Self {
        Self {
            config,
            layout: Layout::new(config),
            subject,
            runs,
        }
    }

    pub fn run(&self) -> Result<()> {
        info!("extracting stats for {}", self.subject);
        let mut timer = AccTimer::new();
        let table = StatsTable::create(
            self.layout.stats_file(self.subject),
            self.config.extract,
            self.config.splithalf,
        )
        .with_context(|| format!("cannot prepare stats file for {}", self.subject))?;

        for &run in self.runs {
            for half in self.config.halves() {
                let scan = Scan::new(self.subject, run, half);
                self.run_scan(&table, &scan)
                    .with_context(|| format!("extraction failed for {scan}"))?;
            }
        }

        timer.elapsed();
        info!(
            "{}: wrote `{}` ({} ms)",
            self.subject,
            table.path().display(),
            timer.get_total_ms()
        );
        Ok(())
    }

    fn run_scan(&self, table: &StatsTable, scan: &Scan) -> Result<()> {
        let reference_path = self.layout.reference_file(scan)?;
        let reference = read_grid(&reference_path)?;

        if let Some(defining) = scan.half.opposite() {
            if self.config.masks.iter().any(MaskSpec::is_functional) {
                info!(
                    "{scan}: using fROIs defined in splithalf{}, skipping those defined in splithalf{}",
                    defining.id(),
                    scan.half.id()
                );
            }
        }

        let mut rois: Vec<(&MaskSpec, PathBuf)> = Vec::with_capacity(self.config.masks.len());
        for mask in &self.config.masks {
            let path = self.layout.roi_file(scan, mask)?;
            info!("using {mask} ROI file `{}`", path.display());
            rois.push((mask, path));
        }

        for (spec, roi_path) in &rois {
            let mask = self.load_mask(scan, spec, roi_path, &reference)?;
            for contrast in &self.config.contrasts {
                if !self.config.applies(spec, contrast) {
                    info!("skipping {spec} search space for the {contrast} contrast");
                    continue;
                }
                info!("extracting stats from {spec} mask within {contrast} contrast");
                let map = Volume::read(self.layout.contrast_file(scan, contrast)?)?;
                if !map.grid().affine.approx_eq(&mask.grid().affine, AFFINE_TOLERANCE) {
                    warn!("the {contrast} map and the {spec} mask have different affines");
                }
                let key = RowKey {
                    subject: scan.subject,
                    task: &self.config.task,
                    run: scan.run,
                    half: scan.half,
                    mask: spec.label(),
                    contrast,
                };
                match self.config.extract {
                    ExtractMode::Mean => {
                        let mean = masked_mean(&map, &mask)?;
                        if mean.is_none() {
                            warn!("the masked {contrast} map is NaN everywhere ({spec})");
                        }
                        table.append_mean(&key, roi_path, mean)?;
                    }
                    ExtractMode::Voxelwise => {
                        table.append_voxels(&key, &masked_values(&map, &mask)?)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Binarized mask on the reference grid.
    fn load_mask(
        &self,
        scan: &Scan,
        spec: &MaskSpec,
        roi_path: &Path,
        reference: &Grid,
    ) -> Result<Volume> {
        let mask = Volume::read(roi_path)?.binarized();
        if mask.count_nonzero() == 0 {
            warn!("the {spec} mask `{}` is empty", roi_path.display());
        }
        if mask.grid().matches(reference) {
            return Ok(mask);
        }
        warn!(
            "the {spec} search space ({:?}) is not on the grid of the functional data ({:?})",
            mask.grid().shape,
            reference.shape
        );
        let cached = self.layout.resampled_file(scan, spec, roi_path);
        cache::load_or_resample(&cached, &mask, reference)
    }
}
