//! The cumulative per-subject stats CSV.

use super::config::ExtractMode;
use super::layout::SplitHalf;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Identifies the (scan, mask, contrast) a block of rows was extracted from.
#[derive(Copy, Clone, Debug)]
pub struct RowKey<'a> {
    pub subject: &'a str,
    pub task: &'a str,
    pub run: u32,
    pub half: SplitHalf,
    pub mask: &'a str,
    pub contrast: &'a str,
}

/// Rows are appended one block at a time; the header is written with the first block.
pub struct StatsTable {
    path: PathBuf,
    mode: ExtractMode,
    split: bool,
}

impl StatsTable {
    /// Prepares `path` for a fresh table: parent directories are created and a table
    /// left over from an earlier invocation is removed.
    pub fn create(path: PathBuf, mode: ExtractMode, split: bool) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        if path.is_file() {
            log::debug!("removing previous stats file `{}`", path.display());
            fs::remove_file(&path)?;
        }
        Ok(Self { path, mode, split })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    pub fn header(&self) -> Vec<&'static str> {
        let mut cols = match self.mode {
            ExtractMode::Mean => vec!["sub", "task", "run"],
            ExtractMode::Voxelwise => vec!["sub", "run"],
        };
        if self.split {
            cols.push("half");
        }
        match self.mode {
            ExtractMode::Mean => cols.extend(["mask", "roi_file", "contrast", "mean_val"]),
            ExtractMode::Voxelwise => cols.extend(["contrast", "mask", "voxel_index", "value"]),
        }
        cols
    }

    fn leading(&self, key: &RowKey) -> Vec<String> {
        let mut row = vec![key.subject.to_string()];
        if self.mode == ExtractMode::Mean {
            row.push(key.task.to_string());
        }
        row.push(key.run.to_string());
        if self.split {
            row.push(key.half.id().to_string());
        }
        row
    }

    pub fn append_mean(&self, key: &RowKey, roi_file: &Path, mean: Option<f64>) -> csv::Result<()> {
        let mut row = self.leading(key);
        row.extend([
            key.mask.to_string(),
            roi_file.display().to_string(),
            key.contrast.to_string(),
            mean.map(format_value).unwrap_or_default(),
        ]);
        self.append(std::iter::once(row))
    }

    pub fn append_voxels(&self, key: &RowKey, values: &[f64]) -> csv::Result<()> {
        let leading = self.leading(key);
        self.append(values.iter().enumerate().map(|(index, &v)| {
            let mut row = leading.clone();
            row.extend([
                key.contrast.to_string(),
                key.mask.to_string(),
                index.to_string(),
                format_value(v),
            ]);
            row
        }))
    }

    fn append<I>(&self, rows: I) -> csv::Result<()>
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        let is_new = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if is_new {
            wtr.write_record(self.header())?;
        }
        for row in rows {
            wtr.write_record(&row)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// NaN becomes an empty cell; whole numbers keep one decimal (`-3.0`).
fn format_value(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else if v.fract() == 0.0 {
        format!("{v:.1}")
    } else {
        v.to_string()
    }
}
