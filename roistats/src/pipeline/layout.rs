//! Where first-level outputs, ROI masks and stats tables live on disk.

use super::config::{ExtractConfig, MaskSpec};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

const NII_GZ: &str = ".nii.gz";

#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("no file matching `{pattern}` in `{}`", dir.display())]
    NotFound { dir: PathBuf, pattern: NamePattern },

    #[error("atlas mask `{mask}` requested but no `sharedDir` is configured")]
    NoSharedDir { mask: String },
}

/// Which part of a run the statistics come from.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum SplitHalf {
    /// The whole run (no split-half analysis).
    Whole,
    First,
    Second,
}

impl SplitHalf {
    /// `0` for the whole run, otherwise `1` or `2`.
    #[inline]
    pub fn id(self) -> u8 {
        match self {
            SplitHalf::Whole => 0,
            SplitHalf::First => 1,
            SplitHalf::Second => 2,
        }
    }

    #[inline]
    pub fn is_split(self) -> bool {
        !matches!(self, SplitHalf::Whole)
    }

    /// The half whose data defines the fROIs used when extracting from `self`.
    #[inline]
    pub fn opposite(self) -> Option<SplitHalf> {
        match self {
            SplitHalf::Whole => None,
            SplitHalf::First => Some(SplitHalf::Second),
            SplitHalf::Second => Some(SplitHalf::First),
        }
    }
}

/// One unit of extraction: a subject's run, or one half of it.
#[derive(Copy, Clone, Debug)]
pub struct Scan<'a> {
    pub subject: &'a str,
    pub run: u32,
    pub half: SplitHalf,
}

impl<'a> Scan<'a> {
    #[inline]
    pub fn new(subject: &'a str, run: u32, half: SplitHalf) -> Self {
        Self { subject, run, half }
    }

    /// `run{N}` or `run{N}_splithalf{H}`.
    pub fn dir_name(&self) -> String {
        run_dir_name(self.run, self.half)
    }
}

impl fmt::Display for Scan<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} run {}", self.subject, self.run)?;
        if self.half.is_split() {
            write!(f, " splithalf {}", self.half.id())?;
        }
        Ok(())
    }
}

fn run_dir_name(run: u32, half: SplitHalf) -> String {
    match half {
        SplitHalf::Whole => format!("run{run}"),
        h => format!("run{run}_splithalf{}", h.id()),
    }
}

/// A `prefix*infix*suffix` file-name pattern; empty parts match anything.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NamePattern {
    prefix: String,
    infix: String,
    suffix: String,
}

impl NamePattern {
    pub fn new(prefix: impl Into<String>, infix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            infix: infix.into(),
            suffix: suffix.into(),
        }
    }

    pub fn ending_with(suffix: impl Into<String>) -> Self {
        Self::new("", "", suffix)
    }

    pub fn matches(&self, name: &str) -> bool {
        name.strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_suffix(self.suffix.as_str()))
            .map_or(false, |middle| middle.contains(self.infix.as_str()))
    }
}

impl fmt::Display for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.infix.is_empty() {
            write!(f, "{}*{}", self.prefix, self.suffix)
        } else {
            write!(f, "{}*{}*{}", self.prefix, self.infix, self.suffix)
        }
    }
}

/// First regular file in `dir` (by name) matching `pattern`.
pub fn find_first(dir: &Path, pattern: &NamePattern) -> Result<PathBuf, LayoutError> {
    let not_found = || LayoutError::NotFound {
        dir: dir.to_path_buf(),
        pattern: pattern.clone(),
    };
    if !dir.is_dir() {
        return Err(not_found());
    }
    let mut hits = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().is_file())
        .filter(|e| pattern.matches(&e.file_name().to_string_lossy()))
        .map(|e| e.into_path());
    let first = hits.next().ok_or_else(not_found)?;
    let others = hits.count();
    if others > 0 {
        log::debug!(
            "{} other files match `{pattern}` in `{}`; using `{}`",
            others,
            dir.display(),
            first.display()
        );
    }
    Ok(first)
}

/// Path conventions of the first-level results tree and the shared ROI directory.
pub struct Layout<'a> {
    config: &'a ExtractConfig,
}

impl<'a> Layout<'a> {
    #[inline]
    pub fn new(config: &'a ExtractConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn subject_dir(&self, subject: &str) -> PathBuf {
        self.config.results_dir.join(subject)
    }

    pub fn preproc_dir(&self, scan: &Scan) -> PathBuf {
        let mut dir = self.subject_dir(scan.subject);
        dir.extend(["preproc", scan.dir_name().as_str()]);
        dir
    }

    pub fn model_dir(&self, scan: &Scan) -> PathBuf {
        let mut dir = self.subject_dir(scan.subject);
        dir.extend(["model", scan.dir_name().as_str()]);
        dir
    }

    /// Preprocessed BOLD series whose grid every mask is aligned to.
    pub fn reference_file(&self, scan: &Scan) -> Result<PathBuf, LayoutError> {
        find_first(
            &self.preproc_dir(scan),
            &NamePattern::ending_with(format!("preproc_bold{NII_GZ}")),
        )
    }

    /// z-statistic map of `contrast`.
    pub fn contrast_file(&self, scan: &Scan, contrast: &str) -> Result<PathBuf, LayoutError> {
        find_first(
            &self.model_dir(scan),
            &NamePattern::ending_with(format!("{contrast}_zstat{NII_GZ}")),
        )
    }

    /// The ROI file that applies to `mask` when extracting from `scan`.
    ///
    /// For split halves, functional ROIs come from the other half. Whole-run functional
    /// ROIs sit in a `<sub>_task-<task>_run-NNN` directory of the run.
    pub fn roi_file(&self, scan: &Scan, mask: &MaskSpec) -> Result<PathBuf, LayoutError> {
        match mask {
            MaskSpec::Atlas { name } => {
                let mut dir = self
                    .config
                    .shared_dir
                    .clone()
                    .ok_or_else(|| LayoutError::NoSharedDir { mask: name.clone() })?;
                dir.push("ROIs");
                if let Some(template) = self.config.template_dir() {
                    dir.push(template);
                }
                find_first(&dir, &NamePattern::new(name.as_str(), "", NII_GZ))
            }
            MaskSpec::Functional { region, .. } => {
                let mut dir = self.subject_dir(scan.subject);
                dir.push("frois");
                match scan.half.opposite() {
                    Some(defining) => dir.push(run_dir_name(scan.run, defining)),
                    None => {
                        dir.push(scan.dir_name());
                        dir.push(format!(
                            "{}_task-{}_run-{:03}",
                            scan.subject, self.config.task, scan.run
                        ));
                    }
                }
                find_first(&dir, &NamePattern::new("", region.as_str(), NII_GZ))
            }
        }
    }

    /// `<results>/<sub>/stats/<sub>_task-<task>_<mode>_ROI_magnitudes.csv`.
    pub fn stats_file(&self, subject: &str) -> PathBuf {
        let mut path = self.subject_dir(subject);
        path.push("stats");
        path.push(format!(
            "{}_task-{}_{}_ROI_magnitudes.csv",
            subject,
            self.config.task,
            self.config.extract.as_str()
        ));
        path
    }

    #[inline]
    pub fn resampled_dir(&self) -> PathBuf {
        self.config.results_dir.join("resampled_rois")
    }

    /// Cache location of `roi` resampled to the functional grid. Atlas ROIs are shared by
    /// all subjects; functional ROIs are kept per subject and scan.
    pub fn resampled_file(&self, scan: &Scan, mask: &MaskSpec, roi: &Path) -> PathBuf {
        let name = roi
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = name.split(".nii").next().unwrap_or_default();
        let mut path = self.resampled_dir();
        if mask.is_functional() {
            path.push(scan.subject);
            path.push(scan.dir_name());
        }
        path.push(format!("{stem}_resampled{NII_GZ}"));
        path
    }
}
