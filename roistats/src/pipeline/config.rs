//! The tab-separated `key<TAB>value` configuration file.

use super::layout::SplitHalf;
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration file `{}` not found; make sure it is saved in your project directory", path.display())]
    NotFound { path: PathBuf },

    #[error("malformed configuration file")]
    Parse(#[from] csv::Error),

    #[error("`{key}` is missing from the configuration file")]
    MissingKey { key: &'static str },

    #[error("`{key}` appears more than once in the configuration file")]
    DuplicateKey { key: String },

    #[error("unknown extraction mode `{0}`; expected `mean` or `voxelwise`")]
    UnknownExtract(String),

    #[error("mask `{0}` does not name a region; expected `fROI-<region>`")]
    InvalidMask(String),

    #[error("atlas mask `{mask}` requested but no `sharedDir` is configured")]
    NoSharedDir { mask: String },

    #[error("results directory `{}` not found", path.display())]
    MissingResultsDir { path: PathBuf },
}

/// How the masked region is summarized.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ExtractMode {
    /// One row per (mask, contrast): the in-mask mean.
    Mean,
    /// One row per in-mask voxel.
    Voxelwise,
}

impl ExtractMode {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            ExtractMode::Mean => "mean",
            ExtractMode::Voxelwise => "voxelwise",
        }
    }
}

impl FromStr for ExtractMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mean" => Ok(ExtractMode::Mean),
            "voxelwise" => Ok(ExtractMode::Voxelwise),
            other => Err(ConfigError::UnknownExtract(other.to_string())),
        }
    }
}

/// A requested search space.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MaskSpec {
    /// A shared atlas ROI, named by its file-name prefix.
    Atlas { name: String },
    /// A subject-specific functional ROI, written `fROI-<region>`.
    Functional { spec: String, region: String },
}

impl MaskSpec {
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        if !s.contains("fROI") {
            return Ok(MaskSpec::Atlas {
                name: s.to_string(),
            });
        }
        match s.split('-').nth(1) {
            Some(region) if !region.is_empty() => Ok(MaskSpec::Functional {
                spec: s.to_string(),
                region: region.to_string(),
            }),
            _ => Err(ConfigError::InvalidMask(s.to_string())),
        }
    }

    /// The mask as written in the configuration file.
    pub fn label(&self) -> &str {
        match self {
            MaskSpec::Atlas { name } => name,
            MaskSpec::Functional { spec, .. } => spec,
        }
    }

    /// The text a contrast name must contain for this mask to apply under `match_events`.
    pub fn match_key(&self) -> String {
        match self {
            MaskSpec::Atlas { name } => name.clone(),
            MaskSpec::Functional { region, .. } => region.to_lowercase(),
        }
    }

    #[inline]
    pub fn is_functional(&self) -> bool {
        matches!(self, MaskSpec::Functional { .. })
    }
}

impl fmt::Display for MaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug)]
pub struct ExtractConfig {
    pub shared_dir: Option<PathBuf>,
    pub results_dir: PathBuf,
    pub task: String,
    pub splithalf: bool,
    /// Lowercased.
    pub contrasts: Vec<String>,
    pub masks: Vec<MaskSpec>,
    pub match_events: bool,
    pub template: Option<String>,
    pub extract: ExtractMode,
}

impl ExtractConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let file = std::fs::File::open(path).map_err(csv::Error::from)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: io::Read>(rdr: R) -> Result<Self, ConfigError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .comment(Some(b'#'))
            .from_reader(rdr);

        let mut entries: BTreeMap<String, Option<String>> = BTreeMap::new();
        for record in reader.records() {
            let record = record?;
            let key = match record.get(0).map(str::trim) {
                Some(k) if !k.is_empty() => k.to_string(),
                _ => continue,
            };
            let value = record
                .get(1)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string);
            if entries.insert(key.clone(), value).is_some() {
                return Err(ConfigError::DuplicateKey { key });
            }
        }
        Self::from_entries(entries)
    }

    fn from_entries(mut entries: BTreeMap<String, Option<String>>) -> Result<Self, ConfigError> {
        let mut take = |key: &str| entries.remove(key).flatten();
        let require = |key: &'static str, v: Option<String>| v.ok_or(ConfigError::MissingKey { key });

        let shared_dir = take("sharedDir").map(PathBuf::from);
        let results_dir: PathBuf = require("resultsDir", take("resultsDir"))?.into();
        let task = require("task", take("task"))?;
        let splithalf = take("splithalf").as_deref() == Some("yes");
        let contrasts = split_list(&require("contrast", take("contrast"))?)
            .map(|c| c.to_lowercase())
            .collect();
        let masks = split_list(&require("mask", take("mask"))?)
            .map(|m| MaskSpec::parse(&m))
            .collect::<Result<Vec<_>, _>>()?;
        if shared_dir.is_none() {
            if let Some(atlas) = masks.iter().find(|m| !m.is_functional()) {
                return Err(ConfigError::NoSharedDir {
                    mask: atlas.label().to_string(),
                });
            }
        }
        let match_events = take("match_events").as_deref() == Some("yes");
        let template = take("template");
        let extract = require("extract", take("extract"))?.parse()?;

        Ok(Self {
            shared_dir,
            results_dir,
            task,
            splithalf,
            contrasts,
            masks,
            match_events,
            template,
            extract,
        })
    }

    /// The halves every run is processed in.
    pub fn halves(&self) -> Vec<SplitHalf> {
        if self.splithalf {
            vec![SplitHalf::First, SplitHalf::Second]
        } else {
            vec![SplitHalf::Whole]
        }
    }

    /// Whether `contrast` is extracted from `mask`. With `match_events`, the contrast name
    /// must contain the mask's match key.
    pub fn applies(&self, mask: &MaskSpec, contrast: &str) -> bool {
        !self.match_events || contrast.contains(&mask.match_key())
    }

    /// Atlas subdirectory picked by the template: its name up to the first `_`.
    pub fn template_dir(&self) -> Option<&str> {
        self.template
            .as_deref()
            .and_then(|t| t.split('_').next())
            .filter(|t| !t.is_empty())
    }

    pub fn check_results_dir(&self) -> Result<(), ConfigError> {
        if self.results_dir.is_dir() {
            Ok(())
        } else {
            Err(ConfigError::MissingResultsDir {
                path: self.results_dir.clone(),
            })
        }
    }
}

fn split_list(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(',')
        .map(|item| item.replace(' ', ""))
        .filter(|item| !item.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = "sharedDir\t/data/shared\n\
        resultsDir\t/data/results\n\
        task\tpixar\n\
        splithalf\tyes\n\
        contrast\tFaces , scenes,bodies\n\
        mask\tfROI-FFA, rTPJ\n\
        match_events\tno\n\
        template\tMNI152NLin2009cAsym_res-2\n\
        extract\tmean\n";

    #[test]
    fn test_full_config() {
        let cfg = ExtractConfig::from_reader(FULL.as_bytes()).unwrap();
        assert_eq!(cfg.shared_dir, Some(PathBuf::from("/data/shared")));
        assert_eq!(cfg.results_dir, PathBuf::from("/data/results"));
        assert_eq!(cfg.task, "pixar");
        assert!(cfg.splithalf);
        assert_eq!(cfg.contrasts, vec!["faces", "scenes", "bodies"]);
        assert_eq!(
            cfg.masks,
            vec![
                MaskSpec::Functional {
                    spec: "fROI-FFA".into(),
                    region: "FFA".into()
                },
                MaskSpec::Atlas {
                    name: "rTPJ".into()
                },
            ]
        );
        assert!(!cfg.match_events);
        assert_eq!(cfg.template_dir(), Some("MNI152NLin2009cAsym"));
        assert_eq!(cfg.extract, ExtractMode::Mean);
        assert_eq!(cfg.halves(), vec![SplitHalf::First, SplitHalf::Second]);
    }

    #[test]
    fn test_optional_keys_may_be_blank_or_absent() {
        let text = "sharedDir\t\nresultsDir\tout\ntask\ttom\ncontrast\tbelief\n\
            mask\tfROI-FFA\nextract\tvoxelwise\ntemplate\n";
        let cfg = ExtractConfig::from_reader(text.as_bytes()).unwrap();
        assert_eq!(cfg.shared_dir, None);
        assert_eq!(cfg.template, None);
        assert!(!cfg.splithalf);
        assert!(!cfg.match_events);
        assert_eq!(cfg.extract, ExtractMode::Voxelwise);
        assert_eq!(cfg.halves(), vec![SplitHalf::Whole]);
    }

    #[test]
    fn test_missing_results_dir_key() {
        let text = "task\ttom\ncontrast\tbelief\nmask\tRTPJ\nextract\tmean\n";
        assert!(matches!(
            ExtractConfig::from_reader(text.as_bytes()),
            Err(ConfigError::MissingKey { key: "resultsDir" })
        ));
    }

    #[test]
    fn test_atlas_mask_needs_shared_dir() {
        let text = "resultsDir\tout\ntask\ttom\ncontrast\tbelief\n\
            mask\tfROI-FFA,RTPJ\nextract\tmean\n";
        assert!(matches!(
            ExtractConfig::from_reader(text.as_bytes()),
            Err(ConfigError::NoSharedDir { mask }) if mask == "RTPJ"
        ));

        let text = format!("sharedDir\t/data/shared\n{text}");
        assert!(ExtractConfig::from_reader(text.as_bytes()).is_ok());
    }

    #[test]
    fn test_duplicate_key() {
        let text = "task\ta\ntask\tb\n";
        assert!(matches!(
            ExtractConfig::from_reader(text.as_bytes()),
            Err(ConfigError::DuplicateKey { key }) if key == "task"
        ));
    }

    #[test]
    fn test_unknown_extract_mode() {
        let text = "resultsDir\tout\ntask\ttom\ncontrast\tbelief\nmask\tRTPJ\nextract\tmedian\n";
        assert!(matches!(
            ExtractConfig::from_reader(text.as_bytes()),
            Err(ConfigError::UnknownExtract(m)) if m == "median"
        ));
    }

    #[test]
    fn test_mask_spec() {
        let f = MaskSpec::parse("fROI-FFA").unwrap();
        assert!(f.is_functional());
        assert_eq!(f.label(), "fROI-FFA");
        assert_eq!(f.match_key(), "ffa");

        let a = MaskSpec::parse("RTPJ").unwrap();
        assert_eq!(a.match_key(), "RTPJ");
        assert_eq!(a.to_string(), "RTPJ");

        assert!(MaskSpec::parse("fROI").is_err());
        assert!(MaskSpec::parse("fROI-").is_err());
    }

    #[test]
    fn test_match_events_filter() {
        let mut cfg = ExtractConfig::from_reader(FULL.as_bytes()).unwrap();
        let ffa = MaskSpec::parse("fROI-FFA").unwrap();
        assert!(cfg.applies(&ffa, "scenes"));
        cfg.match_events = true;
        assert!(cfg.applies(&ffa, "ffa_faces"));
        assert!(!cfg.applies(&ffa, "scenes"));
    }

    #[test]
    fn test_config_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ExtractConfig::from_file(dir.path().join("config.tsv")),
            Err(ConfigError::NotFound { .. })
        ));
    }
}
