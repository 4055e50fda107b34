//! Configuration, file layout and output of a batch extraction.

pub mod cache;
pub mod config;
pub mod layout;
pub mod table;

pub use config::{ConfigError, ExtractConfig, ExtractMode, MaskSpec};
pub use layout::{Layout, LayoutError, Scan, SplitHalf};
pub use table::{RowKey, StatsTable};
