//! Batch extraction of region-of-interest statistics from first-level fMRI results.

pub mod pipeline;
mod subcmd_impls;

pub use subcmd_impls::args::Cli;
