//! Command-line parsing for the calibration fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command
//! dispatch** separate from the modeling/math code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "rescal",
    version,
    about = "Global detector-response calibration fit"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a global fit from a fit-spec JSON file.
    Fit(FitArgs),
    /// Run an end-to-end fit on a synthetic sample with known truth.
    Demo(DemoArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Path to the fit-spec JSON file.
    #[arg(short, long)]
    pub spec: PathBuf,

    /// Write the full fit report JSON here.
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Override the number of minimization passes from the spec.
    #[arg(long)]
    pub passes: Option<usize>,

    /// Confidence multiplier for exported bands (1 = one standard deviation).
    #[arg(long, default_value_t = 1.0)]
    pub band_k: f64,
}

#[derive(Debug, Parser, Clone)]
pub struct DemoArgs {
    /// Random seed for sample generation.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Points per generated dataset.
    #[arg(short = 'n', long, default_value_t = 30)]
    pub points: usize,

    /// Gaussian noise level (also the per-point sigma).
    #[arg(long, default_value_t = 0.002)]
    pub noise: f64,

    /// Write the full fit report JSON here.
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Confidence multiplier for exported bands.
    #[arg(long, default_value_t = 1.0)]
    pub band_k: f64,
}
