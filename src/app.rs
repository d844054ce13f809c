//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads fit-spec files or generates the synthetic demo sample
//! - runs the global fit pipeline
//! - prints the run summary
//! - writes the optional report file

use clap::Parser;

use crate::cli::{Cli, Command, DemoArgs, FitArgs};
use crate::data::{DemoConfig, generate_demo};
use crate::error::AppError;
use crate::{io, report};

pub mod pipeline;

/// Entry point for the `rescal` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Demo(args) => handle_demo(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let spec = io::read_spec(&args.spec)?;
    let mut inputs = io::build_inputs(spec)?;
    for warning in &inputs.warnings {
        eprintln!("warning: {warning}");
    }
    if let Some(passes) = args.passes {
        inputs.settings.n_passes = passes;
    }

    let run = pipeline::run_fit(
        inputs.datasets,
        inputs.shapes,
        inputs.sources,
        inputs.reference,
        inputs.settings,
    )?;

    println!(
        "{}",
        report::format_run_summary(&run.ctx, &run.outcome, &run.decomposition)
    );
    write_report_if_requested(&run, args.out.as_deref(), args.band_k)
}

fn handle_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = DemoConfig {
        seed: args.seed,
        n_points: args.points,
        noise: args.noise,
    };
    let demo = generate_demo(&config)?;
    let truth = demo.truth.clone();

    let run = pipeline::run_fit(
        demo.datasets,
        demo.shapes,
        demo.sources,
        None,
        demo.settings,
    )?;

    println!(
        "{}",
        report::format_run_summary(&run.ctx, &run.outcome, &run.decomposition)
    );
    println!("Truth comparison:");
    for (i, t) in truth.iter().enumerate() {
        println!(
            "  --> p{i}: fitted {:+.3} +/- {:.3} | truth {:+.3}",
            run.outcome.parameters[i],
            run.outcome.error(i),
            t
        );
    }
    write_report_if_requested(&run, args.out.as_deref(), args.band_k)
}

fn write_report_if_requested(
    run: &pipeline::RunOutput,
    out: Option<&std::path::Path>,
    band_k: f64,
) -> Result<(), AppError> {
    if let Some(path) = out {
        let report = io::build_report(&run.ctx, &run.outcome, &run.decomposition, band_k);
        io::write_report(path, &report)?;
        println!("Report written to {}", path.display());
    }
    Ok(())
}
