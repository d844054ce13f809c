//! Shared fit pipeline used by both CLI front-ends.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! assemble -> minimize -> validate
//!
//! The CLI subcommands then focus on presentation (printing and exports).

use crate::domain::{Curve, Dataset, Decomposition, FitOutcome, FitSettings, ShapeDef, SourceDef};
use crate::error::AppError;
use crate::fit::{FitContext, Minimizer, Objective, validate};

/// All computed outputs of a single fit run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// The context after the fit: `output`/`variation` views reflect the
    /// converged parameters.
    pub ctx: FitContext,
    pub outcome: FitOutcome,
    pub decomposition: Decomposition,
}

/// Execute the full pipeline: assemble the context, minimize, validate.
pub fn run_fit(
    datasets: Vec<Dataset>,
    shapes: Vec<ShapeDef>,
    sources: Vec<SourceDef>,
    reference: Option<Curve>,
    settings: FitSettings,
) -> Result<RunOutput, AppError> {
    let mut ctx = FitContext::assemble(datasets, shapes, sources, reference, settings)?;

    let outcome = {
        let initial = vec![0.0; ctx.n_tot()];
        let bound = ctx.settings.par_bound;
        let passes = ctx.settings.n_passes;
        let mut objective = Objective::new(&mut ctx);
        Minimizer::with_defaults().minimize(
            |p| objective.residuals(p),
            initial,
            (-bound, bound),
            passes,
        )?
    };

    let decomposition = validate(&outcome, &mut ctx)?;

    Ok(RunOutput {
        ctx,
        outcome,
        decomposition,
    })
}
