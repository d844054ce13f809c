//! Formatted terminal output for a finished fit.
//!
//! We keep formatting code in one place so:
//! - the fit code stays clean and testable
//! - output changes are localized (important for future snapshot tests)

use crate::domain::{Decomposition, FitOutcome};
use crate::fit::FitContext;

/// Format the full run summary: input counts, chi-square breakdown and the
/// fitted parameter tables.
pub fn format_run_summary(
    ctx: &FitContext,
    outcome: &FitOutcome,
    decomposition: &Decomposition,
) -> String {
    let mut out = String::new();

    out.push_str("=== rescal - global response calibration fit ===\n");
    out.push_str(&format!(
        "Inputs: {} datasets | {} points | {} shapes | {} sources\n",
        ctx.datasets.len(),
        ctx.n_points(),
        ctx.shapes.len(),
        ctx.sources.len()
    ));
    for ds in &ctx.datasets {
        let (lo, hi) = x_range(ds.input.points.iter().map(|p| p.x));
        out.push_str(&format!(
            "  {:<16} {:<5} n={:<3} x=[{:.0}, {:.0}]\n",
            ds.name,
            ds.kind.display_name(),
            ds.len(),
            lo,
            hi
        ));
    }

    out.push_str(&format!(
        "\nGlobal fit has {} total parameters:\n",
        ctx.n_tot()
    ));
    out.push_str(&format!("  --> {} fit parameters\n", ctx.n_fit()));
    out.push_str(&format!("  --> {} nuisance parameters\n", ctx.n_nuisance()));
    if ctx.settings.penalize_fit_pars {
        out.push_str("  --> fit parameters carry a Gaussian prior\n");
    }

    out.push('\n');
    out.push_str(&format_decomposition(ctx, outcome, decomposition));
    out.push('\n');
    out.push_str(&format_parameters(ctx, outcome));
    out
}

/// Chi-square breakdown, one line per contribution.
pub fn format_decomposition(
    ctx: &FitContext,
    outcome: &FitOutcome,
    decomposition: &Decomposition,
) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "  --> Total     chi2/NDF  = {:>8.1} / {}\n",
        decomposition.chi2_total, outcome.n_terms
    ));
    out.push_str(&format!(
        "  --> Data      chi2/NDF  = {:>8.1} / {}\n",
        decomposition.chi2_data,
        ctx.n_points()
    ));
    out.push_str(&format!(
        "  --> Nuisance  chi2/Nsrc = {:>8.1} / {}\n",
        decomposition.chi2_src,
        ctx.n_nuisance()
    ));
    out.push_str(&format!(
        "  --> Parameter chi2/Npar = {:>8.1} / {}\n",
        decomposition.chi2_par,
        ctx.n_fit()
    ));
    out
}

/// Fitted shape and nuisance parameters as `name: value +/- error` rows.
pub fn format_parameters(ctx: &FitContext, outcome: &FitOutcome) -> String {
    let mut out = String::new();

    out.push_str("Fitted shape parameters:\n");
    for (i, name) in ctx.fit_par_names().iter().enumerate() {
        out.push_str(&parameter_line(name, outcome.parameters[i], outcome.error(i)));
    }

    if !ctx.sources.is_empty() {
        out.push_str("Nuisance parameters:\n");
        for src in &ctx.sources {
            let i = ctx.n_fit() + src.index;
            out.push_str(&parameter_line(
                &src.name,
                outcome.parameters[i],
                outcome.error(i),
            ));
        }
    }
    out
}

fn parameter_line(name: &str, value: f64, error: f64) -> String {
    format!("  --> {name:<20}: {value:>+6.2} +/- {error:>5.2}\n")
}

fn x_range(xs: impl Iterator<Item = f64>) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for x in xs {
        lo = lo.min(x);
        hi = hi.max(x);
    }
    (lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Curve, DataPoint, Dataset, FitSettings, ObsKind, ShapeDef, SourceDef};
    use crate::fit::{Minimizer, Objective, validate};
    use crate::math::basis;

    #[test]
    fn summary_names_every_parameter() {
        let points = vec![
            DataPoint { x: 50.0, y: 1.1, sigma: 0.1 },
            DataPoint { x: 100.0, y: 1.12, sigma: 0.1 },
            DataPoint { x: 500.0, y: 1.08, sigma: 0.1 },
        ];
        let mut ctx = FitContext::assemble(
            vec![Dataset::new("resp_zjet", ObsKind::Resp, points, None).unwrap()],
            vec![ShapeDef {
                name: "flat".into(),
                family: "flat".into(),
                applies_to: ObsKind::Resp,
                non_negative: false,
                form: basis::constant_one,
            }],
            vec![SourceDef {
                name: "scale_zjet".into(),
                applies_to: "resp_zjet".into(),
                profile: Curve::constant(0.05),
            }],
            None,
            FitSettings {
                shape_scale: 1.0,
                ..FitSettings::default()
            },
        )
        .unwrap();

        let outcome = {
            let mut objective = Objective::new(&mut ctx);
            Minimizer::with_defaults()
                .minimize(
                    |p| objective.residuals(p),
                    vec![0.0, 0.0],
                    (-100.0, 100.0),
                    1,
                )
                .unwrap()
        };
        let dec = validate(&outcome, &mut ctx).unwrap();
        let summary = format_run_summary(&ctx, &outcome, &dec);

        assert!(summary.contains("resp_zjet"));
        assert!(summary.contains("flat"));
        assert!(summary.contains("scale_zjet"));
        assert!(summary.contains("Total     chi2/NDF"));
        assert!(summary.contains("Gaussian prior"));
    }
}
