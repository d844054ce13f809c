//! Post-fit decomposition and consistency checks.
//!
//! The checks here are load-bearing: they exist to catch the class of bug
//! where a parameter is declared but never wired into any residual term. A
//! plain minimizer cannot detect that (it just reports the parameter sitting
//! at its starting point), so every violation is fatal and is never downgraded
//! to a warning.

use crate::domain::{Decomposition, FitOutcome};
use crate::error::AppError;
use crate::fit::context::FitContext;
use crate::fit::objective::Objective;

/// Error threshold for classifying a parameter as "moved off its unit prior".
const TRIVIAL_ERR_TOL: f64 = 0.01;

/// Tolerance for the chi-square reconstruction identity.
const DECOMP_TOL: f64 = 1e-6;

/// Decompose the converged chi-square and verify the internal invariants.
///
/// The objective is re-evaluated once at the final parameters first, so the
/// stored `output`/`variation` views are guaranteed to reflect the converged
/// parameters rather than an intermediate iteration.
pub fn validate(outcome: &FitOutcome, ctx: &mut FitContext) -> Result<Decomposition, AppError> {
    let n_fit = ctx.n_fit();
    let n_nuisance = ctx.n_nuisance();
    if outcome.parameters.len() != n_fit + n_nuisance {
        return Err(AppError::consistency(format!(
            "parameter vector length {} does not match {} shape + {} nuisance parameters",
            outcome.parameters.len(),
            n_fit,
            n_nuisance
        )));
    }

    let (chi2_total, n_terms) = {
        let mut objective = Objective::new(ctx);
        let chi2 = objective.evaluate(&outcome.parameters);
        (chi2, objective.n_terms())
    };

    // Classify every parameter: "non-trivial" means it moved off zero or its
    // error moved off the unit-prior expectation. A parameter that did
    // neither was never constrained by anything and signals a configuration
    // bug upstream (an unused shape or an orphaned source).
    let mut chi2_par = 0.0;
    let mut chi2_src = 0.0;
    let mut n_par_true = 0;
    let mut n_src_true = 0;
    for i in 0..outcome.parameters.len() {
        let val = outcome.parameters[i];
        let err = outcome.error(i);
        if val != 0.0 || (err - 1.0).abs() > TRIVIAL_ERR_TOL {
            if i < n_fit {
                n_par_true += 1;
                chi2_par += val * val;
            } else {
                n_src_true += 1;
                chi2_src += val * val;
            }
        }
    }
    if n_par_true != n_fit {
        return Err(AppError::consistency(format!(
            "{} of {} shape parameters were never constrained by the fit",
            n_fit - n_par_true,
            n_fit
        )));
    }
    if n_src_true != n_nuisance {
        return Err(AppError::consistency(format!(
            "{} of {} nuisance parameters were never constrained by the fit",
            n_nuisance - n_src_true,
            n_nuisance
        )));
    }

    // Recompute the data contribution from the refreshed output views.
    let evaluator = ctx.evaluator();
    let fit_pars = &outcome.parameters[..n_fit];
    let mut chi2_data = 0.0;
    for ds in &ctx.datasets {
        for p in &ds.output.points {
            let err = p.sigma.hypot(ctx.settings.err_floor);
            let r = (p.y - evaluator.predict(ds.kind, p.x, fit_pars)) / err;
            chi2_data += r * r;
        }
    }

    // The decomposition must reconstruct the total exactly.
    let penalized = ctx.settings.penalize_fit_pars;
    let expected = chi2_data + chi2_src + if penalized { chi2_par } else { 0.0 };
    if (chi2_total - expected).abs() >= DECOMP_TOL {
        return Err(AppError::consistency(format!(
            "chi-square decomposition mismatch: total {chi2_total} vs data {chi2_data} \
             + src {chi2_src} + par {chi2_par}"
        )));
    }

    let expected_terms = ctx.n_points() + n_nuisance + if penalized { n_fit } else { 0 };
    if n_terms != expected_terms {
        return Err(AppError::consistency(format!(
            "effective term count {n_terms} does not match {expected_terms} \
             (points + priors)"
        )));
    }
    if outcome.n_terms != n_terms {
        return Err(AppError::consistency(format!(
            "term count changed between minimization ({}) and validation ({n_terms})",
            outcome.n_terms
        )));
    }

    Ok(Decomposition {
        chi2_total,
        chi2_data,
        chi2_src,
        chi2_par,
        n_par_true,
        n_src_true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Curve, DataPoint, Dataset, FitSettings, ObsKind, ShapeDef, SourceDef};
    use crate::fit::minimizer::Minimizer;
    use crate::math::basis;

    fn resp_dataset(name: &str, ys: &[f64]) -> Dataset {
        let xs = [10.0, 100.0, 1000.0];
        let points = xs
            .iter()
            .zip(ys)
            .map(|(&x, &y)| DataPoint { x, y, sigma: 0.1 })
            .collect();
        Dataset::new(name, ObsKind::Resp, points, None).unwrap()
    }

    fn flat_shape() -> ShapeDef {
        ShapeDef {
            name: "flat".into(),
            family: "flat".into(),
            applies_to: ObsKind::Resp,
            non_negative: false,
            form: basis::constant_one,
        }
    }

    fn unit_settings() -> FitSettings {
        FitSettings {
            shape_scale: 1.0,
            ..FitSettings::default()
        }
    }

    fn fit(ctx: &mut FitContext) -> FitOutcome {
        let initial = vec![0.0; ctx.n_tot()];
        let bound = ctx.settings.par_bound;
        let passes = ctx.settings.n_passes;
        let mut objective = Objective::new(ctx);
        Minimizer::with_defaults()
            .minimize(|p| objective.residuals(p), initial, (-bound, bound), passes)
            .unwrap()
    }

    #[test]
    fn decomposition_reconstructs_the_total_with_nuisances_and_priors() {
        let mut ctx = FitContext::assemble(
            vec![resp_dataset("resp_zjet", &[1.1, 1.12, 1.08])],
            vec![flat_shape()],
            vec![SourceDef {
                name: "scale".into(),
                applies_to: "resp_zjet".into(),
                profile: Curve::constant(0.05),
            }],
            None,
            unit_settings(),
        )
        .unwrap();
        let outcome = fit(&mut ctx);
        let dec = validate(&outcome, &mut ctx).unwrap();

        assert_eq!(dec.n_par_true, 1);
        assert_eq!(dec.n_src_true, 1);
        assert!(dec.chi2_par > 0.0);
        let reconstructed = dec.chi2_data + dec.chi2_src + dec.chi2_par;
        assert!((dec.chi2_total - reconstructed).abs() < 1e-6);
    }

    #[test]
    fn decomposition_holds_with_zero_nuisances() {
        let mut ctx = FitContext::assemble(
            vec![resp_dataset("resp_zjet", &[1.1, 1.12, 1.08])],
            vec![flat_shape()],
            vec![],
            None,
            unit_settings(),
        )
        .unwrap();
        let outcome = fit(&mut ctx);
        let dec = validate(&outcome, &mut ctx).unwrap();

        assert_eq!(dec.n_src_true, 0);
        assert_eq!(dec.chi2_src, 0.0);
        assert!((dec.chi2_total - (dec.chi2_data + dec.chi2_par)).abs() < 1e-6);
    }

    #[test]
    fn unneeded_nuisance_converges_near_zero() {
        // The flat shape alone explains the data, so the regularized nuisance
        // stays close to its prior expectation.
        let mut ctx = FitContext::assemble(
            vec![resp_dataset("resp_zjet", &[1.1, 1.12, 1.08])],
            vec![flat_shape()],
            vec![SourceDef {
                name: "scale".into(),
                applies_to: "resp_zjet".into(),
                profile: Curve::constant(0.05),
            }],
            None,
            unit_settings(),
        )
        .unwrap();
        let outcome = fit(&mut ctx);
        let nuisance = outcome.parameters[1];
        assert!(nuisance.abs() < 0.05, "nuisance = {nuisance}");
        validate(&outcome, &mut ctx).unwrap();
    }

    #[test]
    fn unconstrained_nuisance_parameter_is_flagged() {
        // An all-zero shift profile never feeds its parameter into any data
        // term: the parameter only appears in its own prior, stays at exactly
        // zero with unit error, and the validator must reject the fit.
        let mut ctx = FitContext::assemble(
            vec![resp_dataset("resp_zjet", &[1.1, 1.12, 1.08])],
            vec![flat_shape()],
            vec![SourceDef {
                name: "dead_source".into(),
                applies_to: "resp_zjet".into(),
                profile: Curve::constant(0.0),
            }],
            None,
            unit_settings(),
        )
        .unwrap();
        let outcome = fit(&mut ctx);
        assert_eq!(outcome.parameters[1], 0.0);
        assert!((outcome.error(1) - 1.0).abs() < 1e-6);

        let err = validate(&outcome, &mut ctx).unwrap_err();
        assert_eq!(err.exit_code(), 5);
        assert!(err.to_string().contains("nuisance parameters"));
    }

    #[test]
    fn term_count_matches_points_plus_parameters() {
        let mut ctx = FitContext::assemble(
            vec![
                resp_dataset("resp_zjet", &[1.1, 1.12, 1.08]),
                resp_dataset("resp_gamjet", &[1.05, 1.07, 1.03]),
            ],
            vec![flat_shape()],
            vec![SourceDef {
                name: "scale".into(),
                applies_to: "resp_gamjet".into(),
                profile: Curve::constant(0.2),
            }],
            None,
            unit_settings(),
        )
        .unwrap();
        let outcome = fit(&mut ctx);
        assert_eq!(outcome.n_terms, 6 + 1 + 1);
        validate(&outcome, &mut ctx).unwrap();
    }
}
