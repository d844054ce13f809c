//! Confidence-band propagation through the fitted model.
//!
//! The band at one abscissa is `k · sqrt(gradᵀ · C · grad)` with the gradient
//! of the prediction taken against the full parameter vector (nuisance entries
//! are identically zero since they never enter the model) and `C` the fit
//! covariance. The generalized form `sqrt(Σ w_i w_j C_ij)` handles arbitrary
//! linear combinations of shape evaluations, which is how per-dataset
//! variation bands are built from the subset of shapes that apply.
//!
//! Everything here is read-only over the context, so grid evaluation is
//! parallelized; results are collected in grid order, keeping output
//! deterministic.

use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::domain::{FitOutcome, ObsKind, ProjectedCurve};
use crate::fit::context::FitContext;
use crate::fit::model::ModelEvaluator;

/// Relative finite-difference step for the prediction gradient.
const FD_STEP: f64 = 1e-6;

/// Propagates the fit covariance into confidence bands for reporting.
#[derive(Clone, Copy)]
pub struct CurveProjector<'a> {
    ctx: &'a FitContext,
    evaluator: ModelEvaluator<'a>,
    outcome: &'a FitOutcome,
    /// Confidence multiplier (1 = one standard deviation).
    k: f64,
}

impl<'a> CurveProjector<'a> {
    pub fn new(ctx: &'a FitContext, outcome: &'a FitOutcome, k: f64) -> Self {
        Self {
            ctx,
            evaluator: ctx.evaluator(),
            outcome,
            k,
        }
    }

    fn fit_pars(&self) -> &[f64] {
        &self.outcome.parameters[..self.ctx.n_fit()]
    }

    /// The fitted model value for `kind` at `x`.
    pub fn value(&self, kind: ObsKind, x: f64) -> f64 {
        self.evaluator.predict(kind, x, self.fit_pars())
    }

    /// The confidence band around [`CurveProjector::value`] at `x`.
    pub fn band(&self, kind: ObsKind, x: f64) -> f64 {
        let n_fit = self.ctx.n_fit();
        let mut grad = vec![0.0; self.outcome.parameters.len()];
        let base = self.value(kind, x);
        let mut work = self.fit_pars().to_vec();
        for j in 0..n_fit {
            let h = FD_STEP * work[j].abs().max(1.0);
            let orig = work[j];
            work[j] = orig + h;
            let plus = self.evaluator.predict(kind, x, &work);
            work[j] = orig;
            grad[j] = (plus - base) / h;
        }
        self.k * quadratic_band(&self.outcome.covariance, &grad)
    }

    /// Band for an arbitrary linear combination of parameters with weights
    /// `w`: `k · sqrt(Σ_ij w_i w_j C_ij)`.
    pub fn band_from_weights(&self, weights: &[f64]) -> f64 {
        self.k * quadratic_band(&self.outcome.covariance, weights)
    }

    /// Weight vector for the shift applied to observable `kind` at `x`: the
    /// evaluations of every shape that applies to `kind`, placed at the
    /// shape's parameter index. Feeding this to
    /// [`CurveProjector::band_from_weights`] gives the variation band.
    pub fn variation_weights(&self, kind: ObsKind, x: f64) -> Vec<f64> {
        let mut w = vec![0.0; self.outcome.parameters.len()];
        for shape in self.ctx.shapes.iter().filter(|s| s.applies_to == kind) {
            w[shape.index] += (shape.form)(x) * self.ctx.settings.shape_scale;
        }
        w
    }

    /// Evaluate value and band over a reporting grid.
    pub fn project(&self, kind: ObsKind, grid: &[f64]) -> ProjectedCurve {
        let evaluated: Vec<(f64, f64)> = grid
            .par_iter()
            .map(|&x| (self.value(kind, x), self.band(kind, x)))
            .collect();
        ProjectedCurve {
            x: grid.to_vec(),
            value: evaluated.iter().map(|(v, _)| *v).collect(),
            band: evaluated.iter().map(|(_, b)| *b).collect(),
        }
    }
}

/// `sqrt(wᵀ C w)`, floored at zero against floating-point noise.
fn quadratic_band(covariance: &DMatrix<f64>, w: &[f64]) -> f64 {
    let mut sum = 0.0;
    for i in 0..w.len() {
        for j in 0..w.len() {
            sum += w[i] * w[j] * covariance[(i, j)];
        }
    }
    sum.max(0.0).sqrt()
}

/// Log-spaced reporting grid (momentum spectra are naturally log-uniform).
pub fn log_grid(min: f64, max: f64, n: usize) -> Vec<f64> {
    let n = n.max(2);
    let (lmin, lmax) = (min.ln(), max.ln());
    (0..n)
        .map(|i| {
            let u = i as f64 / (n as f64 - 1.0);
            (lmin + u * (lmax - lmin)).exp()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DataPoint, Dataset, FitSettings, ShapeDef};
    use crate::math::basis;

    fn test_ctx() -> FitContext {
        let points = vec![
            DataPoint { x: 50.0, y: 1.0, sigma: 0.1 },
            DataPoint { x: 100.0, y: 1.0, sigma: 0.1 },
        ];
        FitContext::assemble(
            vec![
                Dataset::new("resp_zjet", ObsKind::Resp, points.clone(), None).unwrap(),
                Dataset::new("chf_zjet", ObsKind::Chf, points, None).unwrap(),
            ],
            vec![
                ShapeDef {
                    name: "flat".into(),
                    family: "flat".into(),
                    applies_to: ObsKind::Resp,
                    non_negative: false,
                    form: basis::constant_one,
                },
                ShapeDef {
                    name: "flat_chf".into(),
                    family: "flat".into(),
                    applies_to: ObsKind::Chf,
                    non_negative: false,
                    form: basis::constant_one,
                },
            ],
            vec![],
            None,
            FitSettings {
                shape_scale: 1.0,
                ..FitSettings::default()
            },
        )
        .unwrap()
    }

    fn outcome_with_cov(var: f64) -> FitOutcome {
        FitOutcome {
            parameters: vec![0.5],
            covariance: DMatrix::from_row_slice(1, 1, &[var]),
            chi2: 0.0,
            n_terms: 0,
        }
    }

    #[test]
    fn band_propagates_the_covariance_through_the_gradient() {
        let ctx = test_ctx();
        let outcome = outcome_with_cov(0.04);
        let projector = CurveProjector::new(&ctx, &outcome, 1.0);

        // d(1 + p)/dp = 1, so the band is sqrt(0.04) = 0.2.
        assert!((projector.value(ObsKind::Resp, 100.0) - 1.5).abs() < 1e-12);
        assert!((projector.band(ObsKind::Resp, 100.0) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn confidence_multiplier_scales_the_band() {
        let ctx = test_ctx();
        let outcome = outcome_with_cov(0.04);
        let projector = CurveProjector::new(&ctx, &outcome, 2.0);
        assert!((projector.band(ObsKind::Resp, 100.0) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn band_from_weights_is_the_quadratic_form() {
        let ctx = test_ctx();
        let outcome = FitOutcome {
            parameters: vec![0.0, 0.0],
            covariance: DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.5, 2.0]),
            chi2: 0.0,
            n_terms: 0,
        };
        let projector = CurveProjector::new(&ctx, &outcome, 1.0);
        // wᵀCw with w = (1, 1): 1 + 0.5 + 0.5 + 2 = 4.
        assert!((projector.band_from_weights(&[1.0, 1.0]) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn variation_weights_select_the_applicable_shapes() {
        let ctx = test_ctx();
        let outcome = outcome_with_cov(1.0);
        let projector = CurveProjector::new(&ctx, &outcome, 1.0);

        let w = projector.variation_weights(ObsKind::Chf, 100.0);
        assert_eq!(w.len(), 1);
        assert!((w[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn project_preserves_grid_order() {
        let ctx = test_ctx();
        let outcome = outcome_with_cov(0.04);
        let projector = CurveProjector::new(&ctx, &outcome, 1.0);

        let grid = log_grid(10.0, 6500.0, 17);
        let curve = projector.project(ObsKind::Resp, &grid);
        assert_eq!(curve.x, grid);
        assert_eq!(curve.value.len(), 17);
        assert_eq!(curve.band.len(), 17);
        for v in &curve.value {
            assert!((v - 1.5).abs() < 1e-12);
        }
    }

    #[test]
    fn log_grid_hits_both_endpoints_monotonically() {
        let grid = log_grid(10.0, 6500.0, 50);
        assert!((grid[0] - 10.0).abs() < 1e-9);
        assert!((grid[49] - 6500.0).abs() < 1e-6);
        for w in grid.windows(2) {
            assert!(w[1] > w[0]);
        }
    }
}
