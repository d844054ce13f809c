//! The global chi-square objective.
//!
//! One evaluation walks every dataset point in a fixed order (dataset
//! insertion order, then point order, then source/shape registration order),
//! so the floating-point accumulation is reproducible run-to-run.
//!
//! Evaluations have two documented side effects on the context:
//!
//! - each dataset's `output`/`variation` views are overwritten with the
//!   shifted data and the shift actually applied
//! - the effective-term counter is refreshed for later degrees-of-freedom
//!   bookkeeping
//!
//! Because of those writes the objective is a single-writer object: no two
//! evaluations may run concurrently against the same context.

use crate::domain::FitSettings;
use crate::fit::context::FitContext;
use crate::fit::model::ModelEvaluator;

/// Chi-square objective over a mutably borrowed [`FitContext`].
#[derive(Debug)]
pub struct Objective<'a> {
    ctx: &'a mut FitContext,
    n_terms: usize,
    n_calls: usize,
}

impl<'a> Objective<'a> {
    pub fn new(ctx: &'a mut FitContext) -> Self {
        Self {
            ctx,
            n_terms: 0,
            n_calls: 0,
        }
    }

    /// Number of residual terms summed by the most recent evaluation.
    pub fn n_terms(&self) -> usize {
        self.n_terms
    }

    /// Number of evaluations performed so far.
    pub fn n_calls(&self) -> usize {
        self.n_calls
    }

    /// The ordered residual vector whose squared sum is the chi-square:
    /// data terms first, then one unit-prior term per nuisance parameter,
    /// then (when enabled) one prior term per fit parameter.
    pub fn residuals(&mut self, pars: &[f64]) -> Vec<f64> {
        let FitContext {
            datasets,
            shapes,
            sources,
            reference,
            settings,
            n_fit,
        } = &mut *self.ctx;
        let n_fit = *n_fit;
        let shapes = &*shapes;
        let sources = &*sources;
        let settings: &FitSettings = settings;
        debug_assert_eq!(pars.len(), n_fit + sources.len());

        let fit_pars = &pars[..n_fit];
        let nuis_pars = &pars[n_fit..];
        let reference = if settings.use_reference {
            reference.as_ref()
        } else {
            None
        };
        let evaluator = ModelEvaluator::new(shapes, reference, settings);
        let (win_lo, win_hi) = settings.satellite_window;

        let n_points: usize = datasets.iter().map(|d| d.len()).sum();
        let n_prior = sources.len() + if settings.penalize_fit_pars { n_fit } else { 0 };
        let mut terms = Vec::with_capacity(n_points + n_prior);

        for ds in datasets.iter_mut() {
            for i in 0..ds.input.len() {
                let point = ds.input.points[i];

                let mut shift = 0.0;
                for src in sources.iter().filter(|s| s.applies_to == ds.name) {
                    shift += nuis_pars[src.index] * src.profile.value_at(point.x);
                }
                for shape in shapes
                    .iter()
                    .filter(|s| !s.applies_to.is_primary() && s.applies_to == ds.kind)
                {
                    if point.x < win_lo || point.x > win_hi {
                        continue;
                    }
                    shift += fit_pars[shape.index] * (shape.form)(point.x) * settings.shape_scale;
                }

                let fit_val = evaluator.predict(ds.kind, point.x, fit_pars);
                let err = point.sigma.hypot(settings.err_floor);
                terms.push((point.y + shift - fit_val) / err);

                ds.output.set_value(i, point.y + shift);
                ds.variation.set_value(i, shift);
            }
        }

        for &p in nuis_pars {
            terms.push(p);
        }
        if settings.penalize_fit_pars {
            for &p in fit_pars {
                terms.push(p);
            }
        }

        self.n_terms = terms.len();
        self.n_calls += 1;
        terms
    }

    /// Total chi-square at `pars`, with the same side effects as
    /// [`Objective::residuals`].
    pub fn evaluate(&mut self, pars: &[f64]) -> f64 {
        self.residuals(pars).iter().fold(0.0, |acc, r| acc + r * r)
    }
}
