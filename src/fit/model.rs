//! Model evaluation: composing shape contributions into a prediction.
//!
//! The evaluator is a pure function of its inputs; it never touches dataset
//! views, so it is safe to call for many abscissas against one parameter
//! slice (the projector does exactly that).

use crate::domain::{Curve, FitSettings, ObsKind, ShapeBasis};

/// Read-only view of the model for one fit run.
///
/// `reference` is `Some` only when reference normalization is enabled; the
/// context assembly has already verified the curve exists in that case.
#[derive(Debug, Clone, Copy)]
pub struct ModelEvaluator<'a> {
    shapes: &'a [ShapeBasis],
    reference: Option<&'a Curve>,
    settings: &'a FitSettings,
}

impl<'a> ModelEvaluator<'a> {
    pub fn new(
        shapes: &'a [ShapeBasis],
        reference: Option<&'a Curve>,
        settings: &'a FitSettings,
    ) -> Self {
        Self {
            shapes,
            reference,
            settings,
        }
    }

    /// Predict the value of observable `kind` at `x` for the given fit-
    /// parameter slice (shape parameters only, nuisances excluded).
    ///
    /// The composition is `base + Σ clamp(p_i) · f_i(x) · scale` over the
    /// primary-type shapes, with `base = 1` for the primary observable and `0`
    /// otherwise; `clamp` floors declared non-negative parameters at zero.
    /// The primary prediction is divided by the interpolated reference curve
    /// when normalization is enabled.
    pub fn predict(&self, kind: ObsKind, x: f64, fit_pars: &[f64]) -> f64 {
        let mut var = if kind.is_primary() { 1.0 } else { 0.0 };

        for shape in self.shapes.iter().filter(|s| s.applies_to.is_primary()) {
            let mut p = fit_pars[shape.index];
            if shape.non_negative {
                p = p.max(0.0);
            }
            var += p * (shape.form)(x) * self.settings.shape_scale;
        }

        if kind.is_primary() {
            if let Some(reference) = self.reference {
                var /= reference.interpolate(x);
            }
        }
        var
    }
}
