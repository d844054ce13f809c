//! Per-run fit context: datasets, shapes, sources and settings, assembled and
//! validated once before any fit runs.
//!
//! Parameter-index assignment is an explicit step here, not a side effect of
//! registration order:
//!
//! - every shape applying to the primary observable claims the next free fit
//!   parameter and registers its family in a `family -> index` table
//! - every satellite shape must resolve its family against that table, so a
//!   family shared across observables shares one fit parameter by construction
//! - nuisance sources get indices in insertion order, offset by the fit-
//!   parameter count in the global vector
//!
//! The total parameter count therefore equals the number of distinct physical
//! shape families plus the number of systematic sources.

use crate::domain::{
    Curve, Dataset, FitSettings, NuisanceSource, ShapeBasis, ShapeDef, SourceDef,
};
use crate::error::AppError;
use crate::fit::model::ModelEvaluator;

/// Everything one fit run reads (and, for the output/variation views, writes).
///
/// Constructed once per run and passed by reference into the core; the core
/// never retains it beyond the run.
#[derive(Debug, Clone)]
pub struct FitContext {
    pub datasets: Vec<Dataset>,
    pub shapes: Vec<ShapeBasis>,
    pub sources: Vec<NuisanceSource>,
    pub reference: Option<Curve>,
    pub settings: FitSettings,
    pub n_fit: usize,
}

impl FitContext {
    /// Assemble and validate a context. All configuration errors surface here,
    /// before any fit evaluation, carrying the offending name.
    pub fn assemble(
        datasets: Vec<Dataset>,
        shapes: Vec<ShapeDef>,
        sources: Vec<SourceDef>,
        reference: Option<Curve>,
        settings: FitSettings,
    ) -> Result<Self, AppError> {
        validate_settings(&settings)?;
        if datasets.is_empty() {
            return Err(AppError::data("no datasets to fit"));
        }
        if settings.use_reference && reference.is_none() {
            return Err(AppError::missing_reference());
        }

        // Family -> fit-parameter index, built from the primary shapes first so
        // satellite resolution cannot depend on registration order.
        let mut families: Vec<(String, usize)> = Vec::new();
        for def in shapes.iter().filter(|s| s.applies_to.is_primary()) {
            if families.iter().any(|(f, _)| *f == def.family) {
                return Err(AppError::config(format!(
                    "shape '{}' re-declares primary family '{}'",
                    def.name, def.family
                )));
            }
            families.push((def.family.clone(), families.len()));
        }
        let n_fit = families.len();

        let mut assigned = Vec::with_capacity(shapes.len());
        for def in shapes {
            let index = match families.iter().find(|(f, _)| *f == def.family) {
                Some((_, i)) => *i,
                None => {
                    return Err(AppError::config(format!(
                        "shape '{}' (family '{}', applies to {}) has no primary-type \
                         counterpart to share a parameter with",
                        def.name,
                        def.family,
                        def.applies_to.display_name()
                    )));
                }
            };
            assigned.push(ShapeBasis {
                name: def.name,
                family: def.family,
                applies_to: def.applies_to,
                index,
                non_negative: def.non_negative,
                form: def.form,
            });
        }

        let mut nuisances = Vec::with_capacity(sources.len());
        for (index, def) in sources.into_iter().enumerate() {
            if !datasets.iter().any(|d| d.name == def.applies_to) {
                return Err(AppError::config(format!(
                    "source '{}' references unknown dataset '{}'",
                    def.name, def.applies_to
                )));
            }
            nuisances.push(NuisanceSource {
                name: def.name,
                applies_to: def.applies_to,
                index,
                profile: def.profile,
            });
        }

        if n_fit + nuisances.len() == 0 {
            return Err(AppError::config(
                "no shapes and no sources registered; nothing to fit",
            ));
        }

        Ok(Self {
            datasets,
            shapes: assigned,
            sources: nuisances,
            reference,
            settings,
            n_fit,
        })
    }

    /// Number of fit (shape) parameters.
    pub fn n_fit(&self) -> usize {
        self.n_fit
    }

    /// Number of nuisance parameters.
    pub fn n_nuisance(&self) -> usize {
        self.sources.len()
    }

    /// Total length of the global parameter vector.
    pub fn n_tot(&self) -> usize {
        self.n_fit + self.sources.len()
    }

    /// Total number of data points across all datasets.
    pub fn n_points(&self) -> usize {
        self.datasets.iter().map(|d| d.len()).sum()
    }

    /// The model evaluator for this context. The reference curve is resolved
    /// here once; assembly has already guaranteed it exists when required.
    pub fn evaluator(&self) -> ModelEvaluator<'_> {
        let reference = if self.settings.use_reference {
            self.reference.as_ref()
        } else {
            None
        };
        ModelEvaluator::new(&self.shapes, reference, &self.settings)
    }

    /// Names of the primary shapes, in parameter-index order (for reporting).
    pub fn fit_par_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = vec![""; self.n_fit];
        for shape in self.shapes.iter().filter(|s| s.applies_to.is_primary()) {
            names[shape.index] = &shape.name;
        }
        names
    }
}

fn validate_settings(settings: &FitSettings) -> Result<(), AppError> {
    if settings.n_passes == 0 {
        return Err(AppError::config("n_passes must be at least 1"));
    }
    if !(settings.par_bound.is_finite() && settings.par_bound > 0.0) {
        return Err(AppError::config("par_bound must be a positive number"));
    }
    if !(settings.err_floor.is_finite() && settings.err_floor >= 0.0) {
        return Err(AppError::config("err_floor must be non-negative"));
    }
    if !(settings.shape_scale.is_finite() && settings.shape_scale != 0.0) {
        return Err(AppError::config("shape_scale must be finite and non-zero"));
    }
    let (lo, hi) = settings.satellite_window;
    if !(lo.is_finite() && hi.is_finite() && lo < hi) {
        return Err(AppError::config("satellite_window must be a valid range"));
    }
    Ok(())
}
