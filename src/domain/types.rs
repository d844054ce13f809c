//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON for downstream reporting
//! - rebuilt from a fit-spec file without touching the core

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Observable kinds handled by the global fit.
///
/// `Resp` is the primary response observable; the energy-fraction observables
/// (`Chf`, `Nhf`, `Nef`) are satellites that share shape parameters with the
/// primary fit by family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObsKind {
    Resp,
    Chf,
    Nhf,
    Nef,
}

impl ObsKind {
    /// The primary observable gets the `1.0 + shifts` model composition and
    /// the optional reference normalization; satellites start from zero.
    pub fn is_primary(self) -> bool {
        matches!(self, ObsKind::Resp)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ObsKind::Resp => "Resp",
            ObsKind::Chf => "chf",
            ObsKind::Nhf => "nhf",
            ObsKind::Nef => "nef",
        }
    }

    /// All kinds, in reporting order.
    pub fn all() -> [ObsKind; 4] {
        [ObsKind::Resp, ObsKind::Chf, ObsKind::Nhf, ObsKind::Nef]
    }
}

/// One measured point. Immutable once loaded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub x: f64,
    pub y: f64,
    pub sigma: f64,
}

/// An ordered sequence of measurement points.
///
/// The value-type replacement for cloned plot objects: the fit mutates the
/// derived views point-by-point instead of juggling heap-allocated graphs.
#[derive(Debug, Clone, PartialEq)]
pub struct PointSeries {
    pub points: Vec<DataPoint>,
}

impl PointSeries {
    pub fn new(points: Vec<DataPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Overwrite the y-value at `i`, keeping x and sigma.
    pub fn set_value(&mut self, i: usize, y: f64) {
        self.points[i].y = y;
    }

    /// Overwrite the error at `i`, keeping x and y.
    pub fn set_error(&mut self, i: usize, sigma: f64) {
        self.points[i].sigma = sigma;
    }

    /// Scale y and sigma of every point by `factor`.
    pub fn scale(&mut self, factor: f64) {
        for p in &mut self.points {
            p.y *= factor;
            p.sigma *= factor;
        }
    }
}

/// One measured dataset with its four aligned views.
///
/// - `raw`: the points exactly as loaded
/// - `input`: raw plus any known pre-fit correction; this is what the fit sees
/// - `output`: input plus the fitted nuisance/shape shift (written once per
///   objective evaluation)
/// - `variation`: the shift itself, for uncertainty bookkeeping
///
/// All four have the same length and index `i` denotes the same physical x in
/// each view.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub name: String,
    pub kind: ObsKind,
    pub raw: PointSeries,
    pub input: PointSeries,
    pub output: PointSeries,
    pub variation: PointSeries,
}

impl Dataset {
    /// Build a dataset from raw points, optionally applying a known pre-fit
    /// offset curve (`input = raw + offset(x)`).
    pub fn new(
        name: impl Into<String>,
        kind: ObsKind,
        points: Vec<DataPoint>,
        prefit_offset: Option<&Curve>,
    ) -> Result<Self, AppError> {
        let name = name.into();
        if points.is_empty() {
            return Err(AppError::data(format!("dataset '{name}' has no points")));
        }
        for p in &points {
            if !(p.x.is_finite() && p.y.is_finite() && p.sigma.is_finite() && p.sigma > 0.0) {
                return Err(AppError::data(format!(
                    "dataset '{name}' has a malformed point at x={}",
                    p.x
                )));
            }
        }

        let raw = PointSeries::new(points);
        let mut input = raw.clone();
        if let Some(offset) = prefit_offset {
            for p in &mut input.points {
                p.y += offset.value_at(p.x);
            }
        }
        let output = input.clone();
        let variation = PointSeries::new(
            input
                .points
                .iter()
                .map(|p| DataPoint {
                    x: p.x,
                    y: 0.0,
                    sigma: 0.0,
                })
                .collect(),
        );

        Ok(Self {
            name,
            kind,
            raw,
            input,
            output,
            variation,
        })
    }

    /// Number of points, asserting the views are still aligned.
    pub fn len(&self) -> usize {
        debug_assert!(
            self.raw.len() == self.input.len()
                && self.input.len() == self.output.len()
                && self.output.len() == self.variation.len()
        );
        self.input.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }
}

/// A tabulated curve over sorted abscissas.
///
/// Two lookup modes are provided, matching how the profiles are consumed:
/// `value_at` uses step (bin-content) semantics for systematic-shift tables,
/// `interpolate` uses linear interpolation for reference curves.
///
/// Construction goes through [`Curve::new`] so the sorted-knots invariant
/// always holds; the loader layer has its own serde schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl Curve {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self, AppError> {
        if x.is_empty() || x.len() != y.len() {
            return Err(AppError::data(format!(
                "curve needs equal-length non-empty knot arrays (got {} x, {} y)",
                x.len(),
                y.len()
            )));
        }
        for w in x.windows(2) {
            if !(w[1] > w[0]) {
                return Err(AppError::data("curve knots must be strictly increasing"));
            }
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(AppError::data("curve knots must be finite"));
        }
        Ok(Self { x, y })
    }

    /// A flat curve: the special-cased "constant scale" profile.
    pub fn constant(value: f64) -> Self {
        Self {
            x: vec![0.0],
            y: vec![value],
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Step lookup: the value of the last knot at or below `x` (clamped to the
    /// first knot below range).
    pub fn value_at(&self, x: f64) -> f64 {
        match self.x.partition_point(|&k| k <= x) {
            0 => self.y[0],
            i => self.y[i - 1],
        }
    }

    /// Linear interpolation, clamped to the end values outside the knot range.
    pub fn interpolate(&self, x: f64) -> f64 {
        let n = self.x.len();
        if n == 1 || x <= self.x[0] {
            return self.y[0];
        }
        if x >= self.x[n - 1] {
            return self.y[n - 1];
        }
        let i = self.x.partition_point(|&k| k <= x);
        let (x0, x1) = (self.x[i - 1], self.x[i]);
        let (y0, y1) = (self.y[i - 1], self.y[i]);
        y0 + (y1 - y0) * (x - x0) / (x1 - x0)
    }
}

/// A basis function of one variable from the catalog in `math::basis`.
pub type BasisFn = fn(f64) -> f64;

/// A shape registration as read from configuration, before index assignment.
#[derive(Debug, Clone)]
pub struct ShapeDef {
    pub name: String,
    /// Family of physically-related shapes; shapes of the same family share
    /// one fit parameter across observables.
    pub family: String,
    pub applies_to: ObsKind,
    pub non_negative: bool,
    pub form: BasisFn,
}

/// A shape with its assigned fit-parameter index.
#[derive(Debug, Clone)]
pub struct ShapeBasis {
    pub name: String,
    pub family: String,
    pub applies_to: ObsKind,
    pub index: usize,
    pub non_negative: bool,
    pub form: BasisFn,
}

/// A systematic-uncertainty source registration, before index assignment.
#[derive(Debug, Clone)]
pub struct SourceDef {
    pub name: String,
    /// Name of the dataset this source shifts.
    pub applies_to: String,
    pub profile: Curve,
}

/// A systematic source with its assigned nuisance-parameter index (within the
/// nuisance block; the global vector offsets it by the fit-parameter count).
#[derive(Debug, Clone)]
pub struct NuisanceSource {
    pub name: String,
    pub applies_to: String,
    pub index: usize,
    pub profile: Curve,
}

/// Policy knobs for one fit run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitSettings {
    /// Divide the primary-observable prediction by the reference curve.
    pub use_reference: bool,
    /// Add a unit Gaussian prior term per fit (shape) parameter.
    pub penalize_fit_pars: bool,
    /// Error floor combined in quadrature with each point's sigma.
    pub err_floor: f64,
    /// Scale factor applied to every shape contribution.
    pub shape_scale: f64,
    /// Validity window for satellite shape shifts; points outside contribute
    /// zero shape shift.
    pub satellite_window: (f64, f64),
    /// Number of full minimization passes. Fixed by policy, never replaced by
    /// a convergence-tolerance loop.
    pub n_passes: usize,
    /// Symmetric box bound applied to every parameter.
    pub par_bound: f64,
}

impl Default for FitSettings {
    fn default() -> Self {
        Self {
            use_reference: false,
            penalize_fit_pars: true,
            err_floor: 0.0,
            shape_scale: 0.01,
            satellite_window: (40.0, 600.0),
            n_passes: 1,
            par_bound: 100.0,
        }
    }
}

/// The converged result of one fit run. Created once, never mutated.
#[derive(Debug, Clone)]
pub struct FitOutcome {
    /// Full parameter vector: `[shape parameters, nuisance parameters]`.
    pub parameters: Vec<f64>,
    /// Parameter covariance, same dimension as `parameters`.
    pub covariance: DMatrix<f64>,
    /// Total chi-square at the final parameters.
    pub chi2: f64,
    /// Number of residual terms summed into the chi-square.
    pub n_terms: usize,
}

impl FitOutcome {
    /// One-sigma error on parameter `i` from the covariance diagonal.
    pub fn error(&self, i: usize) -> f64 {
        self.covariance[(i, i)].max(0.0).sqrt()
    }
}

/// Post-fit chi-square decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Decomposition {
    pub chi2_total: f64,
    pub chi2_data: f64,
    /// Nuisance-prior contribution.
    pub chi2_src: f64,
    /// Fit-parameter-prior contribution.
    pub chi2_par: f64,
    pub n_par_true: usize,
    pub n_src_true: usize,
}

/// A model curve evaluated over a reporting grid with a confidence band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedCurve {
    pub x: Vec<f64>,
    pub value: Vec<f64>,
    pub band: Vec<f64>,
}
