//! JSON export of fit results.
//!
//! The report file is the portable representation of a finished run:
//! converged parameters with errors, the full covariance, the chi-square
//! decomposition, every dataset's prefit/postfit/variation series (variation
//! points carry their propagated band as the error), and the fitted curves
//! with confidence bands over a log-spaced reporting grid.
//!
//! Satellite-observable series are exported scaled back by `1/shape_scale`,
//! so downstream consumers see them in their natural units.

use std::fs::File;
use std::path::Path;

use serde::Serialize;

use crate::domain::{Decomposition, FitOutcome, ObsKind, PointSeries, ProjectedCurve};
use crate::error::AppError;
use crate::fit::{CurveProjector, FitContext, log_grid};

/// Number of grid points for exported curves.
const GRID_POINTS: usize = 101;

#[derive(Debug, Clone, Serialize)]
pub struct FitReportFile {
    pub tool: String,
    pub generated: String,
    pub chi2: f64,
    pub n_terms: usize,
    pub n_points: usize,
    pub n_fit_pars: usize,
    pub n_nuisance_pars: usize,
    pub decomposition: Decomposition,
    pub parameters: Vec<ParameterOut>,
    pub covariance: Vec<Vec<f64>>,
    pub datasets: Vec<DatasetOut>,
    pub curves: Vec<CurveOut>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParameterOut {
    pub name: String,
    /// `"shape"` or `"nuisance"`.
    pub role: String,
    pub value: f64,
    pub error: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeriesOut {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub err: Vec<f64>,
}

impl SeriesOut {
    fn from_series(series: &PointSeries) -> Self {
        Self {
            x: series.points.iter().map(|p| p.x).collect(),
            y: series.points.iter().map(|p| p.y).collect(),
            err: series.points.iter().map(|p| p.sigma).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetOut {
    pub name: String,
    pub kind: ObsKind,
    pub raw: SeriesOut,
    pub prefit: SeriesOut,
    pub postfit: SeriesOut,
    pub variation: SeriesOut,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurveOut {
    pub kind: ObsKind,
    pub curve: ProjectedCurve,
}

/// Assemble the report from a finished run.
pub fn build_report(
    ctx: &FitContext,
    outcome: &FitOutcome,
    decomposition: &Decomposition,
    band_k: f64,
) -> FitReportFile {
    let projector = CurveProjector::new(ctx, outcome, band_k);

    let mut parameters = Vec::with_capacity(ctx.n_tot());
    for (i, name) in ctx.fit_par_names().iter().enumerate() {
        parameters.push(ParameterOut {
            name: (*name).to_string(),
            role: "shape".into(),
            value: outcome.parameters[i],
            error: outcome.error(i),
        });
    }
    for src in &ctx.sources {
        let i = ctx.n_fit() + src.index;
        parameters.push(ParameterOut {
            name: src.name.clone(),
            role: "nuisance".into(),
            value: outcome.parameters[i],
            error: outcome.error(i),
        });
    }

    let covariance = (0..ctx.n_tot())
        .map(|i| (0..ctx.n_tot()).map(|j| outcome.covariance[(i, j)]).collect())
        .collect();

    let mut datasets = Vec::with_capacity(ctx.datasets.len());
    for ds in &ctx.datasets {
        let mut prefit = ds.input.clone();
        let mut postfit = ds.output.clone();
        let mut variation = ds.variation.clone();

        // Attach the propagated band to each variation point.
        for i in 0..variation.len() {
            let x = variation.points[i].x;
            let weights = projector.variation_weights(ds.kind, x);
            variation.set_error(i, projector.band_from_weights(&weights));
        }

        if !ds.kind.is_primary() {
            let back = 1.0 / ctx.settings.shape_scale;
            prefit.scale(back);
            postfit.scale(back);
            variation.scale(back);
        }

        datasets.push(DatasetOut {
            name: ds.name.clone(),
            kind: ds.kind,
            raw: SeriesOut::from_series(&ds.raw),
            prefit: SeriesOut::from_series(&prefit),
            postfit: SeriesOut::from_series(&postfit),
            variation: SeriesOut::from_series(&variation),
        });
    }

    let (x_min, x_max) = data_range(ctx);
    let grid = log_grid(x_min, x_max, GRID_POINTS);
    let curves = ObsKind::all()
        .into_iter()
        .filter(|kind| ctx.datasets.iter().any(|d| d.kind == *kind))
        .map(|kind| CurveOut {
            kind,
            curve: projector.project(kind, &grid),
        })
        .collect();

    FitReportFile {
        tool: "rescal".into(),
        generated: chrono::Local::now().to_rfc3339(),
        chi2: outcome.chi2,
        n_terms: outcome.n_terms,
        n_points: ctx.n_points(),
        n_fit_pars: ctx.n_fit(),
        n_nuisance_pars: ctx.n_nuisance(),
        decomposition: *decomposition,
        parameters,
        covariance,
        datasets,
        curves,
    }
}

/// Write the report as pretty-printed JSON.
pub fn write_report(path: &Path, report: &FitReportFile) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(2, format!("failed to create report '{}': {e}", path.display()))
    })?;
    serde_json::to_writer_pretty(file, report)
        .map_err(|e| AppError::new(2, format!("failed to write report: {e}")))
}

fn data_range(ctx: &FitContext) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for ds in &ctx.datasets {
        for p in &ds.input.points {
            lo = lo.min(p.x);
            hi = hi.max(p.x);
        }
    }
    if !(lo.is_finite() && hi.is_finite() && hi > lo) {
        (10.0, 6500.0)
    } else {
        (lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Curve, DataPoint, Dataset, FitSettings, ShapeDef, SourceDef};
    use crate::fit::{Minimizer, Objective, validate};
    use crate::math::basis;

    fn run() -> (FitContext, FitOutcome, Decomposition) {
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
                name: "scale".into(),
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
        (ctx, outcome, dec)
    }

    #[test]
    fn report_carries_parameters_series_and_curves() {
        let (ctx, outcome, dec) = run();
        let report = build_report(&ctx, &outcome, &dec, 1.0);

        assert_eq!(report.parameters.len(), 2);
        assert_eq!(report.parameters[0].role, "shape");
        assert_eq!(report.parameters[1].role, "nuisance");
        assert_eq!(report.covariance.len(), 2);
        assert_eq!(report.datasets.len(), 1);
        assert_eq!(report.datasets[0].postfit.y.len(), 3);
        assert_eq!(report.curves.len(), 1);
        assert_eq!(report.curves[0].curve.value.len(), GRID_POINTS);
        // The variation series carries a propagated band.
        assert!(report.datasets[0].variation.err.iter().all(|e| *e > 0.0));

        // The document serializes.
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"tool\": \"rescal\"") || json.contains("\"tool\":\"rescal\""));
    }
}
