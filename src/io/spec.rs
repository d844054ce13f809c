//! Fit-spec file loading.
//!
//! A fit spec is one JSON document naming everything a run needs: datasets
//! (points plus optional pre-fit offsets), shape registrations referencing the
//! basis catalog by form name, systematic sources (tabulated or constant
//! profiles), the optional reference curve, and the settings block.
//!
//! Loader policy, mirroring how the inputs are produced upstream:
//! - a shape or source whose target dataset (or observable type) was not
//!   loaded is skipped with a warning — the core only ever sees the filtered,
//!   present set
//! - an unknown basis-form name or a malformed curve is a configuration
//!   error carrying the offending name; those are never skipped silently

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{
    Curve, DataPoint, Dataset, FitSettings, ObsKind, ShapeDef, SourceDef,
};
use crate::error::AppError;
use crate::math::basis;

/// Top-level fit-spec document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitSpecFile {
    #[serde(default)]
    pub settings: FitSettings,
    pub datasets: Vec<DatasetSpec>,
    #[serde(default)]
    pub shapes: Vec<ShapeSpec>,
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
    #[serde(default)]
    pub reference: Option<CurveSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSpec {
    pub name: String,
    pub kind: ObsKind,
    /// `[x, y, sigma]` triples.
    pub points: Vec<[f64; 3]>,
    #[serde(default)]
    pub prefit_offset: Option<CurveSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapeSpec {
    pub name: String,
    pub family: String,
    pub applies_to: ObsKind,
    #[serde(default)]
    pub positive: bool,
    /// Basis-catalog form name (see `math::basis::resolve`).
    pub form: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSpec {
    pub name: String,
    /// Dataset name this source shifts.
    pub applies_to: String,
    pub profile: ProfileSpec,
}

/// A shift profile: either a flat value or a tabulated curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProfileSpec {
    Constant { constant: f64 },
    Table { x: Vec<f64>, y: Vec<f64> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveSpec {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl CurveSpec {
    fn build(self, what: &str) -> Result<Curve, AppError> {
        Curve::new(self.x, self.y)
            .map_err(|e| AppError::config(format!("invalid curve for {what}: {e}")))
    }
}

impl ProfileSpec {
    fn build(self, source: &str) -> Result<Curve, AppError> {
        match self {
            ProfileSpec::Constant { constant } => {
                if !constant.is_finite() {
                    return Err(AppError::config(format!(
                        "source '{source}' has a non-finite constant profile"
                    )));
                }
                Ok(Curve::constant(constant))
            }
            ProfileSpec::Table { x, y } => Curve::new(x, y)
                .map_err(|e| AppError::config(format!("source '{source}' profile: {e}"))),
        }
    }
}

/// Everything the pipeline needs, plus the loader's skip warnings.
#[derive(Debug, Clone)]
pub struct LoadedInputs {
    pub datasets: Vec<Dataset>,
    pub shapes: Vec<ShapeDef>,
    pub sources: Vec<SourceDef>,
    pub reference: Option<Curve>,
    pub settings: FitSettings,
    pub warnings: Vec<String>,
}

/// Read and parse a fit-spec JSON file.
pub fn read_spec(path: &Path) -> Result<FitSpecFile, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::config(format!("failed to open fit spec '{}': {e}", path.display()))
    })?;
    serde_json::from_reader(file)
        .map_err(|e| AppError::config(format!("invalid fit spec '{}': {e}", path.display())))
}

/// Turn a parsed spec into domain objects, applying the skip policy.
pub fn build_inputs(spec: FitSpecFile) -> Result<LoadedInputs, AppError> {
    let mut warnings = Vec::new();

    let mut datasets = Vec::with_capacity(spec.datasets.len());
    for ds in spec.datasets {
        let offset = match ds.prefit_offset {
            Some(c) => Some(c.build(&format!("dataset '{}' prefit offset", ds.name))?),
            None => None,
        };
        let points = ds
            .points
            .iter()
            .map(|&[x, y, sigma]| DataPoint { x, y, sigma })
            .collect();
        datasets.push(Dataset::new(ds.name, ds.kind, points, offset.as_ref())?);
    }

    let mut shapes = Vec::with_capacity(spec.shapes.len());
    for sh in spec.shapes {
        let Some(form) = basis::resolve(&sh.form) else {
            return Err(AppError::config(format!(
                "shape '{}' references unknown form '{}'",
                sh.name, sh.form
            )));
        };
        if !datasets.iter().any(|d| d.kind == sh.applies_to) {
            warnings.push(format!(
                "skipping shape '{}': no dataset of type {}",
                sh.name,
                sh.applies_to.display_name()
            ));
            continue;
        }
        shapes.push(ShapeDef {
            name: sh.name,
            family: sh.family,
            applies_to: sh.applies_to,
            non_negative: sh.positive,
            form,
        });
    }

    let mut sources = Vec::with_capacity(spec.sources.len());
    for src in spec.sources {
        if !datasets.iter().any(|d| d.name == src.applies_to) {
            warnings.push(format!(
                "skipping source '{}': dataset '{}' not loaded",
                src.name, src.applies_to
            ));
            continue;
        }
        let profile = src.profile.build(&src.name)?;
        sources.push(SourceDef {
            name: src.name,
            applies_to: src.applies_to,
            profile,
        });
    }

    let reference = match spec.reference {
        Some(c) => Some(c.build("reference")?),
        None => None,
    };

    Ok(LoadedInputs {
        datasets,
        shapes,
        sources,
        reference,
        settings: spec.settings,
        warnings,
    })
}
