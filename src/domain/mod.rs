//! Domain types used throughout the calibration pipeline.
//!
//! This module defines:
//!
//! - observable kinds (`ObsKind`) and measurement points (`DataPoint`)
//! - dataset views (`Dataset`, `PointSeries`) and tabulated curves (`Curve`)
//! - shape/nuisance registrations (`ShapeDef`, `SourceDef`) and their
//!   index-assigned forms (`ShapeBasis`, `NuisanceSource`)
//! - fit settings and fit outputs (`FitSettings`, `FitOutcome`, `Decomposition`)

pub mod types;

pub use types::*;
