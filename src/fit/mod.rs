//! The global-fit core.
//!
//! Responsibilities:
//!
//! - assemble and validate a per-run [`FitContext`] (no global registries)
//! - compose the shared response model ([`ModelEvaluator`])
//! - build the chi-square objective over all datasets, nuisance priors and
//!   optional fit-parameter priors ([`Objective`])
//! - minimize it with a fixed number of bounded least-squares passes
//!   ([`Minimizer`])
//! - decompose and consistency-check the converged chi-square ([`validate`])
//! - propagate the covariance to confidence bands ([`CurveProjector`])

pub mod context;
pub mod minimizer;
pub mod model;
pub mod objective;
pub mod projection;
pub mod validate;

pub use context::*;
pub use minimizer::*;
pub use model::*;
pub use objective::*;
pub use projection::*;
pub use validate::*;
