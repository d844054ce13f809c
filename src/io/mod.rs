//! File I/O around the fit core: spec-file loading and result export.
//!
//! The core itself has no file-format surface; everything serialized lives
//! here so the fit modules stay testable with in-memory inputs.

pub mod export;
pub mod spec;

pub use export::*;
pub use spec::*;
