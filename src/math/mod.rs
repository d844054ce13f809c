//! Mathematical utilities: the basis-function catalog and dense linear algebra.

pub mod basis;
pub mod linalg;

pub use basis::*;
pub use linalg::*;
