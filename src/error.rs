//! Crate-wide error type.
//!
//! Every fallible path funnels into [`AppError`], which carries a process exit
//! code alongside the message (the binary maps it straight to `ExitCode`).
//!
//! Exit-code conventions:
//! - 2: configuration problems (bad spec file, unknown names, invalid settings)
//! - 3: data problems (empty or malformed input series)
//! - 4: convergence failures (the minimizer could not produce a valid result)
//! - 5: consistency failures (post-fit invariants violated; these indicate a
//!   programming or configuration defect, never a data problem)

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    /// Configuration error (unknown names, invalid settings, bad spec file).
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(2, message)
    }

    /// Data error (empty or malformed input series).
    pub fn data(message: impl Into<String>) -> Self {
        Self::new(3, message)
    }

    /// The minimizer failed to reach a valid state; the run is aborted, no
    /// partial result is returned.
    pub fn not_converged(message: impl Into<String>) -> Self {
        Self::new(4, format!("fit did not converge: {}", message.into()))
    }

    /// A post-fit invariant was violated.
    pub fn consistency(message: impl Into<String>) -> Self {
        Self::new(5, message)
    }

    /// Reference normalization requested without a reference curve.
    pub fn missing_reference() -> Self {
        Self::config("reference normalization is enabled but no reference curve was provided")
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
