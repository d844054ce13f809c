//! Bounded Levenberg–Marquardt minimization of the chi-square objective.
//!
//! The driver runs a fixed, configured number of full minimization passes;
//! each pass restarts the damped least-squares iteration from the previous
//! pass's result. The pass count is policy (it stabilizes configurations
//! where the objective feeds back on its own parameters through the reference
//! normalization) and is never replaced by an outer convergence test.
//!
//! On completion the parameter covariance is extracted as `(JᵀJ)⁻¹` at the
//! final parameters. A covariance that is not positive definite, or any
//! non-finite state, aborts the run; no partial result is ever returned.

use nalgebra::{DMatrix, DVector};

use crate::domain::FitOutcome;
use crate::error::AppError;
use crate::math::{invert_spd, solve_spd};

/// Tuning knobs for the damped least-squares iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmConfig {
    /// Iteration cap per pass.
    pub max_iterations: usize,
    /// Residual-norm threshold below which a pass stops early.
    pub tolerance: f64,
    /// Relative parameter-change threshold below which a pass stops early.
    pub param_tolerance: f64,
    /// Initial damping factor.
    pub initial_lambda: f64,
    /// Damping increase on a rejected step.
    pub lambda_up: f64,
    /// Damping decrease on an accepted step.
    pub lambda_down: f64,
    pub min_lambda: f64,
    pub max_lambda: f64,
    /// Relative finite-difference step for the Jacobian.
    pub fd_step: f64,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-12,
            param_tolerance: 1e-12,
            initial_lambda: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
            min_lambda: 1e-12,
            max_lambda: 1e12,
            fd_step: 1e-8,
        }
    }
}

/// Least-squares minimizer: residual vector in, parameters + covariance out.
#[derive(Debug, Clone)]
pub struct Minimizer {
    config: LmConfig,
}

impl Minimizer {
    pub fn new(config: LmConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(LmConfig::default())
    }

    pub fn config(&self) -> &LmConfig {
        &self.config
    }

    /// Minimize the squared norm of `residuals` over the parameter box
    /// `[bounds.0, bounds.1]`, running exactly `passes` restarts.
    pub fn minimize<F>(
        &self,
        mut residuals: F,
        initial: Vec<f64>,
        bounds: (f64, f64),
        passes: usize,
    ) -> Result<FitOutcome, AppError>
    where
        F: FnMut(&[f64]) -> Vec<f64>,
    {
        if initial.is_empty() {
            return Err(AppError::config("empty parameter vector"));
        }
        if passes == 0 {
            return Err(AppError::config("at least one minimization pass is required"));
        }
        if !(bounds.0.is_finite() && bounds.1.is_finite() && bounds.0 < bounds.1) {
            return Err(AppError::config("invalid parameter bounds"));
        }

        let mut params: Vec<f64> = initial
            .into_iter()
            .map(|p| p.clamp(bounds.0, bounds.1))
            .collect();
        for _ in 0..passes {
            params = self.lm_pass(&mut residuals, params, bounds)?;
        }

        let r = residuals(&params);
        let n_terms = r.len();
        let chi2 = sum_of_squares(&r);
        if !chi2.is_finite() {
            return Err(AppError::not_converged("non-finite chi-square at minimum"));
        }

        let jacobian = self.jacobian(&mut residuals, &params, &r);
        let jtj = jacobian.transpose() * &jacobian;
        let covariance = invert_spd(&jtj)
            .ok_or_else(|| AppError::not_converged("covariance matrix is not positive definite"))?;

        Ok(FitOutcome {
            parameters: params,
            covariance,
            chi2,
            n_terms,
        })
    }

    /// One full damped least-squares minimization from `params`.
    fn lm_pass<F>(
        &self,
        f: &mut F,
        mut params: Vec<f64>,
        bounds: (f64, f64),
    ) -> Result<Vec<f64>, AppError>
    where
        F: FnMut(&[f64]) -> Vec<f64>,
    {
        let cfg = &self.config;

        let mut r = f(&params);
        if r.is_empty() {
            return Err(AppError::config("objective produced no residual terms"));
        }
        let mut ss = sum_of_squares(&r);
        if !ss.is_finite() {
            return Err(AppError::not_converged("non-finite chi-square at start"));
        }

        let mut lambda = cfg.initial_lambda;
        for _ in 0..cfg.max_iterations {
            if ss.sqrt() < cfg.tolerance {
                break;
            }

            let jacobian = self.jacobian(f, &params, &r);
            let jtj = jacobian.transpose() * &jacobian;
            let jtr = jacobian.transpose() * DVector::from_column_slice(&r);

            let mut damped = jtj;
            for i in 0..damped.nrows() {
                damped[(i, i)] += lambda;
            }

            let delta = match solve_spd(&damped, &(-jtr)) {
                Some(d) => d,
                None => {
                    lambda = (lambda * cfg.lambda_up).min(cfg.max_lambda);
                    continue;
                }
            };

            let param_norm = params.iter().map(|p| p * p).sum::<f64>().sqrt().max(1.0);
            if delta.norm() / param_norm < cfg.param_tolerance {
                break;
            }

            let trial: Vec<f64> = params
                .iter()
                .zip(delta.iter())
                .map(|(p, d)| (p + d).clamp(bounds.0, bounds.1))
                .collect();
            let r_trial = f(&trial);
            let ss_trial = sum_of_squares(&r_trial);

            if ss_trial.is_finite() && ss_trial < ss {
                params = trial;
                r = r_trial;
                ss = ss_trial;
                lambda = (lambda * cfg.lambda_down).max(cfg.min_lambda);
            } else {
                lambda = (lambda * cfg.lambda_up).min(cfg.max_lambda);
            }
        }

        Ok(params)
    }

    /// Forward finite-difference Jacobian of the residual vector.
    fn jacobian<F>(&self, f: &mut F, params: &[f64], r0: &[f64]) -> DMatrix<f64>
    where
        F: FnMut(&[f64]) -> Vec<f64>,
    {
        let n_res = r0.len();
        let n_par = params.len();
        let mut jacobian = DMatrix::zeros(n_res, n_par);
        let mut work = params.to_vec();

        for j in 0..n_par {
            let h = self.config.fd_step * work[j].abs().max(1.0);
            let orig = work[j];
            work[j] = orig + h;
            let r_plus = f(&work);
            work[j] = orig;
            for i in 0..n_res {
                jacobian[(i, j)] = (r_plus[i] - r0[i]) / h;
            }
        }
        jacobian
    }
}

#[inline]
fn sum_of_squares(v: &[f64]) -> f64 {
    v.iter().fold(0.0, |acc, x| acc + x * x)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: (f64, f64) = (-100.0, 100.0);

    #[test]
    fn solves_a_separable_linear_problem_with_unit_covariance() {
        let residuals = |p: &[f64]| vec![p[0] - 2.0, p[1] - 3.0];
        let out = Minimizer::with_defaults()
            .minimize(residuals, vec![0.0, 0.0], BOUNDS, 1)
            .unwrap();

        assert!((out.parameters[0] - 2.0).abs() < 1e-6);
        assert!((out.parameters[1] - 3.0).abs() < 1e-6);
        assert!(out.chi2 < 1e-10);
        assert_eq!(out.n_terms, 2);
        // J = I, so the covariance is the identity.
        assert!((out.covariance[(0, 0)] - 1.0).abs() < 1e-6);
        assert!((out.covariance[(1, 1)] - 1.0).abs() < 1e-6);
        assert!(out.covariance[(0, 1)].abs() < 1e-6);
    }

    #[test]
    fn fits_the_weighted_mean_of_three_points() {
        // One flat shape, no prior: the model is 1 + p, so p converges to the
        // weighted mean offset and chi2 to the scatter around it.
        let y = [1.1, 1.12, 1.08];
        let residuals = move |p: &[f64]| y.iter().map(|yi| (yi - (1.0 + p[0])) / 0.1).collect();
        let out = Minimizer::with_defaults()
            .minimize(residuals, vec![0.0], BOUNDS, 1)
            .unwrap();

        assert!((out.parameters[0] - 0.1).abs() < 1e-6);
        assert!((out.chi2 - 0.08).abs() < 1e-6);
        // JtJ = 3 / 0.1^2 = 300, so the error is sqrt(1/300).
        assert!((out.error(0) - (1.0 / 300.0_f64).sqrt()).abs() < 1e-6);
    }

    #[test]
    fn gaussian_prior_shrinks_the_fitted_parameter_toward_zero() {
        let y = [1.1, 1.12, 1.08];
        let free = move |p: &[f64]| -> Vec<f64> {
            y.iter().map(|yi| (yi - (1.0 + p[0])) / 0.1).collect()
        };
        let with_prior = move |p: &[f64]| -> Vec<f64> {
            let mut r: Vec<f64> = y.iter().map(|yi| (yi - (1.0 + p[0])) / 0.1).collect();
            r.push(p[0]);
            r
        };

        let m = Minimizer::with_defaults();
        let a = m.minimize(free, vec![0.0], BOUNDS, 1).unwrap();
        let b = m.minimize(with_prior, vec![0.0], BOUNDS, 1).unwrap();

        assert!(b.parameters[0].abs() < a.parameters[0].abs());
        // Closed form: p = 30 / 301.
        assert!((b.parameters[0] - 30.0 / 301.0).abs() < 1e-6);
        assert!(b.parameters[0] * b.parameters[0] > 0.0);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let y = [1.1, 1.12, 1.08];
        let make = move || move |p: &[f64]| -> Vec<f64> {
            y.iter().map(|yi| (yi - (1.0 + p[0])) / 0.1).collect()
        };
        let m = Minimizer::with_defaults();
        let a = m.minimize(make(), vec![0.0], BOUNDS, 1).unwrap();
        let b = m.minimize(make(), vec![0.0], BOUNDS, 1).unwrap();
        assert!((a.chi2 - b.chi2).abs() < 1e-9);
        assert!((a.parameters[0] - b.parameters[0]).abs() < 1e-9);
    }

    #[test]
    fn extra_passes_do_not_change_a_converged_linear_solution() {
        let residuals = |p: &[f64]| vec![p[0] - 2.0];
        let m = Minimizer::with_defaults();
        let one = m.minimize(residuals, vec![0.0], BOUNDS, 1).unwrap();
        let three = m.minimize(residuals, vec![0.0], BOUNDS, 3).unwrap();
        assert!((one.parameters[0] - three.parameters[0]).abs() < 1e-9);
    }

    #[test]
    fn parameters_are_clamped_to_the_box() {
        let residuals = |p: &[f64]| vec![p[0] - 500.0];
        let out = Minimizer::with_defaults()
            .minimize(residuals, vec![0.0], BOUNDS, 1)
            .unwrap();
        assert_eq!(out.parameters[0], 100.0);
    }

    #[test]
    fn unconstrained_parameter_yields_a_convergence_error() {
        // The second parameter never enters the residuals, so JtJ is singular
        // and the covariance extraction must fail loudly.
        let residuals = |p: &[f64]| vec![p[0] - 1.0];
        let err = Minimizer::with_defaults()
            .minimize(residuals, vec![0.0, 0.0], BOUNDS, 1)
            .unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn empty_parameter_vector_is_rejected() {
        let residuals = |_p: &[f64]| vec![1.0];
        assert!(
            Minimizer::with_defaults()
                .minimize(residuals, vec![], BOUNDS, 1)
                .is_err()
        );
    }
}
