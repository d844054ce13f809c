//! Catalog of response-correction basis functions.
//!
//! Each entry is a fixed, parameter-free curve of the momentum `x` describing
//! how one physical effect distorts an observable; the global fit scales each
//! by its fit parameter. The primary-response family covers tracker dynamic
//! inefficiency, pileup offset, calorimeter-scale terms and single-particle
//! response variants; the `*_chf` / `*_nhf` / `*_nef` entries are the same
//! families expressed for the energy-fraction observables.
//!
//! Numerical notes:
//! - All forms divide by `x` or take `ln(x)` somewhere; `x` is clamped to a
//!   small positive epsilon so stray zero abscissas cannot produce NaNs.
//! - The recurring `2t/(1+t)` motif (with `t = (x/x0)^p`) is a smooth turn-on
//!   from 0 to 2 centered at `x0`; it is factored out as `turnon`.

use crate::domain::BasisFn;

/// Guard against `x = 0` in basis evaluation.
const X_EPS: f64 = 1e-6;

/// Smooth turn-on `1 + (t - 1)/(t + 1) = 2t/(1 + t)` with `t = (x/x0)^p`.
fn turnon(x: f64, x0: f64, p: f64) -> f64 {
    let t = (x / x0).powf(p);
    2.0 * t / (t + 1.0)
}

/// Shared shape of the calorimeter-scale terms:
/// `t/(1+t) * (1 - t^-1)` with `t = (x/x0)^p`.
fn hump(x: f64, x0: f64, p: f64) -> f64 {
    let t = (x / x0).powf(p);
    t / (1.0 + t) * (1.0 - (x / x0).powf(-p))
}

/// Unit constant; the simplest possible shape, used by tests and demos.
pub fn constant_one(_x: f64) -> f64 {
    1.0
}

// ---- primary-response family ----

/// Tracker dynamic inefficiency.
pub fn ftd(x: f64) -> f64 {
    let x = x.max(X_EPS);
    -0.116 - 0.6417 * (x / 208.0).powf(-0.3051) + 23.63 / x
}

/// Pileup offset (flat).
pub fn fp(_x: f64) -> f64 {
    -0.8295
}

/// Hadron-calorimeter scale, crossover region.
pub fn fhx(x: f64) -> f64 {
    let x = x.max(X_EPS);
    0.8904 + 1.082 * hump(x, 1408.0, 1.204)
}

/// Hadron-calorimeter scale, hadron-hadron term.
pub fn fhh(x: f64) -> f64 {
    let x = x.max(X_EPS);
    -0.7938 - 0.5798 * hump(x, 396.1, 1.412)
}

/// Electromagnetic-on-hadronic scale term.
pub fn feh(x: f64) -> f64 {
    let x = x.max(X_EPS);
    -0.2603 - 0.2196 * hump(x, 409.4, 1.276)
}

/// Calorimeter response to soft hadrons.
pub fn fhw(x: f64) -> f64 {
    let x = x.max(X_EPS);
    0.3 * (0.9526 - 0.3883 * turnon(x, 1285.0, 2.46) + 18.1 / x - 2.062 * x.ln() / x)
}

/// Offset-correction residual.
pub fn fl1(x: f64) -> f64 {
    let x = x.max(X_EPS);
    let l = x.ln();
    (1.0 - (0.350077 + 0.553560 * l - 0.0527681 * l * l) / x) - 1.0
}

/// Tracker inefficiency minus its reference parameterization.
pub fn ftd_ftm(x: f64) -> f64 {
    let x = x.max(X_EPS);
    let a = -0.116 - 0.6417 * (x / 208.0).powf(-0.3051) + 23.63 / x;
    let b = 0.2683 - 0.6994 * (x / 208.0).powf(-0.3051) + 18.49 / x;
    3.0 * (a - b)
}

/// Low-momentum single-particle-response variation.
pub fn f1q3(x: f64) -> f64 {
    let x = x.max(X_EPS);
    0.01 * (0.7966 + 0.9311 * ((0.01 * x).powf(-1.0) - 1.0))
}

// ---- charged-hadron-fraction family ----

pub fn ftd_chf(x: f64) -> f64 {
    let x = x.max(X_EPS);
    1.982 - 2.678 * turnon(x, 47.02, 0.262) + 0.1494 * x.powf(0.3) - 3.097 / x
}

pub fn fp_chf(x: f64) -> f64 {
    let x = x.max(X_EPS);
    0.3333 + 0.7433 * turnon(x, 1023.0, 0.3926) - 0.09446 * x.powf(0.2883)
}

pub fn fhx_chf(x: f64) -> f64 {
    let x = x.max(X_EPS);
    -0.0637 - 0.2811 * turnon(x, 4531.0, -0.3172) + 1.071 * x.powf(-0.153)
}

pub fn fhw_chf(x: f64) -> f64 {
    let x = x.max(X_EPS);
    -0.2176 + 1.064e-05 * x.powf(1.373)
}

// ---- neutral-hadron-fraction family ----

pub fn ftd_nhf(x: f64) -> f64 {
    let x = x.max(X_EPS);
    -0.01022 - 0.1962 * turnon(x, 4000.0, 3.071) + 0.04211 * x.powf(0.3) + 0.01005 / x
}

pub fn fp_nhf(x: f64) -> f64 {
    let x = x.max(X_EPS);
    0.07395 + 1.223e-05 * x.powf(1.158)
}

pub fn fhx_nhf(x: f64) -> f64 {
    let x = x.max(X_EPS);
    -0.295 + 0.09444 * turnon(x, 2713.0, 0.06437)
}

pub fn fhw_nhf(x: f64) -> f64 {
    let x = x.max(X_EPS);
    -5.151 + 4.495 * x.powf(0.03335) - 12.3 / x
}

// ---- photon-fraction family ----

pub fn ftd_nef(x: f64) -> f64 {
    let x = x.max(X_EPS);
    0.07453 + 0.1457 * turnon(x, 1131.0, -3.68) - 0.4155 * x.powf(-0.3) - 1.878 / x
}

pub fn fp_nef(x: f64) -> f64 {
    let x = x.max(X_EPS);
    2.283 - 2.738 * x.powf(0.002452)
}

pub fn fhx_nef(x: f64) -> f64 {
    let x = x.max(X_EPS);
    0.05474 - 0.003141 * turnon(x, 798.6, 78.84) - 0.000957 * x.powf(0.76)
}

pub fn fhw_nef(x: f64) -> f64 {
    let x = x.max(X_EPS);
    0.8417 - 0.2605 * x.powf(0.2289) + 2.426 / x
}

/// Resolve a configured form name to its basis function.
///
/// Returns `None` for unknown names; the loader surfaces that as a
/// configuration error carrying the offending name.
pub fn resolve(name: &str) -> Option<BasisFn> {
    let f: BasisFn = match name {
        "one" => constant_one,
        "ftd" => ftd,
        "fp" => fp,
        "fhx" => fhx,
        "fhh" => fhh,
        "feh" => feh,
        "fhw" => fhw,
        "fl1" => fl1,
        "ftd-ftm" => ftd_ftm,
        "f1q3" => f1q3,
        "ftd_chf" => ftd_chf,
        "fp_chf" => fp_chf,
        "fhx_chf" => fhx_chf,
        "fhw_chf" => fhw_chf,
        "ftd_nhf" => ftd_nhf,
        "fp_nhf" => fp_nhf,
        "fhx_nhf" => fhx_nhf,
        "fhw_nhf" => fhw_nhf,
        "ftd_nef" => ftd_nef,
        "fp_nef" => fp_nef,
        "fhx_nef" => fhx_nef,
        "fhw_nef" => fhw_nef,
        _ => return None,
    };
    Some(f)
}
