//! Sampled stress-strain curves for preview plots.
//!
//! The lab UI draws the selected law before a test is run. Sampling goes
//! through the same [`Material::uniaxial_stress`] the solver uses, so the
//! preview and the analysis never disagree.
//!
//! [`kent_park_stress`] is a preview-only law that is not part of
//! [`ConstitutiveModel`](crate::constitutive::ConstitutiveModel); the solver
//! never calls it.

use crate::error::{Error, Result};
use crate::material::Material;
use serde::{Deserialize, Serialize};

/// One sample of a stress-strain curve (compression positive).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub strain: f64,
    pub stress: f64,
}

/// Sample `n_points` evenly spaced points of the material law on `[0, εU]`.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if fewer than 2 points are requested.
pub fn sample_curve(material: &Material, n_points: usize) -> Result<Vec<CurvePoint>> {
    if n_points < 2 {
        return Err(Error::Configuration(format!(
            "A curve needs at least 2 points, got {}",
            n_points
        )));
    }
    material.validate()?;

    let step = material.ultimate_strain / (n_points - 1) as f64;
    Ok((0..n_points)
        .map(|i| {
            let strain = step * i as f64;
            CurvePoint {
                strain,
                stress: material.uniaxial_stress(strain),
            }
        })
        .collect())
}

/// Kent–Park law: Hognestad parabola up to `(eps0, fc)`, then a straight
/// descent reaching 0.5fc at ε50u, floored at 0.2fc.
///
/// ```text
/// ε50u = (3 + 0.29 fc) / (145 fc − 1000)
/// Z    = 0.5 / (ε50u − ε0)
/// σ    = fc [1 − Z (ε − ε0)]
/// ```
///
/// The ε50u expression is used as written. Its denominator vanishes near
/// fc ≈ 6.9 and turns negative below, where the descent flips into a rise;
/// callers should restrict previews to structural strengths.
pub fn kent_park_stress(strain: f64, fc: f64, eps0: f64) -> f64 {
    if !(strain > 0.0) {
        return 0.0;
    }
    if strain <= eps0 {
        let x = strain / eps0;
        return fc * (2.0 * x - x * x);
    }
    let eps50u = (3.0 + 0.29 * fc) / (145.0 * fc - 1000.0);
    let z = 0.5 / (eps50u - eps0);
    (fc * (1.0 - z * (strain - eps0))).max(0.2 * fc)
}
