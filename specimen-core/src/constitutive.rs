//! Uniaxial stress-strain laws for concrete-like materials.
//!
//! Every law maps a compressive strain magnitude ε (positive) to a stress
//! magnitude σ in MPa. Strains at or below zero give zero stress. Laws are
//! pure functions of the strain and [`ConstitutiveParams`]; the solver calls
//! them through [`stress`] and [`tangent_modulus`], dispatched over the
//! closed [`ConstitutiveModel`] enum.
//!
//! # Laws
//!
//! | Model       | Ascending branch                         | Beyond ε0                      |
//! |-------------|------------------------------------------|--------------------------------|
//! | `Linear`    | min(Eε, fc)                              | same                           |
//! | `Hognestad` | fc[2x − x²]                              | linear, floor 0.2fc            |
//! | `Gb50010`   | cubic in x with shape αa                 | fc / [αd(x−1)² + x]            |
//! | `Mander`    | fcc·x·r / (r − 1 + xʳ)                   | same expression                |
//! | `Eurocode`  | fc(kη − η²) / (1 + (k − 2)η)             | linear, floor 0.2fc            |
//! | `Damage`    | (1 − d)Eε, d from the Hognestad envelope | exponential softening          |

use serde::{Deserialize, Serialize};

/// Step for the forward-difference tangent modulus.
pub const TANGENT_STEP: f64 = 1e-5;

/// Lower bound on the tangent modulus as a fraction of E.
pub const MIN_TANGENT_RATIO: f64 = 0.01;

/// Residual strength floor for the linearly softening laws.
pub const RESIDUAL_STRENGTH_RATIO: f64 = 0.2;

/// Upper bound of the scalar damage variable.
pub const MAX_DAMAGE: f64 = 0.99;

/// Constitutive law attached to a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstitutiveModel {
    /// Linear elastic, capped at fc when a strength is given.
    #[default]
    Linear,
    /// Hognestad parabola with linear softening.
    Hognestad,
    /// GB 50010 concrete curve.
    Gb50010,
    /// Mander unconfined concrete.
    Mander,
    /// EN 1992-1-1 nonlinear curve.
    Eurocode,
    /// Scalar damage on the Hognestad envelope.
    Damage,
}

impl ConstitutiveModel {
    /// All models, in declaration order.
    pub const ALL: [ConstitutiveModel; 6] = [
        ConstitutiveModel::Linear,
        ConstitutiveModel::Hognestad,
        ConstitutiveModel::Gb50010,
        ConstitutiveModel::Mander,
        ConstitutiveModel::Eurocode,
        ConstitutiveModel::Damage,
    ];

    /// Whether the law departs from linear elasticity below the strength.
    pub fn is_nonlinear(self) -> bool {
        !matches!(self, ConstitutiveModel::Linear)
    }

    /// Whether the law needs a compressive strength fc.
    pub fn requires_strength(self) -> bool {
        self.is_nonlinear()
    }

    pub fn name(self) -> &'static str {
        match self {
            ConstitutiveModel::Linear => "linear",
            ConstitutiveModel::Hognestad => "hognestad",
            ConstitutiveModel::Gb50010 => "gb50010",
            ConstitutiveModel::Mander => "mander",
            ConstitutiveModel::Eurocode => "eurocode",
            ConstitutiveModel::Damage => "damage",
        }
    }
}

/// Parameters consumed by the laws, in MPa and mm/mm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstitutiveParams {
    /// Initial elastic modulus E.
    pub e: f64,
    /// Compressive strength fc. `None` only makes sense for `Linear`.
    pub fc: Option<f64>,
    /// Strain at peak stress ε0.
    pub eps0: f64,
    /// Ultimate strain εU.
    pub eps_u: f64,
}

impl ConstitutiveParams {
    fn strength(&self) -> f64 {
        // Without a strength the elastic line is the only sensible envelope;
        // validated materials always carry fc for nonlinear laws.
        self.fc.unwrap_or(self.e * self.eps0)
    }

    fn softening_span(&self) -> f64 {
        (self.eps_u - self.eps0).max(f64::EPSILON)
    }
}

/// Stress magnitude for a compressive strain magnitude.
pub fn stress(model: ConstitutiveModel, strain: f64, params: &ConstitutiveParams) -> f64 {
    if !(strain > 0.0) {
        return 0.0;
    }
    match model {
        ConstitutiveModel::Linear => linear(strain, params),
        ConstitutiveModel::Hognestad => hognestad(strain, params),
        ConstitutiveModel::Gb50010 => gb50010(strain, params),
        ConstitutiveModel::Mander => mander(strain, params),
        ConstitutiveModel::Eurocode => eurocode(strain, params),
        ConstitutiveModel::Damage => damage(strain, params),
    }
}

/// Tangent modulus dσ/dε by forward difference, clamped to ≥ 1% of E.
///
/// The clamp keeps any stiffness matrix built from it positive definite
/// on softening branches.
pub fn tangent_modulus(model: ConstitutiveModel, strain: f64, params: &ConstitutiveParams) -> f64 {
    let eps = strain.max(0.0);
    let slope = (stress(model, eps + TANGENT_STEP, params) - stress(model, eps, params))
        / TANGENT_STEP;
    slope.max(MIN_TANGENT_RATIO * params.e)
}

/// σ = min(Eε, fc).
pub fn linear(strain: f64, params: &ConstitutiveParams) -> f64 {
    let elastic = params.e * strain;
    match params.fc {
        Some(fc) => elastic.min(fc),
        None => elastic,
    }
}

/// Hognestad parabola peaking at (ε0, fc), linear descent losing 15% of fc
/// at εU, floored at 0.2fc.
pub fn hognestad(strain: f64, params: &ConstitutiveParams) -> f64 {
    let fc = params.strength();
    if strain <= params.eps0 {
        let x = strain / params.eps0;
        fc * (2.0 * x - x * x)
    } else {
        let drop = 0.15 * (strain - params.eps0) / params.softening_span();
        (fc * (1.0 - drop)).max(RESIDUAL_STRENGTH_RATIO * fc)
    }
}

/// GB 50010 ascending cubic and rational descending branch.
pub fn gb50010(strain: f64, params: &ConstitutiveParams) -> f64 {
    let fc = params.strength();
    let fcu_k = fc / 0.76;
    let x = strain / params.eps0;

    if x <= 1.0 {
        let alpha_a = (2.4 - 0.0125 * fcu_k).clamp(1.0, 2.4);
        fc * (alpha_a * x + (3.0 - 2.0 * alpha_a) * x.powi(2) + (alpha_a - 2.0) * x.powi(3))
    } else {
        let alpha_d = (0.157 * fcu_k.powf(0.785) - 0.905).max(0.5);
        fc / (alpha_d * (x - 1.0).powi(2) + x)
    }
}

/// Mander unconfined curve with fcc = fc and εcc = ε0.
///
/// When the secant modulus at peak reaches the initial modulus the exponent
/// r = E / (E − Esec) diverges; the limit of the expression is then used:
/// a straight line to the peak with no post-peak capacity.
pub fn mander(strain: f64, params: &ConstitutiveParams) -> f64 {
    let fcc = params.strength();
    let x = strain / params.eps0;
    let e_sec = fcc / params.eps0;
    let gap = params.e - e_sec;

    if gap <= 1e-6 * params.e {
        return if x <= 1.0 { fcc * x } else { 0.0 };
    }

    let r = params.e / gap;
    fcc * x * r / (r - 1.0 + x.powf(r))
}

/// EN 1992-1-1 curve for η ≤ 1, linear descent to 0.2fc at εU beyond.
///
/// The ascending form needs k = 1.05Eε0/fc ≥ 1; below that it has a pole
/// inside (0, 1). [`Material::validate`](crate::material::Material::validate)
/// rejects such materials, and raw parameters are clamped to the k = 1
/// limit, a straight line to the peak.
pub fn eurocode(strain: f64, params: &ConstitutiveParams) -> f64 {
    let fc = params.strength();
    let eta = strain / params.eps0;

    if eta <= 1.0 {
        let k = eurocode_k(params).max(1.0);
        let denominator = 1.0 + (k - 2.0) * eta;
        if denominator.abs() < 1e-12 {
            // k → 1 limit of (kη − η²) / (1 − η)
            return fc * eta;
        }
        fc * (k * eta - eta * eta) / denominator
    } else {
        let drop = 0.8 * (strain - params.eps0) / params.softening_span();
        (fc * (1.0 - drop)).max(RESIDUAL_STRENGTH_RATIO * fc)
    }
}

/// Eurocode plasticity number k = 1.05Eε0/fc.
pub fn eurocode_k(params: &ConstitutiveParams) -> f64 {
    1.05 * params.e * params.eps0 / params.strength()
}

/// Scalar damage variable for a strain magnitude, clamped to [0, 0.99].
///
/// Ascending: d = 1 − envelope / (Eε) with the Hognestad envelope.
/// Descending: the undamaged stress fc decays exponentially, reaching
/// 0.2fc at εU.
pub fn damage_variable(strain: f64, params: &ConstitutiveParams) -> f64 {
    if !(strain > 0.0) {
        return 0.0;
    }
    let elastic = params.e * strain;
    let retained = if strain <= params.eps0 {
        hognestad(strain, params)
    } else {
        let decay = 5.0_f64.ln() * (strain - params.eps0) / params.softening_span();
        hognestad(params.eps0, params) * (-decay).exp()
    };
    (1.0 - retained / elastic).clamp(0.0, MAX_DAMAGE)
}

/// σ = (1 − d)Eε.
pub fn damage(strain: f64, params: &ConstitutiveParams) -> f64 {
    (1.0 - damage_variable(strain, params)) * params.e * strain
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn c30() -> ConstitutiveParams {
        ConstitutiveParams {
            e: 30000.0,
            fc: Some(30.0),
            eps0: 0.002,
            eps_u: 0.0035,
        }
    }

    fn soft_c30() -> ConstitutiveParams {
        // E = 4700√fc, the concrete preset
        ConstitutiveParams {
            e: 4700.0 * 30.0_f64.sqrt(),
            ..c30()
        }
    }

    #[test]
    fn test_zero_and_negative_strain_give_zero_stress() {
        let params = c30();
        for model in ConstitutiveModel::ALL {
            assert_eq!(stress(model, 0.0, &params), 0.0, "{}", model.name());
            assert_eq!(stress(model, -0.001, &params), 0.0, "{}", model.name());
            assert_eq!(stress(model, f64::NAN, &params), 0.0, "{}", model.name());
        }
    }

    #[test]
    fn test_non_decreasing_up_to_peak() {
        for params in [c30(), soft_c30()] {
            for model in ConstitutiveModel::ALL {
                let mut previous = 0.0;
                for i in 1..=400 {
                    let eps = params.eps0 * i as f64 / 400.0;
                    let s = stress(model, eps, &params);
                    assert!(
                        s + 1e-9 >= previous,
                        "{} decreases at ε = {}: {} < {}",
                        model.name(),
                        eps,
                        s,
                        previous
                    );
                    previous = s;
                }
            }
        }
    }

    #[test]
    fn test_continuous_on_ascending_branch() {
        let params = c30();
        for model in ConstitutiveModel::ALL {
            for i in 0..200 {
                let eps = params.eps0 * i as f64 / 200.0;
                let jump = (stress(model, eps + 1e-9, &params) - stress(model, eps, &params)).abs();
                assert!(jump < 1e-3, "{} jumps at ε = {}", model.name(), eps);
            }
        }
    }

    #[test]
    fn test_peak_at_fc() {
        for params in [c30(), soft_c30()] {
            for model in ConstitutiveModel::ALL {
                let peak = stress(model, params.eps0, &params);
                assert_relative_eq!(peak, 30.0, max_relative = 0.01);
            }
        }
    }

    #[test]
    fn test_linear_caps_at_strength() {
        let params = c30();
        assert_relative_eq!(linear(0.0005, &params), 15.0, epsilon = 1e-12);
        assert_relative_eq!(linear(0.01, &params), 30.0, epsilon = 1e-12);

        let uncapped = ConstitutiveParams { fc: None, ..params };
        assert_relative_eq!(linear(0.01, &uncapped), 300.0, epsilon = 1e-9);
    }

    #[test]
    fn test_hognestad_values() {
        let params = c30();
        // x = 0.5 → fc(1 − 0.25)
        assert_relative_eq!(hognestad(0.001, &params), 22.5, epsilon = 1e-12);
        // 15% drop at εU
        assert_relative_eq!(hognestad(0.0035, &params), 25.5, epsilon = 1e-9);
        // Floor far beyond εU
        assert_relative_eq!(hognestad(0.05, &params), 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_gb50010_descending_branch() {
        let params = c30();
        let fcu_k: f64 = 30.0 / 0.76;
        let alpha_d = (0.157 * fcu_k.powf(0.785) - 0.905).max(0.5);
        let x = 1.5;
        let expected = 30.0 / (alpha_d * 0.25 + x);
        assert_relative_eq!(gb50010(0.003, &params), expected, epsilon = 1e-12);
        assert!(gb50010(0.003, &params) < 30.0);
    }

    #[test]
    fn test_gb50010_shape_parameter_clamped() {
        // Very high strength drives 2.4 − 0.0125 fcu_k below 1.0
        let params = ConstitutiveParams {
            fc: Some(120.0),
            ..c30()
        };
        let x: f64 = 0.5;
        let expected = 120.0 * (x + x.powi(2) - x.powi(3));
        assert_relative_eq!(gb50010(0.001, &params), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_mander_regular_exponent() {
        let params = c30();
        // Esec = 15000, r = 2 → σ = fc·2x / (1 + x²)
        let x: f64 = 0.5;
        let expected = 30.0 * x * 2.0 / (1.0 + x * x);
        assert_relative_eq!(mander(0.001, &params), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_mander_guards_diverging_exponent() {
        // E equals the secant modulus fc/ε0 → r undefined
        let params = ConstitutiveParams {
            e: 15000.0,
            ..c30()
        };
        let s = mander(0.001, &params);
        assert!(s.is_finite());
        assert_relative_eq!(s, 15.0, epsilon = 1e-12);
        assert_relative_eq!(mander(0.002, &params), 30.0, epsilon = 1e-12);
        assert_eq!(mander(0.0025, &params), 0.0);
    }

    #[test]
    fn test_eurocode_values() {
        let params = c30();
        let k = 1.05 * 30000.0 * 0.002 / 30.0;
        let eta = 0.5;
        let expected = 30.0 * (k * eta - eta * eta) / (1.0 + (k - 2.0) * eta);
        assert_relative_eq!(eurocode(0.001, &params), expected, epsilon = 1e-12);
        // Residual floor reached at εU
        assert_relative_eq!(eurocode(0.0035, &params), 6.0, epsilon = 1e-9);
        assert_relative_eq!(eurocode(0.01, &params), 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_eurocode_soft_modulus_stays_monotone() {
        // k = 0.7: the raw closed form has a pole at η = 1/1.3
        let params = ConstitutiveParams {
            e: 10000.0,
            ..c30()
        };
        assert!(eurocode_k(&params) < 1.0);

        let mut prev = 0.0;
        for i in 0..=200 {
            let strain = 0.002 * i as f64 / 200.0;
            let s = eurocode(strain, &params);
            assert!(s.is_finite() && s >= prev - 1e-12);
            assert!(s <= 30.0 + 1e-9);
            prev = s;
        }
        assert_relative_eq!(eurocode(0.0015, &params), 22.5, epsilon = 1e-9);
        assert_relative_eq!(eurocode(0.002, &params), 30.0, epsilon = 1e-9);
    }

    #[test]
    fn test_damage_variable_bounds() {
        let params = soft_c30();
        for i in 0..=100 {
            let eps = 0.006 * i as f64 / 100.0;
            let d = damage_variable(eps, &params);
            assert!((0.0..=MAX_DAMAGE).contains(&d));
        }
        // Softening: stress decays to 0.2fc at εU
        assert_relative_eq!(damage(0.0035, &params), 6.0, max_relative = 1e-9);
        // Damage grows past the peak
        assert!(damage_variable(0.003, &params) > damage_variable(0.002, &params));
    }

    #[test]
    fn test_tangent_modulus_initial_and_clamped() {
        let params = c30();
        // Initial slope of the Hognestad parabola is 2fc/ε0 = E here
        let initial = tangent_modulus(ConstitutiveModel::Hognestad, 0.0, &params);
        assert_relative_eq!(initial, 30000.0, max_relative = 0.01);

        // Softening branch → clamped to 1% of E
        let softening = tangent_modulus(ConstitutiveModel::Hognestad, 0.0025, &params);
        assert_relative_eq!(softening, 300.0, epsilon = 1e-9);

        // Linear beyond the strength cap
        let capped = tangent_modulus(ConstitutiveModel::Linear, 0.01, &params);
        assert_relative_eq!(capped, 300.0, epsilon = 1e-9);
    }

    #[test]
    fn test_tangent_modulus_positive_everywhere() {
        let params = soft_c30();
        for model in ConstitutiveModel::ALL {
            for i in 0..=60 {
                let eps = 0.0001 * i as f64;
                assert!(tangent_modulus(model, eps, &params) >= 0.01 * params.e);
            }
        }
    }

    #[test]
    fn test_model_serde_names() {
        let json = serde_json::to_string(&ConstitutiveModel::Gb50010).unwrap();
        assert_eq!(json, "\"gb50010\"");
        let model: ConstitutiveModel = serde_json::from_str("\"hognestad\"").unwrap();
        assert_eq!(model, ConstitutiveModel::Hognestad);
    }
}
