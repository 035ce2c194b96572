//! Material property definitions.
//!
//! A [`Material`] carries the isotropic elastic constants used by the
//! element kernels plus the strength parameters consumed by the
//! [`constitutive`](crate::constitutive) laws. Units are MPa and mm/mm.

use crate::constitutive::{self, ConstitutiveModel, ConstitutiveParams};
use crate::error::{Error, Result};
use nalgebra::{Matrix3, Matrix6};
use serde::{Deserialize, Serialize};

/// Default strain at peak stress.
pub const DEFAULT_PEAK_STRAIN: f64 = 0.002;

/// Default ultimate strain.
pub const DEFAULT_ULTIMATE_STRAIN: f64 = 0.0035;

/// 2D idealisation for quadrilateral elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    /// Thin specimen, σ_z = 0.
    #[default]
    PlaneStress,
    /// Thick specimen, ε_z = 0.
    PlaneStrain,
}

/// Material properties for specimen analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Young's modulus E (MPa).
    pub youngs_modulus: f64,
    /// Poisson's ratio ν (dimensionless).
    pub poissons_ratio: f64,
    /// Compressive strength fc (MPa).
    pub compressive_strength: Option<f64>,
    /// Tensile strength ft (MPa).
    ///
    /// Carried for the lab front end (crack reporting, result tables). The
    /// laws are compression-only and stress recovery never reads it.
    pub tensile_strength: Option<f64>,
    /// Strain at peak stress ε0.
    pub peak_strain: f64,
    /// Ultimate strain εU.
    pub ultimate_strain: f64,
    /// Stress-strain law.
    pub model: ConstitutiveModel,
}

impl Material {
    /// Create a new isotropic linear elastic material.
    ///
    /// # Arguments
    ///
    /// * `youngs_modulus` - Young's modulus E (MPa)
    /// * `poissons_ratio` - Poisson's ratio ν (dimensionless, -1 < ν < 0.5)
    ///
    /// # Errors
    ///
    /// Returns error if material properties are physically invalid.
    pub fn new(youngs_modulus: f64, poissons_ratio: f64) -> Result<Self> {
        if !(youngs_modulus > 0.0) || !youngs_modulus.is_finite() {
            return Err(Error::InvalidMaterial(
                "Young's modulus must be positive".into(),
            ));
        }
        if !(poissons_ratio > -1.0 && poissons_ratio < 0.5) {
            return Err(Error::InvalidMaterial(
                "Poisson's ratio must be in range (-1, 0.5)".into(),
            ));
        }
        Ok(Self {
            youngs_modulus,
            poissons_ratio,
            compressive_strength: None,
            tensile_strength: None,
            peak_strain: DEFAULT_PEAK_STRAIN,
            ultimate_strain: DEFAULT_ULTIMATE_STRAIN,
            model: ConstitutiveModel::Linear,
        })
    }

    /// Set the compressive strength fc.
    pub fn with_strength(mut self, fc: f64) -> Result<Self> {
        if !(fc > 0.0) || !fc.is_finite() {
            return Err(Error::InvalidMaterial(
                "Compressive strength must be positive".into(),
            ));
        }
        self.compressive_strength = Some(fc);
        Ok(self)
    }

    /// Set the tensile strength ft.
    pub fn with_tensile_strength(mut self, ft: f64) -> Result<Self> {
        if !(ft > 0.0) || !ft.is_finite() {
            return Err(Error::InvalidMaterial(
                "Tensile strength must be positive".into(),
            ));
        }
        self.tensile_strength = Some(ft);
        Ok(self)
    }

    /// Set the strain at peak stress ε0.
    pub fn with_peak_strain(mut self, eps0: f64) -> Result<Self> {
        if !(eps0 > 0.0) || !eps0.is_finite() {
            return Err(Error::InvalidMaterial("Peak strain must be positive".into()));
        }
        self.peak_strain = eps0;
        Ok(self)
    }

    /// Set the ultimate strain εU.
    pub fn with_ultimate_strain(mut self, eps_u: f64) -> Result<Self> {
        if !(eps_u > 0.0) || !eps_u.is_finite() {
            return Err(Error::InvalidMaterial(
                "Ultimate strain must be positive".into(),
            ));
        }
        self.ultimate_strain = eps_u;
        Ok(self)
    }

    /// Attach a constitutive law.
    pub fn with_model(mut self, model: ConstitutiveModel) -> Self {
        self.model = model;
        self
    }

    /// Check the whole parameter set, including cross-field constraints.
    ///
    /// Fields are public so deserialised or hand-edited materials are
    /// re-validated here before any mesh is built from them.
    pub fn validate(&self) -> Result<()> {
        Material::new(self.youngs_modulus, self.poissons_ratio)?;
        if let Some(fc) = self.compressive_strength {
            if !(fc > 0.0) || !fc.is_finite() {
                return Err(Error::InvalidMaterial(
                    "Compressive strength must be positive".into(),
                ));
            }
        }
        if let Some(ft) = self.tensile_strength {
            if !(ft > 0.0) || !ft.is_finite() {
                return Err(Error::InvalidMaterial(
                    "Tensile strength must be positive".into(),
                ));
            }
        }
        if !(self.peak_strain > 0.0) {
            return Err(Error::InvalidMaterial("Peak strain must be positive".into()));
        }
        if !(self.ultimate_strain > self.peak_strain) {
            return Err(Error::InvalidMaterial(format!(
                "Ultimate strain {} must exceed peak strain {}",
                self.ultimate_strain, self.peak_strain
            )));
        }
        if self.model.requires_strength() && self.compressive_strength.is_none() {
            return Err(Error::InvalidMaterial(format!(
                "Constitutive model '{}' requires a compressive strength",
                self.model.name()
            )));
        }
        if self.model == ConstitutiveModel::Eurocode {
            let k = constitutive::eurocode_k(&self.constitutive_params());
            if k < 1.0 {
                return Err(Error::InvalidMaterial(format!(
                    "Eurocode curve needs 1.05·E·ε0/fc >= 1, got {:.3}",
                    k
                )));
            }
        }
        Ok(())
    }

    /// Whether stresses are recovered through a nonlinear law.
    pub fn is_nonlinear(&self) -> bool {
        self.model.is_nonlinear()
    }

    /// Parameters for the constitutive laws.
    pub fn constitutive_params(&self) -> ConstitutiveParams {
        ConstitutiveParams {
            e: self.youngs_modulus,
            fc: self.compressive_strength,
            eps0: self.peak_strain,
            eps_u: self.ultimate_strain,
        }
    }

    /// Uniaxial stress magnitude for a compressive strain magnitude.
    pub fn uniaxial_stress(&self, strain: f64) -> f64 {
        constitutive::stress(self.model, strain, &self.constitutive_params())
    }

    /// Tangent modulus at a compressive strain magnitude.
    pub fn tangent_modulus(&self, strain: f64) -> f64 {
        constitutive::tangent_modulus(self.model, strain, &self.constitutive_params())
    }

    /// Modulus used for stiffness: E for linear materials or when no strain
    /// estimate is available, otherwise the tangent at the estimate.
    pub fn effective_modulus(&self, strain_estimate: Option<f64>) -> f64 {
        match strain_estimate {
            Some(strain) if self.is_nonlinear() => self.tangent_modulus(strain.abs()),
            _ => self.youngs_modulus,
        }
    }

    /// Shear modulus G = E / (2(1 + ν)).
    pub fn shear_modulus(&self) -> f64 {
        self.youngs_modulus / (2.0 * (1.0 + self.poissons_ratio))
    }

    /// Bulk modulus K = E / (3(1 - 2ν)).
    pub fn bulk_modulus(&self) -> f64 {
        self.youngs_modulus / (3.0 * (1.0 - 2.0 * self.poissons_ratio))
    }

    /// 3D constitutive matrix for isotropic linear elasticity.
    ///
    /// Returns the 6x6 matrix D such that σ = D * ε in Voigt notation.
    pub fn constitutive_3d(&self) -> Matrix6<f64> {
        isotropic_3d(self.youngs_modulus, self.poissons_ratio)
    }

    /// 3D constitutive matrix evaluated with modulus `e` instead of E.
    pub fn constitutive_3d_with(&self, e: f64) -> Matrix6<f64> {
        isotropic_3d(e, self.poissons_ratio)
    }

    /// Plane stress constitutive matrix (for 2D elements).
    ///
    /// Returns a 3x3 matrix for [σ_xx, σ_yy, τ_xy] = D * [ε_xx, ε_yy, γ_xy].
    pub fn constitutive_plane_stress(&self) -> Matrix3<f64> {
        plane_stress(self.youngs_modulus, self.poissons_ratio)
    }

    /// Plane strain constitutive matrix (for 2D elements).
    ///
    /// Returns a 3x3 matrix for [σ_xx, σ_yy, τ_xy] = D * [ε_xx, ε_yy, γ_xy].
    pub fn constitutive_plane_strain(&self) -> Matrix3<f64> {
        plane_strain(self.youngs_modulus, self.poissons_ratio)
    }

    /// 2D constitutive matrix for an analysis type with modulus `e`.
    pub fn constitutive_2d_with(&self, analysis: AnalysisType, e: f64) -> Matrix3<f64> {
        match analysis {
            AnalysisType::PlaneStress => plane_stress(e, self.poissons_ratio),
            AnalysisType::PlaneStrain => plane_strain(e, self.poissons_ratio),
        }
    }
}

fn isotropic_3d(e: f64, nu: f64) -> Matrix6<f64> {
    let factor = e / ((1.0 + nu) * (1.0 - 2.0 * nu));
    let c11 = factor * (1.0 - nu);
    let c12 = factor * nu;
    let c44 = factor * (1.0 - 2.0 * nu) / 2.0; // = G

    Matrix6::new(
        c11, c12, c12, 0.0, 0.0, 0.0,
        c12, c11, c12, 0.0, 0.0, 0.0,
        c12, c12, c11, 0.0, 0.0, 0.0,
        0.0, 0.0, 0.0, c44, 0.0, 0.0,
        0.0, 0.0, 0.0, 0.0, c44, 0.0,
        0.0, 0.0, 0.0, 0.0, 0.0, c44,
    )
}

fn plane_stress(e: f64, nu: f64) -> Matrix3<f64> {
    let factor = e / (1.0 - nu * nu);

    Matrix3::new(
        factor,         factor * nu, 0.0,
        factor * nu,    factor,      0.0,
        0.0,            0.0,         factor * (1.0 - nu) / 2.0,
    )
}

fn plane_strain(e: f64, nu: f64) -> Matrix3<f64> {
    let factor = e / ((1.0 + nu) * (1.0 - 2.0 * nu));
    let c11 = factor * (1.0 - nu);
    let c12 = factor * nu;
    let c44 = factor * (1.0 - 2.0 * nu) / 2.0;

    Matrix3::new(
        c11, c12, 0.0,
        c12, c11, 0.0,
        0.0, 0.0, c44,
    )
}

/// Common material presets (MPa).
impl Material {
    /// Normal-weight concrete of strength `fc` with the Hognestad law.
    ///
    /// E = 4700√fc, ν = 0.2, ft = 0.1fc, ε0 = 0.002, εU = 0.0035.
    pub fn concrete(fc: f64) -> Result<Self> {
        if !(fc > 0.0) || !fc.is_finite() {
            return Err(Error::InvalidMaterial(
                "Compressive strength must be positive".into(),
            ));
        }
        Material::new(4700.0 * fc.sqrt(), 0.2)?
            .with_strength(fc)?
            .with_tensile_strength(0.1 * fc)
            .map(|m| m.with_model(ConstitutiveModel::Hognestad))
    }

    /// Structural steel (E = 200 GPa, ν = 0.3), linear elastic.
    pub fn steel() -> Self {
        Self {
            youngs_modulus: 200_000.0,
            poissons_ratio: 0.3,
            compressive_strength: None,
            tensile_strength: None,
            peak_strain: DEFAULT_PEAK_STRAIN,
            ultimate_strain: DEFAULT_ULTIMATE_STRAIN,
            model: ConstitutiveModel::Linear,
        }
    }
}
