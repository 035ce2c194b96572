//! Core data types for specimen analysis.
//!
//! This module defines fundamental types used throughout the crate:
//! - Geometric primitives (points, vectors)
//! - Stress and strain tensors with their invariants

use nalgebra::{Matrix3, Vector3, Vector6};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// A point in 3D space. 2D meshes store `z = 0`.
pub type Point3 = Vector3<f64>;

/// A 3D vector (displacement, force, etc.).
pub type Vec3 = Vector3<f64>;

/// Symmetric stress tensor in Voigt notation.
///
/// Components are ordered as: [σ_xx, σ_yy, σ_zz, τ_xy, τ_yz, τ_xz]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StressTensor(pub Vector6<f64>);

impl StressTensor {
    /// Create a new stress tensor from Voigt components.
    pub fn new(components: [f64; 6]) -> Self {
        Self(Vector6::from_row_slice(&components))
    }

    /// Zero stress state.
    pub fn zero() -> Self {
        Self(Vector6::zeros())
    }

    pub fn xx(&self) -> f64 {
        self.0[0]
    }

    pub fn yy(&self) -> f64 {
        self.0[1]
    }

    pub fn zz(&self) -> f64 {
        self.0[2]
    }

    pub fn xy(&self) -> f64 {
        self.0[3]
    }

    /// Compute von Mises equivalent stress.
    pub fn von_mises(&self) -> f64 {
        let s = &self.0;
        let s_xx = s[0];
        let s_yy = s[1];
        let s_zz = s[2];
        let t_xy = s[3];
        let t_yz = s[4];
        let t_xz = s[5];

        let term1 = (s_xx - s_yy).powi(2) + (s_yy - s_zz).powi(2) + (s_zz - s_xx).powi(2);
        let term2 = 6.0 * (t_xy.powi(2) + t_yz.powi(2) + t_xz.powi(2));

        ((term1 + term2) / 2.0).sqrt()
    }

    /// Compute hydrostatic (mean) stress.
    pub fn hydrostatic(&self) -> f64 {
        (self.0[0] + self.0[1] + self.0[2]) / 3.0
    }

    /// Extract the full 3x3 symmetric stress matrix.
    pub fn to_matrix(&self) -> Matrix3<f64> {
        let s = &self.0;
        Matrix3::new(
            s[0], s[3], s[5],
            s[3], s[1], s[4],
            s[5], s[4], s[2],
        )
    }

    /// In-plane principal stresses (σ1, σ2) from Mohr's circle.
    ///
    /// ```text
    /// σ1,2 = (σx + σy)/2 ± √(((σx − σy)/2)² + τxy²)
    /// ```
    pub fn principal_in_plane(&self) -> (f64, f64) {
        let avg = 0.5 * (self.xx() + self.yy());
        let radius = ((0.5 * (self.xx() - self.yy())).powi(2) + self.xy().powi(2)).sqrt();
        (avg + radius, avg - radius)
    }

    /// Principal stresses for a 2D state, sorted σ1 ≥ σ2 ≥ σ3.
    ///
    /// The two in-plane values come from Mohr's circle; σ_zz (zero for plane
    /// stress, ν(σx + σy) for plane strain) is the third principal value.
    pub fn principal_2d(&self) -> [f64; 3] {
        let (s1, s2) = self.principal_in_plane();
        sorted_descending([s1, s2, self.zz()])
    }

    /// Principal stresses of the full tensor, sorted σ1 ≥ σ2 ≥ σ3.
    ///
    /// Solves the characteristic cubic with the trigonometric method:
    /// the deviatoric part is normalised and its determinant gives the
    /// angle of the three real roots.
    pub fn principal_3d(&self) -> [f64; 3] {
        let a = self.to_matrix();
        let off_diag = self.0[3].powi(2) + self.0[4].powi(2) + self.0[5].powi(2);
        let scale = a.norm_squared();

        if off_diag <= f64::EPSILON * scale {
            return sorted_descending([a[(0, 0)], a[(1, 1)], a[(2, 2)]]);
        }

        let q = a.trace() / 3.0;
        let p2 = (a[(0, 0)] - q).powi(2)
            + (a[(1, 1)] - q).powi(2)
            + (a[(2, 2)] - q).powi(2)
            + 2.0 * off_diag;
        let p = (p2 / 6.0).sqrt();

        let b = (a - Matrix3::identity() * q) / p;
        let r = (b.determinant() / 2.0).clamp(-1.0, 1.0);
        let phi = r.acos() / 3.0;

        let e1 = q + 2.0 * p * phi.cos();
        let e3 = q + 2.0 * p * (phi + 2.0 * PI / 3.0).cos();
        let e2 = 3.0 * q - e1 - e3;

        sorted_descending([e1, e2, e3])
    }
}

fn sorted_descending(mut values: [f64; 3]) -> [f64; 3] {
    values.sort_by(|a, b| b.total_cmp(a));
    values
}

/// Symmetric strain tensor in Voigt notation.
///
/// Components are ordered as: [ε_xx, ε_yy, ε_zz, γ_xy, γ_yz, γ_xz]
/// where γ = 2ε for engineering shear strain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrainTensor(pub Vector6<f64>);

impl StrainTensor {
    /// Create a new strain tensor from Voigt components.
    pub fn new(components: [f64; 6]) -> Self {
        Self(Vector6::from_row_slice(&components))
    }

    /// Zero strain state.
    pub fn zero() -> Self {
        Self(Vector6::zeros())
    }

    /// Compute volumetric strain.
    pub fn volumetric(&self) -> f64 {
        self.0[0] + self.0[1] + self.0[2]
    }

    /// Index (0, 1 or 2) and value of the normal strain with the largest
    /// magnitude. Ties go to the lower index.
    pub fn dominant_normal(&self) -> (usize, f64) {
        let mut axis = 0;
        for i in 1..3 {
            if self.0[i].abs() > self.0[axis].abs() {
                axis = i;
            }
        }
        (axis, self.0[axis])
    }

    /// Extract the full 3x3 symmetric strain matrix.
    pub fn to_matrix(&self) -> Matrix3<f64> {
        let e = &self.0;
        // Note: off-diagonal terms are γ/2 = ε
        Matrix3::new(
            e[0],       e[3] / 2.0, e[5] / 2.0,
            e[3] / 2.0, e[1],       e[4] / 2.0,
            e[5] / 2.0, e[4] / 2.0, e[2],
        )
    }
}
