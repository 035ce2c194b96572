//! 8-node hexahedron (Hex8) element.
//!
//! Trilinear shape functions in natural coordinates (ξ, η, ζ) ∈ [-1, 1]³:
//! ```text
//! N_i = (1 + ξ_i ξ)(1 + η_i η)(1 + ζ_i ζ) / 8
//! ```
//!
//! # Node Numbering
//!
//! ```text
//!        7-------6
//!       /|      /|
//!      4-------5 |
//!      | 3-----|-2
//!      |/      |/
//!      0-------1
//! ```
//! Nodes 0-3 form the ζ = -1 face, nodes 4-7 the matching ζ = +1 face.
//! Each node carries 3 DOFs; stiffness uses 2×2×2 Gauss quadrature and
//! strain is recovered at the centroid.

use crate::element::gauss::gauss_hex;
use crate::element::Element;
use crate::error::{Error, Result};
use crate::material::Material;
use crate::types::{Point3, StrainTensor};
use nalgebra::{DMatrix, DVector, Matrix3, Vector3};

const XI: [f64; 8] = [-1.0, 1.0, 1.0, -1.0, -1.0, 1.0, 1.0, -1.0];
const ETA: [f64; 8] = [-1.0, -1.0, 1.0, 1.0, -1.0, -1.0, 1.0, 1.0];
const ZETA: [f64; 8] = [-1.0, -1.0, -1.0, -1.0, 1.0, 1.0, 1.0, 1.0];

/// 8-node hexahedral element (trilinear brick).
#[derive(Debug, Clone, Copy, Default)]
pub struct Hex8;

impl Hex8 {
    pub fn new() -> Self {
        Self
    }

    /// Natural derivatives `[dN/dξ, dN/dη, dN/dζ]` for each node.
    fn natural_derivatives(xi: f64, eta: f64, zeta: f64) -> [Vector3<f64>; 8] {
        let mut d = [Vector3::zeros(); 8];
        for i in 0..8 {
            let a = 1.0 + XI[i] * xi;
            let b = 1.0 + ETA[i] * eta;
            let c = 1.0 + ZETA[i] * zeta;
            d[i] = Vector3::new(XI[i] * b * c, ETA[i] * a * c, ZETA[i] * a * b) * 0.125;
        }
        d
    }

    /// Row r of J holds ∂(x, y, z)/∂(ξ, η, ζ)_r.
    fn jacobian(coords: &[Point3], dn: &[Vector3<f64>; 8]) -> Matrix3<f64> {
        let mut j = Matrix3::zeros();
        for (d, x) in dn.iter().zip(coords) {
            j += d * x.transpose();
        }
        j
    }

    /// 6×24 strain-displacement matrix and det J at a natural point.
    fn b_matrix(coords: &[Point3], xi: f64, eta: f64, zeta: f64) -> Result<(DMatrix<f64>, f64)> {
        let dn = Self::natural_derivatives(xi, eta, zeta);
        let j = Self::jacobian(coords, &dn);
        let det_j = j.determinant();
        if !(det_j > 0.0) {
            return Err(Error::MeshingDefect(format!(
                "Hex8 Jacobian determinant {:.3e} at ({:.3}, {:.3}, {:.3}); inverted element",
                det_j, xi, eta, zeta
            )));
        }
        let j_inv = j
            .try_inverse()
            .ok_or_else(|| Error::MeshingDefect("Hex8 Jacobian is singular".into()))?;

        // ε = [ε_xx, ε_yy, ε_zz, γ_xy, γ_yz, γ_xz]ᵀ = B u
        let mut b = DMatrix::zeros(6, 24);
        for (i, d) in dn.iter().enumerate() {
            let g = j_inv * d;
            let col = 3 * i;
            b[(0, col)] = g[0];
            b[(1, col + 1)] = g[1];
            b[(2, col + 2)] = g[2];
            b[(3, col)] = g[1];
            b[(3, col + 1)] = g[0];
            b[(4, col + 1)] = g[2];
            b[(4, col + 2)] = g[1];
            b[(5, col)] = g[2];
            b[(5, col + 2)] = g[0];
        }
        Ok((b, det_j))
    }

    fn check_coords(coords: &[Point3]) -> Result<()> {
        if coords.len() != 8 {
            return Err(Error::Configuration(format!(
                "Hex8 requires 8 nodal coordinates, got {}",
                coords.len()
            )));
        }
        Ok(())
    }
}

impl Element for Hex8 {
    fn n_nodes(&self) -> usize {
        8
    }

    fn dofs_per_node(&self) -> usize {
        3
    }

    fn stiffness(
        &self,
        coords: &[Point3],
        material: &Material,
        strain_estimate: Option<f64>,
    ) -> Result<DMatrix<f64>> {
        Self::check_coords(coords)?;

        let d = material.constitutive_3d_with(material.effective_modulus(strain_estimate));
        let mut k = DMatrix::zeros(24, 24);

        for gp in gauss_hex(2) {
            let (b, det_j) = Self::b_matrix(coords, gp.xi(), gp.eta(), gp.zeta())?;
            let db = &d * &b;
            k += b.transpose() * db * (det_j * gp.weight);
        }

        Ok(k)
    }

    fn centroid_strain(&self, coords: &[Point3], displacements: &[f64]) -> Result<StrainTensor> {
        Self::check_coords(coords)?;
        if displacements.len() != 24 {
            return Err(Error::Configuration(format!(
                "Hex8 requires 24 displacement DOFs, got {}",
                displacements.len()
            )));
        }

        let (b, _) = Self::b_matrix(coords, 0.0, 0.0, 0.0)?;
        let e = b * DVector::from_column_slice(displacements);
        Ok(StrainTensor::new([e[0], e[1], e[2], e[3], e[4], e[5]]))
    }

    fn volume(&self, coords: &[Point3]) -> Result<f64> {
        Self::check_coords(coords)?;
        let mut volume = 0.0;
        for gp in gauss_hex(2) {
            let (_, det_j) = Self::b_matrix(coords, gp.xi(), gp.eta(), gp.zeta())?;
            volume += det_j * gp.weight;
        }
        Ok(volume)
    }
}
