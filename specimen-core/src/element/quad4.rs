//! 4-node bilinear quadrilateral for plane stress and plane strain.
//!
//! Nodes are ordered counter-clockwise; in natural coordinates:
//! ```text
//!   3 (-1,+1) ---- 2 (+1,+1)
//!   |              |
//!   0 (-1,-1) ---- 1 (+1,-1)
//! ```
//!
//! Each node carries 2 DOFs `(u, v)`. Stiffness uses 2×2 Gauss quadrature;
//! strain is recovered at the centroid `(ξ, η) = (0, 0)`.

use crate::element::gauss::gauss_quad;
use crate::element::Element;
use crate::error::{Error, Result};
use crate::material::{AnalysisType, Material};
use crate::types::{Point3, StrainTensor};
use nalgebra::{DMatrix, DVector, Matrix2, Vector2};

const NODE_XI: [f64; 4] = [-1.0, 1.0, 1.0, -1.0];
const NODE_ETA: [f64; 4] = [-1.0, -1.0, 1.0, 1.0];

/// Bilinear quadrilateral for in-plane analysis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad4 {
    analysis: AnalysisType,
    thickness: f64,
}

impl Quad4 {
    pub fn new(analysis: AnalysisType, thickness: f64) -> Self {
        Self {
            analysis,
            thickness,
        }
    }

    pub fn analysis(&self) -> AnalysisType {
        self.analysis
    }

    pub fn thickness(&self) -> f64 {
        self.thickness
    }

    /// Shape function derivatives (dN/dξ, dN/dη) for each node.
    fn natural_derivatives(xi: f64, eta: f64) -> [(f64, f64); 4] {
        let mut d = [(0.0, 0.0); 4];
        for i in 0..4 {
            d[i] = (
                0.25 * NODE_XI[i] * (1.0 + NODE_ETA[i] * eta),
                0.25 * NODE_ETA[i] * (1.0 + NODE_XI[i] * xi),
            );
        }
        d
    }

    /// Jacobian `[[∂x/∂ξ, ∂y/∂ξ], [∂x/∂η, ∂y/∂η]]` at `(ξ, η)`.
    fn jacobian(coords: &[Point3], xi: f64, eta: f64) -> Matrix2<f64> {
        let dn = Self::natural_derivatives(xi, eta);
        let mut j = Matrix2::zeros();
        for (i, &(dxi, deta)) in dn.iter().enumerate() {
            j[(0, 0)] += dxi * coords[i][0];
            j[(0, 1)] += dxi * coords[i][1];
            j[(1, 0)] += deta * coords[i][0];
            j[(1, 1)] += deta * coords[i][1];
        }
        j
    }

    /// 3×8 strain-displacement matrix and det J at `(ξ, η)`.
    fn b_matrix(coords: &[Point3], xi: f64, eta: f64) -> Result<(DMatrix<f64>, f64)> {
        let j = Self::jacobian(coords, xi, eta);
        let det_j = j.determinant();
        if !(det_j > 0.0) {
            return Err(Error::MeshingDefect(format!(
                "Quad4 Jacobian determinant {:.3e} at ({:.3}, {:.3}); nodes must be counter-clockwise",
                det_j, xi, eta
            )));
        }
        let j_inv = j.try_inverse().ok_or_else(|| {
            Error::MeshingDefect("Quad4 Jacobian is singular".into())
        })?;

        let mut b = DMatrix::zeros(3, 8);
        for (i, &(dxi, deta)) in Self::natural_derivatives(xi, eta).iter().enumerate() {
            let g = j_inv * Vector2::new(dxi, deta);
            let col = 2 * i;
            b[(0, col)] = g[0];
            b[(1, col + 1)] = g[1];
            b[(2, col)] = g[1];
            b[(2, col + 1)] = g[0];
        }
        Ok((b, det_j))
    }

    fn check_coords(coords: &[Point3]) -> Result<()> {
        if coords.len() != 4 {
            return Err(Error::Configuration(format!(
                "Quad4 requires 4 nodal coordinates, got {}",
                coords.len()
            )));
        }
        Ok(())
    }

    fn check_thickness(&self) -> Result<()> {
        if !(self.thickness > 0.0) || !self.thickness.is_finite() {
            return Err(Error::Configuration(format!(
                "Thickness must be positive, got {}",
                self.thickness
            )));
        }
        Ok(())
    }
}

impl Element for Quad4 {
    fn n_nodes(&self) -> usize {
        4
    }

    fn dofs_per_node(&self) -> usize {
        2
    }

    fn stiffness(
        &self,
        coords: &[Point3],
        material: &Material,
        strain_estimate: Option<f64>,
    ) -> Result<DMatrix<f64>> {
        Self::check_coords(coords)?;
        self.check_thickness()?;

        let e = material.effective_modulus(strain_estimate);
        let d = material.constitutive_2d_with(self.analysis, e);
        let mut k = DMatrix::zeros(8, 8);

        for gp in gauss_quad(2) {
            let (b, det_j) = Self::b_matrix(coords, gp.xi(), gp.eta())?;
            // K += w t |J| Bᵀ D B
            let db = &d * &b;
            k += b.transpose() * db * (gp.weight * self.thickness * det_j);
        }

        Ok(k)
    }

    fn centroid_strain(&self, coords: &[Point3], displacements: &[f64]) -> Result<StrainTensor> {
        Self::check_coords(coords)?;
        if displacements.len() != 8 {
            return Err(Error::Configuration(format!(
                "Quad4 requires 8 displacement DOFs, got {}",
                displacements.len()
            )));
        }

        let (b, _) = Self::b_matrix(coords, 0.0, 0.0)?;
        let strain = b * DVector::from_column_slice(displacements);
        Ok(StrainTensor::new([strain[0], strain[1], 0.0, strain[2], 0.0, 0.0]))
    }

    fn volume(&self, coords: &[Point3]) -> Result<f64> {
        Self::check_coords(coords)?;
        let mut area = 0.0;
        for gp in gauss_quad(2) {
            let (_, det_j) = Self::b_matrix(coords, gp.xi(), gp.eta())?;
            area += gp.weight * det_j;
        }
        Ok(area * self.thickness)
    }
}
