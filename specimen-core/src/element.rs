//! Element trait and implementations.
//!
//! The Element trait defines the interface for finite elements, enabling
//! the assembly and post-processing passes to work with any element type
//! uniformly.
//!
//! # Submodules
//!
//! - [`gauss`] - Gauss quadrature rules for numerical integration
//! - [`quad4`] - 4-node bilinear quadrilateral (plane stress / plane strain)
//! - [`hex8`] - 8-node trilinear hexahedron

use crate::error::Result;
use crate::material::{AnalysisType, Material};
use crate::mesh::ElementType;
use crate::types::{Point3, StrainTensor};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

pub mod gauss;
pub mod hex8;
pub mod quad4;

pub use gauss::{gauss_1d, gauss_hex, gauss_quad, GaussPoint};
pub use hex8::Hex8;
pub use quad4::Quad4;

/// Finite element interface.
///
/// Elements must be thread-safe (Send + Sync) to enable parallel assembly.
pub trait Element: Send + Sync {
    /// Number of nodes in this element.
    fn n_nodes(&self) -> usize;

    /// Degrees of freedom per node (2 for plane elements, 3 for solids).
    fn dofs_per_node(&self) -> usize;

    /// Total degrees of freedom for this element.
    fn n_dofs(&self) -> usize {
        self.n_nodes() * self.dofs_per_node()
    }

    /// Compute the element stiffness matrix.
    ///
    /// # Arguments
    ///
    /// * `coords` - Nodal coordinates in element order
    /// * `material` - Material properties
    /// * `strain_estimate` - Current compressive strain magnitude; selects
    ///   the tangent modulus for nonlinear materials (E when `None`)
    ///
    /// # Errors
    ///
    /// Returns [`Error::MeshingDefect`](crate::Error::MeshingDefect) when
    /// det J ≤ 0 at any quadrature point.
    fn stiffness(
        &self,
        coords: &[Point3],
        material: &Material,
        strain_estimate: Option<f64>,
    ) -> Result<DMatrix<f64>>;

    /// Strain at the element centroid (natural origin).
    ///
    /// Plane elements report `[ε_xx, ε_yy, 0, γ_xy, 0, 0]`.
    fn centroid_strain(&self, coords: &[Point3], displacements: &[f64]) -> Result<StrainTensor>;

    /// Element area × thickness (2D) or volume (3D).
    fn volume(&self, coords: &[Point3]) -> Result<f64>;
}

/// Cross-section settings shared by every element of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Plane stress or plane strain (ignored by solid elements).
    pub analysis: AnalysisType,
    /// Out-of-plane thickness for plane elements.
    pub thickness: f64,
}

impl Default for Section {
    fn default() -> Self {
        Self {
            analysis: AnalysisType::PlaneStress,
            thickness: 1.0,
        }
    }
}

/// Build the kernel for an element type.
pub fn create_element(element_type: ElementType, section: Section) -> Box<dyn Element> {
    match element_type {
        ElementType::Quad4 => Box::new(Quad4::new(section.analysis, section.thickness)),
        ElementType::Hex8 => Box::new(Hex8::new()),
    }
}
