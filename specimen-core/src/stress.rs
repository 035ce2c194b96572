//! Stress recovery from the displacement solution.
//!
//! The recovery pipeline, per element:
//! 1. Gather element nodal displacements from the global solution
//! 2. Strain at the centroid: ε = B(0) u_e
//! 3. Stress from the material law (below)
//! 4. Principal stresses and von Mises
//!
//! Stress is sampled once per element at the centroid, never at Gauss
//! points, so each element gets a single colour in the visualisation.
//!
//! # Nonlinear Materials
//!
//! The normal strain with the largest magnitude is mapped through the
//! uniaxial law by magnitude and gets its sign back. The remaining
//! components come from D(E_t) ε with E_t the tangent modulus at that
//! magnitude.

use crate::element::{create_element, Element, Section};
use crate::error::{Error, Result};
use crate::material::{AnalysisType, Material};
use crate::mesh::Mesh;
use crate::solver::SolveStats;
use crate::types::{Point3, StrainTensor, StressTensor, Vec3};
use nalgebra::{Vector3, Vector6};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Recovered state of one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementResult {
    pub element_id: usize,
    /// Centroid strain.
    pub strain: StrainTensor,
    /// Centroid stress.
    pub stress: StressTensor,
    /// Principal stresses, σ1 ≥ σ2 ≥ σ3.
    pub principal: [f64; 3],
    pub von_mises: f64,
}

impl ElementResult {
    /// Principal stress with the largest magnitude.
    pub fn max_abs_principal(&self) -> f64 {
        self.principal.iter().fold(0.0_f64, |m, s| m.max(s.abs()))
    }
}

/// Result of one solve, index-aligned with the mesh nodes and elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FemResult {
    /// Nodal displacement vectors (z = 0 in 2D).
    pub displacements: Vec<Vec3>,
    pub elements: Vec<ElementResult>,
    /// Largest nodal displacement magnitude.
    pub max_displacement: f64,
    /// Largest principal stress magnitude.
    pub max_stress: f64,
    pub max_von_mises: f64,
    pub converged: bool,
    pub iterations: usize,
    pub residual: f64,
}

impl FemResult {
    pub fn element(&self, elem_id: usize) -> Option<&ElementResult> {
        self.elements.get(elem_id)
    }

    /// Von Mises stress per element, for colour mapping.
    pub fn von_mises_field(&self) -> Vec<f64> {
        self.elements.iter().map(|e| e.von_mises).collect()
    }

    /// Dominant normal strain magnitude per element.
    pub fn dominant_strains(&self) -> Vec<f64> {
        self.elements
            .iter()
            .map(|e| e.strain.dominant_normal().1.abs())
            .collect()
    }
}

/// Stress at a material point from its strain.
///
/// `dimension` selects the 2D (3×3 D matrix, `analysis` applies) or 3D path.
pub fn stress_from_strain(
    strain: &StrainTensor,
    material: &Material,
    analysis: AnalysisType,
    dimension: usize,
) -> StressTensor {
    let e = &strain.0;
    let dominant = material.is_nonlinear().then(|| strain.dominant_normal());
    let modulus = match dominant {
        Some((_, value)) => material.tangent_modulus(value.abs()),
        None => material.youngs_modulus,
    };

    let mut sigma = if dimension == 2 {
        let d = material.constitutive_2d_with(analysis, modulus);
        let s = d * Vector3::new(e[0], e[1], e[3]);
        Vector6::new(s[0], s[1], 0.0, s[2], 0.0, 0.0)
    } else {
        material.constitutive_3d_with(modulus) * e
    };

    if let Some((axis, value)) = dominant {
        sigma[axis] = value.signum() * material.uniaxial_stress(value.abs());
    }
    if dimension == 2 && analysis == AnalysisType::PlaneStrain {
        sigma[2] = material.poissons_ratio * (sigma[0] + sigma[1]);
    }

    StressTensor(sigma)
}

/// Recover strain, stress, principal stresses and von Mises for one element.
pub fn recover_element_result(
    element_id: usize,
    element: &dyn Element,
    coords: &[Point3],
    displacements: &[f64],
    material: &Material,
    section: Section,
) -> Result<ElementResult> {
    let strain = element.centroid_strain(coords, displacements)?;
    let dimension = element.dofs_per_node();
    let stress = stress_from_strain(&strain, material, section.analysis, dimension);
    let principal = if dimension == 2 {
        stress.principal_2d()
    } else {
        stress.principal_3d()
    };

    Ok(ElementResult {
        element_id,
        strain,
        stress,
        principal,
        von_mises: stress.von_mises(),
    })
}

/// Recover every element result and the aggregate maxima.
///
/// # Arguments
///
/// * `mesh` - The solved mesh
/// * `section` - Plane-element settings used for the solve
/// * `displacements` - Global displacement vector (length = n_dofs)
/// * `stats` - Statistics of the solve that produced `displacements`
pub fn recover_results(
    mesh: &Mesh,
    section: Section,
    displacements: &[f64],
    stats: SolveStats,
) -> Result<FemResult> {
    let dim = mesh
        .dofs_per_node()
        .ok_or_else(|| Error::Configuration("Mesh has no elements".into()))?;
    if displacements.len() != mesh.n_nodes() * dim {
        return Err(Error::Configuration(format!(
            "Displacement vector has length {}, expected {}",
            displacements.len(),
            mesh.n_nodes() * dim
        )));
    }

    let nodal: Vec<Vec3> = displacements
        .chunks_exact(dim)
        .map(|u| Vec3::new(u[0], u[1], if dim == 3 { u[2] } else { 0.0 }))
        .collect();

    let elements = mesh
        .elements()
        .par_iter()
        .map(|conn| {
            let element = create_element(conn.element_type, section);
            let coords = mesh
                .element_coords(conn.id)
                .ok_or_else(|| Error::Configuration(format!("Unknown element {}", conn.id)))?;
            let material = mesh.element_material(conn.id).ok_or_else(|| {
                Error::Configuration(format!("Element {} has no material", conn.id))
            })?;
            let u_e: Vec<f64> = conn
                .nodes
                .iter()
                .flat_map(|&n| displacements[n * dim..(n + 1) * dim].iter().copied())
                .collect();
            recover_element_result(conn.id, element.as_ref(), &coords, &u_e, material, section)
        })
        .collect::<Result<Vec<_>>>()?;

    let max_displacement = nodal.iter().fold(0.0_f64, |m, u| m.max(u.norm()));
    let max_stress = elements
        .iter()
        .fold(0.0_f64, |m, e| m.max(e.max_abs_principal()));
    let max_von_mises = elements.iter().fold(0.0_f64, |m, e| m.max(e.von_mises));

    info!(
        max_displacement,
        max_stress,
        max_von_mises,
        converged = stats.converged,
        "recovered element results"
    );

    Ok(FemResult {
        displacements: nodal,
        elements,
        max_displacement,
        max_stress,
        max_von_mises,
        converged: stats.converged,
        iterations: stats.iterations,
        residual: stats.residual,
    })
}
