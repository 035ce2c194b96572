//! Parallel finite element assembly.
//!
//! Element stiffness matrices are computed in parallel using Rayon and then
//! scattered into a dense global matrix in element order, so the summation
//! order (and therefore the result) never depends on thread scheduling.
//!
//! Global DOF numbering is `node * dofs_per_node + component`.

use crate::element::{create_element, Section};
use crate::error::{Error, Result};
use crate::mesh::Mesh;
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use tracing::{debug, info};

/// Point force on a node, one optional component per axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodalLoad {
    pub node: usize,
    pub force: [Option<f64>; 3],
}

impl NodalLoad {
    /// A load with no components set.
    pub fn new(node: usize) -> Self {
        Self {
            node,
            force: [None; 3],
        }
    }

    /// Set the component along `axis` (0 = x, 1 = y, 2 = z).
    pub fn with(mut self, axis: usize, value: f64) -> Self {
        if let Some(slot) = self.force.get_mut(axis) {
            *slot = Some(value);
        }
        self
    }

    /// Vertical (y) force only.
    pub fn vertical(node: usize, fy: f64) -> Self {
        Self::new(node).with(1, fy)
    }
}

/// Prescribed displacement on a node, one optional component per axis.
///
/// Components left as `None` are free unless the mesh fixes them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplacementBc {
    pub node: usize,
    pub value: [Option<f64>; 3],
}

impl DisplacementBc {
    pub fn new(node: usize) -> Self {
        Self {
            node,
            value: [None; 3],
        }
    }

    /// Prescribe the component along `axis` (0 = x, 1 = y, 2 = z).
    pub fn with(mut self, axis: usize, value: f64) -> Self {
        if let Some(slot) = self.value.get_mut(axis) {
            *slot = Some(value);
        }
        self
    }

    /// Prescribed vertical (y) displacement only.
    pub fn vertical(node: usize, uy: f64) -> Self {
        Self::new(node).with(1, uy)
    }
}

/// Assembled global stiffness, before boundary conditions.
#[derive(Debug, Clone)]
pub struct GlobalSystem {
    /// Dense `n_dofs × n_dofs` stiffness matrix.
    pub stiffness: DMatrix<f64>,
    pub n_dofs: usize,
    pub dofs_per_node: usize,
}

/// Assemble the global stiffness matrix.
///
/// # Arguments
///
/// * `mesh` - Finite element mesh (all elements of one dimension)
/// * `section` - Plane-element settings
/// * `strain_estimates` - Optional per-element compressive strain magnitude
///   used to evaluate tangent moduli of nonlinear materials
///
/// # Errors
///
/// Returns [`Error::Configuration`] for an empty mesh or a mismatched
/// estimate slice, and propagates element errors such as
/// [`Error::MeshingDefect`].
pub fn assemble(
    mesh: &Mesh,
    section: Section,
    strain_estimates: Option<&[f64]>,
) -> Result<GlobalSystem> {
    let dofs_per_node = mesh
        .dofs_per_node()
        .ok_or_else(|| Error::Configuration("Cannot assemble a mesh with no elements".into()))?;
    if let Some(estimates) = strain_estimates {
        if estimates.len() != mesh.n_elements() {
            return Err(Error::Configuration(format!(
                "Expected {} strain estimates, got {}",
                mesh.n_elements(),
                estimates.len()
            )));
        }
    }

    let n_dofs = mesh.n_nodes() * dofs_per_node;

    let contributions: Vec<(Vec<usize>, DMatrix<f64>)> = mesh
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
            let dofs = mesh
                .element_dofs(conn.id)
                .ok_or_else(|| Error::Configuration(format!("Unknown element {}", conn.id)))?;

            let estimate = strain_estimates.map(|e| e[conn.id]);
            let ke = element.stiffness(&coords, material, estimate)?;
            Ok((dofs, ke))
        })
        .collect::<Result<_>>()?;

    let mut stiffness = DMatrix::zeros(n_dofs, n_dofs);
    for (dofs, ke) in &contributions {
        for (a, &ga) in dofs.iter().enumerate() {
            for (b, &gb) in dofs.iter().enumerate() {
                stiffness[(ga, gb)] += ke[(a, b)];
            }
        }
    }

    info!(
        n_dofs,
        elements = mesh.n_elements(),
        tangent = strain_estimates.is_some(),
        "assembled global stiffness"
    );

    Ok(GlobalSystem {
        stiffness,
        n_dofs,
        dofs_per_node,
    })
}

/// Scatter nodal loads into a global force vector.
///
/// Loads on the same node accumulate. A component along an axis the mesh
/// does not have (z in 2D) is rejected.
pub fn assemble_loads(mesh: &Mesh, loads: &[NodalLoad]) -> Result<DVector<f64>> {
    let dofs_per_node = mesh
        .dofs_per_node()
        .ok_or_else(|| Error::Configuration("Cannot load a mesh with no elements".into()))?;
    let mut rhs = DVector::zeros(mesh.n_nodes() * dofs_per_node);

    for load in loads {
        if load.node >= mesh.n_nodes() {
            return Err(Error::Configuration(format!(
                "Load references node {} but mesh has {} nodes",
                load.node,
                mesh.n_nodes()
            )));
        }
        for (axis, value) in load.force.iter().enumerate() {
            let Some(value) = value else { continue };
            if axis >= dofs_per_node {
                return Err(Error::Configuration(format!(
                    "Load on node {} has a component on axis {} in a {}D mesh",
                    load.node, axis, dofs_per_node
                )));
            }
            rhs[load.node * dofs_per_node + axis] += value;
        }
    }

    Ok(rhs)
}

/// Equivalent nodal loads for a uniform pressure on the top edge of a 2D mesh.
///
/// Each element edge lying on the top boundary passes half of
/// `pressure × length × thickness` to each of its end nodes. Negative
/// pressure is compression (acting in -y).
pub fn top_edge_pressure(mesh: &Mesh, pressure: f64, thickness: f64) -> Result<Vec<NodalLoad>> {
    require_dimension(mesh, 2)?;
    if !(thickness > 0.0) {
        return Err(Error::Configuration(format!(
            "Thickness must be positive, got {}",
            thickness
        )));
    }
    let edge_area = |nodes: &[usize]| {
        let length = (mesh.nodes()[nodes[0]].coords - mesh.nodes()[nodes[1]].coords).norm();
        length * thickness
    };
    let tributary = top_face_tributaries(mesh, edge_area, 2)?;
    Ok(to_loads(tributary, pressure))
}

/// Equivalent nodal loads for a uniform pressure on the top face of a 3D mesh.
///
/// Each element face lying on the top boundary passes a quarter of
/// `pressure × area` to each of its corner nodes.
pub fn top_face_pressure(mesh: &Mesh, pressure: f64) -> Result<Vec<NodalLoad>> {
    require_dimension(mesh, 3)?;
    let tributary = top_face_tributaries(mesh, |nodes| face_area(mesh, nodes), 4)?;
    Ok(to_loads(tributary, pressure))
}

fn require_dimension(mesh: &Mesh, dim: usize) -> Result<()> {
    match mesh.dimension() {
        Some(d) if d == dim => Ok(()),
        Some(d) => Err(Error::Configuration(format!(
            "Expected a {}D mesh, got {}D",
            dim, d
        ))),
        None => Err(Error::Configuration("Mesh has no elements".into())),
    }
}

/// Split each boundary facet measure evenly among its nodes.
fn top_face_tributaries<F>(
    mesh: &Mesh,
    measure: F,
    nodes_per_facet: usize,
) -> Result<BTreeMap<usize, f64>>
where
    F: Fn(&[usize]) -> f64,
{
    let top = mesh.top_nodes();
    let mut tributary = BTreeMap::new();

    for elem in mesh.elements() {
        let facet: Vec<usize> = elem
            .nodes
            .iter()
            .copied()
            .filter(|n| top.binary_search(n).is_ok())
            .collect();
        if facet.len() != nodes_per_facet {
            continue;
        }
        let share = measure(&facet) / nodes_per_facet as f64;
        for node in facet {
            *tributary.entry(node).or_insert(0.0) += share;
        }
    }

    if tributary.is_empty() {
        return Err(Error::Configuration(
            "No element facet lies on the top boundary".into(),
        ));
    }
    debug!(nodes = tributary.len(), "computed top-boundary tributaries");
    Ok(tributary)
}

/// Area of a planar quadrilateral facet in the x-z plane.
fn face_area(mesh: &Mesh, nodes: &[usize]) -> f64 {
    let pts: Vec<(f64, f64)> = nodes
        .iter()
        .map(|&n| {
            let c = &mesh.nodes()[n].coords;
            (c[0], c[2])
        })
        .collect();
    let cx = pts.iter().map(|p| p.0).sum::<f64>() / pts.len() as f64;
    let cz = pts.iter().map(|p| p.1).sum::<f64>() / pts.len() as f64;

    // Element order need not walk the facet boundary
    let mut ordered = pts.clone();
    ordered.sort_by(|a, b| {
        let ta = (a.1 - cz).atan2(a.0 - cx).rem_euclid(2.0 * PI);
        let tb = (b.1 - cz).atan2(b.0 - cx).rem_euclid(2.0 * PI);
        ta.total_cmp(&tb)
    });

    let mut twice_area = 0.0;
    for i in 0..ordered.len() {
        let (x0, z0) = ordered[i];
        let (x1, z1) = ordered[(i + 1) % ordered.len()];
        twice_area += x0 * z1 - x1 * z0;
    }
    0.5 * twice_area.abs()
}

fn to_loads(tributary: BTreeMap<usize, f64>, pressure: f64) -> Vec<NodalLoad> {
    tributary
        .into_iter()
        .map(|(node, measure)| NodalLoad::vertical(node, pressure * measure))
        .collect()
}
