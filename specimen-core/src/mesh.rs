//! Mesh data structure for specimen analysis.
//!
//! Stores nodes (with per-axis fixed flags), element connectivity and the
//! materials elements refer to by id. Node ids are dense and equal to their
//! index, so every lookup is a direct array access.
//!
//! # Submodules
//!
//! - [`generator`] - Regular quad/hex grids and boundary-flag appliers

use crate::error::{Error, Result};
use crate::material::Material;
use crate::types::Point3;
use serde::{Deserialize, Serialize};

pub mod generator;

pub use generator::{
    apply_bottom_fixed, apply_compression_bc, generate_cuboid_mesh,
    generate_cuboid_mesh_with_material, generate_rectangular_mesh,
};

/// Relative tolerance for locating boundary nodes by coordinate.
const BOUNDARY_TOLERANCE: f64 = 1e-9;

/// A mesh node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Dense id, equal to the node's index in the mesh.
    pub id: usize,
    /// Coordinates (z = 0 for 2D meshes).
    pub coords: Point3,
    /// Fixed flags for the x, y and z displacement components.
    pub fixed: [bool; 3],
}

impl Node {
    /// Whether any component is fixed.
    pub fn is_constrained(&self) -> bool {
        self.fixed.iter().any(|&f| f)
    }
}

/// Element connectivity - node indices for an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementConnectivity {
    /// Dense id, equal to the element's index in the mesh.
    pub id: usize,
    /// Element type identifier.
    pub element_type: ElementType,
    /// Node indices (0-based).
    pub nodes: Vec<usize>,
    /// Index into the mesh materials.
    pub material: usize,
}

/// Supported element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    /// 4-node quadrilateral (plane stress/strain).
    Quad4,
    /// 8-node hexahedron (linear).
    Hex8,
}

impl ElementType {
    /// Number of nodes for this element type.
    pub fn n_nodes(self) -> usize {
        match self {
            ElementType::Quad4 => 4,
            ElementType::Hex8 => 8,
        }
    }

    /// Spatial dimension (2D or 3D).
    pub fn dimension(self) -> usize {
        match self {
            ElementType::Quad4 => 2,
            ElementType::Hex8 => 3,
        }
    }

    /// Displacement DOFs per node.
    pub fn dofs_per_node(self) -> usize {
        self.dimension()
    }
}

/// Finite element mesh.
///
/// Deserialisation rebuilds the mesh through [`Mesh::add_node`],
/// [`Mesh::add_material`] and [`Mesh::add_element`], so a serialised mesh
/// passes the same checks as one built in code.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "RawMesh")]
pub struct Mesh {
    nodes: Vec<Node>,
    elements: Vec<ElementConnectivity>,
    materials: Vec<Material>,
}

/// Unchecked wire form of [`Mesh`].
#[derive(Deserialize)]
struct RawMesh {
    nodes: Vec<Node>,
    elements: Vec<ElementConnectivity>,
    materials: Vec<Material>,
}

impl TryFrom<RawMesh> for Mesh {
    type Error = Error;

    fn try_from(raw: RawMesh) -> Result<Self> {
        let mut mesh = Mesh::with_capacity(raw.nodes.len(), raw.elements.len());

        for (idx, node) in raw.nodes.iter().enumerate() {
            if node.id != idx {
                return Err(Error::Configuration(format!(
                    "Node at position {} has id {}",
                    idx, node.id
                )));
            }
            if node.coords.iter().any(|c| !c.is_finite()) {
                return Err(Error::Configuration(format!(
                    "Node {} has non-finite coordinates",
                    idx
                )));
            }
            mesh.add_node(node.coords);
        }
        for material in raw.materials {
            mesh.add_material(material)?;
        }
        for (idx, elem) in raw.elements.into_iter().enumerate() {
            if elem.id != idx {
                return Err(Error::Configuration(format!(
                    "Element at position {} has id {}",
                    idx, elem.id
                )));
            }
            mesh.add_element(elem.element_type, elem.nodes, elem.material)?;
        }
        for node in &raw.nodes {
            for axis in (0..3).filter(|&axis| node.fixed[axis]) {
                mesh.fix_dof(node.id, axis)?;
            }
        }
        Ok(mesh)
    }
}

impl Mesh {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mesh with pre-allocated capacity.
    pub fn with_capacity(n_nodes: usize, n_elements: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(n_nodes),
            elements: Vec::with_capacity(n_elements),
            materials: Vec::new(),
        }
    }

    /// Add a free node to the mesh, returning its id.
    pub fn add_node(&mut self, coords: Point3) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node {
            id,
            coords,
            fixed: [false; 3],
        });
        id
    }

    /// Add a material, returning its id.
    ///
    /// # Errors
    ///
    /// Returns error if the material fails validation.
    pub fn add_material(&mut self, material: Material) -> Result<usize> {
        material.validate()?;
        let id = self.materials.len();
        self.materials.push(material);
        Ok(id)
    }

    /// Add an element to the mesh, returning its id.
    ///
    /// All elements of a mesh must share one spatial dimension.
    pub fn add_element(
        &mut self,
        element_type: ElementType,
        nodes: Vec<usize>,
        material: usize,
    ) -> Result<usize> {
        if nodes.len() != element_type.n_nodes() {
            return Err(Error::Configuration(format!(
                "Element type {:?} requires {} nodes, got {}",
                element_type,
                element_type.n_nodes(),
                nodes.len()
            )));
        }

        for &node_idx in &nodes {
            if node_idx >= self.nodes.len() {
                return Err(Error::Configuration(format!(
                    "Node index {} out of bounds (mesh has {} nodes)",
                    node_idx,
                    self.nodes.len()
                )));
            }
        }

        for (i, a) in nodes.iter().enumerate() {
            if nodes[i + 1..].contains(a) {
                return Err(Error::Configuration(format!(
                    "Element repeats node {}",
                    a
                )));
            }
        }

        if material >= self.materials.len() {
            return Err(Error::Configuration(format!(
                "Material index {} out of bounds (mesh has {} materials)",
                material,
                self.materials.len()
            )));
        }

        if let Some(dim) = self.dimension() {
            if dim != element_type.dimension() {
                return Err(Error::Configuration(format!(
                    "Cannot mix {}D and {}D elements in one mesh",
                    dim,
                    element_type.dimension()
                )));
            }
        }

        let id = self.elements.len();
        self.elements.push(ElementConnectivity {
            id,
            element_type,
            nodes,
            material,
        });
        Ok(id)
    }

    /// Number of nodes in the mesh.
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of elements in the mesh.
    pub fn n_elements(&self) -> usize {
        self.elements.len()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, idx: usize) -> Option<&Node> {
        self.nodes.get(idx)
    }

    pub fn elements(&self) -> &[ElementConnectivity] {
        &self.elements
    }

    pub fn element(&self, idx: usize) -> Option<&ElementConnectivity> {
        self.elements.get(idx)
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn material(&self, idx: usize) -> Option<&Material> {
        self.materials.get(idx)
    }

    /// Material of an element.
    pub fn element_material(&self, elem_idx: usize) -> Option<&Material> {
        let elem = self.elements.get(elem_idx)?;
        self.materials.get(elem.material)
    }

    /// Get coordinates for an element's nodes.
    pub fn element_coords(&self, elem_idx: usize) -> Option<Vec<Point3>> {
        let elem = self.elements.get(elem_idx)?;
        elem.nodes
            .iter()
            .map(|&i| self.nodes.get(i).map(|n| n.coords))
            .collect()
    }

    /// Spatial dimension of the elements, `None` for a mesh without elements.
    pub fn dimension(&self) -> Option<usize> {
        self.elements.first().map(|e| e.element_type.dimension())
    }

    /// Displacement DOFs per node, `None` for a mesh without elements.
    pub fn dofs_per_node(&self) -> Option<usize> {
        self.elements.first().map(|e| e.element_type.dofs_per_node())
    }

    /// Total number of displacement DOFs.
    pub fn n_dofs(&self) -> usize {
        self.n_nodes() * self.dofs_per_node().unwrap_or(0)
    }

    /// Global DOF indices of an element, node by node.
    pub fn element_dofs(&self, elem_idx: usize) -> Option<Vec<usize>> {
        let elem = self.elements.get(elem_idx)?;
        let dofs_per_node = elem.element_type.dofs_per_node();
        Some(
            elem.nodes
                .iter()
                .flat_map(|&node| (0..dofs_per_node).map(move |d| node * dofs_per_node + d))
                .collect(),
        )
    }

    /// Fix one displacement component of a node.
    pub fn fix_dof(&mut self, node: usize, axis: usize) -> Result<()> {
        let n_nodes = self.nodes.len();
        let dim = self.dimension().unwrap_or(3);
        if axis >= dim {
            return Err(Error::Configuration(format!(
                "Axis {} out of range for a {}D mesh",
                axis, dim
            )));
        }
        let node = self.nodes.get_mut(node).ok_or_else(|| {
            Error::Configuration(format!(
                "Node index {} out of bounds (mesh has {} nodes)",
                node, n_nodes
            ))
        })?;
        node.fixed[axis] = true;
        Ok(())
    }

    /// Clear every fixed flag.
    pub fn release_all(&mut self) {
        for node in &mut self.nodes {
            node.fixed = [false; 3];
        }
    }

    /// Global indices of all fixed DOFs, ascending.
    pub fn fixed_dofs(&self) -> Vec<usize> {
        let Some(dofs_per_node) = self.dofs_per_node() else {
            return Vec::new();
        };
        self.nodes
            .iter()
            .flat_map(|node| {
                (0..dofs_per_node)
                    .filter(move |&axis| node.fixed[axis])
                    .map(move |axis| node.id * dofs_per_node + axis)
            })
            .collect()
    }

    /// Ids of the nodes on the lowest vertical (y) coordinate.
    pub fn bottom_nodes(&self) -> Vec<usize> {
        match self.bounds() {
            Some((min, max)) => self.nodes_at(1, min[1], max[1] - min[1]),
            None => Vec::new(),
        }
    }

    /// Ids of the nodes on the highest vertical (y) coordinate.
    pub fn top_nodes(&self) -> Vec<usize> {
        match self.bounds() {
            Some((min, max)) => self.nodes_at(1, max[1], max[1] - min[1]),
            None => Vec::new(),
        }
    }

    fn nodes_at(&self, axis: usize, value: f64, span: f64) -> Vec<usize> {
        let tol = BOUNDARY_TOLERANCE * span.abs().max(1.0);
        self.nodes
            .iter()
            .filter(|n| (n.coords[axis] - value).abs() <= tol)
            .map(|n| n.id)
            .collect()
    }

    /// Compute mesh bounding box.
    pub fn bounds(&self) -> Option<(Point3, Point3)> {
        let first = self.nodes.first()?;

        let mut min = first.coords;
        let mut max = first.coords;

        for node in &self.nodes[1..] {
            for i in 0..3 {
                min[i] = min[i].min(node.coords[i]);
                max[i] = max[i].max(node.coords[i]);
            }
        }

        Some((min, max))
    }
}
