//! Regular grid generators and boundary-flag appliers.
//!
//! # Node Numbering
//!
//! 2D grids are row-major from the bottom-left corner:
//! ```text
//! id = j * (nx + 1) + i
//! ```
//! 3D grids add depth layers (y is vertical, z is depth):
//! ```text
//! id = (k * (ny + 1) + j) * (nx + 1) + i
//! ```
//!
//! # Element Ordering
//!
//! Quad4: `[bottom-left, bottom-right, top-right, top-left]`.
//!
//! Hex8: four bottom nodes followed by the four matching top nodes,
//! ```text
//! bottom: (i, j, k+1), (i+1, j, k+1), (i+1, j, k), (i, j, k)
//! top:    same with j + 1
//! ```
//! which maps (ξ, η, ζ) to (x, -z, y) and keeps det J > 0.

use crate::error::{Error, Result};
use crate::material::Material;
use crate::mesh::{ElementType, Mesh};
use crate::types::Point3;
use tracing::{debug, info};

fn check_dimension(name: &str, value: f64) -> Result<()> {
    if !(value > 0.0) || !value.is_finite() {
        return Err(Error::Configuration(format!(
            "{} must be positive and finite, got {}",
            name, value
        )));
    }
    Ok(())
}

fn check_divisions(name: &str, value: usize) -> Result<()> {
    if value < 1 {
        return Err(Error::Configuration(format!(
            "{} must be at least 1, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Generate a `nx × ny` grid of Quad4 elements over `[0, width] × [0, height]`.
///
/// Produces `(nx+1)(ny+1)` nodes and `nx·ny` elements sharing one material.
///
/// # Errors
///
/// Returns [`Error::Configuration`] for zero divisions or non-positive
/// dimensions, and [`Error::InvalidMaterial`] for an invalid material.
pub fn generate_rectangular_mesh(
    width: f64,
    height: f64,
    nx: usize,
    ny: usize,
    material: Material,
) -> Result<Mesh> {
    check_dimension("width", width)?;
    check_dimension("height", height)?;
    check_divisions("nx", nx)?;
    check_divisions("ny", ny)?;

    let mut mesh = Mesh::with_capacity((nx + 1) * (ny + 1), nx * ny);
    let mat = mesh.add_material(material)?;

    let dx = width / nx as f64;
    let dy = height / ny as f64;
    for j in 0..=ny {
        for i in 0..=nx {
            mesh.add_node(Point3::new(i as f64 * dx, j as f64 * dy, 0.0));
        }
    }

    let row = nx + 1;
    for j in 0..ny {
        for i in 0..nx {
            let bl = j * row + i;
            let br = bl + 1;
            let tr = br + row;
            let tl = bl + row;
            mesh.add_element(ElementType::Quad4, vec![bl, br, tr, tl], mat)?;
        }
    }

    info!(
        nodes = mesh.n_nodes(),
        elements = mesh.n_elements(),
        "generated {}x{} rectangular mesh",
        nx,
        ny
    );
    Ok(mesh)
}

/// Generate a `nx × ny × nz` grid of Hex8 elements over
/// `[0, width] × [0, height] × [0, depth]` with a linear elastic material.
pub fn generate_cuboid_mesh(
    width: f64,
    height: f64,
    depth: f64,
    nx: usize,
    ny: usize,
    nz: usize,
    youngs_modulus: f64,
    poissons_ratio: f64,
) -> Result<Mesh> {
    let material = Material::new(youngs_modulus, poissons_ratio)?;
    generate_cuboid_mesh_with_material(width, height, depth, nx, ny, nz, material)
}

/// [`generate_cuboid_mesh`] with an arbitrary (possibly nonlinear) material.
pub fn generate_cuboid_mesh_with_material(
    width: f64,
    height: f64,
    depth: f64,
    nx: usize,
    ny: usize,
    nz: usize,
    material: Material,
) -> Result<Mesh> {
    check_dimension("width", width)?;
    check_dimension("height", height)?;
    check_dimension("depth", depth)?;
    check_divisions("nx", nx)?;
    check_divisions("ny", ny)?;
    check_divisions("nz", nz)?;

    let mut mesh = Mesh::with_capacity((nx + 1) * (ny + 1) * (nz + 1), nx * ny * nz);
    let mat = mesh.add_material(material)?;

    let dx = width / nx as f64;
    let dy = height / ny as f64;
    let dz = depth / nz as f64;
    for k in 0..=nz {
        for j in 0..=ny {
            for i in 0..=nx {
                mesh.add_node(Point3::new(i as f64 * dx, j as f64 * dy, k as f64 * dz));
            }
        }
    }

    let id = |i: usize, j: usize, k: usize| (k * (ny + 1) + j) * (nx + 1) + i;
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let nodes = vec![
                    id(i, j, k + 1),
                    id(i + 1, j, k + 1),
                    id(i + 1, j, k),
                    id(i, j, k),
                    id(i, j + 1, k + 1),
                    id(i + 1, j + 1, k + 1),
                    id(i + 1, j + 1, k),
                    id(i, j + 1, k),
                ];
                mesh.add_element(ElementType::Hex8, nodes, mat)?;
            }
        }
    }

    info!(
        nodes = mesh.n_nodes(),
        elements = mesh.n_elements(),
        "generated {}x{}x{} cuboid mesh",
        nx,
        ny,
        nz
    );
    Ok(mesh)
}

fn require_elements(mesh: &Mesh) -> Result<usize> {
    mesh.dimension()
        .ok_or_else(|| Error::Configuration("Mesh has no elements".into()))
}

/// Node on the bottom face closest to `target` in the horizontal plane.
fn closest_bottom_node(mesh: &Mesh, bottom: &[usize], target: Point3) -> Option<usize> {
    bottom.iter().copied().min_by(|&a, &b| {
        let da = horizontal_distance(mesh, a, &target);
        let db = horizontal_distance(mesh, b, &target);
        da.total_cmp(&db).then(a.cmp(&b))
    })
}

fn horizontal_distance(mesh: &Mesh, node: usize, target: &Point3) -> f64 {
    let c = &mesh.nodes()[node].coords;
    (c[0] - target[0]).powi(2) + (c[2] - target[2]).powi(2)
}

/// Fix the vertical DOF of every bottom node and the horizontal DOF(s) of
/// the bottom mid-point only.
///
/// This removes rigid-body motion without restraining lateral expansion at
/// the base. In 3D the depth DOF of the bottom node on the `x = max` edge in
/// line with the centre is also fixed, which removes the rotation about the
/// vertical axis.
pub fn apply_bottom_fixed(mesh: &mut Mesh) -> Result<()> {
    let dim = require_elements(mesh)?;
    let bottom = mesh.bottom_nodes();
    let Some((min, max)) = mesh.bounds() else {
        return Err(Error::Configuration("Mesh has no nodes".into()));
    };

    for &node in &bottom {
        mesh.fix_dof(node, 1)?;
    }

    let centre = Point3::new(0.5 * (min[0] + max[0]), min[1], 0.5 * (min[2] + max[2]));
    let mid = closest_bottom_node(mesh, &bottom, centre)
        .ok_or_else(|| Error::Configuration("Mesh has no bottom nodes".into()))?;
    mesh.fix_dof(mid, 0)?;

    if dim == 3 {
        mesh.fix_dof(mid, 2)?;
        let edge = Point3::new(max[0], min[1], mesh.nodes()[mid].coords[2]);
        if let Some(edge_node) = closest_bottom_node(mesh, &bottom, edge) {
            mesh.fix_dof(edge_node, 2)?;
        }
    }

    debug!(bottom_nodes = bottom.len(), mid_node = mid, "applied bottom-fixed BC");
    Ok(())
}

/// Frictional-platen compression boundary conditions.
///
/// Every DOF of the bottom nodes is fixed; top nodes have only their
/// horizontal DOF(s) fixed so the vertical load can be applied there. The
/// end restraint produces the barrel-shaped stress field seen near the
/// platens in real compression tests.
pub fn apply_compression_bc(mesh: &mut Mesh) -> Result<()> {
    let dim = require_elements(mesh)?;
    let bottom = mesh.bottom_nodes();
    let top = mesh.top_nodes();

    for &node in &bottom {
        for axis in 0..dim {
            mesh.fix_dof(node, axis)?;
        }
    }
    for &node in &top {
        mesh.fix_dof(node, 0)?;
        if dim == 3 {
            mesh.fix_dof(node, 2)?;
        }
    }

    debug!(
        bottom_nodes = bottom.len(),
        top_nodes = top.len(),
        "applied compression platen BC"
    );
    Ok(())
}
