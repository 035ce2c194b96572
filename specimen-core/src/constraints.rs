//! Penalty enforcement of fixed and prescribed displacements.
//!
//! A constrained DOF `i` with prescribed value `ū` gets
//! ```text
//! K_ii += α,   f_i = α ū
//! ```
//! where `α = max|K_ii| × 1e12`, clamped to `[1e15, 1e20]`. The matrix keeps
//! its size and symmetry, so both the LU and the CG solver apply unchanged.

use crate::assembly::{DisplacementBc, GlobalSystem};
use crate::error::{Error, Result};
use crate::mesh::Mesh;
use nalgebra::{DMatrix, DVector};
use std::collections::BTreeMap;
use tracing::debug;

/// Penalty relative to the largest diagonal stiffness.
pub const PENALTY_SCALE: f64 = 1e12;
pub const MIN_PENALTY: f64 = 1e15;
pub const MAX_PENALTY: f64 = 1e20;

/// A constrained global DOF and its prescribed value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constraint {
    pub dof: usize,
    pub value: f64,
}

/// Penalty magnitude for a stiffness matrix.
pub fn penalty_value(matrix: &DMatrix<f64>) -> f64 {
    let max_diag = matrix.diagonal().iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    (max_diag * PENALTY_SCALE).clamp(MIN_PENALTY, MAX_PENALTY)
}

/// Merge the mesh fixed flags (value 0) with transient prescribed
/// displacements. A prescribed value overrides a fixed flag on the same DOF.
///
/// Constraints are returned sorted by DOF.
pub fn collect_constraints(mesh: &Mesh, bcs: &[DisplacementBc]) -> Result<Vec<Constraint>> {
    let dofs_per_node = mesh
        .dofs_per_node()
        .ok_or_else(|| Error::Configuration("Mesh has no elements".into()))?;

    let mut merged: BTreeMap<usize, f64> =
        mesh.fixed_dofs().into_iter().map(|dof| (dof, 0.0)).collect();

    for bc in bcs {
        if bc.node >= mesh.n_nodes() {
            return Err(Error::Configuration(format!(
                "Displacement BC references node {} but mesh has {} nodes",
                bc.node,
                mesh.n_nodes()
            )));
        }
        for (axis, value) in bc.value.iter().enumerate() {
            let Some(value) = *value else { continue };
            if axis >= dofs_per_node {
                return Err(Error::Configuration(format!(
                    "Displacement BC on node {} sets axis {} in a {}D mesh",
                    bc.node, axis, dofs_per_node
                )));
            }
            if !value.is_finite() {
                return Err(Error::Configuration(format!(
                    "Prescribed displacement on node {} is not finite",
                    bc.node
                )));
            }
            merged.insert(bc.node * dofs_per_node + axis, value);
        }
    }

    Ok(merged
        .into_iter()
        .map(|(dof, value)| Constraint { dof, value })
        .collect())
}

/// Add the penalty to every constrained diagonal and set the matching load
/// entries. Returns the penalty used.
pub fn apply_penalty(
    system: &mut GlobalSystem,
    rhs: &mut DVector<f64>,
    constraints: &[Constraint],
) -> Result<f64> {
    let penalty = penalise_matrix(&mut system.stiffness, constraints)?;
    penalise_rhs(rhs, constraints, penalty)?;
    Ok(penalty)
}

/// Matrix half of [`apply_penalty`]; the result can be reused across load sets.
pub fn penalise_matrix(matrix: &mut DMatrix<f64>, constraints: &[Constraint]) -> Result<f64> {
    let n = matrix.nrows();
    check_range(constraints, n)?;

    let penalty = penalty_value(matrix);
    for c in constraints {
        matrix[(c.dof, c.dof)] += penalty;
    }
    debug!(penalty, constrained = constraints.len(), "applied penalty constraints");
    Ok(penalty)
}

/// Right-hand-side half of [`apply_penalty`]: `f_i = α ū_i`.
pub fn penalise_rhs(rhs: &mut DVector<f64>, constraints: &[Constraint], penalty: f64) -> Result<()> {
    check_range(constraints, rhs.len())?;
    for c in constraints {
        rhs[c.dof] = penalty * c.value;
    }
    Ok(())
}

/// Start vector for an iterative solve: prescribed values on constrained
/// DOFs, zero elsewhere.
pub fn initial_guess(n_dofs: usize, constraints: &[Constraint]) -> Result<DVector<f64>> {
    check_range(constraints, n_dofs)?;
    let mut guess = DVector::zeros(n_dofs);
    for c in constraints {
        guess[c.dof] = c.value;
    }
    Ok(guess)
}

fn check_range(constraints: &[Constraint], n: usize) -> Result<()> {
    match constraints.iter().find(|c| c.dof >= n) {
        Some(c) => Err(Error::Configuration(format!(
            "Constraint on DOF {} outside system of size {}",
            c.dof, n
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::assemble;
    use crate::element::Section;
    use crate::material::Material;
    use crate::mesh::generate_rectangular_mesh;

    fn mesh() -> Mesh {
        generate_rectangular_mesh(1.0, 1.0, 1, 1, Material::new(30000.0, 0.2).unwrap()).unwrap()
    }

    #[test]
    fn test_penalty_clamped() {
        let small = DMatrix::from_diagonal_element(3, 3, 1.0);
        assert_eq!(penalty_value(&small), MIN_PENALTY);

        let large = DMatrix::from_diagonal_element(3, 3, 1e10);
        assert_eq!(penalty_value(&large), MAX_PENALTY);

        let mid = DMatrix::from_diagonal_element(3, 3, 5e4);
        assert_eq!(penalty_value(&mid), 5e4 * PENALTY_SCALE);
    }

    #[test]
    fn test_collect_merges_fixed_and_prescribed() {
        let mut mesh = mesh();
        mesh.fix_dof(0, 0).unwrap();
        mesh.fix_dof(0, 1).unwrap();
        mesh.fix_dof(1, 1).unwrap();

        let bcs = [DisplacementBc::vertical(1, -0.01), DisplacementBc::vertical(3, -0.02)];
        let constraints = collect_constraints(&mesh, &bcs).unwrap();
        assert_eq!(
            constraints,
            vec![
                Constraint { dof: 0, value: 0.0 },
                Constraint { dof: 1, value: 0.0 },
                Constraint { dof: 3, value: -0.01 },
                Constraint { dof: 7, value: -0.02 },
            ]
        );
    }

    #[test]
    fn test_collect_rejects_bad_bcs() {
        let mesh = mesh();
        assert!(collect_constraints(&mesh, &[DisplacementBc::vertical(4, 0.0)]).is_err());
        assert!(collect_constraints(&mesh, &[DisplacementBc::new(0).with(2, 0.0)]).is_err());
        assert!(collect_constraints(&mesh, &[DisplacementBc::vertical(0, f64::NAN)]).is_err());
    }

    #[test]
    fn test_apply_penalty() {
        let mesh = mesh();
        let mut system = assemble(&mesh, Section::default(), None).unwrap();
        let original = system.stiffness.clone();
        let mut rhs = DVector::from_element(8, 1.0);

        let constraints = [Constraint { dof: 2, value: 0.5 }];
        let penalty = apply_penalty(&mut system, &mut rhs, &constraints).unwrap();

        assert_eq!(penalty, penalty_value(&original));
        assert_eq!(system.stiffness[(2, 2)], original[(2, 2)] + penalty);
        assert_eq!(system.stiffness[(2, 3)], original[(2, 3)]);
        assert_eq!(rhs[2], 0.5 * penalty);
        assert_eq!(rhs[3], 1.0);
    }

    #[test]
    fn test_initial_guess_carries_prescribed_values() {
        let constraints = [
            Constraint { dof: 1, value: 0.0 },
            Constraint { dof: 3, value: -0.05 },
        ];
        let guess = initial_guess(5, &constraints).unwrap();
        assert_eq!(guess.as_slice(), &[0.0, 0.0, 0.0, -0.05, 0.0]);
        assert!(initial_guess(3, &constraints).is_err());
    }

    #[test]
    fn test_out_of_range_constraint() {
        let mut matrix = DMatrix::identity(2, 2);
        let constraints = [Constraint { dof: 5, value: 0.0 }];
        assert!(matches!(
            penalise_matrix(&mut matrix, &constraints),
            Err(Error::Configuration(_))
        ));
    }
}
