//! Analysis drivers.
//!
//! Each driver runs the full pipeline:
//! ```text
//! assemble → loads → constraints → penalty → solve → recover
//! ```
//!
//! - [`solve_2d`]: Quad4 meshes, dense LU. Nonlinear materials may be
//!   loaded incrementally with tangent re-assembly per step.
//! - [`solve_3d`]: Hex8 meshes, Jacobi-preconditioned CG.
//! - [`PrecomputedSolver3d`]: assembles and penalises a Hex8 model once so
//!   that an interactive load driver can re-solve many load sets cheaply.

use crate::assembly::{assemble, assemble_loads, DisplacementBc, NodalLoad};
use crate::constraints::{
    apply_penalty, collect_constraints, initial_guess, penalise_matrix, penalise_rhs, Constraint,
};
use crate::element::Section;
use crate::error::{Error, Result};
use crate::material::AnalysisType;
use crate::mesh::Mesh;
use crate::solver::{
    ConjugateGradient, GaussianElimination, LinearSolver, SolveStats, SolverConfig,
};
use crate::stress::{recover_results, FemResult};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Options for a 2D solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    pub analysis: AnalysisType,
    /// Out-of-plane thickness (mm).
    pub thickness: f64,
    /// Iterative solver settings; the 2D driver itself solves directly.
    pub solver: SolverConfig,
    /// Number of equal load increments for nonlinear materials.
    pub load_steps: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            analysis: AnalysisType::PlaneStress,
            thickness: 1.0,
            solver: SolverConfig::default(),
            load_steps: 1,
        }
    }
}

impl AnalysisOptions {
    pub fn section(&self) -> Section {
        Section {
            analysis: self.analysis,
            thickness: self.thickness,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.thickness > 0.0) || !self.thickness.is_finite() {
            return Err(Error::Configuration(format!(
                "Thickness must be positive, got {}",
                self.thickness
            )));
        }
        if self.load_steps == 0 {
            return Err(Error::Configuration("load_steps must be at least 1".into()));
        }
        self.solver.validate()
    }
}

fn require_dimension(mesh: &Mesh, dim: usize) -> Result<()> {
    match mesh.dimension() {
        Some(d) if d == dim => Ok(()),
        Some(d) => Err(Error::Configuration(format!(
            "Expected a {}D mesh, got a {}D mesh",
            dim, d
        ))),
        None => Err(Error::Configuration("Mesh has no elements".into())),
    }
}

/// Solve a 2D Quad4 model.
///
/// Linear materials (or `load_steps == 1`) take a single solve with E.
/// Otherwise the loads and prescribed displacements are applied in
/// `load_steps` equal increments; each increment re-assembles with tangent
/// moduli at the current element strains and the increments accumulate.
pub fn solve_2d(
    mesh: &Mesh,
    loads: &[NodalLoad],
    bcs: &[DisplacementBc],
    options: &AnalysisOptions,
) -> Result<FemResult> {
    options.validate()?;
    require_dimension(mesh, 2)?;

    let section = options.section();
    let nonlinear = mesh.materials().iter().any(|m| m.is_nonlinear());
    let steps = if nonlinear { options.load_steps } else { 1 };

    info!(
        nodes = mesh.n_nodes(),
        elements = mesh.n_elements(),
        analysis = ?options.analysis,
        steps,
        "starting 2D solve"
    );

    let loads_rhs = assemble_loads(mesh, loads)?;
    let constraints = collect_constraints(mesh, bcs)?;

    if steps == 1 {
        let mut system = assemble(mesh, section, None)?;
        let mut rhs = loads_rhs;
        apply_penalty(&mut system, &mut rhs, &constraints)?;
        let solution = GaussianElimination::new().solve(&system.stiffness, &rhs)?;
        return recover_results(mesh, section, solution.values.as_slice(), solution.stats());
    }

    let fraction = 1.0 / steps as f64;
    let step_rhs = loads_rhs * fraction;
    let step_constraints: Vec<Constraint> = constraints
        .iter()
        .map(|c| Constraint {
            dof: c.dof,
            value: c.value * fraction,
        })
        .collect();

    let mut total = DVector::zeros(mesh.n_dofs());
    let mut strains = vec![0.0; mesh.n_elements()];
    let mut stats = SolveStats::default();
    let mut result = None;

    for step in 1..=steps {
        let mut system = assemble(mesh, section, Some(strains.as_slice()))?;
        let mut rhs = step_rhs.clone();
        apply_penalty(&mut system, &mut rhs, &step_constraints)?;
        let solution = GaussianElimination::new().solve(&system.stiffness, &rhs)?;
        total += &solution.values;

        stats.converged &= solution.converged;
        stats.iterations += solution.iterations;
        stats.residual = stats.residual.max(solution.residual);

        let step_result = recover_results(mesh, section, total.as_slice(), stats)?;
        strains = step_result.dominant_strains();
        debug!(
            step,
            steps,
            max_displacement = step_result.max_displacement,
            max_von_mises = step_result.max_von_mises,
            "load increment solved"
        );
        result = Some(step_result);
    }

    result.ok_or_else(|| Error::Configuration("No load increments were run".into()))
}

/// Solve a 3D Hex8 model with the CG solver.
///
/// CG starts from the prescribed displacements, so its tolerance is
/// measured against the out-of-balance forces rather than the penalty
/// loads.
pub fn solve_3d(
    mesh: &Mesh,
    loads: &[NodalLoad],
    bcs: &[DisplacementBc],
    config: &SolverConfig,
) -> Result<FemResult> {
    config.validate()?;
    require_dimension(mesh, 3)?;

    info!(
        nodes = mesh.n_nodes(),
        elements = mesh.n_elements(),
        "starting 3D solve"
    );

    let section = Section::default();
    let mut system = assemble(mesh, section, None)?;
    let mut rhs = assemble_loads(mesh, loads)?;
    let constraints = collect_constraints(mesh, bcs)?;
    apply_penalty(&mut system, &mut rhs, &constraints)?;

    let guess = initial_guess(system.n_dofs, &constraints)?;
    let solution = ConjugateGradient::new(*config).solve_from(&system.stiffness, &rhs, &guess)?;
    recover_results(mesh, section, solution.values.as_slice(), solution.stats())
}

/// A 3D model assembled and penalised once, re-solvable for many load sets.
///
/// The constrained set is fixed at construction: it is exactly the DOFs
/// fixed on the mesh. Per-solve prescribed displacements may only target
/// those DOFs. Every solve starts CG from the prescribed values, so
/// identical inputs give identical results regardless of call history.
#[derive(Debug, Clone)]
pub struct PrecomputedSolver3d {
    mesh: Mesh,
    stiffness: DMatrix<f64>,
    penalty: f64,
    fixed: Vec<Constraint>,
    solver: ConjugateGradient,
}

impl PrecomputedSolver3d {
    /// Assemble and penalise `mesh` (a copy is kept for stress recovery).
    pub fn new(mesh: &Mesh, config: SolverConfig) -> Result<Self> {
        config.validate()?;
        require_dimension(mesh, 3)?;

        let mut system = assemble(mesh, Section::default(), None)?;
        let fixed = collect_constraints(mesh, &[])?;
        let penalty = penalise_matrix(&mut system.stiffness, &fixed)?;

        info!(
            n_dofs = system.n_dofs,
            constrained = fixed.len(),
            penalty,
            "precomputed 3D system"
        );

        Ok(Self {
            mesh: mesh.clone(),
            stiffness: system.stiffness,
            penalty,
            fixed,
            solver: ConjugateGradient::new(config),
        })
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn n_dofs(&self) -> usize {
        self.stiffness.nrows()
    }

    pub fn penalty(&self) -> f64 {
        self.penalty
    }

    /// Solve for a load set and prescribed displacements on fixed DOFs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a prescribed displacement targets
    /// a DOF that was not fixed when the solver was built.
    pub fn solve(&mut self, loads: &[NodalLoad], prescribed: &[DisplacementBc]) -> Result<FemResult> {
        let constraints = collect_constraints(&self.mesh, prescribed)?;
        if let Some(c) = constraints
            .iter()
            .find(|c| self.fixed.binary_search_by_key(&c.dof, |f| f.dof).is_err())
        {
            return Err(Error::Configuration(format!(
                "DOF {} was not fixed when the system was precomputed",
                c.dof
            )));
        }

        let mut rhs = assemble_loads(&self.mesh, loads)?;
        penalise_rhs(&mut rhs, &constraints, self.penalty)?;

        let guess = initial_guess(rhs.len(), &constraints)?;
        let solution = self.solver.solve_from(&self.stiffness, &rhs, &guess)?;
        recover_results(
            &self.mesh,
            Section::default(),
            solution.values.as_slice(),
            solution.stats(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::{top_edge_pressure, top_face_pressure};
    use crate::constitutive::ConstitutiveModel;
    use crate::material::Material;
    use crate::mesh::{
        apply_bottom_fixed, apply_compression_bc, generate_cuboid_mesh,
        generate_rectangular_mesh, ElementType,
    };
    use crate::types::Point3;
    use approx::assert_relative_eq;

    fn hognestad() -> Material {
        Material::new(30000.0, 0.2)
            .unwrap()
            .with_strength(30.0)
            .unwrap()
            .with_model(ConstitutiveModel::Hognestad)
    }

    /// 150 mm cube face, 10×10, bottom-fixed.
    fn specimen_2d(material: Material) -> Mesh {
        let mut mesh = generate_rectangular_mesh(150.0, 150.0, 10, 10, material).unwrap();
        apply_bottom_fixed(&mut mesh).unwrap();
        mesh
    }

    #[test]
    fn test_axial_bar_matches_fl_over_ae() {
        let (length, thickness, e, force) = (100.0, 10.0, 30000.0, 3000.0);
        let material = Material::new(e, 0.0).unwrap();
        let mut mesh = generate_rectangular_mesh(length, length, 1, 1, material).unwrap();
        for node in mesh.bottom_nodes() {
            mesh.fix_dof(node, 0).unwrap();
            mesh.fix_dof(node, 1).unwrap();
        }
        let loads: Vec<NodalLoad> = mesh
            .top_nodes()
            .into_iter()
            .map(|n| NodalLoad::vertical(n, -force / 2.0))
            .collect();
        let options = AnalysisOptions {
            thickness,
            ..AnalysisOptions::default()
        };

        let result = solve_2d(&mesh, &loads, &[], &options).unwrap();
        let expected = force * length / (length * thickness * e);
        for node in mesh.top_nodes() {
            assert_relative_eq!(
                -result.displacements[node][1],
                expected,
                max_relative = 1e-6
            );
        }
        assert!(result.converged);
    }

    #[test]
    fn test_end_to_end_compression_specimen() {
        let mesh = specimen_2d(hognestad());
        let loads = top_edge_pressure(&mesh, -30.0, 1.0).unwrap();
        let result = solve_2d(&mesh, &loads, &[], &AnalysisOptions::default()).unwrap();

        assert!(result.converged);
        assert!(result.max_displacement > 0.0);

        // Mid-height, mid-width element
        let mid = &result.elements[5 * 10 + 5];
        assert!(mid.stress.yy() < 0.0);
        assert!(result.max_von_mises > 3.0 && result.max_von_mises < 300.0);

        for node in mesh.nodes() {
            for axis in 0..2 {
                if node.fixed[axis] {
                    assert!(result.displacements[node.id][axis].abs() < 1e-6);
                }
            }
        }
    }

    #[test]
    fn test_solve_is_deterministic() {
        let mesh = specimen_2d(hognestad());
        let loads = top_edge_pressure(&mesh, -20.0, 1.0).unwrap();
        let options = AnalysisOptions {
            load_steps: 3,
            ..AnalysisOptions::default()
        };
        let a = solve_2d(&mesh, &loads, &[], &options).unwrap();
        let b = solve_2d(&mesh, &loads, &[], &options).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_incremental_tangent_softens_response() {
        let mesh = specimen_2d(hognestad());
        let loads = top_edge_pressure(&mesh, -25.0, 1.0).unwrap();
        let single = solve_2d(&mesh, &loads, &[], &AnalysisOptions::default()).unwrap();
        let stepped = solve_2d(
            &mesh,
            &loads,
            &[],
            &AnalysisOptions {
                load_steps: 5,
                ..AnalysisOptions::default()
            },
        )
        .unwrap();

        assert!(stepped.converged);
        assert_eq!(stepped.iterations, 5);
        assert!(stepped.max_displacement > single.max_displacement);
    }

    #[test]
    fn test_linear_material_ignores_load_steps() {
        let mesh = specimen_2d(Material::new(30000.0, 0.2).unwrap());
        let loads = top_edge_pressure(&mesh, -10.0, 1.0).unwrap();
        let single = solve_2d(&mesh, &loads, &[], &AnalysisOptions::default()).unwrap();
        let stepped = solve_2d(
            &mesh,
            &loads,
            &[],
            &AnalysisOptions {
                load_steps: 4,
                ..AnalysisOptions::default()
            },
        )
        .unwrap();
        assert_eq!(single, stepped);
    }

    #[test]
    fn test_prescribed_displacement_2d() {
        let mut mesh =
            generate_rectangular_mesh(100.0, 100.0, 2, 2, Material::new(30000.0, 0.2).unwrap())
                .unwrap();
        apply_compression_bc(&mut mesh).unwrap();
        let bcs: Vec<DisplacementBc> = mesh
            .top_nodes()
            .into_iter()
            .map(|n| DisplacementBc::vertical(n, -0.05))
            .collect();

        let result = solve_2d(&mesh, &[], &bcs, &AnalysisOptions::default()).unwrap();
        for node in mesh.top_nodes() {
            assert_relative_eq!(result.displacements[node][1], -0.05, max_relative = 1e-9);
        }
        assert!(result.max_von_mises > 0.0);
    }

    #[test]
    fn test_plane_strain_out_of_plane_stress() {
        let mesh = specimen_2d(Material::new(30000.0, 0.2).unwrap());
        let loads = top_edge_pressure(&mesh, -30.0, 1.0).unwrap();
        let options = AnalysisOptions {
            analysis: AnalysisType::PlaneStrain,
            ..AnalysisOptions::default()
        };
        let result = solve_2d(&mesh, &loads, &[], &options).unwrap();
        let mid = &result.elements[55].stress;
        assert_relative_eq!(mid.zz(), 0.2 * (mid.xx() + mid.yy()), max_relative = 1e-12);
        assert!(mid.zz() < 0.0);
    }

    #[test]
    fn test_inverted_element_is_fatal() {
        let mut mesh = Mesh::new();
        let mat = mesh.add_material(Material::new(30000.0, 0.2).unwrap()).unwrap();
        for (x, y) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
            mesh.add_node(Point3::new(x, y, 0.0));
        }
        mesh.add_element(ElementType::Quad4, vec![0, 3, 2, 1], mat).unwrap();
        mesh.fix_dof(0, 0).unwrap();
        mesh.fix_dof(0, 1).unwrap();
        mesh.fix_dof(1, 1).unwrap();

        let result = solve_2d(&mesh, &[NodalLoad::vertical(2, -1.0)], &[], &AnalysisOptions::default());
        assert!(matches!(result, Err(Error::MeshingDefect(_))));
    }

    #[test]
    fn test_dimension_and_option_checks() {
        let cube = generate_cuboid_mesh(1.0, 1.0, 1.0, 1, 1, 1, 30000.0, 0.2).unwrap();
        assert!(matches!(
            solve_2d(&cube, &[], &[], &AnalysisOptions::default()),
            Err(Error::Configuration(_))
        ));

        let mesh = specimen_2d(hognestad());
        let bad = AnalysisOptions {
            load_steps: 0,
            ..AnalysisOptions::default()
        };
        assert!(solve_2d(&mesh, &[], &[], &bad).is_err());
        assert!(solve_3d(&mesh, &[], &[], &SolverConfig::default()).is_err());
    }

    #[test]
    fn test_options_serde_defaults() {
        let options: AnalysisOptions =
            serde_json::from_str(r#"{"analysis": "plane_strain", "load_steps": 4}"#).unwrap();
        assert_eq!(options.analysis, AnalysisType::PlaneStrain);
        assert_eq!(options.load_steps, 4);
        assert_eq!(options.thickness, 1.0);
        assert_eq!(options.solver, SolverConfig::default());
        assert_eq!(options.section(), Section {
            analysis: AnalysisType::PlaneStrain,
            thickness: 1.0,
        });
    }

    fn specimen_3d() -> Mesh {
        let mut mesh = generate_cuboid_mesh(100.0, 100.0, 100.0, 2, 2, 2, 30000.0, 0.2).unwrap();
        apply_bottom_fixed(&mut mesh).unwrap();
        mesh
    }

    #[test]
    fn test_3d_uniform_compression() {
        let mesh = specimen_3d();
        let loads = top_face_pressure(&mesh, -10.0).unwrap();
        let config = SolverConfig {
            tolerance: 1e-10,
            ..SolverConfig::default()
        };
        let result = solve_3d(&mesh, &loads, &[], &config).unwrap();

        assert!(result.converged);
        assert!(result.iterations > 0);
        // Unrestrained lateral expansion gives a uniaxial field
        for elem in &result.elements {
            assert_relative_eq!(elem.stress.yy(), -10.0, max_relative = 1e-3);
            assert_relative_eq!(elem.von_mises, 10.0, max_relative = 1e-3);
        }
        let top = mesh.top_nodes()[0];
        assert_relative_eq!(
            result.displacements[top][1],
            -10.0 * 100.0 / 30000.0,
            max_relative = 1e-3
        );
    }

    #[test]
    fn test_3d_iteration_cap_reports_not_converged() {
        let mesh = specimen_3d();
        let loads = top_face_pressure(&mesh, -10.0).unwrap();
        let config = SolverConfig {
            tolerance: 1e-12,
            max_iterations: 2,
        };
        let result = solve_3d(&mesh, &loads, &[], &config).unwrap();
        assert!(!result.converged);
        assert_eq!(result.iterations, 2);
    }

    #[test]
    fn test_precomputed_matches_direct_and_scales() {
        let mesh = specimen_3d();
        let config = SolverConfig::default();
        let mut cache = PrecomputedSolver3d::new(&mesh, config).unwrap();
        assert_eq!(cache.n_dofs(), 27 * 3);

        let loads = top_face_pressure(&mesh, -10.0).unwrap();
        let cached = cache.solve(&loads, &[]).unwrap();
        let direct = solve_3d(&mesh, &loads, &[], &config).unwrap();
        assert_eq!(cached, direct);

        let doubled = top_face_pressure(&mesh, -20.0).unwrap();
        let scaled = cache.solve(&doubled, &[]).unwrap();
        for (a, b) in scaled.displacements.iter().zip(&cached.displacements) {
            assert_relative_eq!(*a, *b * 2.0, max_relative = 1e-12, epsilon = 1e-15);
        }

        // Re-solving the first load set reproduces it exactly
        assert_eq!(cache.solve(&loads, &[]).unwrap(), cached);
    }

    #[test]
    fn test_precomputed_prescribed_displacement() {
        let mut mesh = generate_cuboid_mesh(50.0, 100.0, 50.0, 1, 2, 1, 30000.0, 0.2).unwrap();
        apply_compression_bc(&mut mesh).unwrap();
        for node in mesh.top_nodes() {
            mesh.fix_dof(node, 1).unwrap();
        }
        let config = SolverConfig {
            tolerance: 1e-10,
            ..SolverConfig::default()
        };
        let mut cache = PrecomputedSolver3d::new(&mesh, config).unwrap();

        let bcs: Vec<DisplacementBc> = mesh
            .top_nodes()
            .into_iter()
            .map(|n| DisplacementBc::vertical(n, -0.02))
            .collect();
        let result = cache.solve(&[], &bcs).unwrap();
        for node in mesh.top_nodes() {
            assert_relative_eq!(result.displacements[node][1], -0.02, max_relative = 1e-6);
        }
        assert!(result.max_von_mises > 0.0);

        // Mid-height nodes are free, so they cannot be driven
        let mid = mesh.nodes().iter().find(|n| n.coords[1] == 50.0).unwrap().id;
        let free = DisplacementBc::vertical(mid, -0.01);
        assert!(matches!(cache.solve(&[], &[free]), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_3d_displacement_control_matches_direct() {
        let mut mesh = generate_cuboid_mesh(100.0, 100.0, 100.0, 2, 4, 2, 30000.0, 0.2).unwrap();
        apply_compression_bc(&mut mesh).unwrap();
        for node in mesh.top_nodes() {
            mesh.fix_dof(node, 1).unwrap();
        }
        let bcs: Vec<DisplacementBc> = mesh
            .top_nodes()
            .into_iter()
            .map(|n| DisplacementBc::vertical(n, -0.05))
            .collect();

        // Dense LU on the same penalised system
        let mut system = assemble(&mesh, Section::default(), None).unwrap();
        let mut rhs = assemble_loads(&mesh, &[]).unwrap();
        let constraints = collect_constraints(&mesh, &bcs).unwrap();
        apply_penalty(&mut system, &mut rhs, &constraints).unwrap();
        let reference = GaussianElimination::new()
            .solve(&system.stiffness, &rhs)
            .unwrap()
            .values;

        let config = SolverConfig {
            tolerance: 1e-10,
            max_iterations: 2000,
        };
        let direct = solve_3d(&mesh, &[], &bcs, &config).unwrap();
        let mut cache = PrecomputedSolver3d::new(&mesh, config).unwrap();
        let cached = cache.solve(&[], &bcs).unwrap();

        for result in [&direct, &cached] {
            assert!(result.converged);
            assert!(result.iterations > 1);
            for node in 0..mesh.n_nodes() {
                for axis in 0..3 {
                    assert_relative_eq!(
                        result.displacements[node][axis],
                        reference[node * 3 + axis],
                        epsilon = 1e-6
                    );
                }
            }
        }

        // Mid-height centre node sits halfway between the platens
        let centre = mesh
            .nodes()
            .iter()
            .find(|n| n.coords == Point3::new(50.0, 50.0, 50.0))
            .unwrap()
            .id;
        assert_relative_eq!(direct.displacements[centre][1], -0.025, epsilon = 1e-6);
    }

    #[test]
    fn test_precomputed_clone_is_independent() {
        let mesh = specimen_3d();
        let mut first = PrecomputedSolver3d::new(&mesh, SolverConfig::default()).unwrap();
        let mut second = first.clone();
        let loads = top_face_pressure(&mesh, -5.0).unwrap();
        assert_eq!(first.solve(&loads, &[]).unwrap(), second.solve(&loads, &[]).unwrap());
    }
}
