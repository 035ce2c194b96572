//! Specimen Core - finite element stress analysis for a virtual materials lab
//!
//! Small-strain analysis of lab specimens (concrete cubes and prisms, steel
//! coupons) with:
//! - Bilinear quadrilateral (plane stress / plane strain) and trilinear
//!   hexahedral elements
//! - Linear and softening constitutive laws for concrete
//! - Parallel assembly using Rayon
//! - Penalty boundary conditions
//! - Dense LU and Jacobi-preconditioned conjugate gradient solvers
//! - Incremental tangent loading for nonlinear 2D materials
//! - A cached 3D solver for repeated load cases on one mesh
//!
//! # Architecture
//!
//! - [`Element`] trait: element stiffness and centroid strain recovery
//! - [`Mesh`]: nodes with fixed flags, connectivity and materials
//! - [`Material`]: elastic constants plus a [`ConstitutiveModel`]
//! - [`LinearSolver`] trait: linear system solution strategies
//! - [`solve_2d`], [`solve_3d`] and [`PrecomputedSolver3d`]: analysis drivers
//!   returning a [`FemResult`]
//!
//! # Example
//!
//! ```
//! use specimen_core::mesh::{apply_bottom_fixed, generate_rectangular_mesh};
//! use specimen_core::assembly::top_edge_pressure;
//! use specimen_core::{solve_2d, AnalysisOptions, Material};
//!
//! let concrete = Material::concrete(30.0).unwrap();
//! let mut mesh = generate_rectangular_mesh(150.0, 150.0, 10, 10, concrete).unwrap();
//! apply_bottom_fixed(&mut mesh).unwrap();
//!
//! let loads = top_edge_pressure(&mesh, -10.0, 1.0).unwrap();
//! let result = solve_2d(&mesh, &loads, &[], &AnalysisOptions::default()).unwrap();
//! assert!(result.converged);
//! assert!(result.max_displacement > 0.0);
//! ```

pub mod analysis;
pub mod assembly;
pub mod constitutive;
pub mod constraints;
pub mod curve;
pub mod element;
pub mod error;
pub mod material;
pub mod mesh;
pub mod solver;
pub mod stress;
pub mod types;

pub use analysis::{solve_2d, solve_3d, AnalysisOptions, PrecomputedSolver3d};
pub use assembly::{DisplacementBc, NodalLoad};
pub use constitutive::ConstitutiveModel;
pub use element::{create_element, Element, Section};
pub use error::{Error, Result};
pub use material::{AnalysisType, Material};
pub use mesh::Mesh;
pub use solver::{LinearSolver, SolverConfig};
pub use stress::{ElementResult, FemResult};
pub use types::{Point3, StrainTensor, StressTensor, Vec3};
