//! Linear system solvers.
//!
//! Provides a direct and an iterative solver for the penalised system Ku = f.
//!
//! # Solver Backends
//!
//! - [`GaussianElimination`]: Dense LU with partial pivoting (nalgebra). Used
//!   for the 2D quad solves, which stay small enough for O(n³).
//! - [`ConjugateGradient`]: Jacobi-preconditioned CG for the 3D hex solves.
//!   The penalised stiffness is symmetric positive definite; the diagonal
//!   preconditioner absorbs the penalty scale.
//!
//! Both solvers reject NaN/Inf input before doing any work. Running out of
//! CG iterations is not an error: the best iterate is returned with
//! `converged = false`.

use crate::error::{Error, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Linear solver interface.
pub trait LinearSolver: Send {
    /// Solve the linear system Ax = b.
    ///
    /// # Arguments
    ///
    /// * `matrix` - System matrix (K, after boundary conditions)
    /// * `rhs` - Right-hand side vector (f)
    fn solve(&mut self, matrix: &DMatrix<f64>, rhs: &DVector<f64>) -> Result<Solution>;

    /// Solver name for diagnostics.
    fn name(&self) -> &str;
}

/// Iterative solver configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Relative residual target ‖r‖ / ‖b‖.
    pub tolerance: f64,
    /// Iteration cap.
    pub max_iterations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 1000,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance > 0.0) || !self.tolerance.is_finite() {
            return Err(Error::Configuration(format!(
                "Solver tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(Error::Configuration(
                "Solver needs at least one iteration".into(),
            ));
        }
        Ok(())
    }
}

/// Solution vector plus solve statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub values: DVector<f64>,
    pub converged: bool,
    /// CG iterations performed (1 for a direct solve).
    pub iterations: usize,
    /// Final relative residual ‖b − Ax‖ / ‖b‖.
    pub residual: f64,
}

impl Solution {
    pub fn stats(&self) -> SolveStats {
        SolveStats {
            converged: self.converged,
            iterations: self.iterations,
            residual: self.residual,
        }
    }
}

/// Solve statistics carried into the analysis result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolveStats {
    pub converged: bool,
    pub iterations: usize,
    pub residual: f64,
}

impl Default for SolveStats {
    fn default() -> Self {
        Self {
            converged: true,
            iterations: 0,
            residual: 0.0,
        }
    }
}

/// Reject NaN/Inf anywhere in the system.
pub fn check_finite(matrix: &DMatrix<f64>, rhs: &DVector<f64>) -> Result<()> {
    if let Some(pos) = matrix.iter().position(|v| !v.is_finite()) {
        let n = matrix.nrows().max(1);
        return Err(Error::NumericalInstability(format!(
            "Non-finite stiffness entry at ({}, {})",
            pos % n,
            pos / n
        )));
    }
    if let Some(i) = rhs.iter().position(|v| !v.is_finite()) {
        return Err(Error::NumericalInstability(format!(
            "Non-finite load entry at DOF {}",
            i
        )));
    }
    Ok(())
}

fn check_dimensions(matrix: &DMatrix<f64>, rhs: &DVector<f64>) -> Result<()> {
    if !matrix.is_square() {
        return Err(Error::Configuration(format!(
            "Matrix must be square, got {}x{}",
            matrix.nrows(),
            matrix.ncols()
        )));
    }
    if matrix.nrows() != rhs.len() {
        return Err(Error::Configuration(format!(
            "RHS length {} does not match matrix size {}",
            rhs.len(),
            matrix.nrows()
        )));
    }
    Ok(())
}

fn relative_residual(matrix: &DMatrix<f64>, x: &DVector<f64>, rhs: &DVector<f64>) -> f64 {
    let b_norm = rhs.norm();
    let r_norm = (rhs - matrix * x).norm();
    if b_norm > 0.0 {
        r_norm / b_norm
    } else {
        r_norm
    }
}

/// Dense direct solver: LU decomposition with partial pivoting.
#[derive(Debug, Clone, Copy, Default)]
pub struct GaussianElimination;

impl GaussianElimination {
    pub fn new() -> Self {
        Self
    }
}

impl LinearSolver for GaussianElimination {
    fn solve(&mut self, matrix: &DMatrix<f64>, rhs: &DVector<f64>) -> Result<Solution> {
        check_dimensions(matrix, rhs)?;
        check_finite(matrix, rhs)?;

        let n = rhs.len();
        if n == 0 {
            return Ok(Solution {
                values: DVector::zeros(0),
                converged: true,
                iterations: 0,
                residual: 0.0,
            });
        }

        let start = Instant::now();
        debug!(n, "starting dense LU solve");

        let values = matrix
            .clone()
            .lu()
            .solve(rhs)
            .ok_or_else(|| {
                Error::SingularMatrix(format!(
                    "Zero pivot in {}x{} system; check boundary conditions",
                    n, n
                ))
            })?;
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::SingularMatrix(
                "LU solve produced non-finite values".into(),
            ));
        }

        let residual = relative_residual(matrix, &values, rhs);
        info!(
            n,
            residual,
            elapsed_ms = start.elapsed().as_secs_f64() * 1e3,
            "dense LU solve finished"
        );

        Ok(Solution {
            values,
            converged: true,
            iterations: 1,
            residual,
        })
    }

    fn name(&self) -> &str {
        "gaussian-elimination"
    }
}

/// Jacobi-preconditioned Conjugate Gradient.
///
/// Work vectors are kept between calls and only reallocated when the system
/// size changes, so repeated solves of one system allocate nothing beyond
/// the returned solution. [`LinearSolver::solve`] starts from zero;
/// [`ConjugateGradient::solve_from`] takes an explicit initial guess.
#[derive(Debug, Clone)]
pub struct ConjugateGradient {
    config: SolverConfig,
    r: DVector<f64>,
    z: DVector<f64>,
    p: DVector<f64>,
    ap: DVector<f64>,
    best: DVector<f64>,
    inv_diag: DVector<f64>,
}

impl ConjugateGradient {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            r: DVector::zeros(0),
            z: DVector::zeros(0),
            p: DVector::zeros(0),
            ap: DVector::zeros(0),
            best: DVector::zeros(0),
            inv_diag: DVector::zeros(0),
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn resize(&mut self, n: usize) {
        if self.r.len() != n {
            self.r = DVector::zeros(n);
            self.z = DVector::zeros(n);
            self.p = DVector::zeros(n);
            self.ap = DVector::zeros(n);
            self.best = DVector::zeros(n);
            self.inv_diag = DVector::zeros(n);
        }
    }
}

impl Default for ConjugateGradient {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

impl ConjugateGradient {
    /// Solve starting from `initial` instead of zero.
    ///
    /// Convergence is measured against the initial residual `b − A x₀`.
    /// For a penalised system, starting from the prescribed values keeps the
    /// penalty terms out of that reference, so the tolerance applies to the
    /// physical out-of-balance forces.
    pub fn solve_from(
        &mut self,
        matrix: &DMatrix<f64>,
        rhs: &DVector<f64>,
        initial: &DVector<f64>,
    ) -> Result<Solution> {
        self.config.validate()?;
        check_dimensions(matrix, rhs)?;
        check_finite(matrix, rhs)?;

        let n = rhs.len();
        if initial.len() != n {
            return Err(Error::Configuration(format!(
                "Initial guess has length {} but system has {} rows",
                initial.len(),
                n
            )));
        }
        if initial.iter().any(|v| !v.is_finite()) {
            return Err(Error::NumericalInstability(
                "Initial guess contains NaN or Inf".into(),
            ));
        }

        let start = Instant::now();
        self.resize(n);
        let mut x = initial.clone();

        // r₀ = b − A x₀
        self.r.copy_from(rhs);
        self.r.gemv(-1.0, matrix, &x, 1.0);
        let r0_norm = self.r.norm();
        if n == 0 || r0_norm == 0.0 {
            return Ok(Solution {
                values: x,
                converged: true,
                iterations: 0,
                residual: 0.0,
            });
        }

        for i in 0..n {
            let d = matrix[(i, i)];
            self.inv_diag[i] = if d > 0.0 { d.recip() } else { 1.0 };
        }

        let tol = self.config.tolerance * r0_norm;
        self.best.copy_from(&x);
        let mut best_norm = r0_norm;

        self.z.copy_from(&self.r);
        self.z.component_mul_assign(&self.inv_diag);
        self.p.copy_from(&self.z);
        let mut rz = self.r.dot(&self.z);

        let mut iterations = 0;
        let mut converged = false;
        while iterations < self.config.max_iterations {
            iterations += 1;

            self.ap.gemv(1.0, matrix, &self.p, 0.0);
            let pap = self.p.dot(&self.ap);
            if !(pap > 0.0) || !pap.is_finite() {
                warn!(iterations, pap, "CG breakdown: search direction lost positivity");
                break;
            }

            let alpha = rz / pap;
            x.axpy(alpha, &self.p, 1.0);
            self.r.axpy(-alpha, &self.ap, 1.0);

            let r_norm = self.r.norm();
            if r_norm < best_norm {
                best_norm = r_norm;
                self.best.copy_from(&x);
            }
            if r_norm <= tol {
                converged = true;
                break;
            }

            self.z.copy_from(&self.r);
            self.z.component_mul_assign(&self.inv_diag);
            let rz_next = self.r.dot(&self.z);
            let beta = rz_next / rz;
            rz = rz_next;
            // p = z + β p
            self.p.axpy(1.0, &self.z, beta);
        }

        let residual = best_norm / r0_norm;
        if converged {
            info!(
                n,
                iterations,
                residual,
                elapsed_ms = start.elapsed().as_secs_f64() * 1e3,
                "CG converged"
            );
        } else {
            warn!(
                n,
                iterations,
                residual,
                tolerance = self.config.tolerance,
                "CG did not converge; returning best iterate"
            );
        }

        Ok(Solution {
            values: self.best.clone(),
            converged,
            iterations,
            residual,
        })
    }
}

impl LinearSolver for ConjugateGradient {
    fn solve(&mut self, matrix: &DMatrix<f64>, rhs: &DVector<f64>) -> Result<Solution> {
        self.solve_from(matrix, rhs, &DVector::zeros(rhs.len()))
    }

    fn name(&self) -> &str {
        "jacobi-pcg"
    }
}
