//! Error types for specimen operations.

use thiserror::Error;

/// Result type alias using the specimen Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or solving a specimen model.
///
/// Solver non-convergence is not an error: it is reported through
/// [`crate::solver::Solution::converged`] so an approximate field can still
/// be visualised.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Invalid mesh resolution, dimensions, ids or options.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Invalid material properties (negative modulus or strength, etc.).
    #[error("invalid material: {0}")]
    InvalidMaterial(String),

    /// Non-positive Jacobian determinant, i.e. wrong node winding.
    #[error("meshing defect: {0}")]
    MeshingDefect(String),

    /// NaN or Inf in the assembled system.
    #[error("numerical instability: {0}")]
    NumericalInstability(String),

    /// Direct solve hit a zero pivot (under-constrained model).
    #[error("singular matrix: {0}")]
    SingularMatrix(String),
}
