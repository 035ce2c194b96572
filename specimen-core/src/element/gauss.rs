//! Gauss-Legendre quadrature on the reference square and cube.
//!
//! Both element kernels integrate with the 2-point rule per direction,
//! which is exact for the bilinear/trilinear stiffness of undistorted
//! elements. The 1- and 3-point rules are kept for volume checks.

/// A quadrature point in natural coordinates `(ξ, η, ζ)`.
///
/// 2D rules leave `ζ = 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussPoint {
    pub coords: [f64; 3],
    pub weight: f64,
}

impl GaussPoint {
    #[inline]
    pub fn xi(&self) -> f64 {
        self.coords[0]
    }

    #[inline]
    pub fn eta(&self) -> f64 {
        self.coords[1]
    }

    #[inline]
    pub fn zeta(&self) -> f64 {
        self.coords[2]
    }
}

/// 1D rule on `[-1, 1]` as `(point, weight)` pairs.
///
/// # Panics
///
/// Panics if `n` is not 1, 2 or 3.
pub fn gauss_1d(n: usize) -> Vec<(f64, f64)> {
    match n {
        1 => vec![(0.0, 2.0)],
        2 => {
            let p = 3.0_f64.sqrt().recip();
            vec![(-p, 1.0), (p, 1.0)]
        }
        3 => {
            let p = 0.6_f64.sqrt();
            vec![(-p, 5.0 / 9.0), (0.0, 8.0 / 9.0), (p, 5.0 / 9.0)]
        }
        _ => panic!("gauss_1d: n must be 1, 2, or 3, got {}", n),
    }
}

/// Tensor-product rule with `n²` points on `[-1, 1]²`.
pub fn gauss_quad(n: usize) -> Vec<GaussPoint> {
    let rule = gauss_1d(n);
    rule.iter()
        .flat_map(|&(xi, wx)| {
            rule.iter().map(move |&(eta, we)| GaussPoint {
                coords: [xi, eta, 0.0],
                weight: wx * we,
            })
        })
        .collect()
}

/// Tensor-product rule with `n³` points on `[-1, 1]³`.
pub fn gauss_hex(n: usize) -> Vec<GaussPoint> {
    let rule = gauss_1d(n);
    let mut points = Vec::with_capacity(n * n * n);
    for &(xi, wx) in &rule {
        for &(eta, we) in &rule {
            for &(zeta, wz) in &rule {
                points.push(GaussPoint {
                    coords: [xi, eta, zeta],
                    weight: wx * we * wz,
                });
            }
        }
    }
    points
}
