//! 3×3 eigen-solver for the constrained conic system.

use nalgebra::{Matrix3, Vector3};

/// Eigenvector of `system` (= C⁻¹ M) satisfying the ellipse constraint
/// 4 v₀ v₂ − v₁² > 0.
///
/// Eigenvalues come from the characteristic polynomial and eigenvectors from
/// the adjugate of (A − λI); `system` is not symmetric in general, so a
/// symmetric solver does not apply. If several eigenvectors pass the
/// constraint, the one with the smallest |λ| wins.
pub(crate) fn constrained_eigenvector(system: &Matrix3<f64>) -> Option<Vector3<f64>> {
    let a = system;
    let tr = a.trace();

    // Sum of the 2×2 principal minors.
    let minor_sum = a[(0, 0)] * a[(1, 1)] - a[(0, 1)] * a[(1, 0)] + a[(0, 0)] * a[(2, 2)]
        - a[(0, 2)] * a[(2, 0)]
        + a[(1, 1)] * a[(2, 2)]
        - a[(1, 2)] * a[(2, 1)];

    let det = a.determinant();

    // λ³ − tr λ² + minor_sum λ − det = 0
    let eigenvalues = solve_cubic_real(1.0, -tr, minor_sum, -det);

    let mut best: Option<(f64, Vector3<f64>)> = None;
    for ev in eigenvalues {
        if !ev.is_finite() {
            continue;
        }
        let shifted = system - Matrix3::identity() * ev;
        let Some(v) = null_vector_3x3(&shifted) else {
            continue;
        };
        let constraint = 4.0 * v[0] * v[2] - v[1] * v[1];
        if constraint <= 0.0 {
            continue;
        }
        if best.map_or(true, |(best_ev, _)| ev.abs() < best_ev) {
            best = Some((ev.abs(), v));
        }
    }

    best.map(|(_, v)| v)
}

/// Null vector of a (near-)singular 3×3 matrix: the adjugate row with the
/// largest norm. For a rank-2 matrix every non-zero adjugate row is
/// proportional to the null vector.
fn null_vector_3x3(m: &Matrix3<f64>) -> Option<Vector3<f64>> {
    let cofactors = [
        Vector3::new(
            m[(1, 1)] * m[(2, 2)] - m[(1, 2)] * m[(2, 1)],
            -(m[(1, 0)] * m[(2, 2)] - m[(1, 2)] * m[(2, 0)]),
            m[(1, 0)] * m[(2, 1)] - m[(1, 1)] * m[(2, 0)],
        ),
        Vector3::new(
            -(m[(0, 1)] * m[(2, 2)] - m[(0, 2)] * m[(2, 1)]),
            m[(0, 0)] * m[(2, 2)] - m[(0, 2)] * m[(2, 0)],
            -(m[(0, 0)] * m[(2, 1)] - m[(0, 1)] * m[(2, 0)]),
        ),
        Vector3::new(
            m[(0, 1)] * m[(1, 2)] - m[(0, 2)] * m[(1, 1)],
            -(m[(0, 0)] * m[(1, 2)] - m[(0, 2)] * m[(1, 0)]),
            m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)],
        ),
    ];

    let best = cofactors
        .iter()
        .max_by(|l, r| l.norm_squared().total_cmp(&r.norm_squared()))?;
    let norm_sq = best.norm_squared();
    if !norm_sq.is_finite() || norm_sq < 1e-30 {
        return None;
    }
    Some(best / norm_sq.sqrt())
}

/// Real roots (1 or 3) of a x³ + b x² + c x + d = 0.
fn solve_cubic_real(a: f64, b: f64, c: f64, d: f64) -> Vec<f64> {
    // Depressed cubic t³ + pt + q = 0 with x = t − b/(3a).
    let b_ = b / a;
    let c_ = c / a;
    let d_ = d / a;

    let p = c_ - b_ * b_ / 3.0;
    let q = 2.0 * b_ * b_ * b_ / 27.0 - b_ * c_ / 3.0 + d_;

    let disc = -4.0 * p * p * p - 27.0 * q * q;
    let shift = -b_ / 3.0;

    if disc >= 0.0 {
        let r = (-p / 3.0).sqrt();
        let cos_arg = if r.abs() < 1e-15 {
            0.0
        } else {
            (-q / (2.0 * r * r * r)).clamp(-1.0, 1.0)
        };
        let theta = cos_arg.acos();
        let two_r = 2.0 * r;
        let tau = 2.0 * std::f64::consts::PI;

        vec![
            two_r * (theta / 3.0).cos() + shift,
            two_r * ((theta + tau) / 3.0).cos() + shift,
            two_r * ((theta + 2.0 * tau) / 3.0).cos() + shift,
        ]
    } else {
        // Cardano
        let sqrt_disc = (q * q / 4.0 + p * p * p / 27.0).sqrt();
        let u = (-q / 2.0 + sqrt_disc).cbrt();
        let v = (-q / 2.0 - sqrt_disc).cbrt();
        vec![u + v + shift]
    }
}
