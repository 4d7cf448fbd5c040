//! Direct least-squares ellipse fitting (Fitzgibbon et al., 1999).

use nalgebra::{DMatrix, Matrix3, Vector6};

use super::eigen::constrained_eigenvector;
use super::types::{ConicCoeffs, Ellipse};
use crate::annotation::EllipseRecord;
use crate::error::FitError;

/// Distinct points needed to determine a conic.
pub const MIN_FIT_POINTS: usize = 5;

/// Fit a conic to boundary points, minimizing the summed squared algebraic
/// residual under the ellipse constraint 4AC − B² = 1.
///
/// Coefficients are returned scaled so that A + C = 1.
pub fn fit_conic_direct(points: &[[f64; 2]]) -> Result<ConicCoeffs, FitError> {
    let distinct = count_distinct(points);
    if distinct < MIN_FIT_POINTS {
        return Err(FitError::InsufficientPoints {
            needed: MIN_FIT_POINTS,
            got: distinct,
        });
    }
    let n = points.len();

    // Shift to the centroid and scale so the mean distance is √2.
    let (mean_x, mean_y, scale) = normalization_params(points);

    // Design matrix rows: [x², xy, y², x, y, 1]
    let mut d = DMatrix::<f64>::zeros(n, 6);
    for (i, &[px, py]) in points.iter().enumerate() {
        let x = (px - mean_x) * scale;
        let y = (py - mean_y) * scale;
        d[(i, 0)] = x * x;
        d[(i, 1)] = x * y;
        d[(i, 2)] = y * y;
        d[(i, 3)] = x;
        d[(i, 4)] = y;
        d[(i, 5)] = 1.0;
    }

    let s = d.transpose() * &d;
    let s11 = s.fixed_view::<3, 3>(0, 0).into_owned();
    let s12 = s.fixed_view::<3, 3>(0, 3).into_owned();
    let s22 = s.fixed_view::<3, 3>(3, 3).into_owned();

    // Collinear points make the linear block rank-deficient.
    let s22_scale = s22.norm();
    if s22.determinant().abs() <= 1e-12 * s22_scale * s22_scale * s22_scale {
        return Err(FitError::Degenerate {
            reason: "singular linear scatter block (collinear points)",
        });
    }
    let s22_inv = s22.try_inverse().ok_or(FitError::Degenerate {
        reason: "singular linear scatter block (collinear points)",
    })?;
    let m = s11 - s12 * s22_inv * s12.transpose();

    //   C1 = [[0, 0, 2], [0, -1, 0], [2, 0, 0]]
    let c1 = Matrix3::new(0.0, 0.0, 2.0, 0.0, -1.0, 0.0, 2.0, 0.0, 0.0);
    let c1_inv = c1.try_inverse().ok_or(FitError::Degenerate {
        reason: "singular constraint matrix",
    })?;

    let a1 = constrained_eigenvector(&(c1_inv * m)).ok_or(FitError::Degenerate {
        reason: "no eigenvector satisfies the ellipse constraint",
    })?;
    let a2 = -s22_inv * s12.transpose() * a1;

    let coeffs_norm = Vector6::new(a1[0], a1[1], a1[2], a2[0], a2[1], a2[2]);
    let conic = ConicCoeffs(denormalize_conic(&coeffs_norm, mean_x, mean_y, scale));

    if !conic.is_ellipse() {
        return Err(FitError::Degenerate {
            reason: "conic discriminant is not negative",
        });
    }
    conic.normalized().ok_or(FitError::Degenerate {
        reason: "vanishing quadratic part",
    })
}

/// Fit and convert to geometric parameters.
pub fn fit_ellipse_direct(points: &[[f64; 2]]) -> Result<Ellipse, FitError> {
    let ellipse = fit_conic_direct(points)?
        .to_ellipse()
        .ok_or(FitError::Degenerate {
            reason: "conic has no real bounded locus",
        })?;
    if !ellipse.is_valid() {
        return Err(FitError::Degenerate {
            reason: "non-finite or zero-length axes",
        });
    }
    Ok(ellipse)
}

/// Fit a contour and produce the stored record (full axes, degrees).
pub fn fit_ellipse_record(points: &[[f64; 2]]) -> Result<EllipseRecord, FitError> {
    fit_ellipse_direct(points).map(|e| e.to_record())
}

/// RMS Sampson distance of points to an ellipse.
pub fn rms_sampson_distance(ellipse: &Ellipse, points: &[[f64; 2]]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = points
        .iter()
        .map(|&[x, y]| {
            let d = ellipse.sampson_distance(x, y);
            d * d
        })
        .sum();
    (sum_sq / points.len() as f64).sqrt()
}

fn count_distinct(points: &[[f64; 2]]) -> usize {
    let mut sorted: Vec<[f64; 2]> = points.to_vec();
    sorted.sort_by(|l, r| l[0].total_cmp(&r[0]).then(l[1].total_cmp(&r[1])));
    sorted.dedup();
    sorted.len()
}

/// Returns (mean_x, mean_y, scale).
fn normalization_params(points: &[[f64; 2]]) -> (f64, f64, f64) {
    let n = points.len() as f64;
    let mean_x: f64 = points.iter().map(|p| p[0]).sum::<f64>() / n;
    let mean_y: f64 = points.iter().map(|p| p[1]).sum::<f64>() / n;

    let mean_dist: f64 = points
        .iter()
        .map(|p| ((p[0] - mean_x).powi(2) + (p[1] - mean_y).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    let scale = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    (mean_x, mean_y, scale)
}

/// Undo the x' = s(x − mx), y' = s(y − my) substitution.
fn denormalize_conic(c: &Vector6<f64>, mx: f64, my: f64, s: f64) -> [f64; 6] {
    let [a_, b_, c_, d_, e_, f_] = [c[0], c[1], c[2], c[3], c[4], c[5]];
    let s2 = s * s;

    let a = a_ * s2;
    let b = b_ * s2;
    let c = c_ * s2;
    let d = -2.0 * a_ * s2 * mx - b_ * s2 * my + d_ * s;
    let e = -b_ * s2 * mx - 2.0 * c_ * s2 * my + e_ * s;
    let f =
        a_ * s2 * mx * mx + b_ * s2 * mx * my + c_ * s2 * my * my - d_ * s * mx - e_ * s * my + f_;

    [a, b, c, d, e, f]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::prelude::*;

    fn make_test_ellipse() -> Ellipse {
        Ellipse {
            cx: 100.0,
            cy: 80.0,
            a: 30.0,
            b: 15.0,
            angle: 0.3,
        }
    }

    #[test]
    fn test_fit_exact_points() {
        let e = make_test_ellipse();
        let pts = e.sample_points(50);

        let fitted = fit_ellipse_direct(&pts).expect("fit should succeed");

        assert_relative_eq!(fitted.cx, e.cx, epsilon = 1e-6);
        assert_relative_eq!(fitted.cy, e.cy, epsilon = 1e-6);
        assert_relative_eq!(fitted.a, e.a, epsilon = 1e-6);
        assert_relative_eq!(fitted.b, e.b, epsilon = 1e-6);
        assert_relative_eq!(fitted.angle, e.angle, epsilon = 1e-6);

        let rms = rms_sampson_distance(&fitted, &pts);
        assert!(rms < 1e-8, "RMS Sampson distance should be ~0, got {}", rms);
    }

    #[test]
    fn test_fit_noisy_points() {
        let e = make_test_ellipse();
        let mut pts = e.sample_points(200);
        let mut rng = StdRng::seed_from_u64(123);
        let noise_sigma = 0.5;

        for p in &mut pts {
            p[0] += rng.gen::<f64>() * noise_sigma * 2.0 - noise_sigma;
            p[1] += rng.gen::<f64>() * noise_sigma * 2.0 - noise_sigma;
        }

        let fitted = fit_ellipse_direct(&pts).expect("fit should succeed with noise");

        assert_relative_eq!(fitted.cx, e.cx, epsilon = 1.0);
        assert_relative_eq!(fitted.cy, e.cy, epsilon = 1.0);
        assert_relative_eq!(fitted.a, e.a, epsilon = 2.0);
        assert_relative_eq!(fitted.b, e.b, epsilon = 2.0);
    }

    #[test]
    fn test_fit_circle() {
        let e = Ellipse {
            cx: 50.0,
            cy: 50.0,
            a: 20.0,
            b: 20.0,
            angle: 0.0,
        };
        let pts = e.sample_points(100);
        let fitted = fit_ellipse_direct(&pts).expect("circle fit should succeed");

        assert_relative_eq!(fitted.cx, 50.0, epsilon = 1e-6);
        assert_relative_eq!(fitted.cy, 50.0, epsilon = 1e-6);
        assert_relative_eq!(fitted.a, 20.0, epsilon = 1e-6);
        assert_relative_eq!(fitted.b, 20.0, epsilon = 1e-6);
    }

    #[test]
    fn test_record_has_full_axes_in_degrees() {
        let e = Ellipse {
            cx: 120.0,
            cy: 90.0,
            a: 40.0,
            b: 25.0,
            angle: -0.5,
        };
        let r = fit_ellipse_record(&e.sample_points(80)).expect("fit");
        assert_relative_eq!(r.center_x, 120.0, epsilon = 1e-3);
        assert_relative_eq!(r.center_y, 90.0, epsilon = 1e-3);
        assert_relative_eq!(r.major_axis, 80.0, epsilon = 1e-3);
        assert_relative_eq!(r.minor_axis, 50.0, epsilon = 1e-3);
        let expected = 180.0 - 0.5f32.to_degrees();
        assert_relative_eq!(r.rotation_angle, expected, epsilon = 1e-3);
    }

    #[test]
    fn test_various_ellipses() {
        let test_cases = [
            Ellipse {
                cx: 50.0,
                cy: 50.0,
                a: 40.0,
                b: 10.0,
                angle: 0.0,
            },
            Ellipse {
                cx: 200.0,
                cy: 150.0,
                a: 25.0,
                b: 24.0,
                angle: 1.0,
            },
            Ellipse {
                cx: 300.0,
                cy: 100.0,
                a: 50.0,
                b: 20.0,
                angle: -0.7,
            },
            Ellipse {
                cx: 512.0,
                cy: 480.0,
                a: 380.0,
                b: 290.0,
                angle: std::f64::consts::FRAC_PI_2,
            },
        ];

        for (i, e) in test_cases.iter().enumerate() {
            let pts = e.sample_points(100);
            let fitted = fit_ellipse_direct(&pts)
                .unwrap_or_else(|err| panic!("fit should succeed for case {}: {}", i, err));

            assert_relative_eq!(fitted.cx, e.cx, epsilon = 1e-4);
            assert_relative_eq!(fitted.cy, e.cy, epsilon = 1e-4);
            assert_relative_eq!(fitted.a, e.a, epsilon = 1e-4);
            assert_relative_eq!(fitted.b, e.b, epsilon = 1e-4);
            let angle_diff = (fitted.angle - e.angle).abs();
            let angle_diff = angle_diff.min((angle_diff - std::f64::consts::PI).abs());
            assert!(
                angle_diff < 1e-4,
                "angle mismatch for case {}: expected {}, got {}",
                i,
                e.angle,
                fitted.angle
            );
        }
    }

    #[test]
    fn test_fit_is_deterministic() {
        let mut pts = make_test_ellipse().sample_points(120);
        let mut rng = StdRng::seed_from_u64(7);
        for p in &mut pts {
            p[0] += rng.gen_range(-1.0..1.0);
            p[1] += rng.gen_range(-1.0..1.0);
        }
        let first = fit_ellipse_record(&pts).expect("fit");
        let second = fit_ellipse_record(&pts).expect("fit");
        assert_eq!(first, second);
    }

    #[test]
    fn test_too_few_distinct_points() {
        let pts = vec![[1.0, 2.0], [3.0, 4.0], [5.0, 7.0], [1.0, 2.0], [3.0, 4.0]];
        assert_eq!(
            fit_conic_direct(&pts),
            Err(FitError::InsufficientPoints { needed: 5, got: 3 })
        );

        let four = vec![[0.0, 0.0], [10.0, 0.0], [10.0, 5.0], [0.0, 5.0]];
        assert!(matches!(
            fit_ellipse_record(&four),
            Err(FitError::InsufficientPoints { got: 4, .. })
        ));
    }

    #[test]
    fn test_collinear_points_rejected() {
        let pts: Vec<[f64; 2]> = (0..6).map(|i| [i as f64, i as f64 * 2.0]).collect();
        assert!(matches!(
            fit_conic_direct(&pts),
            Err(FitError::Degenerate { .. })
        ));

        let line: Vec<[f64; 2]> = (0..10).map(|i| [i as f64 * 10.0, 0.0]).collect();
        assert!(matches!(
            fit_ellipse_direct(&line),
            Err(FitError::Degenerate { .. })
        ));
    }

    #[test]
    fn test_degenerate_inputs_dont_panic() {
        let dup: Vec<[f64; 2]> = vec![[1.0, 1.0]; 10];
        assert!(fit_conic_direct(&dup).is_err());

        let mut clusters: Vec<[f64; 2]> = vec![[0.0, 0.0]; 5];
        clusters.extend(vec![[100.0, 100.0]; 5]);
        assert!(fit_conic_direct(&clusters).is_err());

        let empty: Vec<[f64; 2]> = vec![];
        assert!(fit_conic_direct(&empty).is_err());
    }

    #[test]
    fn test_conic_is_trace_normalized() {
        let conic = fit_conic_direct(&make_test_ellipse().sample_points(40)).expect("fit");
        let [a, _, c, ..] = conic.0;
        assert_relative_eq!(a + c, 1.0, epsilon = 1e-12);
    }
}
