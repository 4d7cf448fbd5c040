//! General conic coefficients and the geometric ellipse they describe.

use nalgebra::Matrix3;

use crate::annotation::EllipseRecord;

/// General conic: A x² + B xy + C y² + D x + E y + F = 0.
/// Stored as [A, B, C, D, E, F].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConicCoeffs(pub [f64; 6]);

/// Geometric ellipse in image pixel coordinates (y pointing down).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipse {
    /// Center x.
    pub cx: f64,
    /// Center y.
    pub cy: f64,
    /// Semi-major axis length.
    pub a: f64,
    /// Semi-minor axis length.
    pub b: f64,
    /// Rotation of the major axis from +x, in radians (−π/2, π/2].
    pub angle: f64,
}

impl ConicCoeffs {
    /// Scale the coefficients so that A + C = 1.
    ///
    /// For an ellipse this makes the quadratic part positive definite.
    /// Returns `None` if A + C ≈ 0.
    pub fn normalized(&self) -> Option<Self> {
        let [a, b, c, d, e, f] = self.0;
        let trace = a + c;
        if !trace.is_finite() || trace.abs() < 1e-15 {
            return None;
        }
        let s = 1.0 / trace;
        Some(Self([a * s, b * s, c * s, d * s, e * s, f * s]))
    }

    /// Algebraic distance of a point (x, y) to this conic.
    pub fn algebraic_distance(&self, x: f64, y: f64) -> f64 {
        let [a, b, c, d, e, f] = self.0;
        a * x * x + b * x * y + c * y * y + d * x + e * y + f
    }

    /// Discriminant B² − 4AC; negative for ellipses.
    pub fn discriminant(&self) -> f64 {
        let [a, b, c, ..] = self.0;
        b * b - 4.0 * a * c
    }

    pub fn is_ellipse(&self) -> bool {
        self.discriminant() < 0.0
    }

    /// Convert to geometric ellipse parameters.
    /// Returns `None` if the conic is not a real ellipse.
    pub fn to_ellipse(self) -> Option<Ellipse> {
        conic_to_ellipse(&self)
    }
}

impl Ellipse {
    /// Positive, finite semi-axes and finite center/angle.
    pub fn is_valid(&self) -> bool {
        self.a > 0.0
            && self.b > 0.0
            && self.a.is_finite()
            && self.b.is_finite()
            && self.cx.is_finite()
            && self.cy.is_finite()
            && self.angle.is_finite()
    }

    pub fn to_conic(self) -> ConicCoeffs {
        ellipse_to_conic(&self)
    }

    /// Rebuild the geometric ellipse from a stored record.
    pub fn from_record(r: &EllipseRecord) -> Self {
        Self {
            cx: r.center_x as f64,
            cy: r.center_y as f64,
            a: r.major_axis as f64 / 2.0,
            b: r.minor_axis as f64 / 2.0,
            angle: (r.rotation_angle as f64).to_radians(),
        }
    }

    /// Full-axis record with the angle in degrees, normalized to [0, 180).
    pub fn to_record(&self) -> EllipseRecord {
        EllipseRecord {
            center_x: self.cx as f32,
            center_y: self.cy as f32,
            major_axis: (2.0 * self.a) as f32,
            minor_axis: (2.0 * self.b) as f32,
            rotation_angle: degrees_half_turn(self.angle),
        }
    }

    /// Sample `n` points on the ellipse boundary.
    pub fn sample_points(&self, n: usize) -> Vec<[f64; 2]> {
        let cos_a = self.angle.cos();
        let sin_a = self.angle.sin();
        (0..n)
            .map(|i| {
                let t = 2.0 * std::f64::consts::PI * (i as f64) / (n as f64);
                let px = self.a * t.cos();
                let py = self.b * t.sin();
                [
                    self.cx + cos_a * px - sin_a * py,
                    self.cy + sin_a * px + cos_a * py,
                ]
            })
            .collect()
    }

    /// First-order geometric distance from a point to the boundary
    /// (algebraic distance over gradient magnitude).
    pub fn sampson_distance(&self, x: f64, y: f64) -> f64 {
        let c = self.to_conic();
        let [ca, cb, cc, cd, ce, _] = c.0;
        let alg = c.algebraic_distance(x, y);
        let gx = 2.0 * ca * x + cb * y + cd;
        let gy = cb * x + 2.0 * cc * y + ce;
        let grad_mag_sq = gx * gx + gy * gy;
        if grad_mag_sq < 1e-30 {
            return alg.abs();
        }
        alg.abs() / grad_mag_sq.sqrt()
    }

    /// Half extents of the axis-aligned bounding box.
    pub fn half_extents(&self) -> [f64; 2] {
        let (s, c) = self.angle.sin_cos();
        [
            (self.a * self.a * c * c + self.b * self.b * s * s).sqrt(),
            (self.a * self.a * s * s + self.b * self.b * c * c).sqrt(),
        ]
    }

    /// The same ellipse after the image is stretched by `sx` along x and
    /// `sy` along y. Unequal factors change axes and angle together.
    pub fn scaled(&self, sx: f64, sy: f64) -> Option<Ellipse> {
        if !(sx > 0.0 && sy > 0.0) {
            return None;
        }
        let [a, b, c, d, e, f] = self.to_conic().0;
        ConicCoeffs([
            a / (sx * sx),
            b / (sx * sy),
            c / (sy * sy),
            d / sx,
            e / sy,
            f,
        ])
        .to_ellipse()
    }
}

/// Convert radians to degrees in [0, 180), stable under f32 rounding.
fn degrees_half_turn(angle: f64) -> f32 {
    let deg = angle.to_degrees().rem_euclid(180.0) as f32;
    if deg.is_nan() || deg >= 180.0 {
        0.0
    } else {
        deg
    }
}

/// Convert general conic coefficients to geometric ellipse parameters.
///
/// Center is the gradient-zero point; semi-axes come from the eigenvalues of
/// the quadratic part evaluated at the center.
pub fn conic_to_ellipse(c: &ConicCoeffs) -> Option<Ellipse> {
    let [a, b, c_coeff, d, e, f] = c.0;

    if c.discriminant() >= 0.0 {
        return None;
    }

    let m = Matrix3::new(
        a,
        b / 2.0,
        d / 2.0,
        b / 2.0,
        c_coeff,
        e / 2.0,
        d / 2.0,
        e / 2.0,
        f,
    );
    if m.determinant().abs() < 1e-15 {
        return None;
    }

    //   2A·cx + B·cy + D = 0
    //   B·cx + 2C·cy + E = 0
    let denom = 4.0 * a * c_coeff - b * b;
    let cx = (b * e - 2.0 * c_coeff * d) / denom;
    let cy = (b * d - 2.0 * a * e) / denom;

    let angle = if (a - c_coeff).abs() < 1e-15 {
        if b > 0.0 {
            std::f64::consts::FRAC_PI_4
        } else if b < 0.0 {
            -std::f64::consts::FRAC_PI_4
        } else {
            0.0
        }
    } else {
        0.5 * b.atan2(a - c_coeff)
    };

    let sum = a + c_coeff;
    let diff = ((a - c_coeff).powi(2) + b * b).sqrt();
    let lambda1 = (sum + diff) / 2.0;
    let lambda2 = (sum - diff) / 2.0;

    let f_center = c.algebraic_distance(cx, cy);
    if f_center.abs() < 1e-15 {
        return None;
    }

    let a_sq = -f_center / lambda1;
    let b_sq = -f_center / lambda2;
    if a_sq <= 0.0 || b_sq <= 0.0 {
        return None;
    }

    let semi_a = a_sq.sqrt();
    let semi_b = b_sq.sqrt();

    // `angle` follows the eigenvector of lambda1, i.e. the shorter axis when
    // lambda1 > lambda2.
    let (semi_a, semi_b, angle) = if semi_a >= semi_b {
        (semi_a, semi_b, angle)
    } else {
        (semi_b, semi_a, angle + std::f64::consts::FRAC_PI_2)
    };

    Some(Ellipse {
        cx,
        cy,
        a: semi_a,
        b: semi_b,
        angle: normalize_angle(angle),
    })
}

/// Convert geometric ellipse parameters to general conic coefficients.
pub fn ellipse_to_conic(e: &Ellipse) -> ConicCoeffs {
    let cos_a = e.angle.cos();
    let sin_a = e.angle.sin();
    let a2 = e.a * e.a;
    let b2 = e.b * e.b;

    let ca = cos_a * cos_a / a2 + sin_a * sin_a / b2;
    let cb = 2.0 * cos_a * sin_a * (1.0 / a2 - 1.0 / b2);
    let cc = sin_a * sin_a / a2 + cos_a * cos_a / b2;
    let cd = -2.0 * ca * e.cx - cb * e.cy;
    let ce = -cb * e.cx - 2.0 * cc * e.cy;
    let cf = ca * e.cx * e.cx + cb * e.cx * e.cy + cc * e.cy * e.cy - 1.0;

    ConicCoeffs([ca, cb, cc, cd, ce, cf])
}

/// Normalize angle to (−π/2, π/2].
fn normalize_angle(mut angle: f64) -> f64 {
    let pi = std::f64::consts::PI;
    while angle > pi / 2.0 {
        angle -= pi;
    }
    while angle <= -pi / 2.0 {
        angle += pi;
    }
    angle
}
