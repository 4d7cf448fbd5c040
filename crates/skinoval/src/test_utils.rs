//! Shared synthetic-mask helpers for unit tests.

use crate::mask::{mask_from_fn, Mask};

/// Filled disc: pixel centers within `radius` of `center`.
pub(crate) fn draw_disc_mask(w: u32, h: u32, center: [f64; 2], radius: f64) -> Mask {
    draw_ellipse_mask(w, h, center, [radius, radius], 0.0)
}

/// Filled rotated ellipse with semi-axes `axes` and `angle` in radians.
pub(crate) fn draw_ellipse_mask(
    w: u32,
    h: u32,
    center: [f64; 2],
    axes: [f64; 2],
    angle: f64,
) -> Mask {
    let (sa, ca) = angle.sin_cos();
    mask_from_fn(w, h, |x, y| {
        let dx = x as f64 - center[0];
        let dy = y as f64 - center[1];
        let xr = ca * dx + sa * dy;
        let yr = -sa * dx + ca * dy;
        (xr / axes[0]).powi(2) + (yr / axes[1]).powi(2) <= 1.0
    })
}

