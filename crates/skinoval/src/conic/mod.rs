//! Ellipse fitting.
//!
//! Implements:
//! - Direct least-squares conic fit (Fitzgibbon et al., "Direct Least Square
//!   Fitting of Ellipses", 1999).
//! - Conversion between general conic coefficients and geometric ellipse
//!   parameters, and from those to the stored [`EllipseRecord`].
//! - Sampson residual for fit-quality reporting.
//!
//! [`EllipseRecord`]: crate::annotation::EllipseRecord

mod eigen;
mod fit;
mod types;

pub use fit::{
    fit_conic_direct, fit_ellipse_direct, fit_ellipse_record, rms_sampson_distance,
    MIN_FIT_POINTS,
};
pub use types::{conic_to_ellipse, ellipse_to_conic, ConicCoeffs, Ellipse};
