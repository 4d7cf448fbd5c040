//! Largest foreground region selection.
//!
//! Boundaries come from `imageproc`'s border-following contour extraction.
//! Only outer borders of top-level regions take part: holes and anything
//! nested inside a hole are ignored.

use imageproc::contours::{find_contours, BorderType};

use crate::error::ItemError;
use crate::mask::Mask;

/// How boundary points are stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainApprox {
    /// Every boundary pixel.
    None,
    /// Only the end points of horizontal, vertical and diagonal runs.
    #[default]
    Simple,
}

impl std::str::FromStr for ChainApprox {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "simple" => Ok(Self::Simple),
            other => Err(format!("unknown chain approximation '{other}' (none|simple)")),
        }
    }
}

/// Closed boundary polygon of one region.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub points: Vec<[i32; 2]>,
    /// Absolute shoelace area in square pixels.
    pub area: f64,
}

impl Contour {
    pub fn new(points: Vec<[i32; 2]>) -> Self {
        let area = polygon_area(&points);
        Self { points, area }
    }

    pub fn to_f64_points(&self) -> Vec<[f64; 2]> {
        self.points
            .iter()
            .map(|&[x, y]| [x as f64, y as f64])
            .collect()
    }
}

/// Absolute shoelace area of a closed polygon.
pub fn polygon_area(points: &[[i32; 2]]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(&[x0, y0], &[x1, y1])| x0 as i64 * y1 as i64 - x1 as i64 * y0 as i64)
        .sum();
    twice.abs() as f64 * 0.5
}

/// Outer borders of all top-level regions, in raster order of their first
/// pixel.
pub fn external_contours(mask: &Mask, approx: ChainApprox) -> Vec<Contour> {
    find_contours::<i32>(mask.as_image())
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| {
            let points: Vec<[i32; 2]> = c.points.iter().map(|p| [p.x, p.y]).collect();
            let points = match approx {
                ChainApprox::None => points,
                ChainApprox::Simple => compress_runs(&points),
            };
            Contour::new(points)
        })
        .collect()
}

/// Boundary of the largest-area external region. Ties keep the first one.
pub fn select_largest_contour(mask: &Mask, approx: ChainApprox) -> Result<Contour, ItemError> {
    let foreground = mask.foreground_count();
    if foreground == 0 {
        return Err(ItemError::EmptyMask { foreground });
    }

    let mut best: Option<Contour> = None;
    for contour in external_contours(mask, approx) {
        if best.as_ref().map_or(true, |b| contour.area > b.area) {
            best = Some(contour);
        }
    }

    match best {
        Some(c) if c.area > 0.0 => Ok(c),
        _ => Err(ItemError::EmptyMask { foreground }),
    }
}

/// Drop points that continue the step direction of their predecessor.
fn compress_runs(points: &[[i32; 2]]) -> Vec<[i32; 2]> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }
    let step = |a: [i32; 2], b: [i32; 2]| [(b[0] - a[0]).signum(), (b[1] - a[1]).signum()];
    (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let cur = points[i];
            let next = points[(i + 1) % n];
            step(prev, cur) != step(cur, next)
        })
        .map(|i| points[i])
        .collect()
}
