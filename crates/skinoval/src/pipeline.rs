//! Single-identifier pipeline: mask → largest region → ellipse → files.

use std::path::Path;

use image::RgbImage;

use crate::annotation::{write_annotation, EllipseRecord};
use crate::conic::{fit_ellipse_direct, rms_sampson_distance};
use crate::config::ExtractConfig;
use crate::error::{FitError, ItemError};
use crate::mask::load_mask;
use crate::region::select_largest_contour;
use crate::render;

/// Everything learned about one successfully processed identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemOutput {
    pub id: u32,
    pub record: EllipseRecord,
    /// Stored points of the selected boundary.
    pub contour_points: usize,
    /// Shoelace area of the selected boundary, square pixels.
    pub contour_area: f64,
    /// RMS Sampson residual of the boundary points against the fit.
    pub rms_residual: f64,
    /// Pixels inside the fitted oval at photo resolution, or at mask
    /// resolution when no photo is loaded.
    pub oval_pixels: u64,
}

/// Source photo, loaded only as far as the run needs it.
enum Photo {
    Dimensions(u32, u32),
    Decoded(RgbImage),
}

impl Photo {
    fn open(path: &Path, decode: bool) -> Result<Self, ItemError> {
        if !path.is_file() {
            return Err(ItemError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let decode_err = |source| ItemError::Decode {
            path: path.to_path_buf(),
            source,
        };
        if decode {
            Ok(Self::Decoded(image::open(path).map_err(decode_err)?.to_rgb8()))
        } else {
            let (w, h) = image::image_dimensions(path).map_err(decode_err)?;
            Ok(Self::Dimensions(w, h))
        }
    }

    fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Dimensions(w, h) => (*w, *h),
            Self::Decoded(img) => img.dimensions(),
        }
    }
}

/// Create the output directory and the rendering subdirectories the
/// configuration asks for.
pub fn create_output_dirs(cfg: &ExtractConfig) -> std::io::Result<()> {
    std::fs::create_dir_all(cfg.output.root())?;
    if cfg.save_masks {
        std::fs::create_dir_all(cfg.output.oval_mask_dir())?;
    }
    if cfg.save_overlays {
        std::fs::create_dir_all(cfg.output.overlay_dir())?;
    }
    Ok(())
}

/// Run the whole pipeline for `id`.
///
/// Renderings are written before the record, so a `.bin` on disk always
/// belongs to an item whose every requested output succeeded. Output
/// directories must already exist (see [`create_output_dirs`]).
pub fn extract_item(id: u32, cfg: &ExtractConfig) -> Result<ItemOutput, ItemError> {
    let mut mask = load_mask(&cfg.layout.mask_path(id))?;

    let photo = if cfg.needs_image() {
        Some(Photo::open(&cfg.layout.image_path(id), cfg.save_overlays)?)
    } else {
        None
    };

    if cfg.resize_to_image {
        if let Some(photo) = &photo {
            let (w, h) = photo.dimensions();
            if mask.dimensions() != (w, h) {
                tracing::trace!(id, from = ?mask.dimensions(), to = ?(w, h), "resizing mask");
                mask = mask.resized_to(w, h);
            }
        }
    }

    let contour = select_largest_contour(&mask, cfg.chain_approx)?;
    let points = contour.to_f64_points();
    let ellipse = fit_ellipse_direct(&points)?;
    let record = ellipse.to_record();
    let rms_residual = rms_sampson_distance(&ellipse, &points);

    // Renderings always match the photo when one is loaded, even if the fit
    // ran at mask resolution.
    let (mw, mh) = mask.dimensions();
    let (w, h) = photo.as_ref().map_or((mw, mh), Photo::dimensions);
    let drawn = if (w, h) == (mw, mh) {
        record
    } else {
        ellipse
            .scaled(w as f64 / mw as f64, h as f64 / mh as f64)
            .ok_or(FitError::Degenerate {
                reason: "ellipse lost while scaling to the photo",
            })?
            .to_record()
    };

    let oval_pixels = if cfg.save_masks {
        let oval = render::oval_mask(w, h, &drawn);
        render::save_png(&cfg.output.oval_mask_path(id), &oval)?;
        oval.pixels().filter(|p| p.0[0] != 0).count() as u64
    } else {
        render::count_inside(w, h, &drawn)
    };

    if let Some(Photo::Decoded(img)) = &photo {
        let overlay = render::draw_overlay(img, &drawn);
        render::save_jpeg(&cfg.output.overlay_path(id), &overlay)?;
    }

    write_annotation(&cfg.output.annotation_path(id), &record)?;

    tracing::debug!(
        id,
        points = contour.points.len(),
        area = contour.area,
        rms = rms_residual,
        oval_pixels,
        "ellipse fitted"
    );

    Ok(ItemOutput {
        id,
        record,
        contour_points: contour.points.len(),
        contour_area: contour.area,
        rms_residual,
        oval_pixels,
    })
}
