//! Binary skin masks.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};

use crate::error::ItemError;

/// Foreground value after binarization.
pub const FOREGROUND: u8 = 255;

/// Binary mask: every pixel is either 0 (background) or [`FOREGROUND`].
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    pixels: GrayImage,
}

impl Mask {
    /// Binarize a luma image: any value above zero becomes foreground.
    pub fn from_luma(img: &GrayImage) -> Self {
        let mut pixels = img.clone();
        for p in pixels.pixels_mut() {
            p.0[0] = if p.0[0] > 0 { FOREGROUND } else { 0 };
        }
        Self { pixels }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn foreground_count(&self) -> u64 {
        self.pixels.pixels().filter(|p| p.0[0] != 0).count() as u64
    }

    /// Nearest-neighbour rescale. Binary values survive unchanged.
    pub fn resized_to(&self, width: u32, height: u32) -> Self {
        if self.dimensions() == (width, height) {
            return self.clone();
        }
        Self {
            pixels: imageops::resize(&self.pixels, width, height, FilterType::Nearest),
        }
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.pixels
    }
}

impl From<GrayImage> for Mask {
    fn from(img: GrayImage) -> Self {
        Self::from_luma(&img)
    }
}

/// Decode a mask file. Color or 16-bit inputs are reduced to 8-bit luma
/// before thresholding.
pub fn load_mask(path: &Path) -> Result<Mask, ItemError> {
    if !path.is_file() {
        return Err(ItemError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let img = image::open(path).map_err(|source| ItemError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Mask::from_luma(&img.to_luma8()))
}

/// Build a mask from a per-pixel predicate.
pub fn mask_from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> bool) -> Mask {
    let pixels = GrayImage::from_fn(width, height, |x, y| {
        Luma([if f(x, y) { FOREGROUND } else { 0 }])
    });
    Mask { pixels }
}
