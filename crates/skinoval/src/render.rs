//! Diagnostic renderings of a fitted ellipse.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, GrayImage, ImageEncoder, Luma, Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;

use crate::annotation::EllipseRecord;
use crate::conic::Ellipse;
use crate::error::ItemError;

/// Outline color of overlays.
pub const OVERLAY_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
/// Outline stroke width in pixels.
pub const OVERLAY_STROKE: i32 = 3;
pub const JPEG_QUALITY: u8 = 90;

/// Inclusive pixel bounds of the ellipse clipped to the image, with the
/// membership test in the ellipse frame.
struct Interior {
    ellipse: Ellipse,
    cos: f64,
    sin: f64,
    x_range: (u32, u32),
    y_range: (u32, u32),
}

impl Interior {
    fn new(width: u32, height: u32, record: &EllipseRecord) -> Option<Self> {
        let ellipse = Ellipse::from_record(record);
        if !ellipse.is_valid() || width == 0 || height == 0 {
            return None;
        }
        let [hx, hy] = ellipse.half_extents();
        let clip = |lo: f64, hi: f64, size: u32| -> Option<(u32, u32)> {
            let lo = lo.floor().max(0.0);
            let hi = hi.ceil().min(size as f64 - 1.0);
            (lo <= hi).then(|| (lo as u32, hi as u32))
        };
        let x_range = clip(ellipse.cx - hx, ellipse.cx + hx, width)?;
        let y_range = clip(ellipse.cy - hy, ellipse.cy + hy, height)?;
        let (sin, cos) = ellipse.angle.sin_cos();
        Some(Self {
            ellipse,
            cos,
            sin,
            x_range,
            y_range,
        })
    }

    fn contains(&self, x: u32, y: u32) -> bool {
        let dx = x as f64 - self.ellipse.cx;
        let dy = y as f64 - self.ellipse.cy;
        let xr = self.cos * dx + self.sin * dy;
        let yr = -self.sin * dx + self.cos * dy;
        (xr / self.ellipse.a).powi(2) + (yr / self.ellipse.b).powi(2) <= 1.0
    }

    fn for_each_inside(&self, mut f: impl FnMut(u32, u32)) {
        for y in self.y_range.0..=self.y_range.1 {
            for x in self.x_range.0..=self.x_range.1 {
                if self.contains(x, y) {
                    f(x, y);
                }
            }
        }
    }
}

/// Binary image with 255 on every pixel center inside the ellipse.
pub fn oval_mask(width: u32, height: u32, record: &EllipseRecord) -> GrayImage {
    let mut img = GrayImage::new(width, height);
    if let Some(interior) = Interior::new(width, height, record) {
        interior.for_each_inside(|x, y| img.put_pixel(x, y, Luma([255])));
    }
    img
}

/// Number of pixel centers inside the ellipse.
pub fn count_inside(width: u32, height: u32, record: &EllipseRecord) -> u64 {
    let mut n = 0u64;
    if let Some(interior) = Interior::new(width, height, record) {
        interior.for_each_inside(|_, _| n += 1);
    }
    n
}

/// Copy of `image` with the ellipse outline stroked in [`OVERLAY_COLOR`].
pub fn draw_overlay(image: &RgbImage, record: &EllipseRecord) -> RgbImage {
    let mut canvas = image.clone();
    let ellipse = Ellipse::from_record(record);
    if !ellipse.is_valid() {
        return canvas;
    }
    // Ramanujan's perimeter estimate; two samples per pixel of arc length
    // leave no gaps between stamps.
    let (a, b) = (ellipse.a, ellipse.b);
    let h = ((a - b) / (a + b)).powi(2);
    let perimeter =
        std::f64::consts::PI * (a + b) * (1.0 + 3.0 * h / (10.0 + (4.0 - 3.0 * h).sqrt()));
    let samples = ((2.0 * perimeter).ceil() as usize).clamp(64, 1 << 16);

    let radius = OVERLAY_STROKE / 2;
    for [x, y] in ellipse.sample_points(samples) {
        draw_filled_circle_mut(
            &mut canvas,
            (x.round() as i32, y.round() as i32),
            radius,
            OVERLAY_COLOR,
        );
    }
    canvas
}

fn create(path: &Path) -> Result<BufWriter<File>, ItemError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| write_error(path, source))
}

fn write_error(path: &Path, source: std::io::Error) -> ItemError {
    ItemError::Write {
        path: path.to_path_buf(),
        source,
    }
}

fn encode_error(path: &Path, err: image::ImageError) -> ItemError {
    match err {
        image::ImageError::IoError(source) => write_error(path, source),
        other => write_error(path, std::io::Error::other(other)),
    }
}

pub fn save_png(path: &Path, img: &GrayImage) -> Result<(), ItemError> {
    let mut writer = create(path)?;
    PngEncoder::new(&mut writer)
        .write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::L8)
        .map_err(|e| encode_error(path, e))?;
    writer.flush().map_err(|e| write_error(path, e))
}

pub fn save_jpeg(path: &Path, img: &RgbImage) -> Result<(), ItemError> {
    let mut writer = create(path)?;
    JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY)
        .encode_image(img)
        .map_err(|e| encode_error(path, e))?;
    writer.flush().map_err(|e| write_error(path, e))
}
