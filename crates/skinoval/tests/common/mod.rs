#![allow(dead_code)]

use std::path::{Path, PathBuf};

use image::{GrayImage, Luma};
use skinoval::{ExtractConfig, Settings};

/// Temporary dataset with the bucketed mask layout.
pub struct Dataset {
    pub root: tempfile::TempDir,
    pub images_per_folder: u32,
}

impl Dataset {
    pub fn new(images_per_folder: u32) -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(root.path().join("masks")).expect("mkdir");
        std::fs::create_dir_all(root.path().join("images")).expect("mkdir");
        Self {
            root,
            images_per_folder,
        }
    }

    pub fn mask_dir(&self) -> PathBuf {
        self.root.path().join("masks")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.path().join("out")
    }

    pub fn mask_path(&self, id: u32) -> PathBuf {
        self.mask_dir()
            .join((id / self.images_per_folder).to_string())
            .join(format!("{id:05}_skin.png"))
    }

    pub fn put_mask(&self, id: u32, img: &GrayImage) {
        let path = self.mask_path(id);
        std::fs::create_dir_all(path.parent().expect("bucket dir")).expect("mkdir");
        img.save(&path).expect("save mask");
    }

    pub fn put_raw(&self, id: u32, bytes: &[u8]) {
        let path = self.mask_path(id);
        std::fs::create_dir_all(path.parent().expect("bucket dir")).expect("mkdir");
        std::fs::write(&path, bytes).expect("write");
    }

    /// Mask-only settings over `[start, end)` of a dataset of `total` images.
    pub fn settings(&self, start: u32, end: u32, total: u32, workers: usize) -> Settings {
        Settings {
            mask_dir: Some(self.mask_dir()),
            output_dir: self.output_dir(),
            total_images: total,
            images_per_folder: self.images_per_folder,
            start,
            end: Some(end),
            resize_to_image: false,
            workers,
            ..Settings::default()
        }
    }

    pub fn config(&self, start: u32, end: u32, total: u32, workers: usize) -> ExtractConfig {
        self.settings(start, end, total, workers)
            .resolve()
            .expect("valid config")
    }
}

/// Filled rotated ellipse on a black background.
pub fn ellipse_mask(w: u32, h: u32, center: [f64; 2], axes: [f64; 2], angle: f64) -> GrayImage {
    let (sa, ca) = angle.sin_cos();
    GrayImage::from_fn(w, h, |x, y| {
        let dx = x as f64 - center[0];
        let dy = y as f64 - center[1];
        let xr = ca * dx + sa * dy;
        let yr = -sa * dx + ca * dy;
        let inside = (xr / axes[0]).powi(2) + (yr / axes[1]).powi(2) <= 1.0;
        Luma([if inside { 255 } else { 0 }])
    })
}

pub fn disc_mask(w: u32, h: u32, center: [f64; 2], radius: f64) -> GrayImage {
    ellipse_mask(w, h, center, [radius, radius], 0.0)
}

pub fn bin_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("read_dir")
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".bin"))
        .collect();
    names.sort();
    names
}
