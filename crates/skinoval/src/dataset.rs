//! On-disk layout of the source collection and of the produced outputs.

use std::path::{Path, PathBuf};

use crate::annotation::annotation_path;

/// Subdirectory of the output directory holding rendered oval masks.
pub const OVAL_MASK_DIR: &str = "oval_masks";
/// Subdirectory of the output directory holding overlay photos.
pub const OVERLAY_DIR: &str = "overlays";
/// Name of the aggregated failure report.
pub const FAILURE_REPORT: &str = "failed.json";

/// Where masks and photos live for a given identifier.
///
/// Masks are bucketed `images_per_folder` per numbered subdirectory:
/// `{mask_dir}/{id / images_per_folder}/{id:0w}_skin.png`. Photos are flat:
/// `{image_dir}/{id}.jpg`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLayout {
    pub image_dir: PathBuf,
    pub mask_dir: PathBuf,
    pub images_per_folder: u32,
    pub id_width: usize,
}

impl DatasetLayout {
    pub fn mask_path(&self, id: u32) -> PathBuf {
        let bucket = id / self.images_per_folder.max(1);
        self.mask_dir
            .join(bucket.to_string())
            .join(format!("{}_skin.png", format_id(id, self.id_width)))
    }

    pub fn image_path(&self, id: u32) -> PathBuf {
        self.image_dir.join(format!("{id}.jpg"))
    }
}

/// Output file naming under one output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub output_dir: PathBuf,
    pub id_width: usize,
}

impl OutputLayout {
    pub fn annotation_path(&self, id: u32) -> PathBuf {
        annotation_path(&self.output_dir, id, self.id_width)
    }

    pub fn oval_mask_dir(&self) -> PathBuf {
        self.output_dir.join(OVAL_MASK_DIR)
    }

    pub fn overlay_dir(&self) -> PathBuf {
        self.output_dir.join(OVERLAY_DIR)
    }

    pub fn oval_mask_path(&self, id: u32) -> PathBuf {
        self.oval_mask_dir()
            .join(format!("{}_oval_mask.png", format_id(id, self.id_width)))
    }

    pub fn overlay_path(&self, id: u32) -> PathBuf {
        self.overlay_dir()
            .join(format!("{}_overlay.jpg", format_id(id, self.id_width)))
    }

    pub fn failure_report_path(&self) -> PathBuf {
        self.output_dir.join(FAILURE_REPORT)
    }

    pub fn root(&self) -> &Path {
        &self.output_dir
    }
}

/// Zero-padded decimal identifier. Wider ids are never truncated.
pub fn format_id(id: u32, width: usize) -> String {
    format!("{id:0width$}")
}
