//! skinoval: rotated-ellipse annotations from face-skin segmentation masks.
//!
//! For every image of a fixed-size collection the pipeline stages are:
//!
//! 1. **Mask** – decode the skin mask and binarize it (any value > 0 is skin),
//!    optionally rescaled to the photo resolution.
//! 2. **Region** – border-following contour extraction, keep the outer
//!    boundary of the largest top-level region.
//! 3. **Conic** – direct least-squares ellipse fit of the boundary points.
//! 4. **Annotation** – fixed 20-byte record per image.
//! 5. **Render** – optional oval mask and overlay images.
//!
//! [`job::run`] drives all stages over an identifier range on a worker pool
//! and collects per-item failures into `failed.json`.
//!
//! # Public API
//! - [`Settings`] / [`Overrides`] → [`ExtractConfig`] for configuration
//! - [`run`] and [`extract_item`] as entry points
//! - [`EllipseRecord`] with [`encode`] / [`decode`] for the stored format

pub mod annotation;
pub mod config;
pub mod conic;
pub mod dataset;
pub mod error;
pub mod job;
pub mod mask;
pub mod pipeline;
pub mod region;
pub mod render;

#[cfg(test)]
pub(crate) mod test_utils;

pub use annotation::{decode, encode, read_annotation, EllipseRecord, RECORD_LEN};
pub use config::{ExtractConfig, Overrides, Settings};
pub use conic::{fit_ellipse_direct, fit_ellipse_record, rms_sampson_distance, Ellipse};
pub use error::{ConfigError, FitError, ItemError, JobError, RecordError};
pub use job::{run, FailureEntry, ItemEvent, JobRange, NoProgress, ProgressSink, RunSummary};
pub use mask::{load_mask, Mask};
pub use pipeline::{extract_item, ItemOutput};
pub use region::{select_largest_contour, ChainApprox, Contour};
