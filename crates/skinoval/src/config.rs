//! Layered run configuration.
//!
//! Resolution order, later layers winning:
//! 1. built-in defaults ([`Settings::default`]),
//! 2. an optional TOML file,
//! 3. command-line [`Overrides`].
//!
//! [`Settings::resolve`] validates the merged settings once and produces the
//! immutable [`ExtractConfig`] shared by every worker.
//!
//! ```toml
//! workers = 8
//!
//! [paths]
//! image_dir = "CelebA-HQ-img"
//! mask_dir = "CelebAMask-HQ-mask-skin"
//! output_dir = "ellipses"
//!
//! [dataset]
//! total_images = 30000
//! images_per_folder = 2000
//!
//! [processing]
//! start = 0
//! save_overlays = true
//! chain_approx = "simple"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::dataset::{DatasetLayout, OutputLayout};
use crate::error::ConfigError;
use crate::job::JobRange;
use crate::region::ChainApprox;

/// File looked up in the working directory when no config path is given.
pub const DEFAULT_CONFIG_NAME: &str = "skinoval.toml";

pub const DEFAULT_TOTAL_IMAGES: u32 = 30_000;
pub const DEFAULT_IMAGES_PER_FOLDER: u32 = 2_000;
pub const DEFAULT_ID_WIDTH: usize = 5;
const MAX_ID_WIDTH: usize = 9;

/// Merged, not yet validated settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub image_dir: Option<PathBuf>,
    pub mask_dir: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub total_images: u32,
    pub images_per_folder: u32,
    pub id_width: usize,
    pub start: u32,
    /// `None` means "through the last image".
    pub end: Option<u32>,
    pub save_masks: bool,
    pub save_overlays: bool,
    pub resize_to_image: bool,
    pub chain_approx: ChainApprox,
    pub workers: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            image_dir: None,
            mask_dir: None,
            output_dir: PathBuf::from("output"),
            total_images: DEFAULT_TOTAL_IMAGES,
            images_per_folder: DEFAULT_IMAGES_PER_FOLDER,
            id_width: DEFAULT_ID_WIDTH,
            start: 0,
            end: None,
            save_masks: false,
            save_overlays: false,
            resize_to_image: true,
            chain_approx: ChainApprox::default(),
            workers: default_workers(),
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    workers: Option<usize>,
    paths: Option<PathsSection>,
    dataset: Option<DatasetSection>,
    processing: Option<ProcessingSection>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PathsSection {
    image_dir: Option<PathBuf>,
    mask_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DatasetSection {
    total_images: Option<u32>,
    images_per_folder: Option<u32>,
    id_width: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ProcessingSection {
    start: Option<u32>,
    end: Option<u32>,
    save_masks: Option<bool>,
    save_overlays: Option<bool>,
    resize_to_image: Option<bool>,
    chain_approx: Option<ChainApprox>,
}

/// Command-line layer. Every field left `None` keeps the lower layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub image_dir: Option<PathBuf>,
    pub mask_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub start: Option<u32>,
    pub end: Option<u32>,
    pub save_masks: Option<bool>,
    pub save_overlays: Option<bool>,
    pub resize_to_image: Option<bool>,
    pub chain_approx: Option<ChainApprox>,
    pub workers: Option<usize>,
}

/// Fully validated configuration of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractConfig {
    pub layout: DatasetLayout,
    pub output: OutputLayout,
    pub range: JobRange,
    pub save_masks: bool,
    pub save_overlays: bool,
    pub resize_to_image: bool,
    pub chain_approx: ChainApprox,
    pub workers: usize,
}

impl ExtractConfig {
    /// Whether the source photo must be opened for an item.
    pub fn needs_image(&self) -> bool {
        self.resize_to_image || self.save_overlays
    }
}

impl Settings {
    /// Defaults merged with a config file.
    ///
    /// An explicit `path` must exist and parse. Without one,
    /// [`DEFAULT_CONFIG_NAME`] in the working directory is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let settings = Self::default();
        match path {
            Some(p) => settings.with_file(p),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_NAME);
                if fallback.is_file() {
                    settings.with_file(fallback)
                } else {
                    Ok(settings)
                }
            }
        }
    }

    /// Layer a TOML file over `self`.
    pub fn with_file(self, path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.with_toml_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn with_toml_str(mut self, raw: &str) -> Result<Self, toml::de::Error> {
        let file: SettingsFile = toml::from_str(raw)?;
        if let Some(w) = file.workers {
            self.workers = w;
        }
        let paths = file.paths.unwrap_or_default();
        if let Some(d) = paths.image_dir {
            self.image_dir = Some(d);
        }
        if let Some(d) = paths.mask_dir {
            self.mask_dir = Some(d);
        }
        if let Some(d) = paths.output_dir {
            self.output_dir = d;
        }
        let dataset = file.dataset.unwrap_or_default();
        if let Some(n) = dataset.total_images {
            self.total_images = n;
        }
        if let Some(n) = dataset.images_per_folder {
            self.images_per_folder = n;
        }
        if let Some(n) = dataset.id_width {
            self.id_width = n;
        }
        let processing = file.processing.unwrap_or_default();
        if let Some(n) = processing.start {
            self.start = n;
        }
        if processing.end.is_some() {
            self.end = processing.end;
        }
        if let Some(b) = processing.save_masks {
            self.save_masks = b;
        }
        if let Some(b) = processing.save_overlays {
            self.save_overlays = b;
        }
        if let Some(b) = processing.resize_to_image {
            self.resize_to_image = b;
        }
        if let Some(c) = processing.chain_approx {
            self.chain_approx = c;
        }
        Ok(self)
    }

    /// Layer command-line overrides over `self`.
    pub fn with_overrides(mut self, o: &Overrides) -> Self {
        if let Some(d) = &o.image_dir {
            self.image_dir = Some(d.clone());
        }
        if let Some(d) = &o.mask_dir {
            self.mask_dir = Some(d.clone());
        }
        if let Some(d) = &o.output_dir {
            self.output_dir = d.clone();
        }
        self.start = o.start.unwrap_or(self.start);
        if o.end.is_some() {
            self.end = o.end;
        }
        self.save_masks = o.save_masks.unwrap_or(self.save_masks);
        self.save_overlays = o.save_overlays.unwrap_or(self.save_overlays);
        self.resize_to_image = o.resize_to_image.unwrap_or(self.resize_to_image);
        self.chain_approx = o.chain_approx.unwrap_or(self.chain_approx);
        self.workers = o.workers.unwrap_or(self.workers);
        self
    }

    /// Validate and freeze.
    pub fn resolve(self) -> Result<ExtractConfig, ConfigError> {
        if self.images_per_folder == 0 {
            return Err(ConfigError::Invalid {
                key: "dataset.images_per_folder",
                message: "must be at least 1".into(),
            });
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid {
                key: "workers",
                message: "must be at least 1".into(),
            });
        }
        if !(1..=MAX_ID_WIDTH).contains(&self.id_width) {
            return Err(ConfigError::Invalid {
                key: "dataset.id_width",
                message: format!("must be between 1 and {MAX_ID_WIDTH}"),
            });
        }
        let range = JobRange::new(
            self.start,
            self.end.unwrap_or(self.total_images),
            self.total_images,
        )?;

        let mask_dir = require_dir("paths.mask_dir", self.mask_dir)?;
        let needs_image = self.resize_to_image || self.save_overlays;
        let image_dir = match self.image_dir {
            Some(d) if needs_image => require_dir("paths.image_dir", Some(d))?,
            Some(d) => d,
            None if needs_image => return Err(ConfigError::Missing { key: "paths.image_dir" }),
            None => PathBuf::new(),
        };

        Ok(ExtractConfig {
            layout: DatasetLayout {
                image_dir,
                mask_dir,
                images_per_folder: self.images_per_folder,
                id_width: self.id_width,
            },
            output: OutputLayout {
                output_dir: self.output_dir,
                id_width: self.id_width,
            },
            range,
            save_masks: self.save_masks,
            save_overlays: self.save_overlays,
            resize_to_image: self.resize_to_image,
            chain_approx: self.chain_approx,
            workers: self.workers,
        })
    }
}

fn require_dir(key: &'static str, dir: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    let dir = dir.ok_or(ConfigError::Missing { key })?;
    if !dir.is_dir() {
        return Err(ConfigError::NotADirectory { key, path: dir });
    }
    Ok(dir)
}
