//! Error taxonomy.
//!
//! Per-item errors ([`ItemError`], [`FitError`]) never escape a worker: the
//! orchestrator turns them into failure entries. [`ConfigError`] is fatal and
//! is raised before any worker starts. [`RecordError`] only concerns readers
//! of finished `.bin` files.

use std::path::PathBuf;

use thiserror::Error;

/// Why a contour could not be turned into an ellipse.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    /// Fewer distinct points than needed to pin down a conic.
    #[error("too few contour points: need {needed} distinct, got {got}")]
    InsufficientPoints { needed: usize, got: usize },
    /// The solved conic is not a real, bounded ellipse.
    #[error("degenerate ellipse fit: {reason}")]
    Degenerate { reason: &'static str },
}

/// Failure of the single-image pipeline for one identifier.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("cannot decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("no usable foreground region in mask ({foreground} foreground pixels)")]
    EmptyMask { foreground: u64 },

    #[error(transparent)]
    Fit(#[from] FitError),

    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ItemError {
    /// Short machine-friendly kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Decode { .. } => "decode",
            Self::EmptyMask { .. } => "empty_mask",
            Self::Fit(FitError::InsufficientPoints { .. }) => "insufficient_points",
            Self::Fit(FitError::Degenerate { .. }) => "degenerate_fit",
            Self::Write { .. } => "write",
        }
    }
}

/// Reading back a `.bin` annotation failed.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("malformed ellipse record: expected 20 bytes, got {len}")]
    Malformed { len: usize },

    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Invalid or missing configuration. Aborts the whole run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{key} is not set")]
    Missing { key: &'static str },

    #[error("{key} is not a directory: {}", path.display())]
    NotADirectory { key: &'static str, path: PathBuf },

    #[error("invalid job range [{start}, {end}) for a dataset of {total} images")]
    Range { start: u32, end: u32, total: u32 },

    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Run-level failure of the orchestrator.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write failure report {}: {source}", path.display())]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}
