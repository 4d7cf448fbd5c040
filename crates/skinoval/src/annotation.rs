//! The 20-byte ellipse annotation record and its on-disk form.
//!
//! Layout (little-endian `f32`):
//!
//! | offset | field            |
//! |--------|------------------|
//! | 0      | `center_x`       |
//! | 4      | `center_y`       |
//! | 8      | `major_axis`     |
//! | 12     | `minor_axis`     |
//! | 16     | `rotation_angle` |

use std::path::{Path, PathBuf};

use crate::error::{ItemError, RecordError};

/// Size of one encoded record in bytes.
pub const RECORD_LEN: usize = 20;

/// Fitted ellipse as stored per image.
///
/// Axes are full lengths (diameters) with `major_axis >= minor_axis`.
/// `rotation_angle` is in degrees, in `[0, 180)`, from +x to the major axis.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EllipseRecord {
    pub center_x: f32,
    pub center_y: f32,
    pub major_axis: f32,
    pub minor_axis: f32,
    pub rotation_angle: f32,
}

impl EllipseRecord {
    fn fields(&self) -> [f32; 5] {
        [
            self.center_x,
            self.center_y,
            self.major_axis,
            self.minor_axis,
            self.rotation_angle,
        ]
    }

    /// Whether the record satisfies the axis-order and angle-range invariants.
    pub fn is_canonical(&self) -> bool {
        self.fields().iter().all(|v| v.is_finite())
            && self.major_axis >= self.minor_axis
            && self.minor_axis >= 0.0
            && (0.0..180.0).contains(&self.rotation_angle)
    }
}

/// Pack a record into its fixed 20-byte form.
pub fn encode(record: &EllipseRecord) -> [u8; RECORD_LEN] {
    let mut out = [0u8; RECORD_LEN];
    for (chunk, value) in out.chunks_exact_mut(4).zip(record.fields()) {
        chunk.copy_from_slice(&value.to_le_bytes());
    }
    out
}

/// Inverse of [`encode`]. Input must be exactly 20 bytes.
pub fn decode(bytes: &[u8]) -> Result<EllipseRecord, RecordError> {
    if bytes.len() != RECORD_LEN {
        return Err(RecordError::Malformed { len: bytes.len() });
    }
    let mut fields = [0f32; 5];
    for (value, chunk) in fields.iter_mut().zip(bytes.chunks_exact(4)) {
        *value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    let [center_x, center_y, major_axis, minor_axis, rotation_angle] = fields;
    Ok(EllipseRecord {
        center_x,
        center_y,
        major_axis,
        minor_axis,
        rotation_angle,
    })
}

/// `{dir}/{id:0width$}.bin`
pub fn annotation_path(dir: &Path, id: u32, id_width: usize) -> PathBuf {
    dir.join(format!("{id:0id_width$}.bin"))
}

/// Sibling temp file that [`write_atomic`] renames over `path`.
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Write `bytes` through [`temp_path`] and a rename, so a reader never
/// observes a partial file. The temp file is gone on every return.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = temp_path(path);
    let result = std::fs::write(&tmp, bytes).and_then(|()| std::fs::rename(&tmp, path));
    if result.is_err() {
        if let Err(e) = std::fs::remove_file(&tmp) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %tmp.display(), "cannot remove temp file: {e}");
            }
        }
    }
    result
}

pub fn write_annotation(path: &Path, record: &EllipseRecord) -> Result<(), ItemError> {
    write_atomic(path, &encode(record)).map_err(|source| ItemError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_annotation(path: &Path) -> Result<EllipseRecord, RecordError> {
    let bytes = std::fs::read(path).map_err(|source| RecordError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode(&bytes)
}
