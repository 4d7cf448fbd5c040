//! Parallel run over an identifier range.
//!
//! A dedicated rayon pool of exactly `workers` threads processes every
//! identifier once. Each worker folds its own successes and failures; the
//! per-worker tallies are merged after the join, and the failure report is
//! written once at the end.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::annotation::write_atomic;
use crate::config::ExtractConfig;
use crate::error::{ConfigError, JobError};
use crate::pipeline::{create_output_dirs, extract_item, ItemOutput};

/// Validated half-open identifier range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobRange {
    start: u32,
    end: u32,
}

impl JobRange {
    /// Requires `start < end <= total`.
    pub fn new(start: u32, end: u32, total: u32) -> Result<Self, ConfigError> {
        if start >= end || end > total {
            return Err(ConfigError::Range { start, end, total });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    /// Number of identifiers, never zero.
    pub fn id_count(&self) -> usize {
        (self.end - self.start) as usize
    }

    pub fn contains(&self, id: u32) -> bool {
        (self.start..self.end).contains(&id)
    }

    pub fn ids(&self) -> std::ops::Range<u32> {
        self.start..self.end
    }
}

/// One identifier that produced no record, as stored in `failed.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub identifier: u32,
    pub reason: String,
}

/// Per-item notification sent from worker threads.
#[derive(Debug, Clone, Copy)]
pub enum ItemEvent<'a> {
    Done(&'a ItemOutput),
    Failed(&'a FailureEntry),
}

/// Receives progress from worker threads.
pub trait ProgressSink: Sync {
    fn start(&self, _total: usize) {}
    fn item(&self, event: ItemEvent<'_>);
    fn finish(&self) {}
}

/// Discards all progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn item(&self, _event: ItemEvent<'_>) {}
}

#[derive(Debug)]
pub struct RunSummary {
    pub range: JobRange,
    pub succeeded: usize,
    /// This run's failures, sorted by identifier.
    pub failures: Vec<FailureEntry>,
    /// `failed.json`, when the run left one on disk.
    pub report_path: Option<PathBuf>,
    /// Sum of oval pixel counts over all successes.
    pub oval_pixels: u64,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

#[derive(Default)]
struct Tally {
    succeeded: usize,
    oval_pixels: u64,
    failures: Vec<FailureEntry>,
}

impl Tally {
    fn merge(mut self, other: Tally) -> Tally {
        self.succeeded += other.succeeded;
        self.oval_pixels += other.oval_pixels;
        self.failures.extend(other.failures);
        self
    }
}

/// Process every identifier of `cfg.range`.
///
/// Per-item errors never abort the run; they end up in
/// [`RunSummary::failures`] and in `failed.json`.
pub fn run(cfg: &ExtractConfig, progress: &dyn ProgressSink) -> Result<RunSummary, JobError> {
    create_output_dirs(cfg).map_err(|source| JobError::OutputDir {
        path: cfg.output.root().to_path_buf(),
        source,
    })?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(cfg.workers)
        .thread_name(|i| format!("skinoval-worker-{i}"))
        .build()?;

    let range = cfg.range;
    tracing::info!(
        start = range.start(),
        end = range.end(),
        workers = cfg.workers,
        output = %cfg.output.root().display(),
        "extraction started"
    );
    progress.start(range.id_count());
    let t0 = Instant::now();

    let tally = pool.install(|| {
        range
            .ids()
            .into_par_iter()
            .fold(Tally::default, |mut tally, id| {
                match extract_item(id, cfg) {
                    Ok(out) => {
                        tally.succeeded += 1;
                        tally.oval_pixels += out.oval_pixels;
                        progress.item(ItemEvent::Done(&out));
                    }
                    Err(err) => {
                        tracing::debug!(id, kind = err.kind(), "{err}");
                        remove_item_outputs(cfg, id);
                        let entry = FailureEntry {
                            identifier: id,
                            reason: err.to_string(),
                        };
                        progress.item(ItemEvent::Failed(&entry));
                        tally.failures.push(entry);
                    }
                }
                tally
            })
            .reduce(Tally::default, Tally::merge)
    });
    progress.finish();

    let mut failures = tally.failures;
    failures.sort_by_key(|f| f.identifier);
    let report_path = write_failure_report(&cfg.output.failure_report_path(), range, &failures)?;
    let elapsed = t0.elapsed();

    tracing::info!(
        succeeded = tally.succeeded,
        failed = failures.len(),
        oval_pixels = tally.oval_pixels,
        elapsed_ms = elapsed.as_millis() as u64,
        "extraction finished"
    );

    Ok(RunSummary {
        range,
        succeeded: tally.succeeded,
        failures,
        report_path,
        oval_pixels: tally.oval_pixels,
        elapsed,
    })
}

/// A failing id keeps no record and no renderings, neither from an earlier
/// run nor from a partial pass of this one.
fn remove_item_outputs(cfg: &ExtractConfig, id: u32) {
    let mut paths = vec![cfg.output.annotation_path(id)];
    if cfg.save_masks {
        paths.push(cfg.output.oval_mask_path(id));
    }
    if cfg.save_overlays {
        paths.push(cfg.output.overlay_path(id));
    }
    for path in paths {
        match std::fs::remove_file(&path) {
            Ok(()) => tracing::debug!(path = %path.display(), "removed stale output"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path.display(), "cannot remove stale output: {e}"),
        }
    }
}

/// Reason given to identifiers read from a report that only listed ids.
pub const LEGACY_REASON: &str = "listed by an earlier run";

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Full(FailureEntry),
    Bare(u32),
}

impl From<StoredEntry> for FailureEntry {
    fn from(entry: StoredEntry) -> Self {
        match entry {
            StoredEntry::Full(f) => f,
            StoredEntry::Bare(identifier) => FailureEntry {
                identifier,
                reason: LEGACY_REASON.to_owned(),
            },
        }
    }
}

/// Read a previous `failed.json`. A missing file is an empty list.
///
/// Both the entry objects written by [`run`] and a bare array of
/// identifiers are accepted.
pub fn read_failure_report(path: &Path) -> std::io::Result<Vec<FailureEntry>> {
    match std::fs::read(path) {
        Ok(bytes) => {
            let stored: Vec<StoredEntry> = serde_json::from_slice(&bytes)?;
            Ok(stored.into_iter().map(FailureEntry::from).collect())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// Merge this run's failures into `failed.json`.
///
/// Entries from earlier runs outside `range` are kept; entries inside it are
/// replaced by `failures`. An empty result removes the file, unless the file
/// could not be parsed: a report that was not understood is never deleted,
/// only overwritten by a non-empty one.
fn write_failure_report(
    path: &Path,
    range: JobRange,
    failures: &[FailureEntry],
) -> Result<Option<PathBuf>, JobError> {
    let report_err = |source| JobError::Report {
        path: path.to_path_buf(),
        source,
    };
    let (previous, understood) = match read_failure_report(path) {
        Ok(entries) => (entries, true),
        Err(e) => {
            tracing::warn!(path = %path.display(), "ignoring unreadable failure report: {e}");
            (Vec::new(), false)
        }
    };

    let mut merged: Vec<FailureEntry> = previous
        .into_iter()
        .filter(|f| !range.contains(f.identifier))
        .chain(failures.iter().cloned())
        .collect();
    merged.sort_by_key(|f| f.identifier);

    if merged.is_empty() {
        if !understood {
            return Ok(Some(path.to_path_buf()));
        }
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(report_err(e)),
        }
        return Ok(None);
    }

    let json = serde_json::to_vec_pretty(&merged).map_err(|e| report_err(e.into()))?;
    write_atomic(path, &json).map_err(report_err)?;
    Ok(Some(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u32, reason: &str) -> FailureEntry {
        FailureEntry {
            identifier: id,
            reason: reason.into(),
        }
    }

    #[test]
    fn range_validation() {
        assert!(JobRange::new(0, 1, 1).is_ok());
        assert!(matches!(
            JobRange::new(3, 3, 10),
            Err(ConfigError::Range { start: 3, end: 3, total: 10 })
        ));
        assert!(JobRange::new(4, 2, 10).is_err());
        assert!(JobRange::new(0, 11, 10).is_err());

        let r = JobRange::new(5, 8, 10).expect("valid");
        assert_eq!(r.id_count(), 3);
        assert!(r.contains(5) && r.contains(7) && !r.contains(8));
        assert_eq!(r.ids().collect::<Vec<_>>(), vec![5, 6, 7]);
    }

    #[test]
    fn report_merges_with_earlier_runs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("failed.json");

        let first = JobRange::new(0, 10, 100).expect("range");
        let written =
            write_failure_report(&path, first, &[entry(2, "a"), entry(7, "b")]).expect("write");
        assert_eq!(written.as_deref(), Some(path.as_path()));

        // A later run over [5, 20) drops 7, keeps 2, adds 15.
        let second = JobRange::new(5, 20, 100).expect("range");
        write_failure_report(&path, second, &[entry(15, "c")]).expect("write");
        let ids: Vec<u32> = read_failure_report(&path)
            .expect("read")
            .iter()
            .map(|f| f.identifier)
            .collect();
        assert_eq!(ids, vec![2, 15]);

        // Clearing every entry removes the file.
        let all = JobRange::new(0, 100, 100).expect("range");
        assert_eq!(write_failure_report(&path, all, &[]).expect("write"), None);
        assert!(!path.exists());
    }

    #[test]
    fn bare_id_report_is_merged() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("failed.json");
        std::fs::write(&path, "[3, 7, 42]").expect("write");

        let r = JobRange::new(0, 10, 100).expect("range");
        write_failure_report(&path, r, &[entry(5, "decode")]).expect("write");
        let merged = read_failure_report(&path).expect("read");
        assert_eq!(merged, vec![entry(5, "decode"), entry(42, LEGACY_REASON)]);
    }

    #[test]
    fn unparsable_report_is_never_deleted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("failed.json");
        std::fs::write(&path, "not json at all").expect("write");

        let r = JobRange::new(0, 10, 10).expect("range");
        let kept = write_failure_report(&path, r, &[]).expect("write");
        assert_eq!(kept.as_deref(), Some(path.as_path()));
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "not json at all");

        // A run with failures replaces it with a well-formed report.
        write_failure_report(&path, r, &[entry(1, "x")]).expect("write");
        assert_eq!(read_failure_report(&path).expect("read"), vec![entry(1, "x")]);
        assert!(!crate::annotation::temp_path(&path).exists());
    }

    #[test]
    fn no_failures_and_no_history_writes_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("failed.json");
        let r = JobRange::new(0, 3, 3).expect("range");
        assert_eq!(write_failure_report(&path, r, &[]).expect("write"), None);
        assert!(!path.exists());
    }

    #[test]
    fn report_is_a_json_array_of_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("failed.json");
        let r = JobRange::new(0, 3, 3).expect("range");
        write_failure_report(&path, r, &[entry(1, "no usable foreground")]).expect("write");
        let v: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).expect("read")).expect("json");
        assert_eq!(
            v,
            serde_json::json!([{ "identifier": 1, "reason": "no usable foreground" }])
        );
    }
}
