//! Typed paths into a recorded run and pure asset-name derivation.
//!
//! Naming functions are total and filesystem-free; `TraceAssets` is the only
//! place that touches disk when resolving a name to a path.
use crate::error::OracleError;
use crate::trace::Step;
use std::path::{Path, PathBuf};

const AUGMENTED_SUFFIX: &str = "_augmented";
const USER_TRACE_MARKER: &str = ".User-Trace";
/// Directories (relative to the run directory) searched for UI-tree dumps.
const UI_TREE_DIRS: [&str; 2] = ["", "xmls"];

/// Plain screen name for an augmented capture.
pub fn plain_screen_name(screenshot: &str) -> String {
    screenshot.replace(AUGMENTED_SUFFIX, "")
}

/// Capture taken at interaction time (`augmented` -> `gui`).
pub fn interaction_capture_name(screenshot: &str) -> String {
    screenshot.replace("augmented", "gui")
}

/// Plain screen name of step `target`, derived from the capture of step `sequence_index`.
///
/// Returns `None` when the capture does not end in `<sequence_index>_augmented`.
pub fn screen_name_at(screenshot: &str, sequence_index: u32, target: u32) -> Option<String> {
    let marker = format!("{sequence_index}{AUGMENTED_SUFFIX}");
    let (prefix, _) = screenshot.split_once(&marker)?;
    Some(format!("{prefix}{target}.png"))
}

/// UI-tree dump names for a capture, primary scheme first.
///
/// Primary: `<app>-<version>-<run>-User-Trace-<step>.xml`.
/// Fallback: `<d0>.<d1>.<d2>-<label>-<run>-<d4>-<d3>-<step>.xml`, where `dN` are
/// the dot-separated fields of the capture name and `<label>` its third
/// underscore-separated field. A scheme the name cannot satisfy is omitted.
pub fn ui_tree_candidates(screenshot: &str, run_id: &str, sequence_index: u32) -> Vec<String> {
    let mut candidates = Vec::new();
    let underscore: Vec<&str> = screenshot.split('_').collect();

    if let Some((app, _)) = screenshot.split_once(USER_TRACE_MARKER) {
        if let Some(version) = underscore.get(1).filter(|field| !field.is_empty()) {
            candidates.push(format!(
                "{app}-{version}-{run_id}-User-Trace-{sequence_index}.xml"
            ));
        }
    }

    let dots: Vec<&str> = screenshot.split('.').collect();
    if dots.len() >= 5 {
        if let Some(label) = underscore.get(2).filter(|field| !field.is_empty()) {
            candidates.push(format!(
                "{}.{}.{}-{label}-{run_id}-{}-{}-{sequence_index}.xml",
                dots[0], dots[1], dots[2], dots[4], dots[3]
            ));
        }
    }

    candidates.dedup();
    candidates
}

/// Convenience wrapper for locating the assets of one recorded run.
#[derive(Debug, Clone)]
pub struct TraceAssets {
    run_dir: PathBuf,
    run_id: String,
}

impl TraceAssets {
    /// Create a helper for `<trace_root>/<run_id>/`.
    pub fn new(trace_root: &Path, run_id: &str) -> Self {
        Self {
            run_dir: trace_root.join(run_id),
            run_id: run_id.to_string(),
        }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Return the `Execution-<run>.json` path.
    pub fn execution_path(&self) -> PathBuf {
        self.run_dir.join(format!("Execution-{}.json", self.run_id))
    }

    /// Return the per-run `oracle.json` config path.
    pub fn config_path(&self) -> PathBuf {
        self.run_dir.join("oracle.json")
    }

    /// Resolve a screen capture by name.
    pub fn screen(&self, name: &str) -> Result<PathBuf, OracleError> {
        let path = self.run_dir.join(name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(OracleError::missing(name, vec![path.display().to_string()]))
        }
    }

    /// Resolve the UI-tree dump for a step, trying each naming scheme in order.
    pub fn ui_tree(&self, step: &Step) -> Result<PathBuf, OracleError> {
        self.ui_tree_from(step.sequence_index, &step.ui_tree)
    }

    /// Resolve the first existing dump among `candidates`.
    pub fn ui_tree_from(
        &self,
        sequence_index: u32,
        candidates: &[String],
    ) -> Result<PathBuf, OracleError> {
        let mut tried = Vec::new();
        for name in candidates {
            for dir in UI_TREE_DIRS {
                let path = self.run_dir.join(dir).join(name);
                if path.is_file() {
                    return Ok(path);
                }
                tried.push(path.display().to_string());
            }
        }
        Err(OracleError::missing(
            format!("ui tree for step {sequence_index}"),
            tried,
        ))
    }
}
