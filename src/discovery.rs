//
// discovery.rs
// dcm-bids
//
// Finds a subject's session DICOM directories and per-run behavioral logs, resolving BIDS labels from directory names.
//
// Thales Matheus Mendonça Santos - November 2025

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use glob::Pattern;
use regex::Regex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::SessionSource;

pub const DICOM_DIR_NAME: &str = "DICOM";
pub const BEHAVIOR_DIR_NAME: &str = "Scanner_behav";

/// `run<N>` / `run-<N>` marker in a file name or series description.
pub(crate) static RUN_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)run-?(\d+)").expect("run marker pattern compiles"));

/// Run number carried by `name`, if any.
pub(crate) fn run_marker(name: &str) -> Option<u32> {
    RUN_MARKER
        .captures(name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Default shape of a session directory: `day<N>_<task>`.
pub const DEFAULT_SESSION_PATTERN: &str = r"^day(?P<day>\d+)_(?P<task>[A-Za-z0-9]+)$";

/// Declarative naming rule for session directories.
///
/// The regex must expose `day` and `task` capture groups.
#[derive(Debug, Clone)]
pub struct SessionPattern {
    regex: Regex,
}

impl SessionPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| Error::InvalidInput(format!("invalid session pattern: {e}")))?;
        let names: Vec<_> = regex.capture_names().flatten().collect();
        if !names.contains(&"day") || !names.contains(&"task") {
            return Err(Error::InvalidInput(format!(
                "session pattern {pattern:?} must define `day` and `task` groups"
            )));
        }
        Ok(Self { regex })
    }

    /// Resolve `(session, task)` from a directory name, e.g. `day2_movies` -> `("ses-day2", "movies")`.
    pub fn labels(&self, dir_name: &str) -> Option<(String, String)> {
        let caps = self.regex.captures(dir_name)?;
        let day = caps.name("day")?.as_str();
        let task = caps.name("task")?.as_str();
        Some((format!("ses-day{day}"), task.to_string()))
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl Default for SessionPattern {
    fn default() -> Self {
        Self {
            regex: Regex::new(DEFAULT_SESSION_PATTERN).expect("default session pattern compiles"),
        }
    }
}

/// Enumerate `<source>/<subject>/day*/DICOM`, sorted by path.
///
/// A `day*` directory that does not fit the pattern is an error, and so is
/// finding nothing at all.
pub fn discover_sessions(
    source_dir: &Path,
    subject: &str,
    pattern: &SessionPattern,
) -> Result<Vec<SessionSource>> {
    let subject_dir = source_dir.join(subject);
    let glob_pattern = format!(
        "{}/day*/{}",
        Pattern::escape(&subject_dir.to_string_lossy()),
        DICOM_DIR_NAME
    );
    debug!(pattern = %glob_pattern, "searching for session DICOM directories");

    let mut dicom_dirs = Vec::new();
    for entry in glob::glob(&glob_pattern)? {
        let path = entry.map_err(|e| {
            let path = e.path().to_path_buf();
            Error::io(path, std::io::Error::from(e))
        })?;
        if path.is_dir() {
            dicom_dirs.push(path);
        }
    }
    dicom_dirs.sort();

    if dicom_dirs.is_empty() {
        return Err(Error::NoMatchingInput(format!(
            "no {}/day*/{DICOM_DIR_NAME} directories under {}",
            subject,
            source_dir.display()
        )));
    }

    dicom_dirs
        .into_iter()
        .map(|dicom_dir| session_from_dicom_dir(subject, dicom_dir, pattern))
        .collect()
}

fn session_from_dicom_dir(
    subject: &str,
    dicom_dir: PathBuf,
    pattern: &SessionPattern,
) -> Result<SessionSource> {
    let session_dir = dicom_dir.parent().unwrap_or(&dicom_dir);
    let name = session_dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    let (session, task) = pattern.labels(name).ok_or_else(|| Error::InvalidSessionDir {
        path: session_dir.to_path_buf(),
        expected: pattern.as_str().to_string(),
    })?;

    Ok(SessionSource {
        subject: subject.to_string(),
        session,
        task,
        dicom_dir,
    })
}

/// A behavioral log for one functional run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BehaviorRun {
    pub run: u32,
    pub csv: PathBuf,
}

impl BehaviorRun {
    /// Zero-padded BIDS run label, e.g. `run-01`.
    pub fn label(&self) -> String {
        format!("run-{:02}", self.run)
    }
}

/// Collect `Scanner_behav/*run-<N>*.csv` next to the session's DICOM directory.
///
/// A session without a `Scanner_behav` directory yields an empty list.
pub fn discover_behavior_runs(session: &SessionSource) -> Result<Vec<BehaviorRun>> {
    let behav_dir = session.session_dir().join(BEHAVIOR_DIR_NAME);
    if !behav_dir.is_dir() {
        return Ok(Vec::new());
    }

    let glob_pattern = format!("{}/*.csv", Pattern::escape(&behav_dir.to_string_lossy()));

    let mut runs: BTreeMap<u32, PathBuf> = BTreeMap::new();
    for entry in glob::glob(&glob_pattern)? {
        let path = entry.map_err(|e| {
            let path = e.path().to_path_buf();
            Error::io(path, std::io::Error::from(e))
        })?;
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(run) = run_marker(name) else {
            debug!(file = %path.display(), "skipping CSV without a run number");
            continue;
        };
        if let Some(existing) = runs.insert(run, path.clone()) {
            return Err(Error::InvalidInput(format!(
                "run {run} has two behavioral logs: {} and {}",
                existing.display(),
                path.display()
            )));
        }
    }

    Ok(runs
        .into_iter()
        .map(|(run, csv)| BehaviorRun { run, csv })
        .collect())
}
