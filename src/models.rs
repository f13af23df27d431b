//
// models.rs
// dcm-bids
//
// Defines serializable data structures for discovered sessions, converter outputs, series summaries, events, and run reports.
//
// Thales Matheus Mendonça Santos - November 2025

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One `day<N>_<task>/DICOM` directory resolved to BIDS labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSource {
    /// Bare subject ID (`ER0009`).
    pub subject: String,
    /// Full session label (`ses-day2`).
    pub session: String,
    /// Bare task name (`movies`).
    pub task: String,
    pub dicom_dir: PathBuf,
}

impl SessionSource {
    pub fn subject_label(&self) -> String {
        format!("sub-{}", self.subject)
    }

    pub fn task_label(&self) -> String {
        format!("task-{}", self.task)
    }

    /// The `day<N>_<task>` directory holding `DICOM` and `Scanner_behav`.
    pub fn session_dir(&self) -> PathBuf {
        self.dicom_dir
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.dicom_dir.clone())
    }
}

/// A NIfTI image and the JSON sidecar sharing its base name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NiftiPair {
    pub nifti: PathBuf,
    pub sidecar: PathBuf,
}

/// Scan types the reorganization step knows how to place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanKind {
    Anat,
    Func,
}

impl ScanKind {
    /// Datatype folder under the session directory.
    pub fn folder(self) -> &'static str {
        match self {
            ScanKind::Anat => "anat",
            ScanKind::Func => "func",
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            ScanKind::Anat => "T1w",
            ScanKind::Func => "bold",
        }
    }
}

/// Header-level summary of one DICOM series inside a session directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub series_number: Option<i32>,
    pub series_description: Option<String>,
    pub protocol_name: Option<String>,
    pub modality: Option<String>,
    pub series_instance_uid: Option<String>,
    pub file_count: usize,
}

/// Subject-level fields read from the first readable file of a DICOM directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudySummary {
    pub patient_id: Option<String>,
    pub study_date: Option<String>,
    pub study_description: Option<String>,
    pub series: Vec<SeriesSummary>,
}

/// BIDS `dataset_description.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DatasetDescription {
    pub name: String,
    #[serde(rename = "BIDSVersion")]
    pub bids_version: String,
    pub dataset_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generated_by: Vec<GeneratedBy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GeneratedBy {
    pub name: String,
    pub version: String,
}

/// One row of a BIDS `_events.tsv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    pub onset: f64,
    pub duration: f64,
    pub trial_type: String,
    /// Optional passthrough columns, keyed by BIDS column name.
    pub extra: BTreeMap<String, String>,
}

/// SHA-256 of a file written during the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub path: PathBuf,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Skipped { reason: String },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step: String,
    #[serde(flatten)]
    pub status: StepStatus,
    pub artifacts: Vec<ArtifactRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub session: String,
    pub task: String,
    pub steps: Vec<StepOutcome>,
}

impl SessionReport {
    pub fn failed(&self) -> bool {
        self.steps
            .iter()
            .any(|s| matches!(s.status, StepStatus::Failed { .. }))
    }
}

/// Per-subject status report printed at the end of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectReport {
    pub subject: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Set when the subject failed before any session was processed.
    pub error: Option<String>,
    /// `dataset_description.json`, `README`, `.bidsignore`.
    pub dataset_files: Vec<ArtifactRecord>,
    pub sessions: Vec<SessionReport>,
}

impl SubjectReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && !self.sessions.iter().any(SessionReport::failed)
    }
}
