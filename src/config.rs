//
// config.rs
// dcm-bids
//
// Runtime configuration resolved once from the CLI and passed into every pipeline step.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const DEFAULT_SOURCE_DIR: &str = "/mnt/keoki/experiments2/EmoRep/Emorep_BIDS/sourcedata";
pub const DEFAULT_RAW_DIR: &str = "/mnt/keoki/experiments2/EmoRep/Emorep_BIDS/rawdata";
pub const DEFAULT_DERIV_DIR: &str = "/mnt/keoki/experiments2/EmoRep/Emorep_BIDS/derivatives";
pub const DEFAULT_DCM2NIIX: &str = "dcm2niix";
pub const DEFAULT_PYDEFACE: &str = "pydeface";

pub const BIDS_VERSION: &str = "1.7.0";

/// Binaries used for the external conversion and defacing steps.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub dcm2niix: PathBuf,
    pub pydeface: PathBuf,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            dcm2niix: PathBuf::from(DEFAULT_DCM2NIIX),
            pydeface: PathBuf::from(DEFAULT_PYDEFACE),
        }
    }
}

/// Values written into the dataset-level metadata files.
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    pub name: String,
    pub authors: Vec<String>,
    pub bids_version: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            name: "EmoRep".to_string(),
            authors: Vec::new(),
            bids_version: BIDS_VERSION.to_string(),
        }
    }
}

/// Everything one pipeline invocation needs. Built from parsed arguments, never from globals.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    source_dir: PathBuf,
    raw_dir: PathBuf,
    deriv_dir: PathBuf,
    subject: String,
    deface: bool,
    pub tools: ToolConfig,
    pub dataset: DatasetConfig,
}

impl PipelineConfig {
    /// Validates the subject list; the pipeline handles exactly one subject per run.
    pub fn new(
        source_dir: PathBuf,
        raw_dir: PathBuf,
        deriv_dir: PathBuf,
        subjects: &[String],
    ) -> Result<Self> {
        let subject = match subjects {
            [single] => normalize_subject(single)?,
            [] => return Err(Error::InvalidInput("no subject given".into())),
            many => return Err(Error::TooManySubjects(many.len())),
        };

        Ok(Self {
            source_dir,
            raw_dir,
            deriv_dir,
            subject,
            deface: true,
            tools: ToolConfig::default(),
            dataset: DatasetConfig::default(),
        })
    }

    pub fn with_deface(mut self, deface: bool) -> Self {
        self.deface = deface;
        self
    }

    pub fn with_tools(mut self, tools: ToolConfig) -> Self {
        self.tools = tools;
        self
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn raw_dir(&self) -> &Path {
        &self.raw_dir
    }

    pub fn deriv_dir(&self) -> &Path {
        &self.deriv_dir
    }

    /// Bare subject ID, without the `sub-` prefix.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn deface(&self) -> bool {
        self.deface
    }
}

/// Accepts `ER0009` or `sub-ER0009`; rejects anything BIDS would not allow in a label.
fn normalize_subject(raw: &str) -> Result<String> {
    let id = raw.trim();
    let id = id.strip_prefix("sub-").unwrap_or(id);
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(Error::InvalidInput(format!(
            "subject ID {raw:?} must be non-empty and alphanumeric"
        )));
    }
    Ok(id.to_string())
}
