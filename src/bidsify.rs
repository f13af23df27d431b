//
// bidsify.rs
// dcm-bids
//
// Classifies converter output by scan type, moves it into BIDS anat/func paths, and writes dataset-level metadata.
//
// Thales Matheus Mendonça Santos - November 2025

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{info, warn};

use crate::config::DatasetConfig;
use crate::convert::nifti_stem;
use crate::discovery::run_marker;
use crate::error::{Error, Result};
use crate::models::{DatasetDescription, GeneratedBy, NiftiPair, ScanKind, SessionSource};

const ANAT_TOKENS: &[&str] = &["mprage", "t1w", "t1"];
const FUNC_TOKENS: &[&str] = &["bold", "epi", "fmri"];
/// Series that look functional or anatomical by name but are not the images BIDS wants here.
const EXCLUDED_TOKENS: &[&str] = &[
    "sbref", "scout", "localizer", "localiser", "aahead", "fieldmap", "fmap", "ph",
];

/// Converter file stem split into the parts `dcm2niix -f <prefix>_%3s_%d` encodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesName {
    pub series_number: Option<u32>,
    pub description: String,
}

impl SeriesName {
    /// Parse `sub-ER0009_ses-day2_003_EPI_movies` given the `sub-ER0009_ses-day2` prefix.
    pub fn parse(stem: &str, prefix: &str) -> Self {
        let rest = stem
            .strip_prefix(prefix)
            .map(|r| r.trim_start_matches('_'))
            .unwrap_or(stem);
        match rest.split_once('_') {
            Some((num, desc)) if num.chars().all(|c| c.is_ascii_digit()) => Self {
                series_number: num.parse().ok(),
                description: desc.to_string(),
            },
            _ => Self {
                series_number: None,
                description: rest.to_string(),
            },
        }
    }

    fn tokens(&self) -> Vec<String> {
        self.description
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_ascii_lowercase)
            .collect()
    }

    /// Explicit `run<N>` / `run-<N>` marker in the series description.
    fn run_marker(&self) -> Option<u32> {
        run_marker(&self.description)
    }
}

/// Decide where a series belongs from its description. `None` leaves it unclassified.
pub fn classify(name: &SeriesName, task: &str) -> Option<ScanKind> {
    let tokens = name.tokens();
    let has = |set: &[&str]| tokens.iter().any(|t| set.contains(&t.as_str()));

    if has(EXCLUDED_TOKENS) {
        return None;
    }
    if has(ANAT_TOKENS) || name.description.to_ascii_lowercase().contains("mprage") {
        return Some(ScanKind::Anat);
    }
    let task = task.to_ascii_lowercase();
    if has(FUNC_TOKENS) || tokens.iter().any(|t| *t == task) {
        return Some(ScanKind::Func);
    }
    None
}

/// Result of reorganizing one session's converter output.
#[derive(Debug, Clone, Default)]
pub struct BidsifyOutput {
    /// Anatomical images, handed to defacing.
    pub t1w: Vec<PathBuf>,
    pub bold: Vec<PathBuf>,
    /// Every file written (images and sidecars).
    pub written: Vec<PathBuf>,
    /// Pairs left where the converter put them.
    pub unclassified: Vec<NiftiPair>,
}

/// BIDS base name, e.g. `sub-ER0009_ses-day2_task-movies_run-01_bold`.
pub fn bids_basename(
    session: &SessionSource,
    kind: ScanKind,
    run: Option<u32>,
) -> String {
    let mut parts = vec![session.subject_label(), session.session.clone()];
    if kind == ScanKind::Func {
        parts.push(session.task_label());
    }
    if let Some(run) = run {
        parts.push(format!("run-{run:02}"));
    }
    parts.push(kind.suffix().to_string());
    parts.join("_")
}

/// Move classified pairs from `dest` into `dest/{anat,func}` under BIDS names.
///
/// `dest` is the session directory, `rawdata/sub-<ID>/ses-<S>`.
pub fn bidsify_nii(
    pairs: &[NiftiPair],
    dest: &Path,
    session: &SessionSource,
) -> Result<BidsifyOutput> {
    let prefix = format!("{}_{}", session.subject_label(), session.session);

    let mut anat = Vec::new();
    let mut func = Vec::new();
    let mut output = BidsifyOutput::default();

    for pair in pairs {
        let stem = nifti_stem(&pair.nifti).unwrap_or_default();
        let name = SeriesName::parse(stem, &prefix);
        match classify(&name, &session.task) {
            Some(ScanKind::Anat) => anat.push((pair, name)),
            Some(ScanKind::Func) => func.push((pair, name)),
            None => {
                warn!(file = %pair.nifti.display(), "unclassified series left in place");
                output.unclassified.push(pair.clone());
            }
        }
    }

    anat.sort_by_key(|(_, n)| n.series_number);
    func.sort_by_key(|(_, n)| n.series_number);

    let anat_runs: Vec<Option<u32>> = if anat.len() > 1 {
        (1..=anat.len() as u32).map(Some).collect()
    } else {
        vec![None; anat.len()]
    };
    for ((pair, _), run) in anat.iter().zip(anat_runs) {
        let (nifti, written) = place_pair(pair, dest, session, ScanKind::Anat, run)?;
        output.t1w.push(nifti);
        output.written.extend(written);
    }

    let func_runs = assign_runs(func.iter().map(|(_, n)| n.run_marker()))?;
    for ((pair, _), run) in func.iter().zip(func_runs) {
        let (nifti, written) = place_pair(pair, dest, session, ScanKind::Func, Some(run))?;
        output.bold.push(nifti);
        output.written.extend(written);
    }

    info!(
        t1w = output.t1w.len(),
        bold = output.bold.len(),
        unclassified = output.unclassified.len(),
        "reorganized converter output"
    );
    Ok(output)
}

/// Explicit markers keep their number; the rest count up from 1, skipping taken numbers.
fn assign_runs(markers: impl Iterator<Item = Option<u32>>) -> Result<Vec<u32>> {
    let markers: Vec<Option<u32>> = markers.collect();
    let mut taken = BTreeSet::new();
    for run in markers.iter().flatten() {
        if !taken.insert(*run) {
            return Err(Error::OutputValidation(format!(
                "two functional series claim run {run}"
            )));
        }
    }

    let mut next = 1;
    Ok(markers
        .into_iter()
        .map(|marker| {
            marker.unwrap_or_else(|| {
                while taken.contains(&next) {
                    next += 1;
                }
                taken.insert(next);
                next
            })
        })
        .collect())
}

fn place_pair(
    pair: &NiftiPair,
    dest: &Path,
    session: &SessionSource,
    kind: ScanKind,
    run: Option<u32>,
) -> Result<(PathBuf, Vec<PathBuf>)> {
    let folder = dest.join(kind.folder());
    fs::create_dir_all(&folder).map_err(|e| Error::io(&folder, e))?;

    let base = bids_basename(session, kind, run);
    let extension = if pair.nifti.to_string_lossy().ends_with(".nii.gz") {
        "nii.gz"
    } else {
        "nii"
    };
    let nifti_dest = folder.join(format!("{base}.{extension}"));
    let sidecar_dest = folder.join(format!("{base}.json"));

    fs::rename(&pair.nifti, &nifti_dest).map_err(|e| Error::io(&pair.nifti, e))?;
    match kind {
        ScanKind::Func => {
            write_task_sidecar(&pair.sidecar, &sidecar_dest, &session.task)?;
            fs::remove_file(&pair.sidecar).map_err(|e| Error::io(&pair.sidecar, e))?;
        }
        ScanKind::Anat => {
            fs::rename(&pair.sidecar, &sidecar_dest).map_err(|e| Error::io(&pair.sidecar, e))?;
        }
    }

    Ok((nifti_dest.clone(), vec![nifti_dest, sidecar_dest]))
}

/// Copy a converter sidecar, adding the `TaskName` key BIDS requires for bold runs.
fn write_task_sidecar(source: &Path, dest: &Path, task: &str) -> Result<()> {
    let text = fs::read_to_string(source).map_err(|e| Error::io(source, e))?;
    let mut value: Value = serde_json::from_str(&text)?;
    let Some(object) = value.as_object_mut() else {
        return Err(Error::OutputValidation(format!(
            "{} is not a JSON object",
            source.display()
        )));
    };
    object.insert("TaskName".to_string(), Value::String(task.to_string()));
    write_json(dest, &value)
}

pub(crate) fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    fs::write(path, text).map_err(|e| Error::io(path, e))
}

pub const DATASET_DESCRIPTION: &str = "dataset_description.json";
pub const README: &str = "README";
pub const BIDSIGNORE: &str = ".bidsignore";

/// Write `dataset_description.json`, `README`, and `.bidsignore` at the dataset root, replacing old copies.
pub fn bidsify_exp(raw_dir: &Path, dataset: &DatasetConfig) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(raw_dir).map_err(|e| Error::io(raw_dir, e))?;

    let description = DatasetDescription {
        name: dataset.name.clone(),
        bids_version: dataset.bids_version.clone(),
        dataset_type: "raw".to_string(),
        authors: dataset.authors.clone(),
        generated_by: vec![GeneratedBy {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }],
    };
    let description_path = raw_dir.join(DATASET_DESCRIPTION);
    write_json(&description_path, &description)?;

    let readme_path = raw_dir.join(README);
    let readme = format!(
        "# {name}\n\
         \n\
         Raw BIDS dataset converted from scanner DICOMs.\n\
         \n\
         - sub-<ID>/ses-day<N>/anat: T1-weighted anatomical images\n\
         - sub-<ID>/ses-day<N>/func: BOLD runs and behavioral events\n\
         \n\
         Defaced anatomical images are kept under derivatives/deface.\n",
        name = dataset.name
    );
    fs::write(&readme_path, readme).map_err(|e| Error::io(&readme_path, e))?;

    let ignore_path = raw_dir.join(BIDSIGNORE);
    let ignore = "# converter output without a BIDS datatype\n\
                  sub-*/ses-*/sub-*_ses-*_[0-9][0-9][0-9]_*\n";
    fs::write(&ignore_path, ignore).map_err(|e| Error::io(&ignore_path, e))?;

    Ok(vec![description_path, readme_path, ignore_path])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn session() -> SessionSource {
        SessionSource {
            subject: "ER0009".into(),
            session: "ses-day2".into(),
            task: "movies".into(),
            dicom_dir: PathBuf::from("/src/ER0009/day2_movies/DICOM"),
        }
    }

    fn name(stem: &str) -> SeriesName {
        SeriesName::parse(stem, "sub-ER0009_ses-day2")
    }

    #[test]
    fn parses_series_number_and_description() {
        let parsed = name("sub-ER0009_ses-day2_003_EPI_movies_run1");
        assert_eq!(parsed.series_number, Some(3));
        assert_eq!(parsed.description, "EPI_movies_run1");
        assert_eq!(parsed.run_marker(), Some(1));

        let bare = name("something_else");
        assert_eq!(bare.series_number, None);
    }

    #[test]
    fn classifies_by_description() {
        assert_eq!(classify(&name("sub-ER0009_ses-day2_002_T1w_MPRAGE"), "movies"), Some(ScanKind::Anat));
        assert_eq!(classify(&name("sub-ER0009_ses-day2_004_EPI_run01"), "movies"), Some(ScanKind::Func));
        assert_eq!(classify(&name("sub-ER0009_ses-day2_005_Movies1"), "movies"), None);
        assert_eq!(classify(&name("sub-ER0009_ses-day2_005_movies"), "movies"), Some(ScanKind::Func));
        assert_eq!(classify(&name("sub-ER0009_ses-day2_001_AAHead_Scout"), "movies"), None);
        assert_eq!(classify(&name("sub-ER0009_ses-day2_006_EPI_SBRef"), "movies"), None);
    }

    #[test]
    fn basenames_follow_bids_entities() {
        let s = session();
        assert_eq!(bids_basename(&s, ScanKind::Anat, None), "sub-ER0009_ses-day2_T1w");
        assert_eq!(
            bids_basename(&s, ScanKind::Func, Some(2)),
            "sub-ER0009_ses-day2_task-movies_run-02_bold"
        );
    }

    #[test]
    fn explicit_run_markers_win() {
        let runs = assign_runs([None, Some(1), None].into_iter()).expect("runs");
        assert_eq!(runs, vec![2, 1, 3]);
        assert!(assign_runs([Some(1), Some(1)].into_iter()).is_err());
    }

    #[test]
    fn moves_pairs_and_tags_task_name() {
        let dir = tempdir().expect("tempdir");
        let dest = dir.path();
        let mut pairs = Vec::new();
        for stem in [
            "sub-ER0009_ses-day2_002_MPRAGE",
            "sub-ER0009_ses-day2_004_EPI_movies",
            "sub-ER0009_ses-day2_006_EPI_movies",
            "sub-ER0009_ses-day2_001_localizer",
        ] {
            let nifti = dest.join(format!("{stem}.nii.gz"));
            let sidecar = dest.join(format!("{stem}.json"));
            fs::write(&nifti, stem).expect("write nifti");
            fs::write(&sidecar, r#"{"RepetitionTime": 2.0}"#).expect("write json");
            pairs.push(NiftiPair { nifti, sidecar });
        }

        let out = bidsify_nii(&pairs, dest, &session()).expect("bidsify");
        assert_eq!(out.t1w, vec![dest.join("anat/sub-ER0009_ses-day2_T1w.nii.gz")]);
        assert_eq!(
            out.bold,
            vec![
                dest.join("func/sub-ER0009_ses-day2_task-movies_run-01_bold.nii.gz"),
                dest.join("func/sub-ER0009_ses-day2_task-movies_run-02_bold.nii.gz"),
            ]
        );
        assert_eq!(out.unclassified.len(), 1);
        assert_eq!(out.written.len(), 6);

        let moved = fs::read_to_string(&out.bold[1]).expect("read");
        assert_eq!(moved, "sub-ER0009_ses-day2_006_EPI_movies");

        let sidecar: Value = serde_json::from_str(
            &fs::read_to_string(dest.join("func/sub-ER0009_ses-day2_task-movies_run-01_bold.json"))
                .expect("read sidecar"),
        )
        .expect("json");
        assert_eq!(sidecar["TaskName"], "movies");
        assert_eq!(sidecar["RepetitionTime"], 2.0);
        assert!(dest.join("anat/sub-ER0009_ses-day2_T1w.json").is_file());
        assert!(!dest.join("sub-ER0009_ses-day2_002_MPRAGE.nii.gz").exists());
    }

    #[test]
    fn dataset_files_are_rewritten() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join(README), "stale").expect("write");

        let written = bidsify_exp(dir.path(), &DatasetConfig::default()).expect("exp");
        assert_eq!(written.len(), 3);

        let description: Value = serde_json::from_str(
            &fs::read_to_string(dir.path().join(DATASET_DESCRIPTION)).expect("read"),
        )
        .expect("json");
        assert_eq!(description["Name"], "EmoRep");
        assert_eq!(description["BIDSVersion"], "1.7.0");
        assert_eq!(description["DatasetType"], "raw");
        assert!(description.get("Authors").is_none());

        let readme = fs::read_to_string(dir.path().join(README)).expect("read");
        assert!(readme.starts_with("# EmoRep"));
        assert!(dir.path().join(BIDSIGNORE).is_file());
    }
}
