//
// convert.rs
// dcm-bids
//
// DICOM to NIfTI conversion through an external converter, returning matched image/sidecar pairs.
//
// Thales Matheus Mendonça Santos - November 2025

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};
use crate::external::run_tool;
use crate::models::{NiftiPair, SessionSource};

/// Anything able to turn a DICOM directory into NIfTI + JSON pairs inside `dest`.
pub trait Converter {
    fn convert(&self, session: &SessionSource, dest: &Path) -> Result<Vec<NiftiPair>>;
}

/// `dcm2niix` backend.
#[derive(Debug, Clone)]
pub struct Dcm2niix {
    binary: PathBuf,
}

impl Dcm2niix {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Output name template: subject, session, 3-digit series number, series description.
    pub fn filename_template(session: &SessionSource) -> String {
        format!("{}_{}_%3s_%d", session.subject_label(), session.session)
    }
}

impl Converter for Dcm2niix {
    fn convert(&self, session: &SessionSource, dest: &Path) -> Result<Vec<NiftiPair>> {
        fs::create_dir_all(dest).map_err(|e| Error::io(dest, e))?;
        info!(
            dicom_dir = %session.dicom_dir.display(),
            dest = %dest.display(),
            "converting DICOM series"
        );

        let template = Self::filename_template(session);
        let args: [&OsStr; 13] = [
            OsStr::new("-a"),
            OsStr::new("y"),
            OsStr::new("-ba"),
            OsStr::new("y"),
            OsStr::new("-z"),
            OsStr::new("y"),
            OsStr::new("-w"),
            OsStr::new("1"),
            OsStr::new("-f"),
            OsStr::new(&template),
            OsStr::new("-o"),
            dest.as_os_str(),
            session.dicom_dir.as_os_str(),
        ];
        run_tool(&self.binary, args)?;

        collect_pairs(dest)
    }
}

/// Strip `.nii.gz` or `.nii` from a file name.
pub fn nifti_stem(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    name.strip_suffix(".nii.gz")
        .or_else(|| name.strip_suffix(".nii"))
}

/// Pair every NIfTI directly inside `dir` with its same-named JSON sidecar.
///
/// Sorted by file name, which for converter output is series order.
pub fn collect_pairs(dir: &Path) -> Result<Vec<NiftiPair>> {
    let entries = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    let mut niftis = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| Error::io(dir, e))?.path();
        if path.is_file() && nifti_stem(&path).is_some() {
            niftis.push(path);
        }
    }
    niftis.sort();

    if niftis.is_empty() {
        return Err(Error::OutputValidation(format!(
            "converter produced no NIfTI files in {}",
            dir.display()
        )));
    }

    niftis
        .into_iter()
        .map(|nifti| {
            let stem = nifti_stem(&nifti).unwrap_or_default();
            let sidecar = dir.join(format!("{stem}.json"));
            if !sidecar.is_file() {
                return Err(Error::OutputValidation(format!(
                    "{} has no JSON sidecar",
                    nifti.display()
                )));
            }
            Ok(NiftiPair { nifti, sidecar })
        })
        .collect()
}

/// Split pairs into the two matched sequences callers downstream expect.
pub fn unzip_pairs(pairs: &[NiftiPair]) -> (Vec<PathBuf>, Vec<PathBuf>) {
    pairs
        .iter()
        .map(|p| (p.nifti.clone(), p.sidecar.clone()))
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::write(path, b"").expect("write");
    }

    #[test]
    fn pairs_are_matched_and_ordered() {
        let dir = tempdir().expect("tempdir");
        for stem in ["sub-ER0009_ses-day2_003_EPI_movies", "sub-ER0009_ses-day2_002_MPRAGE"] {
            touch(&dir.path().join(format!("{stem}.nii.gz")));
            touch(&dir.path().join(format!("{stem}.json")));
        }
        touch(&dir.path().join("notes.txt"));

        let pairs = collect_pairs(dir.path()).expect("pairs");
        let (niftis, sidecars) = unzip_pairs(&pairs);
        assert_eq!(niftis.len(), 2);
        assert!(niftis[0].ends_with("sub-ER0009_ses-day2_002_MPRAGE.nii.gz"));
        assert!(sidecars[0].ends_with("sub-ER0009_ses-day2_002_MPRAGE.json"));
        assert!(sidecars[1].ends_with("sub-ER0009_ses-day2_003_EPI_movies.json"));
    }

    #[test]
    fn nifti_without_sidecar_fails_validation() {
        let dir = tempdir().expect("tempdir");
        touch(&dir.path().join("scan.nii.gz"));
        assert!(matches!(
            collect_pairs(dir.path()),
            Err(Error::OutputValidation(_))
        ));
    }

    #[test]
    fn empty_output_fails_validation() {
        let dir = tempdir().expect("tempdir");
        assert!(matches!(
            collect_pairs(dir.path()),
            Err(Error::OutputValidation(_))
        ));
    }

    #[test]
    fn stems_handle_both_extensions() {
        assert_eq!(nifti_stem(Path::new("/a/b.nii.gz")), Some("b"));
        assert_eq!(nifti_stem(Path::new("b.nii")), Some("b"));
        assert_eq!(nifti_stem(Path::new("b.json")), None);
    }

    #[test]
    fn template_names_subject_and_session() {
        let session = SessionSource {
            subject: "ER0009".into(),
            session: "ses-day2".into(),
            task: "movies".into(),
            dicom_dir: PathBuf::from("/src/ER0009/day2_movies/DICOM"),
        };
        assert_eq!(
            Dcm2niix::filename_template(&session),
            "sub-ER0009_ses-day2_%3s_%d"
        );
    }
}
