use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::dicom_access::open_header;
use crate::error::{Error, Result};

/// Confirms `dir` holds at least one parseable DICOM file and returns the first one found.
pub fn check_dicom_dir(dir: &Path) -> Result<PathBuf> {
    if !dir.is_dir() {
        return Err(Error::NoMatchingInput(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    for entry in WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        match open_header(entry.path()) {
            Ok(_) => return Ok(entry.into_path()),
            Err(e) => debug!(error = %e, "not a DICOM file"),
        }
    }

    Err(Error::NoMatchingInput(format!(
        "no readable DICOM files under {}",
        dir.display()
    )))
}
