//
// manifest.rs
// dcm-bids
//
// Records SHA-256 checksums of the files a run writes so repeated runs can be compared byte for byte.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::models::ArtifactRecord;

/// Hex SHA-256 of a file's contents, streamed.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| Error::io(path, e))?;
    Ok(hex::encode(hasher.finalize()))
}

pub fn record(paths: &[PathBuf]) -> Result<Vec<ArtifactRecord>> {
    paths
        .iter()
        .map(|path| {
            Ok(ArtifactRecord {
                path: path.clone(),
                sha256: sha256_file(path)?,
            })
        })
        .collect()
}
