//
// verify.rs
// dcm-bids
//
// Voxel-wise comparison of NIfTI volumes, used to check conversion and defacing output against reference images.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::Path;

use ndarray::ArrayD;
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Outcome of comparing a candidate volume with a reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeComparison {
    pub reference_shape: Vec<usize>,
    pub candidate_shape: Vec<usize>,
    /// Voxels whose values differ. Zero when shapes disagree, since nothing was compared.
    pub differing_voxels: usize,
    pub max_abs_difference: f64,
}

impl VolumeComparison {
    pub fn identical(&self) -> bool {
        self.reference_shape == self.candidate_shape && self.differing_voxels == 0
    }
}

/// Load a `.nii` / `.nii.gz` volume as `f64`, with scaling applied.
pub fn load_volume(path: &Path) -> Result<ArrayD<f64>> {
    let nifti_err = |source: nifti::error::NiftiError| Error::Nifti {
        path: path.to_path_buf(),
        source,
    };
    let obj = ReaderOptions::new().read_file(path).map_err(nifti_err)?;
    obj.into_volume().into_ndarray::<f64>().map_err(nifti_err)
}

/// Compare two in-memory volumes voxel by voxel.
pub fn compare_arrays(reference: &ArrayD<f64>, candidate: &ArrayD<f64>) -> VolumeComparison {
    let reference_shape = reference.shape().to_vec();
    let candidate_shape = candidate.shape().to_vec();
    if reference_shape != candidate_shape {
        return VolumeComparison {
            reference_shape,
            candidate_shape,
            differing_voxels: 0,
            max_abs_difference: f64::NAN,
        };
    }

    let mut differing_voxels = 0;
    let mut max_abs_difference: f64 = 0.0;
    for (a, b) in reference.iter().zip(candidate.iter()) {
        if a != b {
            differing_voxels += 1;
            max_abs_difference = max_abs_difference.max((a - b).abs());
        }
    }

    VolumeComparison {
        reference_shape,
        candidate_shape,
        differing_voxels,
        max_abs_difference,
    }
}

/// Load both files and compare them.
pub fn compare_volumes(reference: &Path, candidate: &Path) -> Result<VolumeComparison> {
    let reference = load_volume(reference)?;
    let candidate = load_volume(candidate)?;
    Ok(compare_arrays(&reference, &candidate))
}
