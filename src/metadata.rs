use std::collections::BTreeMap;
use std::path::Path;

use dicom::dictionary_std::tags;
use tracing::debug;
use walkdir::WalkDir;

use crate::dicom_access::{open_header, ElementAccess};
use crate::error::{Error, Result};
use crate::models::{SeriesSummary, StudySummary};

/// Series-level fields of a single DICOM header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesHeader {
    pub series_instance_uid: Option<String>,
    pub series_number: Option<i32>,
    pub series_description: Option<String>,
    pub protocol_name: Option<String>,
    pub modality: Option<String>,
}

pub fn extract_series_header<T: ElementAccess>(obj: &T) -> SeriesHeader {
    SeriesHeader {
        series_instance_uid: obj.element_str(tags::SERIES_INSTANCE_UID),
        series_number: obj.element_i32(tags::SERIES_NUMBER),
        series_description: obj.element_str(tags::SERIES_DESCRIPTION),
        protocol_name: obj.element_str(tags::PROTOCOL_NAME),
        modality: obj.element_str(tags::MODALITY),
    }
}

/// Group every readable DICOM file under `dir` by series.
///
/// Files that do not parse as DICOM are skipped. A directory with no
/// readable file at all is `NoMatchingInput`.
pub fn summarize_dicom_dir(dir: &Path) -> Result<StudySummary> {
    let mut series: BTreeMap<(Option<i32>, String), SeriesSummary> = BTreeMap::new();
    let mut patient_id = None;
    let mut study_date = None;
    let mut study_description = None;

    for entry in WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let obj = match open_header(entry.path()) {
            Ok(obj) => obj,
            Err(e) => {
                debug!(error = %e, "skipping non-DICOM file");
                continue;
            }
        };

        if patient_id.is_none() {
            patient_id = obj.element_str(tags::PATIENT_ID);
            study_date = obj.element_str(tags::STUDY_DATE);
            study_description = obj.element_str(tags::STUDY_DESCRIPTION);
        }

        let header = extract_series_header(&obj);
        let key = (
            header.series_number,
            header.series_instance_uid.clone().unwrap_or_default(),
        );
        series
            .entry(key)
            .or_insert_with(|| SeriesSummary {
                series_number: header.series_number,
                series_description: header.series_description.clone(),
                protocol_name: header.protocol_name.clone(),
                modality: header.modality.clone(),
                series_instance_uid: header.series_instance_uid.clone(),
                file_count: 0,
            })
            .file_count += 1;
    }

    if series.is_empty() {
        return Err(Error::NoMatchingInput(format!(
            "no readable DICOM files under {}",
            dir.display()
        )));
    }

    Ok(StudySummary {
        patient_id,
        study_date,
        study_description,
        series: series.into_values().collect(),
    })
}

pub fn print_summary(dir: &Path, summary: &StudySummary) {
    println!("{}", "=".repeat(80));
    println!("DICOM Directory: {}", dir.display());
    println!("{}", "=".repeat(80));

    println!("STUDY");
    println!("  Patient ID:  {}", summary.patient_id.as_deref().unwrap_or("N/A"));
    println!("  Date:        {}", summary.study_date.as_deref().unwrap_or("N/A"));
    println!(
        "  Description: {}",
        summary.study_description.as_deref().unwrap_or("N/A")
    );

    println!("\nSERIES");
    for s in &summary.series {
        let number = s
            .series_number
            .map(|n| format!("{n:03}"))
            .unwrap_or_else(|| "---".to_string());
        println!(
            "  {} {:<40} {:<4} {:>5} files",
            number,
            s.series_description.as_deref().unwrap_or("N/A"),
            s.modality.as_deref().unwrap_or("?"),
            s.file_count
        );
    }
}
