//
// behavior.rs
// dcm-bids
//
// Turns per-run behavioral CSV logs into BIDS events TSV files with JSON column descriptions.
//
// Thales Matheus Mendonça Santos - November 2025

//! Behavioral logs are headered CSV files. Columns are matched case-insensitively:
//!
//! | field      | accepted headers                                  |
//! |------------|---------------------------------------------------|
//! | onset      | `onset`, `onset_time`, `start`, `start_time`       |
//! | duration   | `duration`, `dur`                                 |
//! | end        | `end`, `end_time`, `offset`, `offset_time`         |
//! | trial_type | `trial_type`, `type`, `condition`, `event`         |
//! | stim_file  | `stim_file`, `stimulus`, `stimdescrip`             |
//! | response   | `response`, `resp`                                |
//!
//! Times are seconds from the start of the run. Duration comes from the
//! duration column when present, otherwise `end - onset`. Rows without an
//! onset (instructions, blank lines) are dropped.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tracing::info;

use crate::bidsify::write_json;
use crate::error::{Error, Result};
use crate::models::{EventRow, SessionSource};

/// Passthrough columns in the order they are written.
const EXTRA_COLUMNS: &[&str] = &["stim_file", "response"];

#[derive(Debug, Default)]
struct ColumnMap {
    onset: Option<usize>,
    duration: Option<usize>,
    end: Option<usize>,
    trial_type: Option<usize>,
    stim_file: Option<usize>,
    response: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let mut map = Self::default();
        for (i, header) in headers.iter().enumerate() {
            let slot = match header.trim().to_lowercase().as_str() {
                "onset" | "onset_time" | "start" | "start_time" => &mut map.onset,
                "duration" | "dur" => &mut map.duration,
                "end" | "end_time" | "offset" | "offset_time" => &mut map.end,
                "trial_type" | "type" | "condition" | "event" => &mut map.trial_type,
                "stim_file" | "stimulus" | "stimdescrip" => &mut map.stim_file,
                "response" | "resp" => &mut map.response,
                _ => continue,
            };
            // First matching header wins.
            slot.get_or_insert(i);
        }

        if map.onset.is_none() {
            return Err(Error::InvalidInput(
                "behavioral log needs an onset column (onset, onset_time, start, start_time)".into(),
            ));
        }
        if map.duration.is_none() && map.end.is_none() {
            return Err(Error::InvalidInput(
                "behavioral log needs a duration column or an end column".into(),
            ));
        }
        if map.trial_type.is_none() {
            return Err(Error::InvalidInput(
                "behavioral log needs a trial type column (trial_type, type, condition, event)"
                    .into(),
            ));
        }
        Ok(map)
    }

    fn extras(&self) -> Vec<(&'static str, usize)> {
        let mut extras = Vec::new();
        if let Some(i) = self.stim_file {
            extras.push(("stim_file", i));
        }
        if let Some(i) = self.response {
            extras.push(("response", i));
        }
        extras
    }
}

fn cell(record: &csv::StringRecord, idx: Option<usize>) -> Option<&str> {
    idx.and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn number(record: &csv::StringRecord, idx: Option<usize>, field: &str) -> Result<Option<f64>> {
    let Some(raw) = cell(record, idx) else {
        return Ok(None);
    };
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => {
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            Err(Error::InvalidInput(format!(
                "line {line}: {field} {raw:?} is not a number"
            )))
        }
    }
}

/// Parse a behavioral log into event rows, in file order.
pub fn parse_events<R: Read>(reader: R) -> Result<Vec<EventRow>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let columns = ColumnMap::from_headers(csv_reader.headers()?)?;
    let extras = columns.extras();

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let Some(onset) = number(&record, columns.onset, "onset")? else {
            continue;
        };
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        let duration = match number(&record, columns.duration, "duration")? {
            Some(d) => d,
            None => match number(&record, columns.end, "end")? {
                Some(end) => end - onset,
                None => {
                    return Err(Error::InvalidInput(format!(
                        "line {line}: no duration or end time"
                    )))
                }
            },
        };
        if !duration.is_finite() {
            return Err(Error::InvalidInput(format!(
                "line {line}: duration {duration} is not a number"
            )));
        }
        if duration < 0.0 {
            return Err(Error::InvalidInput(format!(
                "line {line}: negative duration {duration}"
            )));
        }

        let trial_type = cell(&record, columns.trial_type)
            .unwrap_or("n/a")
            .to_string();
        let extra = extras
            .iter()
            .map(|(name, i)| {
                let value = cell(&record, Some(*i)).unwrap_or("n/a").to_string();
                (name.to_string(), value)
            })
            .collect();

        rows.push(EventRow {
            onset,
            duration,
            trial_type,
            extra,
        });
    }

    Ok(rows)
}

fn seconds(value: f64) -> String {
    format!("{value:.3}")
}

/// Write rows as a BIDS events TSV. Columns: onset, duration, trial_type, then any passthrough columns.
pub fn write_events_tsv(path: &Path, rows: &[EventRow]) -> Result<()> {
    let extras: Vec<&str> = EXTRA_COLUMNS
        .iter()
        .copied()
        .filter(|c| rows.iter().any(|r| r.extra.contains_key(*c)))
        .collect();

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)?;

    let mut header = vec!["onset", "duration", "trial_type"];
    header.extend(extras.iter().copied());
    writer.write_record(&header)?;

    for row in rows {
        let mut record = vec![seconds(row.onset), seconds(row.duration), row.trial_type.clone()];
        for column in &extras {
            record.push(row.extra.get(*column).cloned().unwrap_or_else(|| "n/a".into()));
        }
        writer.write_record(&record)?;
    }
    writer.flush().map_err(|e| Error::io(path, e))?;
    Ok(())
}

/// Column descriptions for the events sidecar, including every trial type seen.
pub fn events_sidecar(rows: &[EventRow]) -> Value {
    let levels: BTreeMap<String, String> = rows
        .iter()
        .map(|r| r.trial_type.as_str())
        .filter(|t| *t != "n/a")
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|t| (t.to_string(), format!("Trials labelled {t} in the behavioral log")))
        .collect();

    let mut sidecar = BTreeMap::new();
    sidecar.insert(
        "onset",
        json!({
            "LongName": "Event onset",
            "Description": "Onset of the event measured from the beginning of the run",
            "Units": "s"
        }),
    );
    sidecar.insert(
        "duration",
        json!({
            "LongName": "Event duration",
            "Description": "Duration of the event",
            "Units": "s"
        }),
    );
    sidecar.insert(
        "trial_type",
        json!({
            "LongName": "Event category",
            "Description": "Condition of the trial as recorded by the task software",
            "Levels": levels
        }),
    );

    let has = |column: &str| rows.iter().any(|r| r.extra.contains_key(column));
    if has("stim_file") {
        sidecar.insert(
            "stim_file",
            json!({
                "LongName": "Stimulus",
                "Description": "Stimulus presented during the event"
            }),
        );
    }
    if has("response") {
        sidecar.insert(
            "response",
            json!({
                "LongName": "Participant response",
                "Description": "Response recorded during the event"
            }),
        );
    }

    json!(sidecar)
}

/// Paths and row count of one run's events files.
#[derive(Debug, Clone)]
pub struct EventsOutput {
    pub tsv: PathBuf,
    pub json: PathBuf,
    pub rows: usize,
}

/// `sub-<ID>_<ses>_task-<T>_<run>_events`.
pub fn events_basename(session: &SessionSource, run: &str) -> String {
    format!(
        "{}_{}_{}_{}_events",
        session.subject_label(),
        session.session,
        session.task_label(),
        run
    )
}

/// Convert one behavioral CSV into `<dest>/<basename>.tsv` and `.json`.
///
/// The TSV is read back and its row count checked against what was parsed.
pub fn events(csv_path: &Path, dest: &Path, session: &SessionSource, run: &str) -> Result<EventsOutput> {
    let file = File::open(csv_path).map_err(|e| Error::io(csv_path, e))?;
    let rows = parse_events(file)?;
    if rows.is_empty() {
        return Err(Error::NoMatchingInput(format!(
            "{} has no rows with an onset",
            csv_path.display()
        )));
    }

    std::fs::create_dir_all(dest).map_err(|e| Error::io(dest, e))?;
    let base = events_basename(session, run);
    let tsv = dest.join(format!("{base}.tsv"));
    let json = dest.join(format!("{base}.json"));

    write_events_tsv(&tsv, &rows)?;
    write_json(&json, &events_sidecar(&rows))?;

    let written = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(&tsv)?
        .records()
        .count();
    if written != rows.len() {
        return Err(Error::OutputValidation(format!(
            "{} has {written} rows, expected {}",
            tsv.display(),
            rows.len()
        )));
    }

    info!(csv = %csv_path.display(), tsv = %tsv.display(), rows = rows.len(), "wrote events");
    Ok(EventsOutput {
        tsv,
        json,
        rows: rows.len(),
    })
}
