//
// pipeline.rs
// dcm-bids
//
// Runs discover, convert, bidsify, deface, and events for one subject, collecting a per-session status report.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{error, info, info_span, warn};

use crate::behavior;
use crate::bidsify::{bidsify_exp, bidsify_nii};
use crate::config::PipelineConfig;
use crate::convert::{Converter, Dcm2niix};
use crate::deface::{self, Defacer, Pydeface};
use crate::discovery::{discover_behavior_runs, discover_sessions, SessionPattern};
use crate::error::Result;
use crate::manifest;
use crate::models::{SessionReport, SessionSource, StepOutcome, StepStatus, SubjectReport};
use crate::validate::check_dicom_dir;

pub const STEP_CONVERT: &str = "convert";
pub const STEP_BIDSIFY: &str = "bidsify";
pub const STEP_DEFACE: &str = "deface";
pub const STEP_EVENTS: &str = "events";

/// One subject's run through the pipeline, with pluggable external tools.
pub struct Pipeline {
    config: PipelineConfig,
    pattern: SessionPattern,
    converter: Box<dyn Converter>,
    defacer: Box<dyn Defacer>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        converter: Box<dyn Converter>,
        defacer: Box<dyn Defacer>,
    ) -> Self {
        Self {
            config,
            pattern: SessionPattern::default(),
            converter,
            defacer,
        }
    }

    /// `dcm2niix` and `pydeface` at the binaries named in the config.
    pub fn with_external_tools(config: PipelineConfig) -> Self {
        let converter = Box::new(Dcm2niix::new(config.tools.dcm2niix.clone()));
        let defacer = Box::new(Pydeface::new(config.tools.pydeface.clone()));
        Self::new(config, converter, defacer)
    }

    pub fn with_pattern(mut self, pattern: SessionPattern) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// `rawdata/sub-<ID>/ses-<S>`.
    pub fn session_raw_dir(&self, session: &SessionSource) -> PathBuf {
        self.config
            .raw_dir()
            .join(session.subject_label())
            .join(&session.session)
    }

    /// Process every session of the configured subject. Never panics on step
    /// failures; they are recorded in the report and stop the remaining work.
    pub fn run(&self) -> SubjectReport {
        let subject = self.config.subject().to_string();
        let _span = info_span!("subject", subject = %subject).entered();

        let mut report = SubjectReport {
            subject: subject.clone(),
            started_at: Utc::now(),
            finished_at: None,
            error: None,
            dataset_files: Vec::new(),
            sessions: Vec::new(),
        };

        let sessions = match self.prepare(&mut report) {
            Ok(sessions) => sessions,
            Err(e) => {
                error!(error = %e, "subject failed before processing sessions");
                report.error = Some(e.to_string());
                report.finished_at = Some(Utc::now());
                return report;
            }
        };

        let mut halted = false;
        for session in &sessions {
            if halted {
                warn!(session = %session.session, "skipping session after earlier failure");
                report.sessions.push(SessionReport {
                    session: session.session.clone(),
                    task: session.task.clone(),
                    steps: vec![skipped(STEP_CONVERT, "halted after an earlier failure")],
                });
                continue;
            }
            let session_report = self.run_session(session);
            halted = session_report.failed();
            report.sessions.push(session_report);
        }

        report.finished_at = Some(Utc::now());
        report
    }

    fn prepare(&self, report: &mut SubjectReport) -> Result<Vec<SessionSource>> {
        let sessions = discover_sessions(
            self.config.source_dir(),
            self.config.subject(),
            &self.pattern,
        )?;
        info!(count = sessions.len(), "discovered sessions");

        let written = bidsify_exp(self.config.raw_dir(), &self.config.dataset)?;
        report.dataset_files = manifest::record(&written)?;
        Ok(sessions)
    }

    /// convert -> bidsify -> deface -> events for one session; stops at the first failure.
    pub fn run_session(&self, session: &SessionSource) -> SessionReport {
        let _span = info_span!("session", session = %session.session, task = %session.task).entered();
        let dest = self.session_raw_dir(session);
        let mut steps = Vec::new();

        let pairs = run_step(&mut steps, STEP_CONVERT, || {
            check_dicom_dir(&session.dicom_dir)?;
            Ok((self.converter.convert(session, &dest)?, Vec::new()))
        });
        let Some(pairs) = pairs else {
            return session_report(session, steps);
        };

        let bids = run_step(&mut steps, STEP_BIDSIFY, || {
            let out = bidsify_nii(&pairs, &dest, session)?;
            let written = out.written.clone();
            Ok((out, written))
        });
        let Some(bids) = bids else {
            return session_report(session, steps);
        };

        if !self.config.deface() {
            steps.push(skipped(STEP_DEFACE, "defacing disabled"));
        } else if bids.t1w.is_empty() {
            warn!("no T1w images to deface");
            steps.push(skipped(STEP_DEFACE, "no T1w images"));
        } else {
            let defaced = run_step(&mut steps, STEP_DEFACE, || {
                let out = deface::deface(
                    self.defacer.as_ref(),
                    &bids.t1w,
                    self.config.deriv_dir(),
                    &session.subject,
                    &session.session,
                )?;
                Ok(((), out))
            });
            if defaced.is_none() {
                return session_report(session, steps);
            }
        }

        self.events_step(session, &dest, &mut steps);
        session_report(session, steps)
    }

    fn events_step(&self, session: &SessionSource, dest: &Path, steps: &mut Vec<StepOutcome>) {
        let runs = match discover_behavior_runs(session) {
            Ok(runs) => runs,
            Err(e) => {
                error!(error = %e, "behavioral log discovery failed");
                steps.push(failed(STEP_EVENTS, &e.to_string()));
                return;
            }
        };
        if runs.is_empty() {
            warn!("no behavioral logs found");
            steps.push(skipped(STEP_EVENTS, "no behavioral logs"));
            return;
        }

        let func_dir = dest.join("func");
        run_step(steps, STEP_EVENTS, || {
            let mut written = Vec::new();
            for run in &runs {
                let out = behavior::events(&run.csv, &func_dir, session, &run.label())?;
                written.push(out.tsv);
                written.push(out.json);
            }
            Ok(((), written))
        });
    }
}

/// Run one step, hashing the files it reports. Returns `None` when it failed.
fn run_step<T>(
    steps: &mut Vec<StepOutcome>,
    name: &str,
    f: impl FnOnce() -> Result<(T, Vec<PathBuf>)>,
) -> Option<T> {
    info!(step = name, "starting");
    let result = f().and_then(|(value, written)| Ok((value, manifest::record(&written)?)));
    match result {
        Ok((value, artifacts)) => {
            info!(step = name, artifacts = artifacts.len(), "completed");
            steps.push(StepOutcome {
                step: name.to_string(),
                status: StepStatus::Completed,
                artifacts,
            });
            Some(value)
        }
        Err(e) => {
            error!(step = name, error = %e, "step failed");
            steps.push(failed(name, &e.to_string()));
            None
        }
    }
}

fn skipped(step: &str, reason: &str) -> StepOutcome {
    StepOutcome {
        step: step.to_string(),
        status: StepStatus::Skipped {
            reason: reason.to_string(),
        },
        artifacts: Vec::new(),
    }
}

fn failed(step: &str, error: &str) -> StepOutcome {
    StepOutcome {
        step: step.to_string(),
        status: StepStatus::Failed {
            error: error.to_string(),
        },
        artifacts: Vec::new(),
    }
}

fn session_report(session: &SessionSource, steps: Vec<StepOutcome>) -> SessionReport {
    SessionReport {
        session: session.session.clone(),
        task: session.task.clone(),
        steps,
    }
}
