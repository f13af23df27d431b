//
// cli.rs
// dcm-bids
//
// Defines the CLI surface with Clap, sets up logging, and dispatches to the pipeline or the inspection commands.
//
// Thales Matheus Mendonça Santos - November 2025

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, CommandFactory, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{
    PipelineConfig, ToolConfig, DEFAULT_DCM2NIIX, DEFAULT_DERIV_DIR, DEFAULT_PYDEFACE,
    DEFAULT_RAW_DIR, DEFAULT_SOURCE_DIR,
};
use crate::models::{StepStatus, SubjectReport};
use crate::pipeline::Pipeline;
use crate::{metadata, verify};

/// Convert DICOMs to NIfTI, organize them as BIDS, deface anatomicals, and write behavioral events.
///
/// Example: dcm-bids --sub-list ER0009 --raw-dir /mnt/keoki/experiments2/EmoRep/Emorep_BIDS/test
#[derive(Parser, Debug)]
#[command(name = "dcm-bids", version)]
#[command(subcommand_negates_reqs = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
    #[command(flatten)]
    pub run: RunArgs,
    /// Log debug output (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to DICOM parent directory "sourcedata"
    #[arg(long, default_value = DEFAULT_SOURCE_DIR)]
    pub source_dir: PathBuf,
    /// Path to BIDS directory "rawdata"
    #[arg(long, default_value = DEFAULT_RAW_DIR)]
    pub raw_dir: PathBuf,
    /// Root for defaced images, written to <DERIV_DIR>/deface
    #[arg(long, default_value = DEFAULT_DERIV_DIR)]
    pub deriv_dir: PathBuf,
    /// Subject IDs to process, e.g. "--sub-list ER4414" (one per invocation)
    #[arg(long, num_args = 1.., required = true, help_heading = "Required Arguments")]
    pub sub_list: Vec<String>,
    /// Skip defacing T1w images
    #[arg(long)]
    pub no_deface: bool,
    /// DICOM to NIfTI converter binary
    #[arg(long, env = "DCM2NIIX_BIN", default_value = DEFAULT_DCM2NIIX)]
    pub dcm2niix: PathBuf,
    /// Defacing binary
    #[arg(long, env = "PYDEFACE_BIN", default_value = DEFAULT_PYDEFACE)]
    pub pydeface: PathBuf,
    /// Write the run report as JSON to this path
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl RunArgs {
    pub fn to_config(&self) -> crate::Result<PipelineConfig> {
        let config = PipelineConfig::new(
            self.source_dir.clone(),
            self.raw_dir.clone(),
            self.deriv_dir.clone(),
            &self.sub_list,
        )?;
        Ok(config.with_deface(!self.no_deface).with_tools(ToolConfig {
            dcm2niix: self.dcm2niix.clone(),
            pydeface: self.pydeface.clone(),
        }))
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Summarize the series in a DICOM directory
    Inspect {
        dicom_dir: PathBuf,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Compare two NIfTI volumes voxel by voxel (exit 1 when they differ)
    Compare {
        reference: PathBuf,
        candidate: PathBuf,
    },
}

pub fn run() -> anyhow::Result<ExitCode> {
    // A bare invocation prints help and fails.
    if std::env::args_os().len() <= 1 {
        let mut stderr = std::io::stderr();
        Cli::command().write_help(&mut stderr)?;
        writeln!(stderr)?;
        return Ok(ExitCode::FAILURE);
    }

    let cli = Cli::parse();
    init_tracing(cli.verbose)?;
    execute(cli)
}

pub fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let default_level = if verbose { "dcm_bids=debug" } else { "dcm_bids=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("failed to initialise logging")?;
    Ok(())
}

pub fn execute(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Some(Commands::Inspect { dicom_dir, json }) => {
            let summary = metadata::summarize_dicom_dir(&dicom_dir)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                metadata::print_summary(&dicom_dir, &summary);
            }
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Compare {
            reference,
            candidate,
        }) => {
            let comparison = verify::compare_volumes(&reference, &candidate)?;
            println!("Reference: {:?} shape {:?}", reference, comparison.reference_shape);
            println!("Candidate: {:?} shape {:?}", candidate, comparison.candidate_shape);
            if comparison.identical() {
                println!("  Identical");
                Ok(ExitCode::SUCCESS)
            } else {
                println!(
                    "  Differs: {} voxels, max |diff| {:.4}",
                    comparison.differing_voxels, comparison.max_abs_difference
                );
                Ok(ExitCode::FAILURE)
            }
        }
        None => run_pipeline(&cli.run),
    }
}

fn run_pipeline(args: &RunArgs) -> anyhow::Result<ExitCode> {
    let config = args.to_config().context("invalid arguments")?;
    let report = Pipeline::with_external_tools(config).run();

    print_report(&report);
    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
    }

    Ok(if report.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

pub fn print_report(report: &SubjectReport) {
    println!("{}", "=".repeat(80));
    println!("Subject sub-{}", report.subject);
    println!("{}", "=".repeat(80));

    if let Some(error) = &report.error {
        println!("  FAILED: {error}");
        return;
    }

    for session in &report.sessions {
        println!("{} (task-{})", session.session, session.task);
        for step in &session.steps {
            let status = match &step.status {
                StepStatus::Completed => format!("ok ({} files)", step.artifacts.len()),
                StepStatus::Skipped { reason } => format!("skipped: {reason}"),
                StepStatus::Failed { error } => format!("FAILED: {error}"),
            };
            println!("  {:<10} {}", step.step, status);
        }
    }
}
