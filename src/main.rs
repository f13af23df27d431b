//
// main.rs
// dcm-bids
//
// Binary entry point that hands off execution to the CLI layer and maps the outcome to an exit status.
//
// Thales Matheus Mendonça Santos - November 2025

use std::process::ExitCode;

use dcm_bids::cli;

fn main() -> anyhow::Result<ExitCode> {
    // Delegate all argument parsing and dispatching to the CLI module.
    cli::run()
}
