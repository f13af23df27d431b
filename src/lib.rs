//
// lib.rs
// dcm-bids
//
// Exposes the crate's modules and re-exports the CLI entry point for both binary and library consumers.
//
// Thales Matheus Mendonça Santos - November 2025

// Public surface of the library: one module per pipeline step plus shared utilities.
pub mod behavior;
pub mod bidsify;
pub mod cli;
pub mod config;
pub mod convert;
pub mod deface;
pub mod dicom_access;
pub mod discovery;
pub mod error;
pub mod external;
pub mod manifest;
pub mod metadata;
pub mod models;
pub mod pipeline;
pub mod validate;
pub mod verify;

pub use cli::{run as run_cli, Cli, Commands};
pub use error::{Error, Result};
pub use pipeline::Pipeline;
