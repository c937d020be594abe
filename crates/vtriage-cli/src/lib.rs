//! Command-line front end for vtriage.
//!
//! This crate provides:
//! - Argument parsing layered over environment configuration
//! - Tracing setup for the binaries

pub mod args;
pub mod logging;

pub use args::Args;
pub use logging::init_tracing;
