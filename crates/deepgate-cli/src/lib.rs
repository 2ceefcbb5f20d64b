//! Launcher for the deepgate gateway.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Used by the binary target only
use anyhow as _;
use dotenvy as _;
use tokio as _;
use tokio_util as _;
use tracing_subscriber as _;

pub mod parser;

pub use parser::Cli;
