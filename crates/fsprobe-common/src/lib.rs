//! fsprobe Common - Shared types and utilities
//!
//! This crate provides the error taxonomy, run configuration, and timing
//! helpers used across all fsprobe components.

pub mod config;
pub mod error;
pub mod timing;

pub use config::ProbeConfig;
pub use error::{Error, Result};
pub use timing::{Timed, time_call};
