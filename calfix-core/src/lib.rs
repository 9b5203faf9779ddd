//! Core of the calfix calendar proxy.
//!
//! This crate holds everything that does not touch the network:
//! - `config` for the process-wide settings read at startup
//! - `patch` for the fixed set of event rewrites
//! - `ics` for validating, patching and rewriting a whole feed

pub mod config;
pub mod error;
pub mod ics;
pub mod patch;

pub use config::Config;
pub use error::{ConfigError, IcsError, IcsResult};
pub use ics::{modify_ics, parse_calendar};
pub use patch::{MarkTutorial, Patch, Pipeline, StripCourseCode};
