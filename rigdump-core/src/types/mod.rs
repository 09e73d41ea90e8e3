//! Document and configuration types
//!
//! This module defines the exported JSON document and the exporter config file.

mod config;
mod document;

pub use config::*;
pub use document::*;
