//! reviewgate CI - local checks for the review gate
//!
//! Provides the pieces needed to run the gate without a hosted CI service:
//! - [`LocalCiService`]: runs configured check commands with per-check
//!   timeouts and reports them as CI checks
//! - [`CommandAnalyzer`]: a linter-backed static analysis tool

pub mod analyzer;
pub mod check;
pub mod runner;
pub mod service;

pub use analyzer::{parse_diagnostics, CommandAnalyzer};
pub use check::{BuiltinCheck, CheckConfig};
pub use runner::{CheckOutcome, CheckRunner};
pub use service::LocalCiService;
