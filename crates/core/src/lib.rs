//! crashlog-core
//!
//! Core library for loading crash reports ahead of symbolication.
//!
//! A report arrives as legacy crash-log text, as structured crash-reporter JSON, or as
//! a JSON incident report (`.ips`). Whatever the input, loading produces a
//! [`ReportFile`] holding canonical crash-log text, the processes extracted from it and
//! the build identifiers a symbolicator needs to look up debug symbols.
//!
//! All substantive logic lives here so it is testable and reusable from frontends
//! other than the bundled CLI.

pub mod build_id;
pub mod config;
pub mod extract;
pub mod model;
pub mod normalize;
pub mod report;
pub mod sniff;
pub mod translate;

pub use build_id::{BuildId, BuildIdError};
pub use config::{load_config, FilterConfig, SymbolicatorConfig};
pub use report::{ReportError, ReportFile, ReportLoader};
pub use sniff::ReportFormat;

/// Returns the library version as encoded at compile time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
