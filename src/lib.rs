// Spacecheck - CPU/GPU execution-space checks for cppcheck dumps
// Copyright (C) 2026  Marcel Joachim Kloubert <marcel@kloubert.dev>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Spacecheck Library
//!
//! Static checks for C++ code written against Kokkos and DDC, run over the
//! dumps cppcheck produces. The checks find code which would touch memory
//! from the wrong execution space (host code reading device fields, device
//! code reading class members it did not capture, owning fields dropped
//! while still referenced) before it fails on a GPU.
//!
//! # Modules
//!
//! - [`error`] - Findings, severities and error types
//! - [`config`] - Vocabularies and project conventions
//! - [`dump`] - Loading cppcheck dumps into indexed tables
//! - [`analyzer`] - The execution- and memory-space checks
//! - [`report`] - Printing findings
//! - [`driver`] - Source discovery, the cppcheck front end and watch mode
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use spacecheck::config::AnalysisConfig;
//!
//! let dumps = vec![PathBuf::from("src/advection/bsl_advection.hpp.dump")];
//! let findings = spacecheck::check_dumps(&dumps, &AnalysisConfig::default()).unwrap();
//! for finding in &findings {
//!     print!("{}", spacecheck::error::format_finding(finding));
//! }
//! ```

pub mod analyzer;
pub mod config;
pub mod driver;
pub mod dump;
pub mod error;
pub mod report;

use std::path::PathBuf;

pub use analyzer::{analyze_group, RunContext};
pub use config::AnalysisConfig;
pub use driver::{Driver, DriverError};
pub use error::{format_finding, CheckId, Finding, Severity};

/// The version of spacecheck.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of the tool.
pub const NAME: &str = "spacecheck";

/// Check already produced dumps as one geometry group and collect the
/// findings.
pub fn check_dumps(dumps: &[PathBuf], config: &AnalysisConfig) -> Result<Vec<Finding>, DriverError> {
    let mut run = RunContext::new();
    driver::analyze_dumps(dumps, config, &mut run)?;
    Ok(run.into_findings())
}
