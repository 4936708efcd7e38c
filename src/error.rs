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

//! Error and diagnostic types for spacecheck.
//!
//! This module defines the finding vocabulary (severities and check ids)
//! as well as the errors raised while loading dumps and running checks.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Severity of a finding, ordered from least to most severe.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Style,
    Error,
    Fatal,
}

impl Severity {
    /// Process exit status used when this severity fails a run.
    pub fn exit_status(&self) -> u8 {
        match self {
            Severity::Warning => 1,
            Severity::Style => 2,
            Severity::Error => 3,
            Severity::Fatal => 4,
        }
    }

    /// Lowercase name used in rendered findings.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Style => "style",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies which check produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CheckId {
    // Scope classification
    VirtualFunctionOnGpu,

    // Class capture
    ClassExecSpace,
    ClassVarOnGpu,
    UnnecessaryGpuClassCapture,

    // Access audit
    BadAccessCpuGpu,
    DanglingFieldMem,
    StdOnGpu,
    UndecoratedLaunchLambda,
    ClassVarInLaunch,

    // Mirror audit
    BadCreateMirror,
    UnnecessaryAuto,

    // Tooling
    Structural,
    FrontEndFailure,
}

impl CheckId {
    /// Get the stable identifier string for this check.
    pub fn code(&self) -> &'static str {
        match self {
            CheckId::VirtualFunctionOnGpu => "virtualFunctionOnGPU",
            CheckId::ClassExecSpace => "classExecSpace",
            CheckId::ClassVarOnGpu => "classVarOnGPU",
            CheckId::UnnecessaryGpuClassCapture => "unnecessaryGPUclassCapture",
            CheckId::BadAccessCpuGpu => "badAccessCPUGPU",
            CheckId::DanglingFieldMem => "danglingFieldMem",
            CheckId::StdOnGpu => "stdOnGPU",
            CheckId::UndecoratedLaunchLambda => "undecoratedLaunchLambda",
            CheckId::ClassVarInLaunch => "classVarInLaunch",
            CheckId::BadCreateMirror => "badCreateMirror",
            CheckId::UnnecessaryAuto => "unnecessaryAuto",
            CheckId::Structural => "structural",
            CheckId::FrontEndFailure => "frontEndFailure",
        }
    }
}

impl fmt::Display for CheckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A single observation produced by a check.
///
/// Findings are immutable once reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// How severe the problem is.
    pub severity: Severity,
    /// The check which raised it.
    pub check: CheckId,
    /// The file the finding refers to.
    pub file: PathBuf,
    /// Line number (1-indexed, 0 when the finding concerns the whole file).
    pub line: u32,
    /// Column number (1-indexed, 0 when unknown).
    pub column: u32,
    /// Human readable message.
    pub message: String,
    /// Optional hint for fixing the problem.
    pub hint: Option<String>,
}

impl Finding {
    /// Create a new finding.
    pub fn new(
        check: CheckId,
        severity: Severity,
        file: impl Into<PathBuf>,
        line: u32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            check,
            file: file.into(),
            line,
            column: 0,
            message: message.into(),
            hint: None,
        }
    }

    /// Create a finding whose message is made of several parts.
    pub fn from_parts(
        check: CheckId,
        severity: Severity,
        file: impl Into<PathBuf>,
        line: u32,
        parts: &[&str],
    ) -> Self {
        Self::new(check, severity, file, line, parts.join(" "))
    }

    /// Set the column of this finding.
    pub fn at_column(mut self, column: u32) -> Self {
        self.column = column;
        self
    }

    /// Add a hint to this finding.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Get the check id string.
    pub fn code_str(&self) -> &'static str {
        self.check.code()
    }
}

/// Errors raised while loading a dump file.
#[derive(Debug, Error)]
pub enum DumpError {
    /// The dump could not be read from disk.
    #[error("Cannot read dump {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The dump is not well-formed XML.
    #[error("Invalid XML in dump {path}: {source}")]
    Xml {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },

    /// The dump lacks the structural sections every dump must have.
    #[error("Malformed dump {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

impl DumpError {
    /// Create a malformed-dump error.
    pub fn malformed(path: &Path, reason: impl Into<String>) -> Self {
        DumpError::Malformed {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by a single check on a single file.
///
/// These never abort a run: the pipeline turns them into structural findings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnalysisError {
    /// An id-based cross reference the check relies on is missing.
    #[error("Lookup failed: {what} ({id})")]
    Lookup { what: &'static str, id: String },

    /// The dump does not have a section the check needs.
    #[error("Dump section '{section}' is missing")]
    MissingSection { section: &'static str },
}

impl AnalysisError {
    /// Create a lookup error.
    pub fn lookup(what: &'static str, id: impl fmt::Display) -> Self {
        AnalysisError::Lookup {
            what,
            id: id.to_string(),
        }
    }
}

/// Result type for check operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Format a finding as a single compiler-style line.
///
/// The hint, when present, is printed on an indented second line.
pub fn format_finding(finding: &Finding) -> String {
    let mut output = format!(
        "{}:{}: {}: {} [{}]\n",
        finding.file.display(),
        finding.line,
        finding.severity,
        finding.message,
        finding.code_str()
    );

    if let Some(hint) = &finding.hint {
        output.push_str(&format!("    = hint: {}\n", hint));
    }

    output
}
