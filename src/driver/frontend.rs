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

//! Locating and invoking the cppcheck front end.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};

use super::DriverError;
use crate::config::AnalysisConfig;

/// Front-end binary names, in order of preference.
const CPPCHECK_BINARIES: &[&str] = &["cppcheck"];

/// Find cppcheck in the system PATH.
pub fn find_cppcheck() -> Option<PathBuf> {
    CPPCHECK_BINARIES
        .iter()
        .find_map(|binary| which::which(binary).ok())
}

/// How a front-end invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontendOutcome {
    /// The exit code, `None` when killed by a signal.
    pub code: Option<i32>,
    /// Last line the front end printed on stderr.
    pub last_error: Option<String>,
}

impl FrontendOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// A configured front end producing `<source>.dump` files.
#[derive(Debug, Clone)]
pub struct Frontend {
    program: PathBuf,
    args: Vec<String>,
    working_dir: PathBuf,
}

impl Frontend {
    pub fn new(program: PathBuf, args: Vec<String>, working_dir: PathBuf) -> Self {
        Self {
            program,
            args,
            working_dir,
        }
    }

    /// Resolve the front end from an explicit path or the PATH.
    ///
    /// An explicit value that is not an existing file is looked up as a
    /// binary name.
    ///
    /// # Arguments
    ///
    /// * `explicit` - The `--cppcheck` value, if given
    /// * `config` - Supplies the flags passed on every invocation
    /// * `working_dir` - Directory the front end runs in
    ///
    /// # Errors
    ///
    /// Returns `DriverError::FrontEndNotFound` if no binary can be found.
    pub fn locate(
        explicit: Option<&Path>,
        config: &AnalysisConfig,
        working_dir: &Path,
    ) -> Result<Self, DriverError> {
        let program = match explicit {
            Some(path) if path.is_file() => path.to_path_buf(),
            Some(path) => which::which(path).map_err(|_| DriverError::FrontEndNotFound)?,
            None => find_cppcheck().ok_or(DriverError::FrontEndNotFound)?,
        };
        debug!(program = %program.display(), "front end");
        Ok(Self::new(
            program,
            config.frontend_args.clone(),
            working_dir.to_path_buf(),
        ))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments for one invocation: the configured flags, the sources, then
    /// one `--file-filter=` per filtered file.
    pub fn arguments(&self, files: &[PathBuf], filters: &[PathBuf]) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.args.iter().map(OsString::from).collect();
        args.extend(files.iter().map(|f| f.as_os_str().to_os_string()));
        for filter in filters {
            let mut arg = OsString::from("--file-filter=");
            arg.push(filter.as_os_str());
            args.push(arg);
        }
        args
    }

    /// Run the front end over `files` and wait for it.
    ///
    /// A non-zero exit is not an error here; the caller decides what it means
    /// for the run.
    ///
    /// # Errors
    ///
    /// Returns `DriverError::FrontEndFailed` if the process cannot be spawned.
    pub fn run(&self, files: &[PathBuf], filters: &[PathBuf]) -> Result<FrontendOutcome, DriverError> {
        let output = Command::new(&self.program)
            .args(self.arguments(files, filters))
            .current_dir(&self.working_dir)
            .output()
            .map_err(DriverError::FrontEndFailed)?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let last_error = stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .map(|l| l.trim().to_string());
        let outcome = FrontendOutcome {
            code: output.status.code(),
            last_error,
        };
        if outcome.success() {
            debug!(files = files.len(), "front end finished");
        } else {
            warn!(
                code = ?outcome.code,
                error = outcome.last_error.as_deref().unwrap_or(""),
                "front end failed"
            );
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frontend(program: &str) -> Frontend {
        Frontend::new(
            PathBuf::from(program),
            AnalysisConfig::default().frontend_args,
            std::env::temp_dir(),
        )
    }

    #[test]
    fn test_arguments_order() {
        let args = frontend("cppcheck").arguments(
            &[PathBuf::from("src/a.cpp"), PathBuf::from("src/b.hpp")],
            &[PathBuf::from("src/a.cpp")],
        );
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args[0], "--dump");
        assert_eq!(args[args.len() - 3], "src/a.cpp");
        assert_eq!(args[args.len() - 2], "src/b.hpp");
        assert_eq!(args[args.len() - 1], "--file-filter=src/a.cpp");
    }

    #[test]
    fn test_locate_missing_binary() {
        let result = Frontend::locate(
            Some(Path::new("definitely-not-a-cppcheck-binary")),
            &AnalysisConfig::default(),
            Path::new("."),
        );
        assert!(matches!(result, Err(DriverError::FrontEndNotFound)));
    }

    #[test]
    fn test_spawn_failure() {
        let result = frontend("/nonexistent/cppcheck").run(&[], &[]);
        assert!(matches!(result, Err(DriverError::FrontEndFailed(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_status_reported() {
        let Ok(program) = which::which("false") else {
            return;
        };
        let outcome = Frontend::new(program, Vec::new(), std::env::temp_dir())
            .run(&[], &[])
            .unwrap();
        assert!(!outcome.success());
        assert_eq!(outcome.code, Some(1));
    }
}
