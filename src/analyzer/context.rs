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

//! State threaded through a run.
//!
//! [`RunContext`] lives for one whole run and owns the findings. A
//! [`GroupContext`] is built for each geometry group before any of its
//! files is audited and is read-only afterwards.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use super::aliases::AliasTable;
use super::signatures::Signatures;
use crate::error::{CheckId, Finding, Severity};
use crate::report::Reporter;

/// Per-run state: findings, the worst severity and the audited files.
#[derive(Default)]
pub struct RunContext {
    findings: Vec<Finding>,
    worst: Option<Severity>,
    reporter: Option<Box<dyn Reporter>>,
    audited: HashSet<PathBuf>,
    seen: HashSet<(CheckId, PathBuf, u32, u32, String)>,
}

impl RunContext {
    /// A context which only collects findings.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context forwarding each finding to `reporter` as it is raised.
    pub fn with_reporter(reporter: Box<dyn Reporter>) -> Self {
        Self {
            reporter: Some(reporter),
            ..Self::default()
        }
    }

    /// Record a finding.
    ///
    /// A finding equal to one already recorded (raised again by another
    /// preprocessor configuration) is dropped.
    pub fn report(&mut self, finding: Finding) {
        let key = (
            finding.check,
            finding.file.clone(),
            finding.line,
            finding.column,
            finding.message.clone(),
        );
        if !self.seen.insert(key) {
            return;
        }
        self.worst = self.worst.max(Some(finding.severity));
        if let Some(reporter) = self.reporter.as_mut() {
            reporter.report(&finding);
        }
        self.findings.push(finding);
    }

    /// Findings in the order they were raised.
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn into_findings(self) -> Vec<Finding> {
        self.findings
    }

    /// The worst severity seen so far.
    pub fn worst(&self) -> Option<Severity> {
        self.worst
    }

    /// Process exit status for this run given the failing level.
    pub fn exit_status(&self, fail_level: Severity) -> u8 {
        match self.worst {
            Some(worst) if worst >= fail_level => worst.exit_status(),
            _ => 0,
        }
    }

    /// Claim a source file for auditing. Returns `false` if it was already
    /// audited in this run.
    pub fn claim(&mut self, path: &Path) -> bool {
        self.audited.insert(path.to_path_buf())
    }

    /// Tell the reporter the run is over.
    pub fn finish(&mut self) {
        if let Some(reporter) = self.reporter.as_mut() {
            reporter.finish(&self.findings, self.worst);
        }
    }
}

/// Shared knowledge of one geometry group.
#[derive(Debug, Clone, Default)]
pub struct GroupContext {
    /// Merged alias table of every unit, keyed by source path.
    pub aliases: HashMap<PathBuf, AliasTable>,
    /// Functions returning owning handles or `auto`.
    pub signatures: Signatures,
}

impl GroupContext {
    /// The merged aliases visible from `path`.
    pub fn aliases_for(&self, path: &Path) -> Option<&AliasTable> {
        self.aliases.get(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder(Rc<RefCell<Vec<String>>>);

    impl Reporter for Recorder {
        fn report(&mut self, finding: &Finding) {
            self.0.borrow_mut().push(finding.message.clone());
        }

        fn finish(&mut self, findings: &[Finding], _worst: Option<Severity>) {
            self.0.borrow_mut().push(format!("done {}", findings.len()));
        }
    }

    fn finding(severity: Severity, message: &str) -> Finding {
        Finding::new(CheckId::ClassVarOnGpu, severity, "a.cpp", 1, message)
    }

    #[test]
    fn test_worst_severity_is_monotonic() {
        let mut run = RunContext::new();
        assert_eq!(run.worst(), None);
        run.report(finding(Severity::Error, "a"));
        run.report(finding(Severity::Warning, "b"));
        assert_eq!(run.worst(), Some(Severity::Error));
        run.report(finding(Severity::Fatal, "c"));
        assert_eq!(run.worst(), Some(Severity::Fatal));
        assert_eq!(run.findings().len(), 3);
    }

    #[test]
    fn test_exit_status_respects_fail_level() {
        let mut run = RunContext::new();
        assert_eq!(run.exit_status(Severity::Error), 0);
        run.report(finding(Severity::Style, "a"));
        assert_eq!(run.exit_status(Severity::Error), 0);
        assert_eq!(run.exit_status(Severity::Warning), Severity::Style.exit_status());
        run.report(finding(Severity::Fatal, "b"));
        assert_eq!(run.exit_status(Severity::Error), Severity::Fatal.exit_status());
    }

    #[test]
    fn test_reporter_sees_findings_immediately() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut run = RunContext::with_reporter(Box::new(Recorder(log.clone())));
        run.report(finding(Severity::Error, "first"));
        assert_eq!(*log.borrow(), vec!["first".to_string()]);
        run.finish();
        assert_eq!(log.borrow().last().map(String::as_str), Some("done 1"));
    }

    #[test]
    fn test_duplicate_findings_are_dropped() {
        let mut run = RunContext::new();
        run.report(finding(Severity::Error, "same"));
        run.report(finding(Severity::Error, "same"));
        assert_eq!(run.findings().len(), 1);
    }

    #[test]
    fn test_claim_once() {
        let mut run = RunContext::new();
        assert!(run.claim(Path::new("src/a.cpp")));
        assert!(!run.claim(Path::new("src/a.cpp")));
    }
}
