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

//! Finding output.
//!
//! A [`Reporter`] is told about every finding the moment it is raised, and
//! once more when the run is over.

use std::cell::RefCell;
use std::rc::Rc;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};

use crate::error::{format_finding, Finding, Severity};

/// Receiver of findings.
pub trait Reporter {
    /// Called once per finding, in the order they are raised.
    fn report(&mut self, finding: &Finding);

    /// Called at the end of a run.
    fn finish(&mut self, findings: &[Finding], worst: Option<Severity>) {
        let _ = (findings, worst);
    }
}

/// Prints findings to stdout.
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    /// Render with source context when the source file can be read.
    pub pretty: bool,
}

impl ConsoleReporter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }
}

impl Reporter for ConsoleReporter {
    fn report(&mut self, finding: &Finding) {
        if self.pretty && finding.line > 0 {
            if let Ok(source) = std::fs::read_to_string(&finding.file) {
                if let Some(rendered) = render_pretty(finding, &source) {
                    print!("{}", rendered);
                    return;
                }
            }
        }
        print!("{}", format_finding(finding));
    }

    fn finish(&mut self, findings: &[Finding], worst: Option<Severity>) {
        println!("{}", summary_line(findings, worst));
    }
}

/// Keeps every finding it is told about, rendered as plain lines.
///
/// Clones share the same buffer, so one clone can be handed to a
/// [`RunContext`](crate::analyzer::RunContext) and another read afterwards.
#[derive(Debug, Clone, Default)]
pub struct CollectingReporter {
    lines: Rc<RefCell<Vec<String>>>,
    summary: Rc<RefCell<Option<String>>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rendered findings in the order they were raised.
    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    /// The summary line, once the run is over.
    pub fn summary(&self) -> Option<String> {
        self.summary.borrow().clone()
    }
}

impl Reporter for CollectingReporter {
    fn report(&mut self, finding: &Finding) {
        self.lines.borrow_mut().push(format_finding(finding));
    }

    fn finish(&mut self, findings: &[Finding], worst: Option<Severity>) {
        *self.summary.borrow_mut() = Some(summary_line(findings, worst));
    }
}

/// The closing line of a run.
pub fn summary_line(findings: &[Finding], worst: Option<Severity>) -> String {
    match worst {
        None => "No problems found".to_string(),
        Some(worst) => {
            let count = |s: Severity| findings.iter().filter(|f| f.severity == s).count();
            format!(
                "{} finding{} (fatal: {}, error: {}, style: {}, warning: {}); worst severity: {}",
                findings.len(),
                if findings.len() == 1 { "" } else { "s" },
                count(Severity::Fatal),
                count(Severity::Error),
                count(Severity::Style),
                count(Severity::Warning),
                worst
            )
        }
    }
}

/// Byte offset of a 1-indexed line and column in `source`.
fn offset_of(source: &str, line: u32, column: u32) -> Option<usize> {
    let mut offset = 0;
    for (n, text) in source.split_inclusive('\n').enumerate() {
        if n + 1 == line as usize {
            let col = (column.max(1) as usize - 1).min(text.trim_end_matches('\n').len());
            return Some(offset + col);
        }
        offset += text.len();
    }
    None
}

/// Render a finding with a source excerpt.
///
/// Returns `None` when the line is not in `source`.
pub fn render_pretty(finding: &Finding, source: &str) -> Option<String> {
    let start = offset_of(source, finding.line, finding.column)?;
    let end = source[start..]
        .find(|c: char| c.is_whitespace())
        .map(|len| start + len.max(1))
        .unwrap_or(source.len());

    let id = finding.file.display().to_string();
    let (kind, color) = match finding.severity {
        Severity::Warning | Severity::Style => (ReportKind::Warning, Color::Yellow),
        Severity::Error | Severity::Fatal => (ReportKind::Error, Color::Red),
    };

    let mut builder = Report::build(kind, id.clone(), start)
        .with_config(Config::default().with_color(false))
        .with_code(finding.code_str())
        .with_message(&finding.message)
        .with_label(
            Label::new((id.clone(), start..end.max(start + 1)))
                .with_message(finding.severity.as_str())
                .with_color(color),
        );
    if let Some(hint) = &finding.hint {
        builder = builder.with_help(hint);
    }

    let mut buffer = Vec::new();
    builder
        .finish()
        .write((id, Source::from(source.to_string())), &mut buffer)
        .ok()?;
    String::from_utf8(buffer).ok()
}
