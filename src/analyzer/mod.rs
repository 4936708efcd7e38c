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

//! Execution- and memory-space analysis.
//!
//! A geometry group is analysed in three phases:
//! - Phase 1: every unit's local aliases and includes are read
//! - Phase 2: aliases are merged over the shared headers and the return
//!   types of every function are harvested with the merged tables
//! - Phase 3: each unit not audited yet in this run goes through the
//!   checks, one preprocessor configuration at a time
//!
//! The per-unit checks are extension traits on [`UnitAnalyzer`], one per
//! submodule. A check that fails on a broken cross-reference is reported as
//! a structural finding and the remaining checks still run.

pub mod access;
pub mod aliases;
pub mod class_capture;
pub mod context;
pub mod exec_space;
pub mod memory_space;
pub mod mirrors;
pub mod signatures;

use std::path::Path;

use tracing::{debug, info};

use crate::config::{AnalysisConfig, ConfigError};
use crate::dump::{Configuration, ExecMarker, ScopeIdx, TokenIdx, TranslationUnit};
use crate::error::{AnalysisError, CheckId, Finding, Severity};

pub use access::AccessAuditor;
pub use aliases::AliasTable;
pub use class_capture::ClassCaptureValidator;
pub use context::{GroupContext, RunContext};
pub use exec_space::ExecSpaceClassifier;
pub use memory_space::MemorySpaceResolver;
pub use mirrors::MirrorAuditor;
pub use signatures::Signatures;

/// The checks of one configuration of one unit.
pub struct UnitAnalyzer<'a> {
    pub(crate) cfg: &'a mut Configuration,
    pub(crate) path: &'a Path,
    pub(crate) main_file: u32,
    pub(crate) config: &'a AnalysisConfig,
    pub(crate) aliases: &'a AliasTable,
    pub(crate) signatures: &'a Signatures,
    pub(crate) run: &'a mut RunContext,
}

impl<'a> UnitAnalyzer<'a> {
    /// Whether a token was written in the audited file.
    pub(crate) fn in_main_file(&self, tok: TokenIdx) -> bool {
        self.cfg.token(tok).file == self.main_file
    }

    /// A finding located at `tok`.
    pub(crate) fn finding_at(
        &self,
        tok: TokenIdx,
        check: CheckId,
        severity: Severity,
        message: impl Into<String>,
    ) -> Finding {
        let token = self.cfg.token(tok);
        Finding::new(check, severity, self.path, token.line, message).at_column(token.column)
    }

    pub(crate) fn emit(&mut self, finding: Finding) {
        self.run.report(finding);
    }

    /// The marker a declaration-prefix token denotes, if any.
    pub(crate) fn marker_of(&self, text: &str) -> Option<ExecMarker> {
        let config = self.config;
        if config.class_lambda_markers.iter().any(|m| m == text) {
            Some(ExecMarker::ClassLambda)
        } else if config.device_lambda_markers.iter().any(|m| m == text) {
            Some(ExecMarker::DeviceLambda)
        } else if config.device_function_markers.iter().any(|m| m == text) {
            Some(ExecMarker::DeviceFunction)
        } else if !config.device_marker_prefix.is_empty()
            && text.starts_with(&config.device_marker_prefix)
        {
            Some(ExecMarker::Device(text.to_string()))
        } else {
            None
        }
    }

    /// Classified scopes whose body is written in the audited file.
    pub(crate) fn audited_scopes(&self) -> Vec<ScopeIdx> {
        self.cfg
            .scope_order()
            .into_iter()
            .filter(|&s| {
                let scope = self.cfg.scope(s);
                scope.exec().is_some()
                    && scope
                        .body_start
                        .get()
                        .is_some_and(|start| self.in_main_file(start))
            })
            .collect()
    }

    /// The arguments of the call whose name token is `call`, split on the
    /// top-level commas. Bracketed sub-expressions are skipped over through
    /// their links.
    pub(crate) fn call_arguments(&self, call: TokenIdx) -> crate::error::Result<Vec<Vec<TokenIdx>>> {
        let open = self
            .cfg
            .next(call)
            .filter(|&t| self.cfg.text(t) == "(")
            .ok_or_else(|| AnalysisError::lookup("call argument list", &self.cfg.token(call).id))?;
        let close = self.cfg.token(open).link.require("call closing parenthesis")?;

        let mut arguments = Vec::new();
        let mut current = Vec::new();
        let mut t = open.0 + 1;
        while t < close.0 {
            let tok = TokenIdx(t);
            if self.cfg.text(tok) == "," {
                arguments.push(std::mem::take(&mut current));
                t += 1;
                continue;
            }
            match self.cfg.token(tok).link.get() {
                Some(end) if end > tok && end < close => {
                    current.extend((t..=end.0).map(TokenIdx));
                    t = end.0 + 1;
                }
                _ => {
                    current.push(tok);
                    t += 1;
                }
            }
        }
        if !current.is_empty() || !arguments.is_empty() {
            arguments.push(current);
        }
        Ok(arguments)
    }

    fn absorb(&mut self, check: &str, result: crate::error::Result<()>) {
        if let Err(error) = result {
            debug!(file = %self.path.display(), check, %error, "check skipped");
            let finding = Finding::new(
                CheckId::Structural,
                Severity::Style,
                self.path,
                0,
                format!("{check} skipped: {error}"),
            );
            self.emit(finding);
        }
    }

    /// Run every check in pipeline order.
    pub fn run_checks(&mut self) {
        let result = self.classify_scopes();
        self.absorb("execution space classification", result);

        let result = self.check_class_exec_space();
        self.absorb("class execution space", result);
        let result = self.check_class_capture();
        self.absorb("class capture", result);

        let result = self.resolve_memory_spaces();
        self.absorb("memory space resolution", result);

        let result = self.check_cross_space_access();
        self.absorb("cross-space access", result);
        let result = self.check_dangling_handles();
        self.absorb("dangling handles", result);
        let result = self.check_host_std();
        self.absorb("host standard library", result);
        let result = self.check_launch_lambdas();
        self.absorb("launch lambdas", result);

        let result = self.check_mirror_calls();
        self.absorb("mirror calls", result);
        let result = self.check_unnecessary_auto();
        self.absorb("unnecessary auto", result);
    }
}

/// Phases 1 and 2 over a group.
pub fn prepare_group(
    units: &[TranslationUnit],
    config: &AnalysisConfig,
) -> Result<GroupContext, ConfigError> {
    let owning = config.owning_return_regex()?;
    let facts: Vec<aliases::UnitAliases> = units.iter().map(aliases::UnitAliases::of).collect();
    let merged = aliases::merge_group(&facts, &config.shared_headers);

    let empty = AliasTable::new();
    let mut harvested = Signatures::default();
    for unit in units {
        let table = merged.get(&unit.path).unwrap_or(&empty);
        for cfg in unit.configurations.iter().filter(|c| c.has_tokens()) {
            harvested.extend(signatures::harvest(cfg, table, &owning));
        }
    }
    debug!(
        owning = harvested.owning.len(),
        auto = harvested.auto.len(),
        "harvested signatures"
    );

    Ok(GroupContext {
        aliases: merged,
        signatures: harvested,
    })
}

/// Phase 3 for one unit.
pub fn audit_unit(
    unit: &mut TranslationUnit,
    config: &AnalysisConfig,
    group: &GroupContext,
    run: &mut RunContext,
) {
    let empty = AliasTable::new();
    let path = unit.path.clone();
    let main_file = unit.main_file_index();
    let aliases = group.aliases_for(&path).unwrap_or(&empty);

    for cfg in unit.configurations.iter_mut() {
        if !cfg.has_tokens() {
            debug!(file = %path.display(), cfg = %cfg.name, "no expanded tokens, checks skipped");
            continue;
        }
        let mut analyzer = UnitAnalyzer {
            cfg,
            path: &path,
            main_file,
            config,
            aliases,
            signatures: &group.signatures,
            run: &mut *run,
        };
        analyzer.run_checks();
    }
}

/// Analyse a whole group. Units already audited earlier in the run still
/// contribute aliases and signatures but are not audited again.
pub fn analyze_group(
    units: &mut [TranslationUnit],
    config: &AnalysisConfig,
    run: &mut RunContext,
) -> Result<GroupContext, ConfigError> {
    let group = prepare_group(units, config)?;
    for unit in units.iter_mut() {
        if !run.claim(&unit.path) {
            debug!(file = %unit.path.display(), "already audited");
            continue;
        }
        info!(file = %unit.path.display(), "auditing");
        audit_unit(unit, config, &group, run);
    }
    Ok(group)
}

/// Error for a check that needs a section the configuration lacks.
pub(crate) fn require_section(present: bool, section: &'static str) -> crate::error::Result<()> {
    if present {
        Ok(())
    } else {
        Err(AnalysisError::MissingSection { section })
    }
}
