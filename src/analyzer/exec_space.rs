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

//! Execution space classification.
//!
//! Every function, lambda and bare block is tagged Host or Device from the
//! launch marker in its declaration prefix. A scope without a marker takes
//! the classification of the executable scope it is written in; class
//! scopes never pass a classification down.

use super::{require_section, UnitAnalyzer};
use crate::dump::{ExecInfo, ExecMarker, ExecSpace, ScopeIdx};
use crate::error::{CheckId, Result, Severity};

/// Extension trait for execution space classification.
pub trait ExecSpaceClassifier {
    /// Classify every executable scope, parents first, then run the
    /// virtual-on-device check.
    fn classify_scopes(&mut self) -> Result<()>;

    /// The first launch marker in the declaration prefix of `scope`.
    fn own_marker(&self, scope: ScopeIdx) -> Option<ExecMarker>;

    /// Report device scopes that are bodies of virtual functions.
    fn check_virtual_on_device(&mut self) -> Result<()>;
}

impl ExecSpaceClassifier for UnitAnalyzer<'_> {
    fn classify_scopes(&mut self) -> Result<()> {
        require_section(self.cfg.sections.scopes, "scopes")?;

        for s in self.cfg.scope_order() {
            if !self.cfg.scope(s).kind.is_executable() {
                continue;
            }
            let info = match self.own_marker(s) {
                Some(marker) => ExecInfo {
                    space: marker.space(),
                    marker,
                    inherited: false,
                },
                None => {
                    let enclosing = self
                        .cfg
                        .scope(s)
                        .parent
                        .get()
                        .and_then(|p| self.cfg.exec_owner(p))
                        .and_then(|owner| self.cfg.scope(owner).exec().cloned());
                    match enclosing {
                        Some(outer) => ExecInfo {
                            inherited: true,
                            ..outer
                        },
                        None => ExecInfo {
                            space: ExecSpace::Host,
                            marker: ExecMarker::Host,
                            inherited: false,
                        },
                    }
                }
            };
            self.cfg.scope_mut(s).classify(info);
        }

        self.check_virtual_on_device()
    }

    fn own_marker(&self, scope: ScopeIdx) -> Option<ExecMarker> {
        let prefix = self.cfg.declaration_prefix(scope).ok()?;
        prefix
            .indices()
            .find_map(|t| self.marker_of(self.cfg.text(t)))
    }

    fn check_virtual_on_device(&mut self) -> Result<()> {
        let mut findings = Vec::new();
        for scope in &self.cfg.scopes {
            if scope.exec_space() != Some(ExecSpace::Device) {
                continue;
            }
            let Some(func) = scope.function.get() else {
                continue;
            };
            if !self.cfg.function(func).is_virtual {
                continue;
            }
            let start = scope.body_start.require("virtual function body start")?;
            let at = self.cfg.prev(start).unwrap_or(start);
            if self.in_main_file(at) {
                findings.push(self.finding_at(
                    at,
                    CheckId::VirtualFunctionOnGpu,
                    Severity::Error,
                    "Virtual functions cannot be reliably called from GPU",
                ));
            }
        }
        for finding in findings {
            self.emit(finding);
        }
        Ok(())
    }
}
