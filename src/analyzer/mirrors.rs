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

//! Mirror call and `auto` audits.

use super::memory_space::MemorySpaceResolver;
use super::UnitAnalyzer;
use crate::dump::{Access, StatementSpan, TokenIdx, VarIdx};
use crate::error::{CheckId, Result, Severity};

/// Extension trait for mirror and `auto` audits.
pub trait MirrorAuditor {
    /// Report mirrors stored into explicit types and mirrors created from
    /// the default host execution space.
    fn check_mirror_calls(&mut self) -> Result<()>;

    /// Report `auto` variables whose type could be spelled out.
    fn check_unnecessary_auto(&mut self) -> Result<()>;
}

impl MirrorAuditor for UnitAnalyzer<'_> {
    fn check_mirror_calls(&mut self) -> Result<()> {
        let mut findings = Vec::new();
        for span in self.cfg.statements().iter() {
            if !self.in_main_file(span.start) {
                continue;
            }
            let Some(call) = self.mirror_call_in(span) else {
                continue;
            };

            let bound = StatementSpan {
                start: span.start,
                end: call,
            }
            .indices()
            .find(|&t| {
                self.cfg.token(t).variable.is_resolved()
                    && matches!(self.cfg.next_text(t), "=" | "(" | "{")
            });
            if let Some(bound) = bound {
                let v = self.cfg.token(bound).variable.require("bound variable")?;
                let explicit = self
                    .cfg
                    .type_texts(v)
                    .map(|texts| texts != ["auto"])
                    .unwrap_or(false);
                if explicit {
                    findings.push(self.finding_at(
                        bound,
                        CheckId::BadCreateMirror,
                        Severity::Fatal,
                        "Mirror function should be saved into auto type to handle CPU and GPU.",
                    ));
                }
            }

            let arguments = self.call_arguments(call)?;
            let first: String = arguments
                .first()
                .map(|a| a.iter().map(|&t| self.cfg.text(t)).collect())
                .unwrap_or_default();
            if first.trim_start_matches("Kokkos::") == "DefaultHostExecutionSpace()" {
                let statement = span
                    .indices()
                    .map(|t| self.cfg.text(t))
                    .collect::<Vec<_>>()
                    .join(" ");
                findings.push(self.finding_at(
                    call,
                    CheckId::BadCreateMirror,
                    Severity::Fatal,
                    format!(
                        "Possible synchronicity error. Kokkos::DefaultHostExecutionSpace() should never be \
                         the first argument to a mirror function ({statement})"
                    ),
                ));
            }
        }
        for finding in findings {
            self.emit(finding);
        }
        Ok(())
    }

    fn check_unnecessary_auto(&mut self) -> Result<()> {
        let mut findings = Vec::new();
        for i in 0..self.cfg.variables.len() {
            let v = VarIdx(i as u32);
            let var = self.cfg.variable(v);
            if var.access == Access::Argument {
                continue;
            }
            let Some(name) = var.name_token.get() else {
                continue;
            };
            if !self.in_main_file(name) || !matches!(self.cfg.type_texts(v).as_deref(), Ok(["auto"])) {
                continue;
            }
            let Some(init) = self.auto_initializer(v, name) else {
                continue;
            };
            if self.is_lambda(init) {
                continue;
            }
            let deduced = init.indices().any(|t| {
                let text = self.cfg.text(t);
                self.config.mirror_functions.iter().any(|m| m == text)
                    || (self.signatures.returns_auto(text) && self.cfg.next_text(t) == "(")
            });
            if !deduced {
                findings.push(self.finding_at(
                    name,
                    CheckId::UnnecessaryAuto,
                    Severity::Error,
                    format!("Please use explicit types instead of auto ({})", var.name),
                ));
            }
        }
        for finding in findings {
            self.emit(finding);
        }
        Ok(())
    }
}

impl UnitAnalyzer<'_> {
    /// The initialiser of an `auto` variable, either assigned or written in
    /// brackets after the name. Range-for bindings have none.
    fn auto_initializer(&self, var: VarIdx, name: TokenIdx) -> Option<StatementSpan> {
        if let Some(init) = self.initializer_of(var) {
            return Some(init);
        }
        match self.cfg.next_text(name) {
            "(" | "{" => {
                let start = self.cfg.next(name)?;
                let end = self.cfg.statements().containing(start).end;
                Some(StatementSpan { start, end })
            }
            _ => None,
        }
    }

    fn is_lambda(&self, init: StatementSpan) -> bool {
        self.cfg.text(init.start) == "["
            || init
                .indices()
                .any(|t| self.marker_of(self.cfg.text(t)).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{AliasTable, RunContext, Signatures};
    use crate::config::AnalysisConfig;
    use crate::dump::builder::{DumpBuilder, GLOBAL};
    use crate::dump::TranslationUnit;
    use crate::error::Finding;

    fn audit(unit: &mut TranslationUnit, signatures: &Signatures) -> Vec<Finding> {
        let config = AnalysisConfig::default();
        let aliases = AliasTable::new();
        let mut run = RunContext::new();
        let path = unit.path.clone();
        let mut analyzer = UnitAnalyzer {
            cfg: &mut unit.configurations[0],
            path: &path,
            main_file: 0,
            config: &config,
            aliases: &aliases,
            signatures,
            run: &mut run,
        };
        analyzer.check_mirror_calls().unwrap();
        analyzer.check_unnecessary_auto().unwrap();
        run.into_findings()
    }

    #[test]
    fn test_mirror_into_explicit_type() {
        let mut unit = DumpBuilder::new("src/a.cpp")
            .func("f", "f", GLOBAL)
            .variable("h", "f", "Local")
            .variable("a", "f", "Local")
            .line("void f@def=f ( ) {@f")
            .line("DFieldMem@ts=h < IdxRangeX , HostAllocator < double > >@te=h h@decl=h ; h@h = ddc :: create_mirror ( d ) ;")
            .line("auto@ty=a a@decl=a = ddc :: create_mirror_view_and_copy ( d ) ;")
            .line("}@f")
            .build()
            .unwrap();
        let findings = audit(&mut unit, &Signatures::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].check, CheckId::BadCreateMirror);
        assert_eq!(
            findings[0].message,
            "Mirror function should be saved into auto type to handle CPU and GPU."
        );
    }

    #[test]
    fn test_mirror_from_default_host_space() {
        let mut unit = DumpBuilder::new("src/a.cpp")
            .func("f", "f", GLOBAL)
            .variable("a", "f", "Local")
            .line("void f@def=f ( ) {@f")
            .line("auto@ty=a a@decl=a = ddc :: create_mirror_view ( Kokkos :: DefaultHostExecutionSpace ( ) , d ) ;")
            .line("}@f")
            .build()
            .unwrap();
        let findings = audit(&mut unit, &Signatures::default());
        assert_eq!(findings.len(), 1);
        insta::assert_snapshot!(
            findings[0].message,
            @"Possible synchronicity error. Kokkos::DefaultHostExecutionSpace() should never be the first argument to a mirror function (auto a = ddc :: create_mirror_view ( Kokkos :: DefaultHostExecutionSpace ( ) , d ))"
        );
    }

    #[test]
    fn test_unnecessary_auto() {
        let mut unit = DumpBuilder::new("src/a.cpp")
            .func("f", "f", GLOBAL)
            .variable("n", "f", "Local")
            .variable("g", "f", "Local")
            .variable("k", "f", "Local")
            .variable("e", "f", "Local")
            .variable("p", "f", "Argument")
            .lambda("l", "f")
            .line("void f@def=f ( auto@ty=p p@decl=p ) {@f")
            .line("auto@ty=n n@decl=n ; n@n = idx_range . size ( ) ;")
            .line("auto@ty=g g@decl=g = get_field_layout ( ) ;")
            .line("auto@ty=k k@decl=k = KOKKOS_LAMBDA ( int i ) {@l }@l ;")
            .line("for ( auto@ty=e e@decl=e : range ) { }")
            .line("}@f")
            .build()
            .unwrap();
        let mut signatures = Signatures::default();
        signatures.auto.insert("get_field_layout".to_string());
        let findings = audit(&mut unit, &signatures);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].check, CheckId::UnnecessaryAuto);
        assert_eq!(findings[0].message, "Please use explicit types instead of auto (n)");
        assert_eq!(findings[0].line, 2);
    }
}
