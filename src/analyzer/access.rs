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

//! Access auditing.
//!
//! These checks match uses against the classification and the memory
//! bindings computed before:
//! - cross-space access: a field indexed from the wrong execution space
//! - dangling handles: an owning handle stored into a view type
//! - host standard library use from device code
//! - the shape of lambdas passed to parallel dispatch functions

use std::collections::HashSet;

use super::UnitAnalyzer;
use crate::dump::{ExecMarker, ExecSpace, ScopeIdx, StatementSpan, TokenIdx, VarIdx};
use crate::error::{CheckId, Finding, Result, Severity};

/// Extension trait for access auditing.
pub trait AccessAuditor {
    /// Report tracked variables indexed or called from a scope of the
    /// other execution space.
    fn check_cross_space_access(&mut self) -> Result<()>;

    /// Report owning handles returned into variables of a non-owning type.
    fn check_dangling_handles(&mut self) -> Result<()>;

    /// Report `std::` facilities used from device code.
    fn check_host_std(&mut self) -> Result<()>;

    /// Report undecorated lambdas and captured class members in parallel
    /// dispatch calls.
    fn check_launch_lambdas(&mut self) -> Result<()>;
}

impl AccessAuditor for UnitAnalyzer<'_> {
    fn check_cross_space_access(&mut self) -> Result<()> {
        let downgrade_host = self.config.downgrades_host_mismatch(self.path);
        let mut findings = Vec::new();
        for s in self.audited_scopes() {
            let Some(space) = self.cfg.scope(s).exec_space() else {
                continue;
            };
            for t in self.cfg.body_tokens(s)? {
                let Some(v) = self.cfg.token(t).variable.get() else {
                    continue;
                };
                let var = self.cfg.variable(v);
                let Some(binding) = var.memory() else {
                    continue;
                };
                let Some(stored) = binding.space.as_exec() else {
                    continue;
                };
                if stored == space || !matches!(self.cfg.next_text(t), "(" | "[") {
                    continue;
                }
                if self.cfg.exec_owner_of_token(t) != Some(s) || self.is_declaration(v, t) {
                    continue;
                }

                // Unconfirmed bindings and the downgraded files only soften
                // findings raised from host code.
                let severity = if space == ExecSpace::Host && (!binding.confirmed || downgrade_host) {
                    Severity::Warning
                } else {
                    Severity::Fatal
                };
                findings.push(self.finding_at(
                    t,
                    CheckId::BadAccessCpuGpu,
                    severity,
                    format!(
                        "Attempted memory access from the wrong execution space. \
                         The current execution space is \"{}\" but the variable {} \
                         is stored on a space compatible with \"{}\"",
                        space, var.name, stored
                    ),
                ));
            }
        }
        for finding in findings {
            self.emit(finding);
        }
        Ok(())
    }

    fn check_dangling_handles(&mut self) -> Result<()> {
        if self.signatures.owning.is_empty() {
            return Ok(());
        }
        let definitions: HashSet<TokenIdx> = self
            .cfg
            .functions
            .iter()
            .filter_map(|f| f.token_def.get())
            .collect();
        let owning_marker = self.config.owning_marker.as_str();

        let mut findings = Vec::new();
        for span in self.cfg.statements().iter() {
            if !self.in_main_file(span.start) {
                continue;
            }
            let Some(call) = span.indices().find(|&t| {
                self.signatures.returns_owning(self.cfg.text(t))
                    && self.cfg.next_text(t) == "("
                    && !definitions.contains(&t)
            }) else {
                continue;
            };
            if self.inside_function_named(call, self.cfg.text(call)) {
                continue;
            }
            let Some(bound) = span
                .indices()
                .find(|&t| self.cfg.token(t).variable.is_resolved())
            else {
                continue;
            };
            if !matches!(self.cfg.next_text(bound), "(" | "=" | "{") {
                continue;
            }
            let Some(v) = self.cfg.token(bound).variable.get() else {
                continue;
            };
            let Ok(texts) = self.cfg.type_texts(v) else {
                continue;
            };
            let written = texts.concat();
            let expanded = self.aliases.expand(&texts).concat();
            if written == "auto" || written.contains(owning_marker) || expanded.contains(owning_marker) {
                continue;
            }

            let statement = format!("({})", self.statement_text(span));
            let token = self.cfg.token(bound);
            findings.push(
                Finding::from_parts(
                    CheckId::DanglingFieldMem,
                    Severity::Fatal,
                    self.path,
                    token.line,
                    &[
                        "Possible memory error. Mem not found in type where a FieldMem object is saved to.",
                        "Returned FieldMem object must be saved in a FieldMem else data may be unintentionally deallocated.",
                        statement.as_str(),
                    ],
                )
                .at_column(token.column),
            );
        }
        for finding in findings {
            self.emit(finding);
        }
        Ok(())
    }

    fn check_host_std(&mut self) -> Result<()> {
        let mut findings = Vec::new();
        for s in self.audited_scopes() {
            if self.cfg.scope(s).exec_space() != Some(ExecSpace::Device) {
                continue;
            }
            for t in self.cfg.body_tokens(s)? {
                if self.cfg.text(t) != "std" || self.cfg.next_text(t) != "::" {
                    continue;
                }
                if self.cfg.exec_owner_of_token(t) != Some(s) {
                    continue;
                }
                let name = self.cfg.text_at(t.0 as i64 + 2);
                if self.config.device_safe_std.iter().any(|n| n == name) {
                    continue;
                }
                findings.push(
                    self.finding_at(
                        t,
                        CheckId::StdOnGpu,
                        Severity::Fatal,
                        format!("std::{name} is not guaranteed to be available on GPU"),
                    )
                    .with_hint("Use the Kokkos or ddc equivalent, or move the call to the host"),
                );
            }
        }
        for finding in findings {
            self.emit(finding);
        }
        Ok(())
    }

    fn check_launch_lambdas(&mut self) -> Result<()> {
        let definitions: HashSet<TokenIdx> = self
            .cfg
            .functions
            .iter()
            .filter_map(|f| f.token_def.get())
            .collect();
        let lambda_marker = self
            .config
            .device_lambda_markers
            .first()
            .map(String::as_str)
            .unwrap_or("KOKKOS_LAMBDA");

        let mut findings = Vec::new();
        for i in 0..self.cfg.tokens.len() {
            let call = TokenIdx(i as u32);
            let dispatch = self.cfg.text(call);
            if !self.config.dispatch_functions.iter().any(|d| d == dispatch)
                || self.cfg.next_text(call) != "("
                || definitions.contains(&call)
                || !self.in_main_file(call)
            {
                continue;
            }
            let arguments = self.call_arguments(call)?;
            let Some(last) = arguments.last() else {
                continue;
            };

            if let Some(&first) = last.first() {
                if self.cfg.text(first) == "[" {
                    let (written, params) = self.lambda_introducer(first)?;
                    findings.push(self.finding_at(
                        first,
                        CheckId::UndecoratedLaunchLambda,
                        Severity::Error,
                        format!(
                            "Lambda passed to {dispatch} is not marked for the device: {written}. \
                             Please use {lambda_marker}({params})"
                        ),
                    ));
                }
            }

            let lambda = last.iter().find_map(|&t| {
                (self.cfg.text(t) == "{")
                    .then(|| self.cfg.scope_opened_at(t))
                    .flatten()
            });
            let Some(lambda) = lambda else {
                continue;
            };
            let captures_class = self
                .cfg
                .scope(lambda)
                .exec()
                .is_some_and(|e| e.marker == ExecMarker::ClassLambda);
            if captures_class {
                continue;
            }
            findings.extend(self.class_members_in(lambda, dispatch)?);
        }
        for finding in findings {
            self.emit(finding);
        }
        Ok(())
    }
}

impl UnitAnalyzer<'_> {
    /// Whether `tok` is the declaration of `var` rather than a use.
    fn is_declaration(&self, var: VarIdx, tok: TokenIdx) -> bool {
        let v = self.cfg.variable(var);
        v.name_token.get() == Some(tok)
            || v.type_end.get().and_then(|end| self.cfg.next(end)) == Some(tok)
    }

    /// Whether `tok` lies in the body of a function called `name`.
    fn inside_function_named(&self, tok: TokenIdx, name: &str) -> bool {
        let Some(scope) = self.cfg.token(tok).scope.get() else {
            return false;
        };
        std::iter::once(scope)
            .chain(self.cfg.ancestors(scope))
            .filter_map(|s| self.cfg.scope(s).function.get())
            .any(|f| self.cfg.function(f).name == name)
    }

    fn statement_text(&self, span: StatementSpan) -> String {
        span.indices()
            .map(|t| self.cfg.text(t))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// The lambda introducer starting at `open` as written (`[=](int i)`)
    /// and the text of its parameter list.
    fn lambda_introducer(&self, open: TokenIdx) -> Result<(String, String)> {
        let close = self.cfg.token(open).link.require("lambda capture end")?;
        let capture: String = (open.0..=close.0)
            .map(|t| self.cfg.text(TokenIdx(t)))
            .collect();
        let params = match self.cfg.next(close) {
            Some(p) if self.cfg.text(p) == "(" => {
                let end = self.cfg.token(p).link.require("lambda parameter list end")?;
                (p.0 + 1..end.0)
                    .map(|t| self.cfg.text(TokenIdx(t)))
                    .collect::<Vec<_>>()
                    .join(" ")
            }
            _ => String::new(),
        };
        Ok((format!("{capture}({params})"), params))
    }

    /// Class members used in a dispatched lambda, one finding per member.
    fn class_members_in(&self, lambda: ScopeIdx, dispatch: &str) -> Result<Vec<Finding>> {
        let mut reported = HashSet::new();
        let mut findings = Vec::new();
        for t in self.cfg.body_tokens(lambda)? {
            let Some(v) = self.cfg.token(t).variable.get() else {
                continue;
            };
            let var = self.cfg.variable(v);
            let in_class = var
                .scope
                .get()
                .is_some_and(|s| self.cfg.scope(s).kind.is_class_like());
            if !in_class || var.access.is_local() || self.is_member_access(t) {
                continue;
            }
            if reported.insert(v) {
                findings.push(
                    self.finding_at(
                        t,
                        CheckId::ClassVarInLaunch,
                        Severity::Error,
                        format!(
                            "Class variable {} is captured by the lambda passed to {}. \
                             Please copy it into a local variable ({}_proxy) before the call.",
                            var.name, dispatch, var.name
                        ),
                    )
                    .with_hint(format!("auto {0}_proxy = {0};", var.name)),
                );
            }
        }
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{
        AliasTable, ExecSpaceClassifier, MemorySpaceResolver, RunContext, Signatures,
    };
    use crate::config::AnalysisConfig;
    use crate::dump::builder::{DumpBuilder, GLOBAL};
    use crate::dump::TranslationUnit;

    fn audit(unit: &mut TranslationUnit, path: &str, signatures: &Signatures) -> Vec<Finding> {
        let config = AnalysisConfig::default();
        let aliases = AliasTable::new();
        let mut run = RunContext::new();
        let path = std::path::PathBuf::from(path);
        let mut analyzer = UnitAnalyzer {
            cfg: &mut unit.configurations[0],
            path: &path,
            main_file: 0,
            config: &config,
            aliases: &aliases,
            signatures,
            run: &mut run,
        };
        analyzer.classify_scopes().unwrap();
        analyzer.resolve_memory_spaces().unwrap();
        analyzer.check_cross_space_access().unwrap();
        analyzer.check_dangling_handles().unwrap();
        analyzer.check_host_std().unwrap();
        analyzer.check_launch_lambdas().unwrap();
        run.into_findings()
    }

    fn host_function_using_device_field() -> TranslationUnit {
        DumpBuilder::new("src/a.cpp")
            .func("f", "f", GLOBAL)
            .variable("x", "f", "Local")
            .line("void f@def=f ( ) {@f")
            .line("DFieldMem@ts=x < IdxRangeX , DeviceAllocator < double > >@te=x x@decl=x ( r ) ;")
            .line("x@x ( i ) = 1.0 ;")
            .line("}@f")
            .build()
            .unwrap()
    }

    #[test]
    fn test_device_field_indexed_from_host() {
        let mut unit = host_function_using_device_field();
        let findings = audit(&mut unit, "src/a.cpp", &Signatures::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].check, CheckId::BadAccessCpuGpu);
        assert_eq!(findings[0].severity, Severity::Fatal);
        assert_eq!(findings[0].line, 3);
        assert!(findings[0].message.contains("\"Host\""));
        assert!(findings[0].message.contains("\"Device\""));
    }

    #[test]
    fn test_exception_file_downgrades_host_mismatch() {
        let mut unit = host_function_using_device_field();
        let findings = audit(&mut unit, "src/speciesinfo/species_info.hpp", &Signatures::default());
        assert_eq!(findings[0].severity, Severity::Warning);
    }

    fn bad_accesses(findings: &[Finding]) -> Vec<&Finding> {
        findings
            .iter()
            .filter(|f| f.check == CheckId::BadAccessCpuGpu)
            .collect()
    }

    #[test]
    fn test_host_mirror_indexed_from_device_is_fatal() {
        let mut unit = DumpBuilder::new("src/a.cpp")
            .func("f", "f", GLOBAL)
            .variable("d", "f", "Local")
            .variable("h", "f", "Local")
            .lambda("l", "f")
            .line("void f@def=f ( ) {@f")
            .line("DFieldMem@ts=d < IdxRangeX >@te=d d@decl=d ( r ) ;")
            .line("auto@ty=h h@decl=h = ddc :: create_mirror_view_and_copy ( d@d ) ;")
            .line("ddc :: parallel_for_each ( Kokkos :: DefaultExecutionSpace ( ) , r , KOKKOS_LAMBDA ( Idx i ) {@l h@h ( i ) = 1.0 ; }@l ) ;")
            .line("}@f")
            .build()
            .unwrap();
        let findings = audit(&mut unit, "src/a.cpp", &Signatures::default());
        let bad = bad_accesses(&findings);
        assert_eq!(bad.len(), 1);
        assert_eq!(bad[0].severity, Severity::Fatal);
        assert_eq!(bad[0].line, 4);
        assert!(bad[0].message.contains("current execution space is \"Device\""));
    }

    #[test]
    fn test_unconfirmed_device_binding_from_host_warns() {
        let mut unit = DumpBuilder::new("src/a.cpp")
            .func("f", "f", GLOBAL)
            .variable("d", "f", "Local")
            .variable("n", "f", "Local")
            .line("void f@def=f ( ) {@f")
            .line("DFieldMem@ts=d < IdxRangeX >@te=d d@decl=d ( r ) ;")
            .line("auto@ty=n n@decl=n = ddc :: create_mirror_view ( Kokkos :: DefaultExecutionSpace ( ) , d@d ) ;")
            .line("n@n ( i ) = 1.0 ;")
            .line("}@f")
            .build()
            .unwrap();
        let findings = audit(&mut unit, "src/a.cpp", &Signatures::default());
        let bad = bad_accesses(&findings);
        assert_eq!(bad.len(), 1);
        assert_eq!(bad[0].severity, Severity::Warning);
        assert_eq!(bad[0].line, 4);
    }

    #[test]
    fn test_exception_file_keeps_device_mismatch_fatal() {
        let mut unit = DumpBuilder::new("src/speciesinfo/species_info.hpp")
            .func("f", "f", GLOBAL)
            .variable("x", "f", "Local")
            .line("KOKKOS_FUNCTION void f@def=f ( ) {@f")
            .line("DFieldMem@ts=x < IdxRangeX , HostAllocator < double > >@te=x x@decl=x ( r ) ;")
            .line("x@x ( i ) = 1.0 ;")
            .line("}@f")
            .build()
            .unwrap();
        let findings = audit(&mut unit, "src/speciesinfo/species_info.hpp", &Signatures::default());
        let bad = bad_accesses(&findings);
        assert_eq!(bad.len(), 1);
        assert_eq!(bad[0].severity, Severity::Fatal);
    }

    #[test]
    fn test_dangling_handle_and_self_reference() {
        let mut unit = DumpBuilder::new("src/a.cpp")
            .func("mk", "make_field", GLOBAL)
            .func("f", "f", GLOBAL)
            .variable("r", "mk", "Local")
            .variable("v", "f", "Local")
            .variable("m", "f", "Local")
            .line("DFieldMem < IdxRangeX > make_field@def=mk ( ) {@mk")
            .line("DFieldMem@ts=r < IdxRangeX >@te=r r@decl=r = make_field ( ) ;")
            .line("return r@r ;")
            .line("}@mk")
            .line("void f@def=f ( ) {@f")
            .line("DField@ts=v < IdxRangeX >@te=v v@decl=v = make_field ( ) ;")
            .line("DFieldMem@ts=m < IdxRangeX >@te=m m@decl=m = make_field ( ) ;")
            .line("}@f")
            .build()
            .unwrap();
        let mut signatures = Signatures::default();
        signatures.owning.insert("make_field".to_string());
        let findings = audit(&mut unit, "src/a.cpp", &signatures);
        let dangling: Vec<&Finding> = findings
            .iter()
            .filter(|f| f.check == CheckId::DanglingFieldMem)
            .collect();
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].line, 6);
        assert!(dangling[0].message.ends_with("(DField < IdxRangeX > v = make_field ( ))"));
    }

    #[test]
    fn test_owning_handle_into_auto_is_not_dangling() {
        let mut unit = DumpBuilder::new("src/a.cpp")
            .func("f", "f", GLOBAL)
            .variable("a", "f", "Local")
            .line("void f@def=f ( ) {@f")
            .line("auto@ty=a a@decl=a = make_field ( ) ;")
            .line("}@f")
            .build()
            .unwrap();
        let mut signatures = Signatures::default();
        signatures.owning.insert("make_field".to_string());
        let findings = audit(&mut unit, "src/a.cpp", &signatures);
        assert!(findings.iter().all(|f| f.check != CheckId::DanglingFieldMem));
    }

    #[test]
    fn test_std_on_device() {
        let mut unit = DumpBuilder::new("src/a.cpp")
            .func("f", "f", GLOBAL)
            .line("KOKKOS_FUNCTION void f@def=f ( ) {@f")
            .line("std :: size_t n = 0 ; std :: cout << n ;")
            .line("}@f")
            .build()
            .unwrap();
        let findings = audit(&mut unit, "src/a.cpp", &Signatures::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].check, CheckId::StdOnGpu);
        assert_eq!(findings[0].message, "std::cout is not guaranteed to be available on GPU");
    }

    #[test]
    fn test_undecorated_lambda_and_member_capture() {
        let mut unit = DumpBuilder::new("src/a.cpp")
            .class("c", "Advection", GLOBAL)
            .variable("dt", "c", "Private")
            .func("f", "step", "c")
            .lambda("l", "f")
            .line("class Advection {@c")
            .line("double@ty=dt m_dt@decl=dt ;")
            .line("void step@def=f ( ) {@f")
            .line("ddc :: parallel_for_each ( Kokkos :: DefaultExecutionSpace ( ) , range , [ = ] ( Idx const i ) {@l g ( i ) = m_dt@dt ; }@l ) ;")
            .line("}@f")
            .line("}@c ;")
            .build()
            .unwrap();
        let findings = audit(&mut unit, "src/a.cpp", &Signatures::default());
        let checks: Vec<CheckId> = findings.iter().map(|f| f.check).collect();
        assert_eq!(
            checks,
            vec![CheckId::UndecoratedLaunchLambda, CheckId::ClassVarInLaunch]
        );
        assert!(findings[0].message.contains("[=](Idx const i)"));
        assert!(findings[0].message.contains("KOKKOS_LAMBDA(Idx const i)"));
        assert!(findings[1].message.contains("m_dt_proxy"));
    }
}
