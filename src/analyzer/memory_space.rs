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

//! Memory space resolution.
//!
//! A variable is tracked when its declared type, after alias substitution,
//! names one of the field families. The space is read from the type in
//! this order:
//!
//! 1. a host wrapper (`host_t<...>`) makes it Host
//! 2. a device space marker makes it Device
//! 3. a host space marker makes it Host
//! 4. the last template argument of the family: an allocator naming
//!    Device or Host, or any other `...Space` name kept verbatim
//! 5. otherwise Device, or unknown when the template brackets do not
//!    balance
//!
//! An `auto` variable is tracked only when it is initialised by a mirror
//! call; its space then comes from the call's arguments and is marked
//! unconfirmed.

use super::UnitAnalyzer;
use crate::dump::{MemoryBinding, MemorySpace, StatementSpan, TokenIdx, VarIdx};
use crate::error::Result;

/// Extension trait for memory space resolution.
pub trait MemorySpaceResolver {
    /// Bind every tracked variable of the configuration to its space.
    fn resolve_memory_spaces(&mut self) -> Result<()>;

    /// The space a declared type implies, or `None` if the type is not a
    /// field family.
    fn space_of_type(&self, texts: &[String]) -> Option<MemorySpace>;

    /// The tokens of the expression a variable is initialised with.
    fn initializer_of(&self, var: VarIdx) -> Option<StatementSpan>;

    /// The first mirror call in `span`.
    fn mirror_call_in(&self, span: StatementSpan) -> Option<TokenIdx>;

    /// The space of the mirror produced by the call at `call`.
    fn mirror_space(&self, call: TokenIdx) -> Result<MemorySpace>;
}

impl MemorySpaceResolver for UnitAnalyzer<'_> {
    fn resolve_memory_spaces(&mut self) -> Result<()> {
        let mut bindings = Vec::new();
        for i in 0..self.cfg.variables.len() {
            let v = VarIdx(i as u32);
            // Variables declared by the front end without a type (implicit
            // `this`, some template parameters) are never tracked.
            let Ok(texts) = self.cfg.type_texts(v) else {
                continue;
            };
            if texts == ["auto"] {
                let Some(init) = self.initializer_of(v) else {
                    continue;
                };
                if let Some(call) = self.mirror_call_in(init) {
                    let space = match self.mirror_space(call) {
                        Ok(space) => space,
                        Err(e) => {
                            tracing::debug!(variable = %self.cfg.variable(v).name, error = %e, "mirror call skipped");
                            continue;
                        }
                    };
                    bindings.push((
                        v,
                        MemoryBinding {
                            space,
                            confirmed: false,
                        },
                    ));
                }
                continue;
            }
            let expanded = self.aliases.expand(&texts);
            if let Some(space) = self.space_of_type(&expanded) {
                bindings.push((
                    v,
                    MemoryBinding {
                        space,
                        confirmed: true,
                    },
                ));
            }
        }

        tracing::debug!(file = %self.path.display(), tracked = bindings.len(), "memory spaces resolved");
        for (v, binding) in bindings {
            self.cfg.variable_mut(v).bind_memory(binding);
        }
        Ok(())
    }

    fn space_of_type(&self, texts: &[String]) -> Option<MemorySpace> {
        let config = self.config;
        let family = texts.iter().position(|t| config.is_field_family(t))?;
        let has_any = |names: &[String]| texts.iter().any(|t| names.contains(t));

        if has_any(&config.host_wrappers) {
            return Some(MemorySpace::Host);
        }
        if has_any(&config.device_space_markers) {
            return Some(MemorySpace::Device);
        }
        if has_any(&config.host_space_markers) {
            return Some(MemorySpace::Host);
        }
        if texts.get(family + 1).map(String::as_str) != Some("<") {
            return Some(MemorySpace::Device);
        }
        match last_template_argument(texts, family + 1) {
            Some(argument) => Some(space_of_argument(&argument)),
            None => Some(MemorySpace::Unknown),
        }
    }

    fn initializer_of(&self, var: VarIdx) -> Option<StatementSpan> {
        let name = self.cfg.variable(var).name_token.get()?;
        let statements = self.cfg.statements();
        let mut span = statements.containing(name);
        let mut at = name;
        if self.cfg.next_text(name) == ";" {
            // `auto x = e;` arrives as `auto x ; x = e ;`
            let assignment = TokenIdx(span.end.0 + 1);
            if assignment.index() >= self.cfg.tokens.len()
                || self.cfg.token(assignment).variable.get() != Some(var)
            {
                return None;
            }
            span = statements.containing(assignment);
            at = assignment;
        }
        let eq = self.cfg.next(at).filter(|&t| self.cfg.text(t) == "=")?;
        let start = TokenIdx(eq.0 + 1);
        (start < span.end).then_some(StatementSpan {
            start,
            end: span.end,
        })
    }

    fn mirror_call_in(&self, span: StatementSpan) -> Option<TokenIdx> {
        span.indices().find(|&t| {
            self.config.mirror_functions.iter().any(|m| m == self.cfg.text(t))
                && self.cfg.next_text(t) == "("
        })
    }

    fn mirror_space(&self, call: TokenIdx) -> Result<MemorySpace> {
        // Without an explicit device space a mirror lives on the host.
        let device = self.call_arguments(call)?.into_iter().flatten().any(|t| {
            let text = self.cfg.text(t);
            self.config.device_space_markers.iter().any(|m| m == text)
        });
        Ok(if device {
            MemorySpace::Device
        } else {
            MemorySpace::Host
        })
    }
}

/// The tokens of the last argument of the template argument list opening
/// at `texts[open]`.
///
/// Returns `None` when the list is not closed before the type ends.
pub fn last_template_argument<S: AsRef<str>>(texts: &[S], open: usize) -> Option<Vec<&str>> {
    let mut depth = 0usize;
    let mut start = open + 1;
    for (i, text) in texts.iter().enumerate().skip(open) {
        match text.as_ref() {
            "<" => depth += 1,
            ">" => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(texts[start..i].iter().map(AsRef::as_ref).collect());
                }
            }
            ">>" => {
                if depth <= 2 {
                    return Some(texts[start..i].iter().map(AsRef::as_ref).collect());
                }
                depth -= 2;
            }
            "," if depth == 1 => start = i + 1,
            ";" | "{" | "}" => return None,
            _ => {}
        }
    }
    None
}

/// The space named by a memory-space template argument.
pub fn space_of_argument(argument: &[&str]) -> MemorySpace {
    for text in argument.iter().rev() {
        if text.ends_with("Allocator") {
            if text.contains("Device") {
                return MemorySpace::Device;
            }
            if text.contains("Host") {
                return MemorySpace::Host;
            }
        }
        if text.ends_with("Space") {
            return MemorySpace::Named(text.to_string());
        }
    }
    MemorySpace::Device
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{AliasTable, RunContext, Signatures};
    use crate::config::AnalysisConfig;
    use crate::dump::builder::{DumpBuilder, GLOBAL};
    use crate::dump::{Ref, TranslationUnit};
    use test_case::test_case;

    fn words(code: &str) -> Vec<String> {
        code.split_whitespace().map(String::from).collect()
    }

    fn with_analyzer<R>(unit: &mut TranslationUnit, f: impl FnOnce(&mut UnitAnalyzer<'_>) -> R) -> R {
        let config = AnalysisConfig::default();
        let aliases = AliasTable::new();
        let signatures = Signatures::default();
        let mut run = RunContext::new();
        let path = unit.path.clone();
        let main_file = unit.main_file_index();
        let mut analyzer = UnitAnalyzer {
            cfg: &mut unit.configurations[0],
            path: &path,
            main_file,
            config: &config,
            aliases: &aliases,
            signatures: &signatures,
            run: &mut run,
        };
        f(&mut analyzer)
    }

    #[test_case("DFieldMem < IdxRangeX , DeviceAllocator < double > >", Some(MemorySpace::Device) ; "device allocator")]
    #[test_case("DFieldMem < IdxRangeX , HostAllocator < double > >", Some(MemorySpace::Host) ; "host allocator")]
    #[test_case("host_t < DFieldMem < IdxRangeX > >", Some(MemorySpace::Host) ; "host wrapper")]
    #[test_case("DField < IdxRangeX , Kokkos :: HostSpace >", Some(MemorySpace::Host) ; "host space")]
    #[test_case("DField < IdxRangeX , Kokkos :: SharedSpace >", Some(MemorySpace::Named("SharedSpace".to_string())) ; "named space")]
    #[test_case("DFieldMem < IdxRangeX , CudaUVMAllocator < double >", Some(MemorySpace::Unknown) ; "unbalanced")]
    #[test_case("DFieldMem < IdxRangeX >", Some(MemorySpace::Device) ; "default device")]
    #[test_case("DiscreteToCartesian", Some(MemorySpace::Device) ; "no template arguments")]
    #[test_case("std :: vector < double >", None ; "not a field")]
    fn test_space_of_type(ty: &str, expected: Option<MemorySpace>) {
        let mut unit = DumpBuilder::new("src/a.cpp").build().unwrap();
        let space = with_analyzer(&mut unit, |a| a.space_of_type(&words(ty)));
        assert_eq!(space, expected);
    }

    #[test]
    fn test_last_template_argument() {
        let texts = ["Chunk", "<", "double", ",", "IdxRange", "<", "X", ">", ",", "Alloc", ">"];
        assert_eq!(last_template_argument(&texts, 1), Some(vec!["Alloc"]));
        assert_eq!(last_template_argument(&texts[..4], 1), None);
        let merged = ["F", "<", "A", "<", "B", ">>"];
        assert_eq!(last_template_argument(&merged, 1), Some(vec!["A", "<", "B"]));
    }

    #[test]
    fn test_declared_and_mirrored_variables() {
        let mut unit = DumpBuilder::new("src/a.cpp")
            .func("f", "f", GLOBAL)
            .variable("d", "f", "Local")
            .variable("h", "f", "Local")
            .variable("n", "f", "Local")
            .variable("i", "f", "Local")
            .line("void f@def=f ( ) {@f")
            .line("DFieldMem@ts=d < IdxRangeX >@te=d d@decl=d ( idx_range ) ;")
            .line("auto@ty=h h@decl=h ; h@h = ddc :: create_mirror_view_and_copy ( d@d ) ;")
            .line("auto@ty=n n@decl=n = ddc :: create_mirror_view ( Kokkos :: DefaultExecutionSpace ( ) , h@h ) ;")
            .line("int@ty=i i@decl=i = 0 ;")
            .line("}@f")
            .build()
            .unwrap();
        with_analyzer(&mut unit, |a| a.resolve_memory_spaces().unwrap());
        let cfg = &unit.configurations[0];
        let binding = |v: usize| cfg.variables[v].memory().cloned();
        assert_eq!(
            binding(0),
            Some(MemoryBinding {
                space: MemorySpace::Device,
                confirmed: true
            })
        );
        assert_eq!(
            binding(1),
            Some(MemoryBinding {
                space: MemorySpace::Host,
                confirmed: false
            })
        );
        assert_eq!(binding(2).map(|b| b.space), Some(MemorySpace::Device));
        assert_eq!(binding(3), None);
    }

    #[test]
    fn test_unlinked_mirror_call_leaves_others_tracked() {
        let mut unit = DumpBuilder::new("src/a.cpp")
            .func("f", "f", GLOBAL)
            .variable("d", "f", "Local")
            .variable("h", "f", "Local")
            .variable("e", "f", "Local")
            .line("void f@def=f ( ) {@f")
            .line("DFieldMem@ts=d < IdxRangeX >@te=d d@decl=d ( idx_range ) ;")
            .line("auto@ty=h h@decl=h = ddc :: create_mirror_view ( d@d ) ;")
            .line("DFieldMem@ts=e < IdxRangeX , HostAllocator < double > >@te=e e@decl=e ( idx_range ) ;")
            .line("}@f")
            .build()
            .unwrap();
        let cfg = &mut unit.configurations[0];
        let call = cfg
            .tokens
            .iter()
            .position(|t| t.text == "create_mirror_view")
            .unwrap();
        cfg.tokens[call + 1].link = Ref::Dangling("0".to_string());

        with_analyzer(&mut unit, |a| a.resolve_memory_spaces().unwrap());
        let cfg = &unit.configurations[0];
        let space = |v: usize| cfg.variables[v].memory().map(|b| b.space.clone());
        assert_eq!(space(0), Some(MemorySpace::Device));
        assert_eq!(space(1), None);
        assert_eq!(space(2), Some(MemorySpace::Host));
    }

    #[test]
    fn test_alias_reveals_field_type() {
        let mut unit = DumpBuilder::new("src/a.cpp")
            .func("f", "f", GLOBAL)
            .variable("d", "f", "Local")
            .line("void f@def=f ( ) {@f DFieldMemX@ty=d d@decl=d ; }@f")
            .build()
            .unwrap();
        let mut aliases = AliasTable::new();
        aliases.insert("DFieldMemX", words("host_t < DFieldMem < IdxRangeX > >"));
        let config = AnalysisConfig::default();
        let signatures = Signatures::default();
        let mut run = RunContext::new();
        let path = unit.path.clone();
        let mut analyzer = UnitAnalyzer {
            cfg: &mut unit.configurations[0],
            path: &path,
            main_file: 0,
            config: &config,
            aliases: &aliases,
            signatures: &signatures,
            run: &mut run,
        };
        analyzer.resolve_memory_spaces().unwrap();
        assert_eq!(
            unit.configurations[0].variables[0].memory().map(|b| b.space.clone()),
            Some(MemorySpace::Host)
        );
    }
}
