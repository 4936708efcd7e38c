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

//! Parameterised checks over the configured vocabularies.

use spacecheck::analyzer::{analyze_group, RunContext};
use spacecheck::config::AnalysisConfig;
use spacecheck::dump::builder::{DumpBuilder, GLOBAL};
use spacecheck::dump::{ExecSpace, TranslationUnit};
use spacecheck::error::{CheckId, Finding, Severity};
use test_case::test_case;

fn analyze(units: &mut [TranslationUnit]) -> Vec<Finding> {
    let mut run = RunContext::new();
    analyze_group(units, &AnalysisConfig::default(), &mut run).unwrap();
    run.into_findings()
}

#[test_case("KOKKOS_FUNCTION", ExecSpace::Device ; "function")]
#[test_case("KOKKOS_INLINE_FUNCTION", ExecSpace::Device ; "inline function")]
#[test_case("KOKKOS_FORCEINLINE_FUNCTION", ExecSpace::Device ; "forced inline function")]
#[test_case("KOKKOS_DEFAULTED_FUNCTION", ExecSpace::Device ; "defaulted function")]
#[test_case("KOKKOS_IMPL_HOST_DEVICE_FUNCTION", ExecSpace::Device ; "generic prefix")]
#[test_case("inline", ExecSpace::Host ; "plain inline")]
#[test_case("static", ExecSpace::Host ; "static")]
fn test_function_marker(marker: &str, expected: ExecSpace) {
    let mut units = vec![DumpBuilder::new("src/a.cpp")
        .func("f", "f", GLOBAL)
        .line(&format!("{marker} void f@def=f ( ) {{@f }}@f"))
        .build()
        .unwrap()];
    analyze(&mut units);
    assert_eq!(units[0].configurations[0].scopes[1].exec_space(), Some(expected));
}

#[test_case("parallel_for_each")]
#[test_case("parallel_for")]
#[test_case("parallel_reduce")]
#[test_case("parallel_transform_reduce")]
#[test_case("parallel_scan")]
fn test_dispatch_with_undecorated_lambda(dispatch: &str) {
    let mut units = vec![DumpBuilder::new("src/a.cpp")
        .func("f", "f", GLOBAL)
        .lambda("l", "f")
        .line("void f@def=f ( ) {@f")
        .line(&format!("ddc :: {dispatch} ( range , [ & ] ( int i ) {{@l }}@l ) ;"))
        .line("}@f")
        .build()
        .unwrap()];
    let findings = analyze(&mut units);
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].check, CheckId::UndecoratedLaunchLambda);
    assert!(findings[0].message.contains(&format!("Lambda passed to {dispatch}")));
    assert!(findings[0].message.contains("[&](int i)"));
}

#[test_case("std :: cout << 1 ;", 1 ; "stream")]
#[test_case("std :: vector < int > v ;", 1 ; "container")]
#[test_case("std :: size_t n = 0 ;", 0 ; "size type")]
#[test_case("constexpr bool b = std :: is_same_v < int , T > ;", 0 ; "type trait")]
fn test_std_in_device_code(statement: &str, expected: usize) {
    let mut units = vec![DumpBuilder::new("src/a.cpp")
        .func("f", "f", GLOBAL)
        .line("KOKKOS_FUNCTION void f@def=f ( ) {@f")
        .line(statement)
        .line("}@f")
        .build()
        .unwrap()];
    let findings = analyze(&mut units);
    let std_findings: Vec<&Finding> = findings.iter().filter(|f| f.check == CheckId::StdOnGpu).collect();
    assert_eq!(std_findings.len(), expected);
    assert!(std_findings.iter().all(|f| f.severity == Severity::Fatal));
}

#[test_case(Severity::Warning, 1)]
#[test_case(Severity::Style, 2)]
#[test_case(Severity::Error, 3)]
#[test_case(Severity::Fatal, 4)]
fn test_exit_status_of_worst_severity(worst: Severity, status: u8) {
    let mut run = RunContext::new();
    run.report(Finding::new(CheckId::Structural, worst, "src/a.cpp", 1, "x"));
    assert_eq!(run.exit_status(Severity::Warning), status);
    assert_eq!(run.exit_status(Severity::Fatal), if worst == Severity::Fatal { 4 } else { 0 });
}
