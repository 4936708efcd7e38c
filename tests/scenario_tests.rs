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

//! End-to-end scenarios through the whole analysis pipeline.

use pretty_assertions::assert_eq;
use spacecheck::analyzer::{analyze_group, RunContext};
use spacecheck::config::AnalysisConfig;
use spacecheck::dump::builder::{DumpBuilder, GLOBAL};
use spacecheck::dump::{ExecMarker, ExecSpace, TranslationUnit};
use spacecheck::error::{CheckId, Finding, Severity};

fn analyze(units: &mut [TranslationUnit]) -> Vec<Finding> {
    let mut run = RunContext::new();
    analyze_group(units, &AnalysisConfig::default(), &mut run).unwrap();
    run.into_findings()
}

fn of_check(findings: &[Finding], check: CheckId) -> Vec<&Finding> {
    findings.iter().filter(|f| f.check == check).collect()
}

/// A device lambda written in a host function runs on the device.
#[test]
fn scenario_a_device_lambda_in_host_function() {
    let mut units = vec![DumpBuilder::new("src/a.cpp")
        .func("f", "run", GLOBAL)
        .lambda("l", "f")
        .line("void run@def=f ( ) {@f")
        .line("auto k = KOKKOS_LAMBDA ( int i ) {@l }@l ;")
        .line("}@f")
        .build()
        .unwrap()];
    analyze(&mut units);

    let scopes = &units[0].configurations[0].scopes;
    let host = scopes[1].exec().unwrap();
    assert_eq!(host.space, ExecSpace::Host);
    let lambda = scopes[2].exec().unwrap();
    assert_eq!(lambda.space, ExecSpace::Device);
    assert_eq!(lambda.marker, ExecMarker::DeviceLambda);
    assert!(!lambda.inherited);
}

/// A device field indexed from the host is reported once.
#[test]
fn scenario_b_device_field_accessed_from_host() {
    let mut units = vec![DumpBuilder::new("src/a.cpp")
        .func("f", "fill", GLOBAL)
        .variable("x", "f", "Local")
        .line("void fill@def=f ( ) {@f")
        .line("DFieldMem@ts=x < IdxRangeX , DeviceAllocator < double > >@te=x x@decl=x ( r ) ;")
        .line("x@x ( i ) = 1.0 ;")
        .line("}@f")
        .build()
        .unwrap()];
    let findings = analyze(&mut units);

    let bad = of_check(&findings, CheckId::BadAccessCpuGpu);
    assert_eq!(bad.len(), 1);
    assert_eq!(bad[0].severity, Severity::Fatal);
    assert_eq!(bad[0].line, 3);
    assert!(bad[0].message.contains("current execution space is \"Host\""));
    assert!(bad[0].message.contains("compatible with \"Device\""));

    let variable = &units[0].configurations[0].variables[0];
    assert_eq!(variable.memory().unwrap().space.to_string(), "Device");
}

/// A class with a reference member, a device method and no device
/// constructor cannot be built on the device.
#[test]
fn scenario_c_reference_member_in_device_class() {
    let mut units = vec![DumpBuilder::new("src/a.cpp")
        .class("c", "Shape", GLOBAL)
        .variable("p", "c", "Private")
        .reference("p")
        .constructor("k", "Shape", "c")
        .func("m", "area", "c")
        .line("class Shape {@c")
        .line("Position@ts=p &@te=p m_pos@decl=p ;")
        .line("Shape@def=k ( Position & p ) {@k }@k")
        .line("KOKKOS_FUNCTION double area@def=m ( ) const {@m return 0.0 ; }@m")
        .line("}@c ;")
        .build()
        .unwrap()];
    let findings = analyze(&mut units);

    let class = of_check(&findings, CheckId::ClassExecSpace);
    assert_eq!(class.len(), 1);
    assert_eq!(class[0].severity, Severity::Error);
    assert!(class[0].message.contains("Shape"));
}

/// An undecorated lambda given to a dispatch call gets a suggested fix.
#[test]
fn scenario_d_undecorated_launch_lambda() {
    let mut units = vec![DumpBuilder::new("src/a.cpp")
        .func("f", "fill", GLOBAL)
        .lambda("l", "f")
        .line("void fill@def=f ( ) {@f")
        .line("ddc :: parallel_for_each ( Kokkos :: DefaultExecutionSpace ( ) , range , [ = ] ( Idx const i ) {@l }@l ) ;")
        .line("}@f")
        .build()
        .unwrap()];
    let findings = analyze(&mut units);

    let undecorated = of_check(&findings, CheckId::UndecoratedLaunchLambda);
    assert_eq!(undecorated.len(), 1);
    assert_eq!(undecorated[0].severity, Severity::Error);
    assert!(undecorated[0].message.contains("[=](Idx const i)"));
    assert!(undecorated[0].message.contains("KOKKOS_LAMBDA(Idx const i)"));
}

/// A class lambda using one member out of four captures too much.
#[test]
fn scenario_e_unnecessary_class_capture() {
    let mut units = vec![DumpBuilder::new("src/a.cpp")
        .class("c", "Solver", GLOBAL)
        .variable("a", "c", "Private")
        .variable("b", "c", "Private")
        .variable("d", "c", "Private")
        .variable("e", "c", "Private")
        .func("f", "solve", "c")
        .lambda("l", "f")
        .line("class Solver {@c")
        .line("double@ty=a m_a@decl=a ; double@ty=b m_b@decl=b ;")
        .line("double@ty=d m_d@decl=d ; double@ty=e m_e@decl=e ;")
        .line("void solve@def=f ( ) {@f")
        .line("ddc :: parallel_for_each ( Kokkos :: DefaultExecutionSpace ( ) , range , KOKKOS_CLASS_LAMBDA ( Idx const i ) {@l g ( i ) = m_a@a ; }@l ) ;")
        .line("}@f")
        .line("}@c ;")
        .build()
        .unwrap()];
    let findings = analyze(&mut units);

    let capture = of_check(&findings, CheckId::UnnecessaryGpuClassCapture);
    assert_eq!(capture.len(), 1);
    assert_eq!(capture[0].severity, Severity::Warning);
    assert_eq!(capture[0].line, 5);
    assert!(of_check(&findings, CheckId::ClassVarOnGpu).is_empty());
    assert!(of_check(&findings, CheckId::ClassVarInLaunch).is_empty());
}

fn geometry_header() -> TranslationUnit {
    DumpBuilder::new("src/geometryXY/geometry.hpp")
        .line("using DFieldMemHost = DFieldMem < IdxRangeX , HostAllocator < double > > ;")
        .header_only()
        .build()
        .unwrap()
}

fn device_user() -> TranslationUnit {
    DumpBuilder::new("src/geometryXY/a.cpp")
        .include("geometry.hpp")
        .func("f", "f", GLOBAL)
        .variable("x", "f", "Local")
        .line("KOKKOS_FUNCTION void f@def=f ( ) {@f")
        .line("DFieldMemHost@ty=x x@decl=x ( r ) ;")
        .line("x@x ( i ) = 1.0 ;")
        .line("}@f")
        .build()
        .unwrap()
}

/// An alias written in a shared header is visible in the files including it.
#[test]
fn test_alias_from_shared_header() {
    let mut units = vec![device_user(), geometry_header()];
    let findings = analyze(&mut units);
    let bad = of_check(&findings, CheckId::BadAccessCpuGpu);
    assert_eq!(bad.len(), 1);
    // The include directive is line 1.
    assert_eq!(bad[0].line, 4);
    assert!(bad[0].message.contains("current execution space is \"Device\""));
    assert!(bad[0].message.contains("compatible with \"Host\""));
}

#[test]
fn test_alias_needs_its_header_in_the_group() {
    let mut units = vec![device_user()];
    let findings = analyze(&mut units);
    assert!(of_check(&findings, CheckId::BadAccessCpuGpu).is_empty());
}

/// A file loaded by two groups is only audited by the first.
#[test]
fn test_unit_audited_once_per_run() {
    let config = AnalysisConfig::default();
    let mut run = RunContext::new();
    let mut first = vec![device_user(), geometry_header()];
    let mut second = vec![device_user(), geometry_header()];
    analyze_group(&mut first, &config, &mut run).unwrap();
    let after_first = run.findings().len();
    analyze_group(&mut second, &config, &mut run).unwrap();
    assert_eq!(run.findings().len(), after_first);
    assert!(after_first > 0);
}

/// Findings raised identically by two preprocessor configurations are
/// reported once.
#[test]
fn test_configurations_deduplicated() {
    let mut unit = DumpBuilder::new("src/a.cpp")
        .func("f", "fill", GLOBAL)
        .variable("x", "f", "Local")
        .line("void fill@def=f ( ) {@f")
        .line("DFieldMem@ts=x < IdxRangeX , DeviceAllocator < double > >@te=x x@decl=x ( r ) ;")
        .line("x@x ( i ) = 1.0 ;")
        .line("}@f")
        .build()
        .unwrap();
    let mut second = unit.configurations[0].clone();
    second.name = "USE_MPI".to_string();
    unit.configurations.push(second);

    let findings = analyze(std::slice::from_mut(&mut unit));
    assert_eq!(of_check(&findings, CheckId::BadAccessCpuGpu).len(), 1);
}

/// A unit with raw tokens only is not audited and raises nothing.
#[test]
fn test_header_only_unit_is_quiet() {
    let mut units = vec![geometry_header()];
    assert!(analyze(&mut units).is_empty());
    assert!(units[0].is_header_only());
}

/// A host mirror indexed inside a device lambda fails the run.
#[test]
fn test_host_mirror_used_on_device_fails_run() {
    let mut units = vec![DumpBuilder::new("src/a.cpp")
        .func("f", "fill", GLOBAL)
        .variable("d", "f", "Local")
        .variable("h", "f", "Local")
        .lambda("l", "f")
        .line("void fill@def=f ( ) {@f")
        .line("DFieldMem@ts=d < IdxRangeX >@te=d d@decl=d ( r ) ;")
        .line("auto@ty=h h@decl=h = ddc :: create_mirror_view_and_copy ( d@d ) ;")
        .line("ddc :: parallel_for_each ( Kokkos :: DefaultExecutionSpace ( ) , r , KOKKOS_LAMBDA ( Idx i ) {@l h@h ( i ) = 1.0 ; }@l ) ;")
        .line("}@f")
        .build()
        .unwrap()];
    let mut run = RunContext::new();
    analyze_group(&mut units, &AnalysisConfig::default(), &mut run).unwrap();

    let bad = of_check(run.findings(), CheckId::BadAccessCpuGpu);
    assert_eq!(bad.len(), 1);
    assert_eq!(bad[0].severity, Severity::Fatal);
    assert_eq!(run.exit_status(Severity::Error), Severity::Fatal.exit_status());
}

/// A device method defined outside its class body uses the members freely.
#[test]
fn test_out_of_line_device_method() {
    let mut units = vec![DumpBuilder::new("src/a.cpp")
        .class("c", "Disk", GLOBAL)
        .variable("r", "c", "Private")
        .out_of_line("m", "area", "c", GLOBAL)
        .line("class Disk {@c")
        .line("double@ty=r m_r@decl=r ;")
        .line("}@c ;")
        .line("KOKKOS_FUNCTION double Disk :: area@def=m ( ) const {@m return m_r@r * m_r@r ; }@m")
        .build()
        .unwrap()];
    let findings = analyze(&mut units);
    assert_eq!(findings, Vec::<Finding>::new());
}
