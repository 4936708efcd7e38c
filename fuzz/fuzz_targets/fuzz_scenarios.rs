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


//! Fuzz target for the checks over well-formed dumps.
//!
//! The input picks a function marker and a sequence of statements from a
//! fixed vocabulary; the dump is written by `DumpBuilder` and analysed.
//! Every combination must analyse without a structural finding.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_scenarios -- -max_total_time=60

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use spacecheck::analyzer::{analyze_group, RunContext};
use spacecheck::config::AnalysisConfig;
use spacecheck::dump::builder::{DumpBuilder, GLOBAL};
use spacecheck::error::CheckId;

#[derive(Debug, Arbitrary)]
enum Marker {
    None,
    Function,
    Inline,
}

#[derive(Debug, Arbitrary)]
enum Statement {
    IndexDevice,
    IndexHost,
    IndexMirror,
    Mirror,
    HostStd,
    DeviceLambda,
    PlainLaunch,
}

#[derive(Debug, Arbitrary)]
struct Scenario {
    marker: Marker,
    statements: Vec<Statement>,
}

fuzz_target!(|scenario: Scenario| {
    let marker = match scenario.marker {
        Marker::None => "",
        Marker::Function => "KOKKOS_FUNCTION ",
        Marker::Inline => "KOKKOS_INLINE_FUNCTION ",
    };
    let mut builder = DumpBuilder::new("src/fuzz.cpp");
    builder
        .func("f", "f", GLOBAL)
        .variable("d", "f", "Local")
        .variable("h", "f", "Local")
        .variable("m", "f", "Local")
        .line(&format!("{marker}void f@def=f ( ) {{@f"))
        .line("DFieldMem@ts=d < IdxRangeX >@te=d d@decl=d ( r ) ;")
        .line("DFieldMem@ts=h < IdxRangeX , HostAllocator < double > >@te=h h@decl=h ( r ) ;")
        .line("auto@ty=m m@decl=m = ddc :: create_mirror_view ( d@d ) ;");
    for (n, statement) in scenario.statements.iter().take(32).enumerate() {
        let lambda = format!("l{n}");
        match statement {
            Statement::IndexDevice => builder.line("d@d ( i ) = 1.0 ;"),
            Statement::IndexHost => builder.line("h@h ( i ) = 1.0 ;"),
            Statement::IndexMirror => builder.line("m@m ( i ) = 1.0 ;"),
            Statement::Mirror => builder.line("ddc :: create_mirror ( Kokkos :: DefaultHostExecutionSpace ( ) , d@d ) ;"),
            Statement::HostStd => builder.line("std :: cout << 1 ;"),
            Statement::DeviceLambda => builder.lambda(&lambda, "f").line(&format!(
                "ddc :: parallel_for_each ( range , KOKKOS_LAMBDA ( Idx i ) {{@{lambda} d@d ( i ) = h@h ( i ) ; }}@{lambda} ) ;"
            )),
            Statement::PlainLaunch => builder.lambda(&lambda, "f").line(&format!(
                "ddc :: parallel_for_each ( range , [ = ] ( Idx i ) {{@{lambda} m@m ( i ) = 0.0 ; }}@{lambda} ) ;"
            )),
        };
    }
    builder.line("}@f");

    let Ok(unit) = builder.build() else {
        return;
    };
    let mut units = vec![unit];
    let mut run = RunContext::new();
    if analyze_group(&mut units, &AnalysisConfig::default(), &mut run).is_ok() {
        assert!(run.findings().iter().all(|f| f.check != CheckId::Structural));
    }
});
