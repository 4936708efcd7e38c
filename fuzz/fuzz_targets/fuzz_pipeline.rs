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

//! Fuzz target for the full analysis of a single dump.
//!
//! Inputs that parse as a dump are analysed with the default
//! configuration. Broken cross-references must surface as findings.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_pipeline -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::path::Path;

use spacecheck::analyzer::{analyze_group, RunContext};
use spacecheck::config::AnalysisConfig;
use spacecheck::dump::TranslationUnit;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(unit) = TranslationUnit::parse_str(text, Path::new("fuzz.cpp.dump")) else {
        return;
    };
    let mut units = vec![unit];
    let mut run = RunContext::new();
    let _ = analyze_group(&mut units, &AnalysisConfig::default(), &mut run);
});
