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

//! Fuzz target for dump ingestion.
//!
//! Arbitrary text is handed to the dump reader, which must answer with a
//! unit or a [`DumpError`](spacecheck::error::DumpError) and never panic.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_dump

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::path::Path;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = spacecheck::dump::TranslationUnit::parse_str(text, Path::new("fuzz.cpp.dump"));
    }
});
