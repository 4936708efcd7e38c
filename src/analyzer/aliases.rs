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

//! Type aliases.
//!
//! Phase 1 extracts the `using Name = ...;` declarations written in each
//! unit. Phase 2 merges into every unit the tables of the shared headers it
//! includes, transitively, before any unit is audited. A unit's own alias
//! always wins over an included one.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::dump::{IncludeTarget, TranslationUnit};

/// Bound on nested alias substitution.
pub const MAX_ALIAS_DEPTH: usize = 8;

/// Alias name to the token texts of its definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    entries: HashMap<String, Vec<String>>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, definition: Vec<String>) {
        self.entries.insert(name.into(), definition);
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add every entry of `other` whose name is not defined yet.
    pub fn merge_missing(&mut self, other: &AliasTable) {
        for (name, definition) in &other.entries {
            self.entries
                .entry(name.clone())
                .or_insert_with(|| definition.clone());
        }
    }

    /// Replace every alias name in `texts` by its definition, repeatedly,
    /// up to [`MAX_ALIAS_DEPTH`] rounds.
    pub fn expand<S: AsRef<str>>(&self, texts: &[S]) -> Vec<String> {
        let mut current: Vec<String> = texts.iter().map(|t| t.as_ref().to_string()).collect();
        if self.entries.is_empty() {
            return current;
        }
        for _ in 0..MAX_ALIAS_DEPTH {
            let mut changed = false;
            let mut next = Vec::with_capacity(current.len());
            for (i, text) in current.iter().enumerate() {
                // `Other::Name` is not our `Name`
                let qualified = i > 0 && current[i - 1] == "::";
                match self.entries.get(text) {
                    Some(definition) if !qualified => {
                        next.extend(definition.iter().cloned());
                        changed = true;
                    }
                    _ => next.push(text.clone()),
                }
            }
            current = next;
            if !changed {
                break;
            }
        }
        current
    }
}

/// Read `using Name = ... ;` declarations from a token text sequence.
pub fn extract_aliases<'a>(texts: impl IntoIterator<Item = &'a str>) -> AliasTable {
    let texts: Vec<&str> = texts.into_iter().collect();
    let mut table = AliasTable::new();
    let mut i = 0;
    while i + 3 < texts.len() {
        if texts[i] == "using" && texts[i + 2] == "=" && is_identifier(texts[i + 1]) {
            let start = i + 3;
            let end = texts[start..]
                .iter()
                .position(|t| *t == ";")
                .map(|p| start + p)
                .unwrap_or(texts.len());
            let definition = texts[start..end].iter().map(|t| t.to_string()).collect();
            table.insert(texts[i + 1], definition);
            i = end;
        } else {
            i += 1;
        }
    }
    table
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// The aliases a unit declares in its own source file.
///
/// Raw tokens are preferred since they are present for every unit; the
/// expanded stream is used when a dump carries no raw section.
pub fn local_aliases(unit: &TranslationUnit) -> AliasTable {
    if !unit.raw_tokens.is_empty() {
        return extract_aliases(
            unit.raw_tokens
                .iter()
                .filter(|t| unit.is_main_file(t.file))
                .map(|t| t.text.as_str()),
        );
    }
    match unit.configurations.first() {
        Some(cfg) => extract_aliases(
            cfg.tokens
                .iter()
                .filter(|t| unit.is_main_file(t.file))
                .map(|t| t.text.as_str()),
        ),
        None => AliasTable::new(),
    }
}

/// Phase 1 facts about one unit.
#[derive(Debug, Clone)]
pub struct UnitAliases {
    pub path: PathBuf,
    pub local: AliasTable,
    pub includes: Vec<IncludeTarget>,
}

impl UnitAliases {
    pub fn of(unit: &TranslationUnit) -> Self {
        Self {
            path: unit.path.clone(),
            local: local_aliases(unit),
            includes: unit.includes(),
        }
    }
}

/// Phase 2: merge the shared headers' tables into every unit.
pub fn merge_group(units: &[UnitAliases], shared_headers: &[String]) -> HashMap<PathBuf, AliasTable> {
    let mut merged = HashMap::new();
    for unit in units {
        let mut table = unit.local.clone();
        let mut visited = HashSet::new();
        visited.insert(unit.path.clone());
        merge_includes(units, shared_headers, unit, &mut table, &mut visited);
        debug!(
            file = %unit.path.display(),
            local = unit.local.len(),
            merged = table.len(),
            "merged aliases"
        );
        merged.insert(unit.path.clone(), table);
    }
    merged
}

fn merge_includes(
    units: &[UnitAliases],
    shared_headers: &[String],
    unit: &UnitAliases,
    table: &mut AliasTable,
    visited: &mut HashSet<PathBuf>,
) {
    for include in &unit.includes {
        let name = include.file_name();
        if !shared_headers.iter().any(|h| h == name) {
            continue;
        }
        let Some(header) = find_header(units, include) else {
            debug!(include = %include.name, "shared header not loaded in this group");
            continue;
        };
        if !visited.insert(header.path.clone()) {
            continue;
        }
        table.merge_missing(&header.local);
        merge_includes(units, shared_headers, header, table, visited);
    }
}

/// The unit of the group an include refers to.
fn find_header<'a>(units: &'a [UnitAliases], include: &IncludeTarget) -> Option<&'a UnitAliases> {
    let wanted = Path::new(&include.name);
    let mut candidates: Vec<&UnitAliases> = units.iter().filter(|u| u.path.ends_with(wanted)).collect();
    candidates.sort_by(|a, b| a.path.cmp(&b.path));
    if candidates.len() > 1 {
        warn!(
            include = %include.name,
            chosen = %candidates[0].path.display(),
            "include matches several files"
        );
    }
    candidates.first().copied()
}
