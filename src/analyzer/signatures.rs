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

//! Function signature harvest.
//!
//! Records, by name, the functions of a group which return an owning field
//! handle and the ones declared to return `auto`.

use std::collections::HashSet;

use regex::Regex;

use super::aliases::AliasTable;
use crate::dump::{Configuration, TokenIdx};

/// Names of functions with a notable return type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signatures {
    /// Functions returning an owning handle.
    pub owning: HashSet<String>,
    /// Functions returning `auto`.
    pub auto: HashSet<String>,
}

impl Signatures {
    pub fn returns_owning(&self, name: &str) -> bool {
        self.owning.contains(name)
    }

    pub fn returns_auto(&self, name: &str) -> bool {
        self.auto.contains(name)
    }

    pub fn extend(&mut self, other: Signatures) {
        self.owning.extend(other.owning);
        self.auto.extend(other.auto);
    }
}

/// Texts of the return type written in front of a function's name token.
///
/// A class qualification (`Shape ::`) directly before the name is dropped.
pub fn return_type_texts(cfg: &Configuration, name_token: TokenIdx) -> Vec<&str> {
    let prefix = cfg.statements().prefix_of(name_token);
    let mut texts: Vec<&str> = prefix.indices().map(|t| cfg.text(t)).collect();
    while texts.len() >= 2 && texts[texts.len() - 1] == "::" {
        texts.truncate(texts.len() - 2);
    }
    texts
}

/// Harvest the signatures of every function defined in `cfg`.
pub fn harvest(cfg: &Configuration, aliases: &AliasTable, owning: &Regex) -> Signatures {
    let mut signatures = Signatures::default();
    for function in &cfg.functions {
        let Some(def) = function.token_def.get() else {
            continue;
        };
        let texts = return_type_texts(cfg, def);
        if texts.last() == Some(&"auto") {
            signatures.auto.insert(function.name.clone());
            continue;
        }
        let joined = aliases.expand(&texts).join(" ");
        if owning.is_match(&joined) {
            signatures.owning.insert(function.name.clone());
        }
    }
    signatures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::dump::builder::{DumpBuilder, GLOBAL};

    fn harvest_code(code: &str, aliases: &AliasTable) -> Signatures {
        let unit = DumpBuilder::new("src/a.cpp")
            .func("make", "make", GLOBAL)
            .func("deduce", "deduce", GLOBAL)
            .func("view", "view", GLOBAL)
            .code(code)
            .build()
            .unwrap();
        let regex = AnalysisConfig::default().owning_return_regex().unwrap();
        harvest(&unit.configurations[0], aliases, &regex)
    }

    #[test]
    fn test_owning_auto_and_view_returns() {
        let signatures = harvest_code(
            "DFieldMem < IdxRangeX > make@def=make ( ) {@make }@make\n\
             auto deduce@def=deduce ( ) {@deduce }@deduce\n\
             DField < IdxRangeX > view@def=view ( ) {@view }@view",
            &AliasTable::new(),
        );
        assert!(signatures.returns_owning("make"));
        assert!(signatures.returns_auto("deduce"));
        assert!(!signatures.returns_owning("view"));
        assert!(!signatures.returns_owning("deduce"));
    }

    #[test]
    fn test_alias_and_qualified_return_types() {
        let mut aliases = AliasTable::new();
        aliases.insert("DFieldMemX", vec!["DFieldMem".to_string(), "<".to_string(), "IdxRangeX".to_string(), ">".to_string()]);
        let signatures = harvest_code(
            "DFieldMemX Builder :: make@def=make ( ) {@make }@make\n\
             ddc :: Chunk < double > view@def=view ( ) {@view }@view",
            &aliases,
        );
        assert!(signatures.returns_owning("make"));
        assert!(signatures.returns_owning("view"));
    }
}
