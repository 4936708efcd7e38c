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

//! Preprocessor directives.
//!
//! Directives arrive as plain text (`#include "geometry.hpp"`). A small
//! logos lexer splits them so include targets can be read without string
//! slicing heuristics.

use logos::Logos;
use std::path::PathBuf;

use super::RawToken;

/// Tokens of a single directive line.
#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(skip r"[ \t]+")]
pub enum DirectiveToken {
    #[token("#")]
    Hash,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Word(String),

    #[regex(r#""[^"]*""#, |lex| { let s = lex.slice(); s[1..s.len() - 1].to_string() })]
    Quoted(String),

    #[regex(r"<[^>]*>", |lex| { let s = lex.slice(); s[1..s.len() - 1].to_string() })]
    Angled(String),
}

/// Lex a directive line, dropping anything the lexer does not recognise.
pub fn lex_directive(text: &str) -> Vec<DirectiveToken> {
    DirectiveToken::lexer(text).filter_map(|t| t.ok()).collect()
}

/// The file named by an `#include` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeTarget {
    /// The included path as written.
    pub name: String,
    /// `true` for `"..."`, `false` for `<...>`.
    pub quoted: bool,
}

impl IncludeTarget {
    /// The last path component of the included name.
    pub fn file_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

/// A preprocessor directive recorded in a dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// File the directive appears in.
    pub file: PathBuf,
    /// Line number (1-indexed).
    pub line: u32,
    /// Directive text.
    pub text: String,
}

impl Directive {
    /// The include target, if this is an `#include` directive.
    pub fn include_target(&self) -> Option<IncludeTarget> {
        parse_include(&self.text)
    }
}

/// Parse the target of an `#include` line.
pub fn parse_include(text: &str) -> Option<IncludeTarget> {
    let tokens = lex_directive(text);
    match tokens.as_slice() {
        [DirectiveToken::Hash, DirectiveToken::Word(w), target, ..] if w == "include" => {
            match target {
                DirectiveToken::Quoted(name) => Some(IncludeTarget {
                    name: name.clone(),
                    quoted: true,
                }),
                DirectiveToken::Angled(name) => Some(IncludeTarget {
                    name: name.clone(),
                    quoted: false,
                }),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Recover quoted `#include` targets from raw tokens.
///
/// Used for header-only units whose dump has no directive list.
pub fn includes_from_raw(raw: &[RawToken]) -> Vec<IncludeTarget> {
    raw.windows(3)
        .filter(|w| w[0].text == "#" && w[1].text == "include")
        .filter_map(|w| {
            let text = &w[2].text;
            if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
                Some(IncludeTarget {
                    name: text[1..text.len() - 1].to_string(),
                    quoted: true,
                })
            } else {
                None
            }
        })
        .collect()
}
