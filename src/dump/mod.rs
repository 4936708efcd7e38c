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

//! Dump ingestion.
//!
//! A cppcheck dump is read once into dense arrays. Every cross-reference
//! between tokens, scopes, variables and functions is interned into an
//! index at load time so that the checks never search by id.
//!
//! # Structure
//!
//! - [`TranslationUnit`] - one dump file: raw tokens plus configurations
//! - [`Configuration`] - one preprocessor configuration with its tokens,
//!   scopes, variables, functions and directives
//! - [`statements`] - statement segmentation of the token stream
//! - [`directives`] - `#include` parsing
//! - [`builder`] - a writer for synthetic dumps

pub mod builder;
pub mod directives;
mod parse;
pub mod scopes;
pub mod statements;
pub mod symbols;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AnalysisError, DumpError, Result};

pub use directives::{Directive, IncludeTarget};
pub use scopes::{ExecInfo, ExecMarker, ExecSpace, Scope, ScopeKind};
pub use statements::{StatementIndex, StatementSpan};
pub use symbols::{Access, Function, FunctionKind, MemoryBinding, MemorySpace, Variable};

macro_rules! index_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u32);

        impl $name {
            /// Position in the owning array.
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

index_type!(
    /// Index into [`Configuration::tokens`].
    TokenIdx
);
index_type!(
    /// Index into [`Configuration::scopes`].
    ScopeIdx
);
index_type!(
    /// Index into [`Configuration::variables`].
    VarIdx
);
index_type!(
    /// Index into [`Configuration::functions`].
    FuncIdx
);

/// A cross-reference between dump entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ref<T> {
    /// The dump does not name a target.
    Absent,
    /// The target was found.
    Resolved(T),
    /// The dump names an id that does not exist.
    Dangling(String),
}

impl<T> Default for Ref<T> {
    fn default() -> Self {
        Ref::Absent
    }
}

impl<T: Copy> Ref<T> {
    /// The target, if resolved.
    pub fn get(&self) -> Option<T> {
        match self {
            Ref::Resolved(t) => Some(*t),
            _ => None,
        }
    }

    /// The target, or a lookup error naming `what` was expected.
    pub fn require(&self, what: &'static str) -> Result<T> {
        match self {
            Ref::Resolved(t) => Ok(*t),
            Ref::Absent => Err(AnalysisError::lookup(what, "<none>")),
            Ref::Dangling(id) => Err(AnalysisError::lookup(what, id)),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Ref::Resolved(_))
    }
}

/// A token from the unpreprocessed source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawToken {
    pub text: String,
    /// Index into [`TranslationUnit::files`].
    pub file: u32,
    pub line: u32,
    pub column: u32,
}

/// A token of the expanded token stream.
#[derive(Debug, Clone)]
pub struct Token {
    pub id: String,
    pub text: String,
    /// Index into [`TranslationUnit::files`].
    pub file: u32,
    pub line: u32,
    pub column: u32,
    pub scope: Ref<ScopeIdx>,
    pub variable: Ref<VarIdx>,
    pub function: Ref<FuncIdx>,
    /// Matching bracket.
    pub link: Ref<TokenIdx>,
    /// Scope of the class this token's value type names.
    pub value_type_scope: Ref<ScopeIdx>,
}

/// Which sections a configuration carried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sections {
    pub tokens: bool,
    pub scopes: bool,
    pub variables: bool,
    pub directives: bool,
}

/// One preprocessor configuration of a translation unit.
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    /// Configuration name (`""` for the default one).
    pub name: String,
    pub tokens: Vec<Token>,
    pub scopes: Vec<Scope>,
    pub variables: Vec<Variable>,
    pub functions: Vec<Function>,
    pub directives: Vec<Directive>,
    pub sections: Sections,
    statements: StatementIndex,
    body_starts: HashMap<TokenIdx, ScopeIdx>,
    function_bodies: HashMap<FuncIdx, ScopeIdx>,
    token_ids: HashMap<String, TokenIdx>,
}

impl Configuration {
    /// Finish construction: build the derived lookup tables.
    pub(crate) fn index(mut self) -> Self {
        self.statements = StatementIndex::build(self.tokens.iter().map(|t| t.text.as_str()));
        self.token_ids = self
            .tokens
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.clone(), TokenIdx(i as u32)))
            .collect();
        for (i, scope) in self.scopes.iter().enumerate() {
            let idx = ScopeIdx(i as u32);
            if let Some(start) = scope.body_start.get() {
                self.body_starts.insert(start, idx);
            }
            if let Some(f) = scope.function.get() {
                self.function_bodies.entry(f).or_insert(idx);
            }
        }
        self
    }

    /// Whether the expanded token stream is present.
    pub fn has_tokens(&self) -> bool {
        self.sections.tokens && !self.tokens.is_empty()
    }

    pub fn token(&self, idx: TokenIdx) -> &Token {
        &self.tokens[idx.index()]
    }

    pub fn text(&self, idx: TokenIdx) -> &str {
        &self.tokens[idx.index()].text
    }

    /// Text of the token at `idx`, or `""` past either end.
    pub fn text_at(&self, idx: i64) -> &str {
        if idx < 0 {
            return "";
        }
        self.tokens
            .get(idx as usize)
            .map(|t| t.text.as_str())
            .unwrap_or("")
    }

    pub fn scope(&self, idx: ScopeIdx) -> &Scope {
        &self.scopes[idx.index()]
    }

    pub fn scope_mut(&mut self, idx: ScopeIdx) -> &mut Scope {
        &mut self.scopes[idx.index()]
    }

    pub fn variable(&self, idx: VarIdx) -> &Variable {
        &self.variables[idx.index()]
    }

    pub fn variable_mut(&mut self, idx: VarIdx) -> &mut Variable {
        &mut self.variables[idx.index()]
    }

    pub fn function(&self, idx: FuncIdx) -> &Function {
        &self.functions[idx.index()]
    }

    /// Look a token up by its dump id.
    pub fn token_by_id(&self, id: &str) -> Option<TokenIdx> {
        self.token_ids.get(id).copied()
    }

    pub fn next(&self, idx: TokenIdx) -> Option<TokenIdx> {
        let n = idx.0 + 1;
        ((n as usize) < self.tokens.len()).then_some(TokenIdx(n))
    }

    pub fn prev(&self, idx: TokenIdx) -> Option<TokenIdx> {
        idx.0.checked_sub(1).map(TokenIdx)
    }

    /// Text of the token after `idx`, or `""`.
    pub fn next_text(&self, idx: TokenIdx) -> &str {
        self.next(idx).map(|n| self.text(n)).unwrap_or("")
    }

    /// Text of the token before `idx`, or `""`.
    pub fn prev_text(&self, idx: TokenIdx) -> &str {
        self.prev(idx).map(|p| self.text(p)).unwrap_or("")
    }

    /// The statement index over the token stream.
    pub fn statements(&self) -> &StatementIndex {
        &self.statements
    }

    /// The scope whose body opens at `tok`.
    pub fn scope_opened_at(&self, tok: TokenIdx) -> Option<ScopeIdx> {
        self.body_starts.get(&tok).copied()
    }

    /// The body scope of a function.
    pub fn body_of(&self, func: FuncIdx) -> Option<ScopeIdx> {
        self.function_bodies.get(&func).copied()
    }

    /// Declaration prefix of a scope: the tokens between the previous
    /// statement boundary and its body start.
    pub fn declaration_prefix(&self, scope: ScopeIdx) -> Result<StatementSpan> {
        let start = self.scope(scope).body_start.require("scope body start")?;
        Ok(self.statements.prefix_of(start))
    }

    /// Every token of a scope body, braces included.
    pub fn body_tokens(&self, scope: ScopeIdx) -> Result<impl Iterator<Item = TokenIdx>> {
        let s = self.scope(scope);
        let start = s.body_start.require("scope body start")?;
        let end = s.body_end.require("scope body end")?;
        Ok((start.0..=end.0).map(TokenIdx))
    }

    /// Texts of a variable's declared type.
    pub fn type_texts(&self, var: VarIdx) -> Result<Vec<&str>> {
        let v = self.variable(var);
        let start = v.type_start.require("variable type start")?;
        let end = v.type_end.require("variable type end")?;
        Ok((start.0..=end.0).map(|i| self.text(TokenIdx(i))).collect())
    }

    /// Scopes ordered so that every parent precedes its children.
    pub fn scope_order(&self) -> Vec<ScopeIdx> {
        let mut order: Vec<ScopeIdx> = self
            .scopes
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.parent.is_resolved())
            .map(|(i, _)| ScopeIdx(i as u32))
            .collect();
        let mut seen = vec![false; self.scopes.len()];
        for s in &order {
            seen[s.index()] = true;
        }
        let mut head = 0;
        while head < order.len() {
            let current = order[head];
            head += 1;
            for &child in &self.scope(current).members {
                if !seen[child.index()] {
                    seen[child.index()] = true;
                    order.push(child);
                }
            }
        }
        order
    }

    /// Strict ancestors of a scope, nearest first.
    pub fn ancestors(&self, scope: ScopeIdx) -> Ancestors<'_> {
        Ancestors {
            cfg: self,
            current: self.scope(scope).parent.get(),
            steps: 0,
        }
    }

    /// The executable scope a region of code belongs to.
    ///
    /// Control-flow bodies are transparent: the body of an `if` inside a
    /// function belongs to that function.
    pub fn exec_owner(&self, scope: ScopeIdx) -> Option<ScopeIdx> {
        let mut current = scope;
        for _ in 0..=self.scopes.len() {
            let s = self.scope(current);
            if s.kind.is_executable() {
                return Some(current);
            }
            if !s.kind.is_control_flow() {
                return None;
            }
            current = s.parent.get()?;
        }
        None
    }

    /// The executable scope a token's code belongs to.
    pub fn exec_owner_of_token(&self, tok: TokenIdx) -> Option<ScopeIdx> {
        self.token(tok).scope.get().and_then(|s| self.exec_owner(s))
    }

    /// Nearest enclosing class or struct.
    pub fn enclosing_class(&self, scope: ScopeIdx) -> Option<ScopeIdx> {
        self.ancestors(scope)
            .find(|&a| self.scope(a).kind.is_class_like())
    }
}

/// Iterator over the ancestors of a scope.
pub struct Ancestors<'a> {
    cfg: &'a Configuration,
    current: Option<ScopeIdx>,
    steps: usize,
}

impl Iterator for Ancestors<'_> {
    type Item = ScopeIdx;

    fn next(&mut self) -> Option<ScopeIdx> {
        // A malformed dump may contain a parent cycle.
        if self.steps > self.cfg.scopes.len() {
            return None;
        }
        let current = self.current?;
        self.steps += 1;
        self.current = self.cfg.scope(current).parent.get();
        Some(current)
    }
}

/// One loaded dump file.
#[derive(Debug, Clone)]
pub struct TranslationUnit {
    /// The source file the dump was produced for.
    pub path: PathBuf,
    /// The dump file itself.
    pub dump_path: PathBuf,
    /// Every file named by the dump.
    pub files: Vec<PathBuf>,
    pub raw_tokens: Vec<RawToken>,
    pub configurations: Vec<Configuration>,
    main_file: u32,
}

impl TranslationUnit {
    /// Load and parse a dump file.
    pub fn load(dump_path: &Path) -> std::result::Result<Self, DumpError> {
        let text = std::fs::read_to_string(dump_path).map_err(|source| DumpError::Io {
            path: dump_path.to_path_buf(),
            source,
        })?;
        Self::parse_str(&text, dump_path)
    }

    /// Parse dump text. `dump_path` names the unit in errors and findings.
    pub fn parse_str(text: &str, dump_path: &Path) -> std::result::Result<Self, DumpError> {
        parse::parse_document(text, dump_path)
    }

    pub(crate) fn from_parts(
        dump_path: &Path,
        files: Vec<PathBuf>,
        raw_tokens: Vec<RawToken>,
        configurations: Vec<Configuration>,
    ) -> Self {
        let path = source_path_for(dump_path);
        let main_file = files
            .iter()
            .position(|f| f == &path || path.ends_with(f) || f.ends_with(&path))
            .unwrap_or(0) as u32;
        Self {
            path,
            dump_path: dump_path.to_path_buf(),
            files,
            raw_tokens,
            configurations,
            main_file,
        }
    }

    /// A unit with raw tokens only (typically a header).
    pub fn is_header_only(&self) -> bool {
        self.configurations.iter().all(|c| !c.has_tokens())
    }

    /// Path of a file index.
    pub fn file_path(&self, file: u32) -> &Path {
        self.files
            .get(file as usize)
            .map(PathBuf::as_path)
            .unwrap_or(self.path.as_path())
    }

    /// File index of the unit's own source file.
    pub fn main_file_index(&self) -> u32 {
        self.main_file
    }

    /// Whether a file index denotes the unit's own source file.
    pub fn is_main_file(&self, file: u32) -> bool {
        file == self.main_file
    }

    /// The file name of the unit's source.
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
    }

    /// Quoted includes written in the unit's own source file.
    pub fn includes(&self) -> Vec<IncludeTarget> {
        let from_directives: Vec<IncludeTarget> = self
            .configurations
            .first()
            .map(|cfg| {
                cfg.directives
                    .iter()
                    .filter(|d| {
                        d.file == self.path || self.path.ends_with(&d.file) || d.file.ends_with(&self.path)
                    })
                    .filter_map(Directive::include_target)
                    .filter(|t| t.quoted)
                    .collect()
            })
            .unwrap_or_default();
        if !from_directives.is_empty() {
            return from_directives;
        }
        let own: Vec<RawToken> = self
            .raw_tokens
            .iter()
            .filter(|t| self.is_main_file(t.file))
            .cloned()
            .collect();
        directives::includes_from_raw(&own)
    }
}

/// The source path a dump was produced for: `foo.hpp.dump` -> `foo.hpp`.
pub fn source_path_for(dump_path: &Path) -> PathBuf {
    match dump_path.extension().and_then(|e| e.to_str()) {
        Some("dump") => dump_path.with_extension(""),
        _ => dump_path.to_path_buf(),
    }
}

/// The dump path cppcheck writes for a source file.
pub fn dump_path_for(source: &Path) -> PathBuf {
    let mut name = source.as_os_str().to_os_string();
    name.push(".dump");
    PathBuf::from(name)
}
