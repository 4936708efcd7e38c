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

//! Synthetic dump writer.
//!
//! Produces cppcheck-shaped XML from whitespace separated code with small
//! annotations, so tests and benchmarks do not need a front end.
//!
//! A word is `text` or `text@items`, where `items` is a comma separated
//! list:
//!
//! | Item      | Meaning                                           |
//! |-----------|---------------------------------------------------|
//! | `KEY`     | on `{`/`}`: body start/end of scope `KEY`; otherwise a use of variable `KEY` |
//! | `decl=K`  | name token of variable `K`                        |
//! | `ty=K`    | the whole declared type of variable `K`           |
//! | `ts=K`    | first token of the type of variable `K`           |
//! | `te=K`    | last token of the type of variable `K`            |
//! | `f=K`     | call of function `K`                              |
//! | `def=K`   | name token of the definition of function `K`      |
//! | `vt=K`    | value type is the class scope `K`                 |
//!
//! Brackets are linked automatically and every token takes the innermost
//! open scope. Each [`DumpBuilder::line`] call is one source line, after
//! one line per include.
//!
//! ```
//! use spacecheck::dump::builder::DumpBuilder;
//!
//! let unit = DumpBuilder::new("src/a.cpp")
//!     .func("f", "f", "global")
//!     .line("void f@def=f ( ) {@f }@f")
//!     .build()
//!     .unwrap();
//! assert_eq!(unit.configurations[0].scopes.len(), 2);
//! ```

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use super::{dump_path_for, TranslationUnit};
use crate::error::DumpError;

/// Key of the global scope every builder starts with.
pub const GLOBAL: &str = "global";

#[derive(Debug, Clone)]
struct ScopeDecl {
    key: String,
    kind: String,
    class_name: String,
    parent: Option<String>,
    function: Option<String>,
}

#[derive(Debug, Clone)]
struct FunctionDecl {
    key: String,
    name: String,
    kind: String,
    owner: String,
    is_virtual: bool,
}

#[derive(Debug, Clone)]
struct VariableDecl {
    key: String,
    scope: String,
    access: String,
    is_reference: bool,
    is_static: bool,
}

/// Writer for one synthetic translation unit.
#[derive(Debug, Clone)]
pub struct DumpBuilder {
    source: PathBuf,
    includes: Vec<String>,
    scopes: Vec<ScopeDecl>,
    functions: Vec<FunctionDecl>,
    variables: Vec<VariableDecl>,
    lines: Vec<String>,
    header_only: bool,
}

#[derive(Debug, Default)]
struct EmittedToken {
    text: String,
    line: usize,
    column: usize,
    scope: String,
    variable: Option<String>,
    function: Option<String>,
    link: Option<usize>,
    value_type: Option<String>,
}

#[derive(Debug, Default)]
struct Layout {
    tokens: Vec<EmittedToken>,
    body_start: HashMap<String, usize>,
    body_end: HashMap<String, usize>,
    name_token: HashMap<String, usize>,
    type_start: HashMap<String, usize>,
    type_end: HashMap<String, usize>,
    token_def: HashMap<String, usize>,
}

fn token_id(i: usize) -> String {
    format!("t{}", i + 1)
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn attr(out: &mut String, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        let _ = write!(out, " {}=\"{}\"", name, escape(value));
    }
}

impl DumpBuilder {
    /// Start a unit for `source`, with only the global scope.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            includes: Vec::new(),
            scopes: vec![ScopeDecl {
                key: GLOBAL.to_string(),
                kind: "Global".to_string(),
                class_name: String::new(),
                parent: None,
                function: None,
            }],
            functions: Vec::new(),
            variables: Vec::new(),
            lines: Vec::new(),
            header_only: false,
        }
    }

    /// Declare a scope of any kind (`Class`, `Struct`, `Unconditional`, `If`, ...).
    pub fn scope(&mut self, key: &str, kind: &str, class_name: &str, parent: &str) -> &mut Self {
        self.scopes.push(ScopeDecl {
            key: key.to_string(),
            kind: kind.to_string(),
            class_name: class_name.to_string(),
            parent: Some(parent.to_string()),
            function: None,
        });
        self
    }

    /// Declare a class scope.
    pub fn class(&mut self, key: &str, name: &str, parent: &str) -> &mut Self {
        self.scope(key, "Class", name, parent)
    }

    /// Declare a struct scope.
    pub fn structure(&mut self, key: &str, name: &str, parent: &str) -> &mut Self {
        self.scope(key, "Struct", name, parent)
    }

    /// Declare a lambda scope.
    pub fn lambda(&mut self, key: &str, parent: &str) -> &mut Self {
        self.scope(key, "Lambda", "", parent)
    }

    /// Declare a bare block.
    pub fn block(&mut self, key: &str, parent: &str) -> &mut Self {
        self.scope(key, "Unconditional", "", parent)
    }

    /// Declare a function of the given kind together with its body scope.
    /// Both use `key`; the function is listed in `declared_in`.
    pub fn function_body(
        &mut self,
        key: &str,
        name: &str,
        kind: &str,
        declared_in: &str,
    ) -> &mut Self {
        self.declare_function(key, name, kind, declared_in);
        self.scopes.push(ScopeDecl {
            key: key.to_string(),
            kind: "Function".to_string(),
            class_name: name.to_string(),
            parent: Some(declared_in.to_string()),
            function: Some(key.to_string()),
        });
        self
    }

    /// Declare an ordinary function with its body scope.
    pub fn func(&mut self, key: &str, name: &str, declared_in: &str) -> &mut Self {
        self.function_body(key, name, "Function", declared_in)
    }

    /// Declare a constructor with its body scope.
    pub fn constructor(&mut self, key: &str, class_name: &str, declared_in: &str) -> &mut Self {
        self.function_body(key, class_name, "Constructor", declared_in)
    }

    /// Declare a method of `class` whose body is written out of line, nested
    /// in `nested_in` instead of the class.
    pub fn out_of_line(&mut self, key: &str, name: &str, class: &str, nested_in: &str) -> &mut Self {
        self.declare_function(key, name, "Function", class);
        self.scopes.push(ScopeDecl {
            key: key.to_string(),
            kind: "Function".to_string(),
            class_name: name.to_string(),
            parent: Some(nested_in.to_string()),
            function: Some(key.to_string()),
        });
        self
    }

    /// Declare a function without a body (a prototype).
    pub fn declare_function(
        &mut self,
        key: &str,
        name: &str,
        kind: &str,
        declared_in: &str,
    ) -> &mut Self {
        self.functions.push(FunctionDecl {
            key: key.to_string(),
            name: name.to_string(),
            kind: kind.to_string(),
            owner: declared_in.to_string(),
            is_virtual: false,
        });
        self
    }

    /// Mark a declared function virtual.
    pub fn make_virtual(&mut self, key: &str) -> &mut Self {
        for f in self.functions.iter_mut().filter(|f| f.key == key) {
            f.is_virtual = true;
        }
        self
    }

    /// Declare a variable. `access` is the front end's access name
    /// (`Local`, `Argument`, `Private`, `Public`, ...).
    pub fn variable(&mut self, key: &str, scope: &str, access: &str) -> &mut Self {
        self.variables.push(VariableDecl {
            key: key.to_string(),
            scope: scope.to_string(),
            access: access.to_string(),
            is_reference: false,
            is_static: false,
        });
        self
    }

    /// Mark a declared variable as a reference.
    pub fn reference(&mut self, key: &str) -> &mut Self {
        for v in self.variables.iter_mut().filter(|v| v.key == key) {
            v.is_reference = true;
        }
        self
    }

    /// Mark a declared variable static.
    pub fn make_static(&mut self, key: &str) -> &mut Self {
        for v in self.variables.iter_mut().filter(|v| v.key == key) {
            v.is_static = true;
        }
        self
    }

    /// Add `#include "target"` at the top of the file.
    pub fn include(&mut self, target: &str) -> &mut Self {
        self.includes.push(target.to_string());
        self
    }

    /// Append one line of annotated code.
    pub fn line(&mut self, code: &str) -> &mut Self {
        self.lines.push(code.to_string());
        self
    }

    /// Append several lines of annotated code.
    pub fn code(&mut self, code: &str) -> &mut Self {
        for line in code.lines() {
            self.line(line);
        }
        self
    }

    /// Emit raw tokens only, as the front end does for an unchecked header.
    pub fn header_only(&mut self) -> &mut Self {
        self.header_only = true;
        self
    }

    /// The source path of the unit.
    pub fn source(&self) -> &Path {
        &self.source
    }

    fn layout(&self) -> Layout {
        let mut layout = Layout::default();
        let mut scope_stack: Vec<String> = vec![GLOBAL.to_string()];
        let mut open: Vec<usize> = Vec::new();
        let first_line = self.includes.len() + 1;

        for (n, line) in self.lines.iter().enumerate() {
            let mut column = 1;
            for word in line.split_whitespace() {
                let (text, items) = match word.split_once('@') {
                    Some((text, items)) if !text.is_empty() => (text, items),
                    _ => (word, ""),
                };
                let idx = layout.tokens.len();
                let mut token = EmittedToken {
                    text: text.to_string(),
                    line: first_line + n,
                    column,
                    ..EmittedToken::default()
                };
                column += text.len() + 1;

                let mut scope = scope_stack.last().cloned().unwrap_or_default();
                for item in items.split(',').filter(|i| !i.is_empty()) {
                    let (kind, key) = item.split_once('=').unwrap_or(("", item));
                    let key = key.to_string();
                    match (kind, text) {
                        ("", "{") => {
                            layout.body_start.insert(key.clone(), idx);
                            scope = key.clone();
                            scope_stack.push(key);
                        }
                        ("", "}") => {
                            layout.body_end.insert(key.clone(), idx);
                            if scope_stack.last() == Some(&key) && scope_stack.len() > 1 {
                                scope_stack.pop();
                            }
                            scope = key;
                        }
                        ("", _) | ("v", _) => token.variable = Some(key),
                        ("decl", _) => {
                            layout.name_token.insert(key.clone(), idx);
                            token.variable = Some(key);
                        }
                        ("ty", _) => {
                            layout.type_start.insert(key.clone(), idx);
                            layout.type_end.insert(key, idx);
                        }
                        ("ts", _) => {
                            layout.type_start.insert(key, idx);
                        }
                        ("te", _) => {
                            layout.type_end.insert(key, idx);
                        }
                        ("f", _) => token.function = Some(key),
                        ("def", _) => {
                            layout.token_def.insert(key.clone(), idx);
                            token.function = Some(key);
                        }
                        ("vt", _) => token.value_type = Some(key),
                        _ => {}
                    }
                }
                token.scope = scope;

                match text {
                    "(" | "[" | "{" => open.push(idx),
                    ")" | "]" | "}" => {
                        let opener = match text {
                            ")" => "(",
                            "]" => "[",
                            _ => "{",
                        };
                        if let Some(pos) = open
                            .iter()
                            .rposition(|&o| layout.tokens[o].text == opener)
                        {
                            let o = open.remove(pos);
                            layout.tokens[o].link = Some(idx);
                            token.link = Some(o);
                        }
                    }
                    _ => {}
                }
                layout.tokens.push(token);
            }
        }
        layout
    }

    /// Render the dump XML.
    pub fn to_xml(&self) -> String {
        let layout = self.layout();
        let source = self.source.display().to_string();
        let mut out = String::from("<?xml version=\"1.0\"?>\n<dumps>\n  <rawtokens>\n");
        let _ = writeln!(out, "    <file index=\"0\" name=\"{}\"/>", escape(&source));
        for (i, include) in self.includes.iter().enumerate() {
            let quoted = format!("\"{include}\"");
            for (c, text) in ["#", "include", quoted.as_str()].iter().enumerate() {
                let _ = writeln!(
                    out,
                    "    <tok fileIndex=\"0\" linenr=\"{}\" column=\"{}\" str=\"{}\"/>",
                    i + 1,
                    c + 1,
                    escape(text)
                );
            }
        }
        for t in &layout.tokens {
            let _ = writeln!(
                out,
                "    <tok fileIndex=\"0\" linenr=\"{}\" column=\"{}\" str=\"{}\"/>",
                t.line,
                t.column,
                escape(&t.text)
            );
        }
        out.push_str("  </rawtokens>\n");

        if !self.header_only {
            self.write_configuration(&mut out, &layout, &source);
        }
        out.push_str("</dumps>\n");
        out
    }

    fn write_configuration(&self, out: &mut String, layout: &Layout, source: &str) {
        out.push_str("  <dump cfg=\"\">\n    <directivelist>\n");
        for (i, include) in self.includes.iter().enumerate() {
            let _ = writeln!(
                out,
                "      <directive file=\"{}\" linenr=\"{}\" str=\"{}\"/>",
                escape(source),
                i + 1,
                escape(&format!("#include \"{include}\""))
            );
        }
        out.push_str("    </directivelist>\n    <tokenlist>\n");
        for (i, t) in layout.tokens.iter().enumerate() {
            let _ = write!(
                out,
                "      <token id=\"{}\" file=\"{}\" fileIndex=\"0\" linenr=\"{}\" column=\"{}\" str=\"{}\"",
                token_id(i),
                escape(source),
                t.line,
                t.column,
                escape(&t.text)
            );
            attr(out, "scope", Some(t.scope.as_str()));
            attr(out, "variable", t.variable.as_deref());
            attr(out, "function", t.function.as_deref());
            attr(out, "link", t.link.map(token_id).as_deref());
            attr(out, "valueType-typeScope", t.value_type.as_deref());
            out.push_str("/>\n");
        }
        out.push_str("    </tokenlist>\n    <scopes>\n");
        for s in &self.scopes {
            let _ = write!(
                out,
                "      <scope id=\"{}\" type=\"{}\" className=\"{}\"",
                escape(&s.key),
                escape(&s.kind),
                escape(&s.class_name)
            );
            attr(out, "bodyStart", layout.body_start.get(&s.key).copied().map(token_id).as_deref());
            attr(out, "bodyEnd", layout.body_end.get(&s.key).copied().map(token_id).as_deref());
            attr(out, "nestedIn", s.parent.as_deref());
            attr(out, "function", s.function.as_deref());
            out.push_str(">\n");

            let functions: Vec<&FunctionDecl> =
                self.functions.iter().filter(|f| f.owner == s.key).collect();
            if !functions.is_empty() {
                out.push_str("        <functionList>\n");
                for f in functions {
                    let _ = write!(
                        out,
                        "          <function id=\"{}\" name=\"{}\" type=\"{}\"",
                        escape(&f.key),
                        escape(&f.name),
                        escape(&f.kind)
                    );
                    attr(out, "tokenDef", layout.token_def.get(&f.key).copied().map(token_id).as_deref());
                    attr(out, "hasVirtualSpecifier", Some(if f.is_virtual { "true" } else { "false" }));
                    out.push_str("/>\n");
                }
                out.push_str("        </functionList>\n");
            }

            let vars: Vec<&VariableDecl> =
                self.variables.iter().filter(|v| v.scope == s.key).collect();
            if !vars.is_empty() {
                out.push_str("        <varlist>\n");
                for v in vars {
                    let _ = writeln!(out, "          <var id=\"{}\"/>", escape(&v.key));
                }
                out.push_str("        </varlist>\n");
            }
            out.push_str("      </scope>\n");
        }
        out.push_str("    </scopes>\n    <variables>\n");
        for v in &self.variables {
            let _ = write!(out, "      <var id=\"{}\"", escape(&v.key));
            attr(out, "nameToken", layout.name_token.get(&v.key).copied().map(token_id).as_deref());
            attr(out, "typeStartToken", layout.type_start.get(&v.key).copied().map(token_id).as_deref());
            attr(out, "typeEndToken", layout.type_end.get(&v.key).copied().map(token_id).as_deref());
            attr(out, "access", Some(v.access.as_str()));
            attr(out, "scope", Some(v.scope.as_str()));
            attr(out, "isReference", Some(if v.is_reference { "true" } else { "false" }));
            attr(out, "isStatic", Some(if v.is_static { "true" } else { "false" }));
            attr(out, "isArgument", Some(if v.access == "Argument" { "true" } else { "false" }));
            out.push_str("/>\n");
        }
        out.push_str("    </variables>\n  </dump>\n");
    }

    /// Parse the rendered dump.
    pub fn build(&self) -> Result<TranslationUnit, DumpError> {
        TranslationUnit::parse_str(&self.to_xml(), &dump_path_for(&self.source))
    }

    /// Write the dump under `root`, at the path the front end would use.
    pub fn write_dump(&self, root: &Path) -> std::io::Result<PathBuf> {
        let path = root.join(dump_path_for(&self.source));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, self.to_xml())?;
        Ok(path)
    }
}
