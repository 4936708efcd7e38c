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

//! XML reading for cppcheck dumps.
//!
//! Each `<dump>` configuration is read in two passes. The first pass interns
//! the ids of tokens, scopes, functions and variables. The second pass builds
//! the records with every reference already turned into an index.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};
use tracing::debug;

use super::{
    Access, Configuration, Directive, FuncIdx, Function, FunctionKind, RawToken, Ref, Scope,
    ScopeIdx, ScopeKind, Sections, Token, TokenIdx, TranslationUnit, VarIdx, Variable,
};
use crate::error::DumpError;

/// File names and the dump's own file indices, mapped to dense indices.
#[derive(Default)]
struct FileTable {
    files: Vec<PathBuf>,
    by_name: HashMap<String, u32>,
    by_dump_index: HashMap<String, u32>,
}

impl FileTable {
    fn intern(&mut self, name: &str) -> u32 {
        if let Some(&idx) = self.by_name.get(name) {
            return idx;
        }
        let idx = self.files.len() as u32;
        self.files.push(PathBuf::from(name));
        self.by_name.insert(name.to_string(), idx);
        idx
    }

    fn register(&mut self, dump_index: &str, name: &str) {
        let idx = self.intern(name);
        self.by_dump_index.insert(dump_index.to_string(), idx);
    }

    /// Resolve the file of a token from `fileIndex` or `file`.
    fn resolve(&mut self, node: Node) -> u32 {
        if let Some(idx) = node
            .attribute("fileIndex")
            .and_then(|i| self.by_dump_index.get(i).copied())
        {
            return idx;
        }
        match node.attribute("file") {
            Some(name) => self.intern(name),
            None => 0,
        }
    }
}

/// Id to index maps of one configuration.
#[derive(Default)]
struct Ids {
    tokens: HashMap<String, u32>,
    scopes: HashMap<String, u32>,
    functions: HashMap<String, u32>,
    variables: HashMap<String, u32>,
}

fn resolve<T>(map: &HashMap<String, u32>, id: Option<&str>, make: fn(u32) -> T) -> Ref<T> {
    match id {
        None | Some("") | Some("0") => Ref::Absent,
        Some(id) => match map.get(id) {
            Some(&i) => Ref::Resolved(make(i)),
            None => Ref::Dangling(id.to_string()),
        },
    }
}

impl Ids {
    fn token(&self, id: Option<&str>) -> Ref<TokenIdx> {
        resolve(&self.tokens, id, TokenIdx)
    }

    fn scope(&self, id: Option<&str>) -> Ref<ScopeIdx> {
        resolve(&self.scopes, id, ScopeIdx)
    }

    fn function(&self, id: Option<&str>) -> Ref<FuncIdx> {
        resolve(&self.functions, id, FuncIdx)
    }

    fn variable(&self, id: Option<&str>) -> Ref<VarIdx> {
        resolve(&self.variables, id, VarIdx)
    }
}

fn elements<'a, 'input>(node: Node<'a, 'input>, tag: &'a str) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == tag)
}

fn child<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == tag)
}

fn number(node: Node, attr: &str) -> u32 {
    node.attribute(attr)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

fn flag(node: Node, attr: &str) -> bool {
    node.attribute(attr) == Some("true")
}

fn intern_ids<'a, 'input: 'a>(
    nodes: impl IntoIterator<Item = Node<'a, 'input>>,
    what: &str,
    dump_path: &Path,
) -> Result<HashMap<String, u32>, DumpError> {
    let mut map = HashMap::new();
    for (i, node) in nodes.into_iter().enumerate() {
        let id = node
            .attribute("id")
            .ok_or_else(|| DumpError::malformed(dump_path, format!("{what} without id")))?;
        map.entry(id.to_string()).or_insert(i as u32);
    }
    Ok(map)
}

pub(super) fn parse_document(text: &str, dump_path: &Path) -> Result<TranslationUnit, DumpError> {
    let doc = Document::parse(text).map_err(|source| DumpError::Xml {
        path: dump_path.to_path_buf(),
        source,
    })?;
    let root = doc.root_element();
    if root.tag_name().name() != "dumps" {
        return Err(DumpError::malformed(
            dump_path,
            format!("unexpected root element <{}>", root.tag_name().name()),
        ));
    }

    let mut files = FileTable::default();
    let mut raw_tokens = Vec::new();
    let mut has_raw = false;
    let mut configurations = Vec::new();

    for node in root.children().filter(|n| n.is_element()) {
        match node.tag_name().name() {
            "rawtokens" => {
                has_raw = true;
                parse_raw(node, &mut files, &mut raw_tokens);
            }
            "dump" => configurations.push(parse_configuration(node, &mut files, dump_path)?),
            _ => {}
        }
    }

    if !has_raw && configurations.is_empty() {
        return Err(DumpError::malformed(
            dump_path,
            "neither raw tokens nor a configuration",
        ));
    }

    debug!(
        dump = %dump_path.display(),
        configurations = configurations.len(),
        raw_tokens = raw_tokens.len(),
        "loaded dump"
    );

    Ok(TranslationUnit::from_parts(
        dump_path,
        files.files,
        raw_tokens,
        configurations,
    ))
}

fn parse_raw(node: Node, files: &mut FileTable, raw_tokens: &mut Vec<RawToken>) {
    for file in elements(node, "file") {
        if let (Some(index), Some(name)) = (file.attribute("index"), file.attribute("name")) {
            files.register(index, name);
        }
    }
    for tok in elements(node, "tok") {
        raw_tokens.push(RawToken {
            text: tok.attribute("str").unwrap_or("").to_string(),
            file: files.resolve(tok),
            line: number(tok, "linenr"),
            column: number(tok, "column"),
        });
    }
}

fn parse_configuration(
    node: Node,
    files: &mut FileTable,
    dump_path: &Path,
) -> Result<Configuration, DumpError> {
    let token_list = child(node, "tokenlist");
    let scope_list = child(node, "scopes");
    let variable_list = child(node, "variables");
    let directive_list = child(node, "directivelist");

    let token_nodes: Vec<Node> = token_list
        .map(|n| elements(n, "token").collect())
        .unwrap_or_default();
    let scope_nodes: Vec<Node> = scope_list
        .map(|n| elements(n, "scope").collect())
        .unwrap_or_default();
    let var_nodes: Vec<Node> = variable_list
        .map(|n| elements(n, "var").collect())
        .unwrap_or_default();

    // Functions are declared inside the scope that owns them.
    let mut function_nodes: Vec<(Node, ScopeIdx)> = Vec::new();
    for (i, scope) in scope_nodes.iter().enumerate() {
        if let Some(list) = child(*scope, "functionList") {
            for f in elements(list, "function") {
                function_nodes.push((f, ScopeIdx(i as u32)));
            }
        }
    }

    let ids = Ids {
        tokens: intern_ids(token_nodes.iter().copied(), "token", dump_path)?,
        scopes: intern_ids(scope_nodes.iter().copied(), "scope", dump_path)?,
        functions: intern_ids(function_nodes.iter().map(|(n, _)| *n), "function", dump_path)?,
        variables: intern_ids(var_nodes.iter().copied(), "variable", dump_path)?,
    };

    let tokens: Vec<Token> = token_nodes
        .iter()
        .map(|t| Token {
            id: t.attribute("id").unwrap_or("").to_string(),
            text: t.attribute("str").unwrap_or("").to_string(),
            file: files.resolve(*t),
            line: number(*t, "linenr"),
            column: number(*t, "column"),
            scope: ids.scope(t.attribute("scope")),
            variable: ids.variable(t.attribute("variable")),
            function: ids.function(t.attribute("function")),
            link: ids.token(t.attribute("link")),
            value_type_scope: ids.scope(t.attribute("valueType-typeScope")),
        })
        .collect();

    let mut scopes: Vec<Scope> = scope_nodes
        .iter()
        .map(|s| {
            let mut scope = Scope::new(
                s.attribute("id").unwrap_or(""),
                ScopeKind::from_name(s.attribute("type").unwrap_or("")),
                s.attribute("className").unwrap_or(""),
            );
            scope.parent = ids.scope(s.attribute("nestedIn"));
            scope.body_start = ids.token(s.attribute("bodyStart"));
            scope.body_end = ids.token(s.attribute("bodyEnd"));
            scope.function = ids.function(s.attribute("function"));
            if let Some(list) = child(*s, "varlist") {
                for v in elements(list, "var") {
                    match ids.variable(v.attribute("id")) {
                        Ref::Resolved(var) => scope.variables.push(var),
                        other => debug!(scope = %scope.id, reference = ?other, "skipping unknown scope variable"),
                    }
                }
            }
            scope
        })
        .collect();

    let functions: Vec<Function> = function_nodes
        .iter()
        .enumerate()
        .map(|(i, (f, owner))| {
            let mut function = Function::new(
                f.attribute("id").unwrap_or(""),
                f.attribute("name").unwrap_or(""),
                FunctionKind::from_name(f.attribute("type").unwrap_or("")),
            );
            function.token_def = ids.token(f.attribute("tokenDef"));
            function.scope = Some(*owner);
            function.is_virtual = flag(*f, "hasVirtualSpecifier") || flag(*f, "isImplicitlyVirtual");
            function.is_static = flag(*f, "isStatic");
            scopes[owner.index()].functions.push(FuncIdx(i as u32));
            function
        })
        .collect();

    for i in 0..scopes.len() {
        if let Some(parent) = scopes[i].parent.get() {
            if parent.index() != i {
                scopes[parent.index()].members.push(ScopeIdx(i as u32));
            }
        }
    }

    let variables: Vec<Variable> = var_nodes
        .iter()
        .map(|v| {
            let name_token = ids.token(v.attribute("nameToken"));
            let name = name_token
                .get()
                .map(|t| tokens[t.index()].text.clone())
                .unwrap_or_default();
            let access = match v.attribute("access") {
                Some(a) => Access::from_name(a),
                None if flag(*v, "isArgument") => Access::Argument,
                None => Access::Unknown,
            };
            let mut variable = Variable::new(v.attribute("id").unwrap_or(""), name, access);
            variable.name_token = name_token;
            variable.type_start = ids.token(v.attribute("typeStartToken"));
            variable.type_end = ids.token(v.attribute("typeEndToken"));
            variable.scope = ids.scope(v.attribute("scope"));
            variable.is_static = flag(*v, "isStatic");
            variable.is_reference = flag(*v, "isReference");
            variable
        })
        .collect();

    let directives: Vec<Directive> = directive_list
        .map(|list| {
            elements(list, "directive")
                .map(|d| Directive {
                    file: PathBuf::from(d.attribute("file").unwrap_or("")),
                    line: number(d, "linenr"),
                    text: d.attribute("str").unwrap_or("").to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    let config = Configuration {
        name: node.attribute("cfg").unwrap_or("").to_string(),
        tokens,
        scopes,
        variables,
        functions,
        directives,
        sections: Sections {
            tokens: token_list.is_some(),
            scopes: scope_list.is_some(),
            variables: variable_list.is_some(),
            directives: directive_list.is_some(),
        },
        ..Configuration::default()
    };
    Ok(config.index())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = r##"<?xml version="1.0"?>
<dumps>
  <rawtokens>
    <file index="0" name="src/a.cpp"/>
    <tok fileIndex="0" linenr="1" column="1" str="void"/>
  </rawtokens>
  <dump cfg="">
    <directivelist>
      <directive file="src/a.cpp" linenr="1" str="#include &quot;geometry.hpp&quot;"/>
    </directivelist>
    <tokenlist>
      <token id="t1" fileIndex="0" linenr="2" column="1" str="void" scope="s0"/>
      <token id="t2" fileIndex="0" linenr="2" column="6" str="f" scope="s0" function="f1"/>
      <token id="t3" fileIndex="0" linenr="2" column="8" str="(" scope="s0" link="t4"/>
      <token id="t4" fileIndex="0" linenr="2" column="9" str=")" scope="s0" link="t3"/>
      <token id="t5" fileIndex="0" linenr="2" column="11" str="{" scope="s1" link="t6"/>
      <token id="t6" fileIndex="0" linenr="2" column="12" str="}" scope="s1" link="t5"/>
    </tokenlist>
    <scopes>
      <scope id="s0" type="Global" className="">
        <functionList>
          <function id="f1" tokenDef="t2" name="f" type="Function" hasVirtualSpecifier="false"/>
        </functionList>
      </scope>
      <scope id="s1" type="Function" className="f" bodyStart="t5" bodyEnd="t6" nestedIn="s0" function="f1"/>
    </scopes>
    <variables/>
  </dump>
</dumps>
"##;

    #[test]
    fn test_parse_small_dump() {
        let unit = TranslationUnit::parse_str(SMALL, Path::new("src/a.cpp.dump")).unwrap();
        assert_eq!(unit.path, PathBuf::from("src/a.cpp"));
        assert_eq!(unit.raw_tokens.len(), 1);
        let cfg = &unit.configurations[0];
        assert_eq!(cfg.tokens.len(), 6);
        assert_eq!(cfg.scopes.len(), 2);
        assert_eq!(cfg.scopes[0].members, vec![ScopeIdx(1)]);
        assert_eq!(cfg.scopes[1].function, Ref::Resolved(FuncIdx(0)));
        assert_eq!(cfg.functions[0].scope, Some(ScopeIdx(0)));
        assert_eq!(cfg.token(TokenIdx(2)).link, Ref::Resolved(TokenIdx(3)));
        assert_eq!(cfg.scope_opened_at(TokenIdx(4)), Some(ScopeIdx(1)));
        assert_eq!(cfg.body_of(FuncIdx(0)), Some(ScopeIdx(1)));
        assert!(unit.is_main_file(cfg.tokens[0].file));
        assert_eq!(unit.includes()[0].name, "geometry.hpp");
    }

    #[test]
    fn test_dangling_reference_is_kept() {
        let text = SMALL.replace("nestedIn=\"s0\"", "nestedIn=\"s9\"");
        let unit = TranslationUnit::parse_str(&text, Path::new("src/a.cpp.dump")).unwrap();
        let cfg = &unit.configurations[0];
        assert_eq!(cfg.scopes[1].parent, Ref::Dangling("s9".to_string()));
        assert!(cfg.scopes[0].members.is_empty());
    }

    #[test]
    fn test_wrong_root_is_malformed() {
        let result = TranslationUnit::parse_str("<dump/>", Path::new("x.dump"));
        assert!(matches!(result, Err(DumpError::Malformed { .. })));
    }

    #[test]
    fn test_invalid_xml() {
        let result = TranslationUnit::parse_str("<dumps>", Path::new("x.dump"));
        assert!(matches!(result, Err(DumpError::Xml { .. })));
    }

    #[test]
    fn test_header_only_unit() {
        let text = r#"<dumps><rawtokens><file index="0" name="geometry.hpp"/>
            <tok fileIndex="0" linenr="1" column="1" str="using"/></rawtokens></dumps>"#;
        let unit = TranslationUnit::parse_str(text, Path::new("geometry.hpp.dump")).unwrap();
        assert!(unit.is_header_only());
        assert!(unit.configurations.is_empty());
    }

    #[test]
    fn test_token_without_id_is_malformed() {
        let text = SMALL.replace("id=\"t1\" ", "");
        let result = TranslationUnit::parse_str(&text, Path::new("src/a.cpp.dump"));
        assert!(matches!(result, Err(DumpError::Malformed { .. })));
    }
}
