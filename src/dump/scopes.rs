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

//! Scope records and the execution-space annotations attached to them.

use std::fmt;

use super::{FuncIdx, Ref, ScopeIdx, TokenIdx, VarIdx};

/// The kind of a lexical scope, as named by the front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Namespace,
    Class,
    Struct,
    Union,
    Enum,
    Function,
    Lambda,
    Unconditional,
    If,
    Else,
    For,
    While,
    Do,
    Switch,
    Try,
    Catch,
    Other(String),
}

impl ScopeKind {
    /// Map the front end's scope type name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "Global" => ScopeKind::Global,
            "Namespace" => ScopeKind::Namespace,
            "Class" => ScopeKind::Class,
            "Struct" => ScopeKind::Struct,
            "Union" => ScopeKind::Union,
            "Enum" => ScopeKind::Enum,
            "Function" => ScopeKind::Function,
            "Lambda" => ScopeKind::Lambda,
            "Unconditional" => ScopeKind::Unconditional,
            "If" => ScopeKind::If,
            "Else" => ScopeKind::Else,
            "For" => ScopeKind::For,
            "While" => ScopeKind::While,
            "Do" => ScopeKind::Do,
            "Switch" => ScopeKind::Switch,
            "Try" => ScopeKind::Try,
            "Catch" => ScopeKind::Catch,
            other => ScopeKind::Other(other.to_string()),
        }
    }

    /// Functions, lambdas and bare blocks carry an execution space.
    pub fn is_executable(&self) -> bool {
        matches!(
            self,
            ScopeKind::Function | ScopeKind::Lambda | ScopeKind::Unconditional
        )
    }

    /// Classes and structs.
    pub fn is_class_like(&self) -> bool {
        matches!(self, ScopeKind::Class | ScopeKind::Struct)
    }

    /// Control-flow bodies belong to the executable scope around them.
    pub fn is_control_flow(&self) -> bool {
        matches!(
            self,
            ScopeKind::If
                | ScopeKind::Else
                | ScopeKind::For
                | ScopeKind::While
                | ScopeKind::Do
                | ScopeKind::Switch
                | ScopeKind::Try
                | ScopeKind::Catch
        )
    }
}

/// Where a piece of code runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecSpace {
    Host,
    Device,
}

impl fmt::Display for ExecSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecSpace::Host => f.write_str("Host"),
            ExecSpace::Device => f.write_str("Device"),
        }
    }
}

/// The launch marker found in front of a scope body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecMarker {
    /// No marker: host code.
    Host,
    /// `KOKKOS_FUNCTION` and friends.
    DeviceFunction,
    /// `KOKKOS_LAMBDA`.
    DeviceLambda,
    /// `KOKKOS_CLASS_LAMBDA`: a device lambda capturing `*this`.
    ClassLambda,
    /// Any other device marker, kept verbatim.
    Device(String),
}

impl ExecMarker {
    /// The execution space implied by the marker.
    pub fn space(&self) -> ExecSpace {
        match self {
            ExecMarker::Host => ExecSpace::Host,
            _ => ExecSpace::Device,
        }
    }
}

/// Result of classifying an executable scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecInfo {
    pub space: ExecSpace,
    pub marker: ExecMarker,
    /// `true` when copied from an enclosing scope rather than found in the
    /// scope's own declaration prefix.
    pub inherited: bool,
}

/// A lexical region of a translation unit.
#[derive(Debug, Clone)]
pub struct Scope {
    /// The front end's id for this scope.
    pub id: String,
    pub kind: ScopeKind,
    /// Declared name (functions, classes, structs).
    pub class_name: String,
    /// Enclosing scope; only the global scope has none.
    pub parent: Ref<ScopeIdx>,
    pub body_start: Ref<TokenIdx>,
    pub body_end: Ref<TokenIdx>,
    /// The function this scope is the body of.
    pub function: Ref<FuncIdx>,
    /// Child scopes, in dump order.
    pub members: Vec<ScopeIdx>,
    /// Variables declared directly in this scope.
    pub variables: Vec<VarIdx>,
    /// Functions declared directly in this scope.
    pub functions: Vec<FuncIdx>,
    exec: Option<ExecInfo>,
}

impl Scope {
    /// Create an unclassified scope.
    pub fn new(id: impl Into<String>, kind: ScopeKind, class_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            class_name: class_name.into(),
            parent: Ref::Absent,
            body_start: Ref::Absent,
            body_end: Ref::Absent,
            function: Ref::Absent,
            members: Vec::new(),
            variables: Vec::new(),
            functions: Vec::new(),
            exec: None,
        }
    }

    /// The execution space annotation, once classified.
    pub fn exec(&self) -> Option<&ExecInfo> {
        self.exec.as_ref()
    }

    /// The execution space, once classified.
    pub fn exec_space(&self) -> Option<ExecSpace> {
        self.exec.as_ref().map(|e| e.space)
    }

    /// Record the classification. Returns `false` if already classified.
    pub fn classify(&mut self, info: ExecInfo) -> bool {
        if self.exec.is_some() {
            return false;
        }
        self.exec = Some(info);
        true
    }
}
