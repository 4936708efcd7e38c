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

//! Variable and function records.

use std::fmt;

use super::scopes::ExecSpace;
use super::{Ref, ScopeIdx, TokenIdx};

/// Access class of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Local,
    Argument,
    Private,
    Protected,
    Public,
    Global,
    Namespace,
    Throw,
    Unknown,
}

impl Access {
    /// Map the front end's access name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "Local" => Access::Local,
            "Argument" => Access::Argument,
            "Private" => Access::Private,
            "Protected" => Access::Protected,
            "Public" => Access::Public,
            "Global" => Access::Global,
            "Namespace" => Access::Namespace,
            "Throw" => Access::Throw,
            _ => Access::Unknown,
        }
    }

    /// Locals and arguments live on the stack of the executing code.
    pub fn is_local(&self) -> bool {
        matches!(self, Access::Local | Access::Argument)
    }
}

/// Memory space a field-like variable is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemorySpace {
    Host,
    Device,
    /// An explicit space name that is neither known host nor device.
    Named(String),
    /// The type looks like a field but its shape was not understood.
    Unknown,
}

impl MemorySpace {
    /// The execution space this memory is accessible from, when known.
    pub fn as_exec(&self) -> Option<ExecSpace> {
        match self {
            MemorySpace::Host => Some(ExecSpace::Host),
            MemorySpace::Device => Some(ExecSpace::Device),
            MemorySpace::Named(_) | MemorySpace::Unknown => None,
        }
    }
}

impl fmt::Display for MemorySpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemorySpace::Host => f.write_str("Host"),
            MemorySpace::Device => f.write_str("Device"),
            MemorySpace::Named(name) => f.write_str(name),
            MemorySpace::Unknown => f.write_str("unknown"),
        }
    }
}

/// The resolved memory space of a tracked variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryBinding {
    pub space: MemorySpace,
    /// `false` when inferred from an `auto` initialiser rather than spelled
    /// out in the declared type.
    pub confirmed: bool,
}

/// A named storage location.
#[derive(Debug, Clone)]
pub struct Variable {
    pub id: String,
    pub name: String,
    pub name_token: Ref<TokenIdx>,
    pub type_start: Ref<TokenIdx>,
    pub type_end: Ref<TokenIdx>,
    pub access: Access,
    pub is_static: bool,
    pub is_reference: bool,
    /// Scope the variable is declared in.
    pub scope: Ref<ScopeIdx>,
    memory: Option<MemoryBinding>,
}

impl Variable {
    /// Create an untracked variable.
    pub fn new(id: impl Into<String>, name: impl Into<String>, access: Access) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            name_token: Ref::Absent,
            type_start: Ref::Absent,
            type_end: Ref::Absent,
            access,
            is_static: false,
            is_reference: false,
            scope: Ref::Absent,
            memory: None,
        }
    }

    /// The memory binding, if the variable is tracked.
    pub fn memory(&self) -> Option<&MemoryBinding> {
        self.memory.as_ref()
    }

    /// Mark the variable as tracked.
    pub fn bind_memory(&mut self, binding: MemoryBinding) {
        self.memory = Some(binding);
    }
}

/// What kind of function a function record is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Ordinary,
    Constructor,
    CopyConstructor,
    MoveConstructor,
    Destructor,
    OperatorEqual,
    Lambda,
}

impl FunctionKind {
    /// Map the front end's function type name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "Constructor" => FunctionKind::Constructor,
            "CopyConstructor" => FunctionKind::CopyConstructor,
            "MoveConstructor" => FunctionKind::MoveConstructor,
            "Destructor" => FunctionKind::Destructor,
            "OperatorEqual" => FunctionKind::OperatorEqual,
            "Lambda" => FunctionKind::Lambda,
            _ => FunctionKind::Ordinary,
        }
    }

    /// Any of the constructor kinds.
    pub fn is_constructor(&self) -> bool {
        matches!(
            self,
            FunctionKind::Constructor | FunctionKind::CopyConstructor | FunctionKind::MoveConstructor
        )
    }
}

/// A function declaration.
#[derive(Debug, Clone)]
pub struct Function {
    pub id: String,
    pub name: String,
    pub kind: FunctionKind,
    /// The name token of the definition.
    pub token_def: Ref<TokenIdx>,
    /// Scope whose function list declares the function.
    pub scope: Option<ScopeIdx>,
    /// Explicitly virtual or overriding a virtual function.
    pub is_virtual: bool,
    pub is_static: bool,
}

impl Function {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: FunctionKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            token_def: Ref::Absent,
            scope: None,
            is_virtual: false,
            is_static: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_locality() {
        assert!(Access::from_name("Argument").is_local());
        assert!(!Access::from_name("Private").is_local());
        assert_eq!(Access::from_name("bogus"), Access::Unknown);
    }

    #[test]
    fn test_memory_space_as_exec() {
        assert_eq!(MemorySpace::Device.as_exec(), Some(ExecSpace::Device));
        assert_eq!(MemorySpace::Named("MemSpace".to_string()).as_exec(), None);
        assert_eq!(MemorySpace::Unknown.to_string(), "unknown");
    }

    #[test]
    fn test_constructor_kinds() {
        assert!(FunctionKind::from_name("MoveConstructor").is_constructor());
        assert!(!FunctionKind::from_name("Destructor").is_constructor());
        assert_eq!(FunctionKind::from_name("Function"), FunctionKind::Ordinary);
    }
}
