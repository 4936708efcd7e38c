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

//! Class capture validation.
//!
//! Device code may only touch the members of a class when the class object
//! itself is available on the device: inside a method of the class, or in a
//! lambda declared with the class-capturing marker.

use std::collections::HashSet;

use super::UnitAnalyzer;
use crate::dump::{ExecMarker, ExecSpace, ScopeIdx, ScopeKind, TokenIdx, VarIdx};
use crate::error::{CheckId, Result, Severity};

/// Extension trait for class capture validation.
pub trait ClassCaptureValidator {
    /// The class whose members code in `scope` refers to.
    fn class_scope_of(&self, scope: ScopeIdx) -> Option<ScopeIdx>;

    /// Whether the class object is available inside `scope`.
    fn captures_class(&self, scope: ScopeIdx) -> bool;

    /// Whether `scope` itself, rather than an enclosing scope, captures the
    /// class.
    fn captures_on_own(&self, scope: ScopeIdx) -> bool;

    /// Whether the body of `scope` uses the class object as a whole.
    fn uses_this(&self, scope: ScopeIdx, class: ScopeIdx) -> Result<bool>;

    /// Report classes with reference members and device methods which
    /// cannot be constructed on the device.
    fn check_class_exec_space(&mut self) -> Result<()>;

    /// Report class members used from device code without the class, and
    /// class captures that are unnecessary or meaningless.
    fn check_class_capture(&mut self) -> Result<()>;
}

impl ClassCaptureValidator for UnitAnalyzer<'_> {
    fn class_scope_of(&self, scope: ScopeIdx) -> Option<ScopeIdx> {
        if let Some(class) = self.cfg.enclosing_class(scope) {
            return Some(class);
        }
        // A method defined out of line is nested where it is written; its
        // class is the scope the function was declared in.
        let function_scope = std::iter::once(scope)
            .chain(self.cfg.ancestors(scope))
            .find(|&s| self.cfg.scope(s).kind == ScopeKind::Function)?;
        let declared_in = self.cfg.function(self.cfg.scope(function_scope).function.get()?).scope?;
        if self.cfg.scope(declared_in).kind.is_class_like() {
            Some(declared_in)
        } else {
            self.cfg.enclosing_class(declared_in)
        }
    }

    fn captures_class(&self, scope: ScopeIdx) -> bool {
        let mut current = scope;
        for _ in 0..=self.cfg.scopes.len() {
            let Some(info) = self.cfg.scope(current).exec() else {
                return false;
            };
            if !info.inherited {
                return self.captures_on_own(current);
            }
            let parent = self.cfg.scope(current).parent.get();
            match parent.and_then(|p| self.cfg.exec_owner(p)) {
                Some(owner) => current = owner,
                None => {
                    return parent.is_some_and(|p| self.cfg.scope(p).kind.is_class_like());
                }
            }
        }
        false
    }

    fn captures_on_own(&self, scope: ScopeIdx) -> bool {
        let s = self.cfg.scope(scope);
        let Some(info) = s.exec() else {
            return false;
        };
        if info.inherited {
            return false;
        }
        info.marker == ExecMarker::ClassLambda
            || s
                .parent
                .get()
                .is_some_and(|p| self.cfg.scope(p).kind.is_class_like())
            || self.is_method_body(scope)
    }

    fn uses_this(&self, scope: ScopeIdx, class: ScopeIdx) -> Result<bool> {
        for t in self.cfg.body_tokens(scope)? {
            let token = self.cfg.token(t);
            if token.text == "this" || token.value_type_scope.get() == Some(class) {
                return Ok(true);
            }
            if let Some(f) = token.function.get() {
                if self.cfg.function(f).scope == Some(class) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn check_class_exec_space(&mut self) -> Result<()> {
        let mut findings = Vec::new();
        for class in &self.cfg.scopes {
            if !class.kind.is_class_like() {
                continue;
            }
            let Some(start) = class.body_start.get() else {
                continue;
            };
            if !self.in_main_file(start) {
                continue;
            }

            let mut members: Vec<ScopeIdx> = class.members.clone();
            members.extend(class.functions.iter().filter_map(|&f| self.cfg.body_of(f)));

            let on_device =
                |s: &ScopeIdx| self.cfg.scope(*s).exec_space() == Some(ExecSpace::Device);
            let has_device_member = members.iter().any(|s| on_device(s));
            let has_reference = class
                .variables
                .iter()
                .any(|&v| self.cfg.variable(v).is_reference);
            let has_device_constructor = members.iter().filter(|s| on_device(*s)).any(|&s| {
                self.cfg
                    .scope(s)
                    .function
                    .get()
                    .is_some_and(|f| self.cfg.function(f).kind.is_constructor())
            });

            if has_device_member && has_reference && !has_device_constructor {
                tracing::debug!(class = %class.class_name, "class with host-only references");
                findings.push(self.finding_at(
                    start,
                    CheckId::ClassExecSpace,
                    Severity::Error,
                    format!("Class {} contains CPU references to objects.", class.class_name),
                ));
            }
        }
        for finding in findings {
            self.emit(finding);
        }
        Ok(())
    }

    fn check_class_capture(&mut self) -> Result<()> {
        let mut findings = Vec::new();
        for s in self.audited_scopes() {
            let scope = self.cfg.scope(s);
            let Some(info) = scope.exec() else {
                continue;
            };
            if info.space != ExecSpace::Device {
                continue;
            }
            let class = self.class_scope_of(s);
            let start = scope.body_start.require("device scope body start")?;

            if !self.captures_class(s) {
                let Some(class) = class else {
                    continue;
                };
                let mut reported: HashSet<VarIdx> = HashSet::new();
                for t in self.cfg.body_tokens(s)? {
                    let Some(v) = self.cfg.token(t).variable.get() else {
                        continue;
                    };
                    if self.cfg.exec_owner_of_token(t) != Some(s) || self.is_member_access(t) {
                        continue;
                    }
                    let var = self.cfg.variable(v);
                    if var.access.is_local() || var.scope.get() != Some(class) {
                        continue;
                    }
                    if reported.insert(v) {
                        findings.push(self.finding_at(
                            t,
                            CheckId::ClassVarOnGpu,
                            Severity::Error,
                            format!(
                                "Class variable {} used from GPU, but class not captured. Please create a proxy variable.",
                                var.name
                            ),
                        ));
                    }
                }
                continue;
            }

            if !self.captures_on_own(s) {
                continue;
            }
            let Some(class) = class else {
                findings.push(self.finding_at(
                    start,
                    CheckId::ClassVarOnGpu,
                    Severity::Warning,
                    "Loop on GPU captures class but does not appear to be in a class.",
                ));
                continue;
            };

            if info.marker == ExecMarker::ClassLambda {
                let used: HashSet<VarIdx> = self
                    .cfg
                    .body_tokens(s)?
                    .filter_map(|t| self.cfg.token(t).variable.get())
                    .collect();
                let all_used = self
                    .cfg
                    .scope(class)
                    .variables
                    .iter()
                    .all(|v| used.contains(v));
                if !all_used && !self.uses_this(s, class)? {
                    findings.push(self.finding_at(
                        start,
                        CheckId::UnnecessaryGpuClassCapture,
                        Severity::Warning,
                        "Loop on GPU captures class but not all variables are used. \
                         This increases CPU/GPU copies and GPU memory usage unnecessarily. \
                         Please prefer proxy variables.",
                    ));
                }
            }
        }
        for finding in findings {
            self.emit(finding);
        }
        Ok(())
    }
}

impl UnitAnalyzer<'_> {
    /// Whether `scope` is the body of a function declared in a class, wherever
    /// the body is written.
    fn is_method_body(&self, scope: ScopeIdx) -> bool {
        let s = self.cfg.scope(scope);
        if s.kind != ScopeKind::Function {
            return false;
        }
        s.function
            .get()
            .and_then(|f| self.cfg.function(f).scope)
            .is_some_and(|c| self.cfg.scope(c).kind.is_class_like())
    }

    /// Whether `tok` names a member of another object (`other.x`), as
    /// opposed to one of the enclosing object (`x`, `this->x`).
    pub(crate) fn is_member_access(&self, tok: TokenIdx) -> bool {
        match self.cfg.prev_text(tok) {
            "." | "->" => {
                let object = self.cfg.prev(tok).map(|p| self.cfg.prev_text(p)).unwrap_or("");
                object != "this"
            }
            _ => false,
        }
    }
}
