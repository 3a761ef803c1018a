//! Role bindings used while building effects and descriptions.

use super::EffectError;
use crate::facts::Bindings;

/// Resolves `?role` tokens and `[role]` placeholders
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingContext {
    bindings: Bindings,
}

impl BindingContext {
    pub fn new(bindings: Bindings) -> Self {
        Self { bindings }
    }

    pub fn with(mut self, role: impl Into<String>, value: impl Into<String>) -> Self {
        self.bindings.insert(role.into(), value.into());
        self
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn get(&self, role: &str) -> Option<&str> {
        self.bindings.get(role).map(String::as_str)
    }

    /// `?role` becomes its bound value; any other token is returned unchanged.
    pub fn resolve(&self, token: &str) -> Result<String, EffectError> {
        match token.strip_prefix('?') {
            Some(role) => self
                .get(role)
                .map(str::to_string)
                .ok_or_else(|| EffectError::UnboundRole(role.to_string())),
            None => Ok(token.to_string()),
        }
    }

    /// Substitutes `[role]` placeholders. Unknown roles are left as written.
    pub fn describe(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('[') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find(']') {
                Some(close) => {
                    let role = &after[..close];
                    match self.get(role) {
                        Some(value) => out.push_str(value),
                        None => {
                            out.push('[');
                            out.push_str(role);
                            out.push(']');
                        }
                    }
                    rest = &after[close + 1..];
                }
                None => {
                    out.push_str(&rest[open..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}
