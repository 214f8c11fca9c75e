//! Lexical scopes tracked while generating one module.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// Top-level `def` / `var` / `let` / `defn`.
    Module,
    /// A named import.
    Import,
    /// The alias of a namespace import.
    Namespace,
    /// Function parameter or function name.
    Param,
    /// Block-local binding.
    Local,
}

#[derive(Debug)]
pub struct Scopes {
    frames: Vec<HashMap<String, BindingKind>>,
}

impl Default for Scopes {
    fn default() -> Self {
        Self {
            frames: vec![HashMap::new()],
        }
    }
}

impl Scopes {
    pub fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    pub fn declare(&mut self, name: &str, kind: BindingKind) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.to_string(), kind);
        }
    }

    /// Innermost binding of `name`.
    pub fn lookup(&self, name: &str) -> Option<BindingKind> {
        self.frames.iter().rev().find_map(|f| f.get(name).copied())
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_frames_shadow_outer() {
        let mut scopes = Scopes::default();
        scopes.declare("x", BindingKind::Module);
        scopes.push();
        scopes.declare("x", BindingKind::Param);
        assert_eq!(scopes.lookup("x"), Some(BindingKind::Param));
        scopes.pop();
        assert_eq!(scopes.lookup("x"), Some(BindingKind::Module));
        scopes.pop();
        assert!(scopes.is_bound("x"));
        assert!(!scopes.is_bound("y"));
    }
}
