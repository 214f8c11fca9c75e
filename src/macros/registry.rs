//! Macro tables and the three-tier lookup used during expansion.

use std::{collections::HashMap, sync::Arc};

use crate::macros::{MacroDefinition, MacroProvenance};

/// Macro definitions keyed by the name they are invoked under.
#[derive(Debug, Clone, Default)]
pub struct MacroRegistry {
    macros: HashMap<String, Arc<MacroDefinition>>,
}

impl MacroRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `def` under `name`, returning any definition it replaced.
    pub fn register(&mut self, name: &str, def: Arc<MacroDefinition>) -> Option<Arc<MacroDefinition>> {
        self.macros.insert(name.to_string(), def)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<MacroDefinition>> {
        self.macros.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.macros.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<MacroDefinition>)> {
        self.macros.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// One module's view of the macro world at expansion time: its own macros,
/// the macros it imported by name, and the session's global tier.
#[derive(Debug, Clone, Copy)]
pub struct MacroScope<'a> {
    pub local: &'a MacroRegistry,
    pub imported: &'a MacroRegistry,
    pub global: &'a MacroRegistry,
}

impl<'a> MacroScope<'a> {
    pub fn new(local: &'a MacroRegistry, imported: &'a MacroRegistry, global: &'a MacroRegistry) -> Self {
        Self {
            local,
            imported,
            global,
        }
    }

    pub fn lookup(&self, name: &str) -> Option<(MacroProvenance, &'a Arc<MacroDefinition>)> {
        if let Some(def) = self.local.get(name) {
            return Some((MacroProvenance::Local, def));
        }
        if let Some(def) = self.imported.get(name) {
            return Some((MacroProvenance::Imported, def));
        }
        self.global.get(name).map(|def| (MacroProvenance::Global, def))
    }

    pub fn is_macro(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Total number of definitions visible through this scope.
    pub fn visible_count(&self) -> usize {
        self.local.len() + self.imported.len() + self.global.len()
    }
}
