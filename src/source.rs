use std::sync::Arc;

use miette::NamedSource;
use serde::{Deserialize, Serialize};

use crate::errors::SourceArc;

/// Index of a source file inside a [`SourceMap`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct SourceId(pub u32);

/// A loaded source text together with its diagnostic handle.
#[derive(Debug)]
pub struct SourceFile {
    pub id: SourceId,
    pub name: String,
    pub text: String,
    named: SourceArc,
}

impl SourceFile {
    /// Shared `NamedSource` used when attaching this file to a diagnostic.
    pub fn to_named_source(&self) -> SourceArc {
        Arc::clone(&self.named)
    }
}

/// Every source text seen during a session, addressable by [`SourceId`].
#[derive(Debug, Default)]
pub struct SourceMap {
    files: Vec<Arc<SourceFile>>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source text and returns its handle.
    pub fn add(&mut self, name: impl Into<String>, text: impl Into<String>) -> Arc<SourceFile> {
        let name = name.into();
        let text = text.into();
        let id = SourceId(self.files.len() as u32);
        let named = Arc::new(NamedSource::new(name.clone(), text.clone()));
        let file = Arc::new(SourceFile {
            id,
            name,
            text,
            named,
        });
        self.files.push(Arc::clone(&file));
        file
    }

    pub fn get(&self, id: SourceId) -> Option<&Arc<SourceFile>> {
        self.files.get(id.0 as usize)
    }

    pub fn name_of(&self, id: SourceId) -> &str {
        self.get(id).map(|f| f.name.as_str()).unwrap_or("<unknown>")
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_follow_insertion_order() {
        let mut map = SourceMap::new();
        let a = map.add("a.sprig", "(a)");
        let b = map.add("b.sprig", "(b)");
        assert_eq!(a.id, SourceId(0));
        assert_eq!(b.id, SourceId(1));
        assert_eq!(map.name_of(b.id), "b.sprig");
        assert_eq!(map.get(a.id).map(|f| f.text.as_str()), Some("(a)"));
        assert_eq!(map.name_of(SourceId(9)), "<unknown>");
    }
}
