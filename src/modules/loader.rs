//! Where module sources come from.

use std::{
    collections::HashMap,
    fs, io,
    path::{Component, Path, PathBuf},
};

/// Resolves and reads module sources.
pub trait SourceLoader {
    /// Canonical form of `path`; fails when the module does not exist.
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;

    fn load(&mut self, path: &Path) -> io::Result<String>;
}

/// Reads modules from the file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLoader;

impl SourceLoader for FsLoader {
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        fs::canonicalize(path)
    }

    fn load(&mut self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }
}

/// An in-memory project. Paths are normalised lexically and every read is
/// counted.
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    files: HashMap<PathBuf, String>,
    reads: HashMap<PathBuf, usize>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl AsRef<Path>, text: impl Into<String>) -> Self {
        self.add_file(path, text);
        self
    }

    pub fn add_file(&mut self, path: impl AsRef<Path>, text: impl Into<String>) {
        self.files.insert(normalize_path(path.as_ref()), text.into());
    }

    /// How many times `path` has been loaded.
    pub fn read_count(&self, path: impl AsRef<Path>) -> usize {
        self.reads
            .get(&normalize_path(path.as_ref()))
            .copied()
            .unwrap_or(0)
    }
}

impl SourceLoader for MemoryLoader {
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        let normalized = normalize_path(path);
        if self.files.contains_key(&normalized) {
            Ok(normalized)
        } else {
            Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no module at {}", normalized.display()),
            ))
        }
    }

    fn load(&mut self, path: &Path) -> io::Result<String> {
        let normalized = normalize_path(path);
        let text = self.files.get(&normalized).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no module at {}", normalized.display()))
        })?;
        *self.reads.entry(normalized).or_insert(0) += 1;
        Ok(text)
    }
}

/// Removes `.` and folds `..` components without touching the file system.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
