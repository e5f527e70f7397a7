//! Template set: the merged namespace of named trees for one composition run

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::parser::ast::Tree;

use super::error::TemplateError;

/// A stored template and the file it came from
#[derive(Debug, Clone)]
pub struct TemplateEntry {
    pub tree: Tree,
    pub source_path: PathBuf,
}

/// Named trees accumulated while composing
#[derive(Debug, Default, Clone)]
pub struct TemplateSet {
    templates: BTreeMap<String, TemplateEntry>,
}

impl TemplateSet {
    /// Create a new empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `tree`.
    ///
    /// Adding a name that is already bound to the same source path is a
    /// no-op, so a file reachable through several imports merges once.
    pub fn add(&mut self, name: &str, tree: Tree, source_path: &Path) -> Result<(), TemplateError> {
        if let Some(existing) = self.templates.get(name) {
            if existing.source_path == source_path {
                trace!(name, path = %source_path.display(), "template already merged");
                return Ok(());
            }
            return Err(TemplateError::DuplicateName {
                name: name.to_string(),
                existing: existing.source_path.clone(),
                conflicting: source_path.to_path_buf(),
            });
        }

        debug!(name, path = %source_path.display(), "merging template");
        self.templates.insert(
            name.to_string(),
            TemplateEntry {
                tree,
                source_path: source_path.to_path_buf(),
            },
        );
        Ok(())
    }

    /// Get a template tree by name
    pub fn get(&self, name: &str) -> Option<&Tree> {
        self.templates.get(name).map(|entry| &entry.tree)
    }

    /// Get the file a template was loaded from
    pub fn source(&self, name: &str) -> Option<&Path> {
        self.templates
            .get(name)
            .map(|entry| entry.source_path.as_path())
    }

    /// Check if a template exists
    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// All template names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
