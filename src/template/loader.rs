//! Recursive import loading
//!
//! Files are loaded depth first: every import of a file is loaded (along
//! with its own imports) before the next import is looked at, and a file's
//! trees are merged only after all of its imports. The walk keeps its own
//! stack of frames, so the import depth ceiling rather than the thread stack
//! bounds how deep a chain can go.

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::parser::{self, Tree};

use super::error::TemplateError;
use super::registry::TemplateSet;
use super::resolver::{self, ResolvedImport};

/// One file whose imports are being loaded
struct Frame {
    path: PathBuf,
    level: usize,
    trees: Vec<Tree>,
    imports: std::vec::IntoIter<ResolvedImport>,
}

/// Loads a root and everything it imports into a template set
pub struct Loader<'s> {
    set: &'s mut TemplateSet,
    extension: &'s str,
    max_depth: usize,
}

impl<'s> Loader<'s> {
    pub fn new(set: &'s mut TemplateSet, extension: &'s str, max_depth: usize) -> Self {
        Self {
            set,
            extension,
            max_depth,
        }
    }

    /// Load an in-memory root at level 0
    pub fn load_root(&mut self, name: &str, path: &Path, text: &str) -> Result<(), TemplateError> {
        let root = self.open(name, path, text, 0)?;
        self.run(root)
    }

    /// Load the file at `path` as template `name`
    pub fn load(&mut self, name: &str, path: &Path, level: usize) -> Result<(), TemplateError> {
        let text = self.read(name, path, level)?;
        let frame = self.open(name, path, &text, level)?;
        self.run(frame)
    }

    fn read(&self, name: &str, path: &Path, level: usize) -> Result<String, TemplateError> {
        if level >= self.max_depth {
            return Err(TemplateError::RecursionLimit {
                name: name.to_string(),
                path: path.to_path_buf(),
                limit: self.max_depth,
            });
        }
        std::fs::read_to_string(path).map_err(|source| TemplateError::SourceUnavailable {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse a file and resolve the import directives of every tree in it
    fn open(&self, name: &str, path: &Path, text: &str, level: usize) -> Result<Frame, TemplateError> {
        debug!(name, path = %path.display(), level, "loading template");

        let mut trees = parser::parse(name, text).map_err(|errors| TemplateError::Syntax {
            path: path.to_path_buf(),
            text: text.to_string(),
            errors,
        })?;

        let dir = path.parent().unwrap_or_else(|| Path::new("/"));
        let mut imports = Vec::new();
        for tree in &mut trees {
            let found = resolver::resolve_tree(tree, dir, self.extension).map_err(|e| {
                TemplateError::MalformedImport {
                    reference: e.reference,
                    path: path.to_path_buf(),
                }
            })?;
            imports.extend(found);
        }

        Ok(Frame {
            path: path.to_path_buf(),
            level,
            trees,
            imports: imports.into_iter(),
        })
    }

    fn run(&mut self, root: Frame) -> Result<(), TemplateError> {
        let mut stack = vec![root];

        loop {
            let next = match stack.last_mut() {
                Some(frame) => frame.imports.next().map(|import| (import, frame.level + 1)),
                None => return Ok(()),
            };

            match next {
                Some((import, level)) => {
                    trace!(name = %import.name, path = %import.path.display(), level, "import");
                    if let Some(existing) = self.set.source(&import.name) {
                        if existing == import.path.as_path() {
                            trace!(name = %import.name, "already loaded");
                            continue;
                        }
                        return Err(TemplateError::DuplicateName {
                            name: import.name,
                            existing: existing.to_path_buf(),
                            conflicting: import.path,
                        });
                    }
                    let text = self.read(&import.name, &import.path, level)?;
                    let child = self.open(&import.name, &import.path, &text, level)?;
                    stack.push(child);
                }
                None => {
                    if let Some(frame) = stack.pop() {
                        self.merge(frame)?;
                    }
                }
            }
        }
    }

    fn merge(&mut self, frame: Frame) -> Result<(), TemplateError> {
        for tree in frame.trees {
            let name = tree.name.clone();
            self.set.add(&name, tree, &frame.path)?;
        }
        Ok(())
    }
}
