//! Public entry point: compose root sources into a template set and execute it

use std::io::Write;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, info};

use crate::config::Config;
use crate::exec::{Executor, FuncMap};
use crate::flavor::Flavor;
use crate::source::RootSource;

use super::error::TemplateError;
use super::loader::Loader;
use super::registry::TemplateSet;

/// Composes template sets and executes them with one function set and flavour
#[derive(Debug)]
pub struct Composer {
    config: Config,
    funcs: FuncMap,
    flavor: Box<dyn Flavor>,
}

impl Default for Composer {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Composer {
    /// Create a composer with the built-in functions only
    pub fn new(config: Config) -> Self {
        let flavor = config.flavor.flavor();
        Self {
            config,
            funcs: FuncMap::builtins(),
            flavor,
        }
    }

    /// Add helper functions; they override built-ins of the same name
    pub fn with_funcs(mut self, funcs: FuncMap) -> Self {
        self.funcs.extend(funcs);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn funcs(&self) -> &FuncMap {
        &self.funcs
    }

    /// Compose a single in-memory root and everything it imports
    pub fn compose(&self, name: &str, path: &Path, text: &str) -> Result<TemplateSet, TemplateError> {
        let mut set = TemplateSet::new();
        self.compose_into(&mut set, name, path, text)?;
        Ok(set)
    }

    /// Compose several roots into one set, stopping at the first error
    pub fn compose_all(&self, roots: &[RootSource]) -> Result<TemplateSet, TemplateError> {
        let mut set = TemplateSet::new();
        for root in roots {
            self.compose_into(&mut set, &root.name, &root.path, &root.text)?;
        }
        Ok(set)
    }

    /// Load a root and its imports into an existing set
    pub fn compose_into(
        &self,
        set: &mut TemplateSet,
        name: &str,
        path: &Path,
        text: &str,
    ) -> Result<(), TemplateError> {
        debug!(name, path = %path.display(), "composing");
        Loader::new(set, &self.config.extension, self.config.max_import_depth)
            .load_root(name, path, text)?;
        info!(name, templates = set.len(), "composed template set");
        Ok(())
    }

    /// Execute the template `entry` with `data`, streaming to `out`.
    ///
    /// Output written before a failure stays written.
    pub fn execute(
        &self,
        set: &TemplateSet,
        entry: &str,
        data: &Value,
        out: &mut dyn Write,
    ) -> Result<(), TemplateError> {
        if !set.contains(entry) {
            return Err(TemplateError::UnknownEntry {
                name: entry.to_string(),
            });
        }
        debug!(entry, flavor = self.flavor.name(), "executing");
        Executor::new(set, &self.funcs, self.flavor.as_ref(), self.config.exec_options())
            .execute(entry, data, out)
            .map_err(|source| TemplateError::Evaluation {
                name: entry.to_string(),
                source,
            })
    }

    /// Execute into a string
    pub fn render(&self, set: &TemplateSet, entry: &str, data: &Value) -> Result<String, TemplateError> {
        let mut buf = Vec::new();
        self.execute(set, entry, data, &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
