//! Import resolution: finding import directives in trees and turning their
//! references into template names and absolute paths

use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::parser::ast::{Node, Span, Spanned, TemplateCall, Tree};

/// `import [name] "file"`
static IMPORT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^import\s+(?:([^\s"]+)\s+)?"([^"]+)"\s*$"#).expect("import pattern is valid")
});

/// A parsed import reference: optional symbolic name plus file reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRef {
    pub name: Option<String>,
    pub file: String,
}

/// The outcome of resolving one directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImport {
    pub name: String,
    pub path: PathBuf,
    pub span: Span,
}

/// Malformed import reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedImport {
    pub reference: String,
}

/// Parse the reference text of an import directive
pub fn parse_reference(reference: &str) -> Result<ImportRef, MalformedImport> {
    let caps = IMPORT_REGEX
        .captures(reference)
        .ok_or_else(|| MalformedImport {
            reference: reference.to_string(),
        })?;
    Ok(ImportRef {
        name: caps.get(1).map(|m| m.as_str().to_string()),
        file: caps[2].to_string(),
    })
}

/// Resolve an import reference relative to the declaring file's directory.
///
/// Returns the symbolic name and the normalized absolute path. A file
/// reference without an extension gets `.{extension}` appended.
pub fn resolve(
    declaring_dir: &Path,
    reference: &str,
    extension: &str,
) -> Result<(String, PathBuf), MalformedImport> {
    let import = parse_reference(reference)?;

    let mut file = PathBuf::from(&import.file);
    if file.extension().is_none() {
        let mut with_ext = file.into_os_string();
        with_ext.push(".");
        with_ext.push(extension);
        file = PathBuf::from(with_ext);
    }

    let name = match import.name {
        Some(name) => name,
        None => name_from_path(&file).ok_or_else(|| MalformedImport {
            reference: reference.to_string(),
        })?,
    };

    let path = if file.is_absolute() {
        file
    } else {
        declaring_dir.join(file)
    };

    Ok((name, normalize(&path)))
}

/// Derive a template name from a file path by stripping every extension
pub fn name_from_path(path: &Path) -> Option<String> {
    let mut name = PathBuf::from(path.file_name()?);
    while name.extension().is_some() {
        name = PathBuf::from(name.file_stem()?);
    }
    name.to_str().map(str::to_string)
}

/// Lexically collapse `.` and `..` segments
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = match out.components().next_back() {
                    Some(Component::Normal(_)) => out.pop(),
                    _ => false,
                };
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Collect every unresolved import directive in a tree.
///
/// Bodies of `if`, `range` and `with` blocks and their `else` arms are
/// searched to any depth using an explicit work list.
pub fn import_directives(tree: &mut Tree) -> Vec<&mut TemplateCall> {
    let mut found = Vec::new();
    let mut pending: Vec<&mut Vec<Spanned<Node>>> = vec![&mut tree.nodes];

    while let Some(nodes) = pending.pop() {
        for Spanned { node, .. } in nodes {
            match node {
                Node::Template(call) => {
                    if call.is_import() {
                        found.push(call);
                    }
                }
                Node::If(branch) | Node::Range(branch) | Node::With(branch) => {
                    pending.push(&mut branch.body);
                    if let Some(else_body) = &mut branch.else_body {
                        pending.push(else_body);
                    }
                }
                Node::Text(_) | Node::Action(_) => {}
            }
        }
    }

    found
}

/// Resolve every import directive in `tree`, rewriting each directive to its
/// symbolic name. Returns the resolved imports in discovery order.
pub fn resolve_tree(
    tree: &mut Tree,
    declaring_dir: &Path,
    extension: &str,
) -> Result<Vec<ResolvedImport>, MalformedImport> {
    let mut resolved = Vec::new();
    for call in import_directives(tree) {
        let (name, path) = resolve(declaring_dir, &call.target.node, extension)?;
        resolved.push(ResolvedImport {
            name: name.clone(),
            path,
            span: call.target.span.clone(),
        });
        call.resolve_import(name);
    }
    Ok(resolved)
}
