//! Errors raised while composing and executing a template set

use std::path::PathBuf;

use thiserror::Error;

use crate::error::ParseError;
use crate::exec::ExecError;

/// Errors that can occur during template composition and execution
#[derive(Debug, Error)]
pub enum TemplateError {
    /// An import directive whose reference cannot be parsed
    #[error("malformed import {reference:?} in {}", path.display())]
    MalformedImport { reference: String, path: PathBuf },

    /// A template file that could not be read
    #[error("cannot read template {}: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Template body failed to parse
    #[error("syntax error in {}: {}", path.display(), format_parse_errors(errors))]
    Syntax {
        path: PathBuf,
        text: String,
        errors: Vec<ParseError>,
    },

    /// Import chain reached the depth ceiling (cycles end up here too)
    #[error("import of {name:?} from {} exceeds the maximum depth of {limit}", path.display())]
    RecursionLimit {
        name: String,
        path: PathBuf,
        limit: usize,
    },

    /// Two different files claim the same template name
    #[error(
        "duplicate template {name:?}: defined in {} and {}",
        existing.display(),
        conflicting.display()
    )]
    DuplicateName {
        name: String,
        existing: PathBuf,
        conflicting: PathBuf,
    },

    /// Execution requested for a name that was never loaded
    #[error("no template named {name:?}")]
    UnknownEntry { name: String },

    /// Runtime failure while rendering
    #[error("error executing {name:?}: {source}")]
    Evaluation {
        name: String,
        #[source]
        source: ExecError,
    },
}

impl TemplateError {
    /// Render the error for a terminal; syntax errors get source context
    pub fn report(&self) -> String {
        match self {
            TemplateError::Syntax { path, text, errors } => {
                let filename = path.display().to_string();
                errors
                    .iter()
                    .map(|e| e.format(text, &filename))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            other => other.to_string(),
        }
    }
}

fn format_parse_errors(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
