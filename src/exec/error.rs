//! Errors raised while evaluating a template tree

use thiserror::Error;

use super::funcs::HelperError;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("map has no entry for key {field:?}")]
    UndefinedField { field: String },

    #[error("undefined variable {name}")]
    UndefinedVariable { name: String },

    #[error("function {name:?} not defined")]
    UnknownFunction { name: String },

    #[error("error calling {name}: {source}")]
    Helper {
        name: String,
        #[source]
        source: HelperError,
    },

    #[error("wrong number of args for {name}: want {expected} got {found}")]
    Arity {
        name: String,
        expected: String,
        found: usize,
    },

    #[error("{0}")]
    TypeMismatch(String),

    #[error("range can't iterate over {kind}")]
    NotIterable { kind: &'static str },

    #[error("no such template {name:?}")]
    UnknownTemplate { name: String },

    #[error("exceeded maximum template depth ({limit})")]
    DepthExceeded { limit: usize },

    #[error("import {reference:?} was never resolved")]
    UnresolvedImport { reference: String },

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecError {
    /// Wrap a failure from the function `name`
    pub(crate) fn helper(name: &str, source: HelperError) -> Self {
        match source {
            HelperError::Arity { expected, found } => ExecError::Arity {
                name: name.to_string(),
                expected,
                found,
            },
            source => ExecError::Helper {
                name: name.to_string(),
                source,
            },
        }
    }

    pub(crate) fn mismatch(message: impl Into<String>) -> Self {
        ExecError::TypeMismatch(message.into())
    }
}
