//! groom - compose text templates from many files
//!
//! Templates name the files they depend on with import directives written in
//! the template language itself. The [`Composer`] loads a root template and,
//! depth first, every file it imports, merging all named templates into one
//! [`TemplateSet`] that can then be executed against JSON-like data.
//!
//! # Example
//!
//! ```rust
//! use std::path::Path;
//! use groom::Composer;
//! use serde_json::json;
//!
//! let composer = Composer::default();
//! let set = composer
//!     .compose("page", Path::new("/site/page.grm"), "Hello, {{.name}}!")
//!     .unwrap();
//! let out = composer.render(&set, "page", &json!({"name": "Joe"})).unwrap();
//! assert_eq!(out, "Hello, Joe!");
//! ```

pub mod config;
pub mod error;
pub mod exec;
pub mod flavor;
pub mod helpers;
pub mod parser;
pub mod source;
pub mod template;

pub use config::{Config, ConfigError};
pub use error::ParseError;
pub use exec::{ExecError, FuncMap, HelperError, MissingKey};
pub use flavor::{Flavor, FlavorKind, HtmlFlavor, TextFlavor};
pub use parser::parse;
pub use source::RootSource;
pub use template::{Composer, TemplateError, TemplateSet};

use serde_json::Value;

/// Compose `roots` and execute each in order, concatenating the output
///
/// # Example
///
/// ```rust
/// use groom::{render, Composer, RootSource};
/// use serde_json::json;
///
/// let roots = [
///     RootSource::new("a", "/t/a.grm", "{{.x}}-"),
///     RootSource::new("b", "/t/b.grm", "{{.x}}"),
/// ];
/// let out = render(&Composer::default(), &roots, &json!({"x": 1})).unwrap();
/// assert_eq!(out, "1-1");
/// ```
pub fn render(composer: &Composer, roots: &[RootSource], data: &Value) -> Result<String, TemplateError> {
    let set = composer.compose_all(roots)?;
    let mut out = String::new();
    for root in roots {
        out.push_str(&composer.render(&set, &root.name, data)?);
    }
    Ok(out)
}
