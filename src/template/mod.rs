//! Import resolution and template composition
//!
//! A root template names the files it needs with import directives written
//! inside the template itself:
//!
//! ```text
//! {{import "greet"}}                  loads ./greet.grm as "greet" and runs it
//! {{import footer "../common/foot" .}} loads ../common/foot.grm as "footer"
//! ```
//!
//! Composition parses the root, finds every directive in its trees (also
//! inside `if`/`range`/`with` bodies), loads the referenced files depth first
//! and merges all named trees into one [`TemplateSet`]. Each directive is
//! rewritten to a plain sub-template call on the resolved name, so execution
//! needs no import logic.

mod composer;
mod error;
mod loader;
mod registry;
pub mod resolver;

pub use composer::Composer;
pub use error::TemplateError;
pub use loader::Loader;
pub use registry::{TemplateEntry, TemplateSet};
pub use resolver::{ImportRef, MalformedImport, ResolvedImport};
