//! Output flavours
//!
//! Parsing and evaluation are shared; a flavour only decides how printed
//! action values are written.

use std::borrow::Cow;
use std::fmt;

use serde::Deserialize;

use crate::exec::value::escape_html;

/// How printed values are escaped
pub trait Flavor: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Prepare a printed value for output
    fn escape<'a>(&self, text: &'a str) -> Cow<'a, str>;

    /// Function whose output this flavour already considers escaped.
    ///
    /// A pipeline ending in it is printed without a second escape.
    fn escaper(&self) -> Option<&'static str> {
        None
    }
}

/// Plain text: values are written unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct TextFlavor;

impl Flavor for TextFlavor {
    fn name(&self) -> &'static str {
        "text"
    }

    fn escape<'a>(&self, text: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(text)
    }
}

/// HTML: every printed value is entity-escaped. Template text is not touched.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlFlavor;

impl Flavor for HtmlFlavor {
    fn name(&self) -> &'static str {
        "html"
    }

    fn escaper(&self) -> Option<&'static str> {
        Some("html")
    }

    fn escape<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if text.contains(['&', '<', '>', '"', '\'', '\0']) {
            Cow::Owned(escape_html(text))
        } else {
            Cow::Borrowed(text)
        }
    }
}

/// Flavour selector used by configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlavorKind {
    #[default]
    Text,
    Html,
}

impl FlavorKind {
    pub fn flavor(self) -> Box<dyn Flavor> {
        match self {
            FlavorKind::Text => Box::new(TextFlavor),
            FlavorKind::Html => Box::new(HtmlFlavor),
        }
    }
}
