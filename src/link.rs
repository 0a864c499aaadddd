//! Colon-link and data-type tag grammars.
//!
//! A colon-link (`TYPE::payload`) is how script hooks tell the engine what to
//! do next: `CALL::url` asks for another fetch round, `NULL::text` injects
//! literal content without touching the network.

use std::fmt;

use encoding_rs::Encoding;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::form_encode;

static COLON_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-zA-Z_$][a-zA-Z0-9_$]*)::(.+)$").expect("static regex")
});
static DATA_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z0-9_]+)\.([A-Za-z0-9_]+)$").expect("static regex"));

/// Link type that makes the engine fetch the payload and re-run the hook.
pub const CALL: &str = "CALL";
/// Link type whose payload is served as the response body.
pub const NULL: &str = "NULL";
/// Working URL used when neither the node nor the caller supplies one.
pub const NULL_LINK: &str = "NULL::";

/// Split `TYPE::payload`. Returns `None` for anything else.
pub fn split_colon_link(text: &str) -> Option<(&str, &str)> {
    let caps = COLON_LINK.captures(text)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

/// A node's `kind.view` tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataType {
    pub kind: String,
    pub view: String,
}

impl DataType {
    pub fn new(kind: impl Into<String>, view: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            view: view.into(),
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        let caps = DATA_TYPE.captures(text)?;
        Some(Self::new(&caps[1], &caps[2]))
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.view)
    }
}

/// Substitute `%input` and `%page` in a URL template.
///
/// Both values are form-url-encoded in `encoding` first.
pub fn format_url(
    template: &str,
    encoding: &'static Encoding,
    input: Option<&str>,
    page: u32,
) -> String {
    template
        .replace("%input", &form_encode(input.unwrap_or_default(), encoding))
        .replace("%page", &form_encode(&page.to_string(), encoding))
}
