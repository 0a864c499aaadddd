//! Resolution nodes.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use super::xml::{attr, describe};
use crate::error::{PluginError, Result};
use crate::link::DataType;

static CACHE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)([hdwmy]?)$").expect("static regex"));

const HOUR: Duration = Duration::from_secs(60 * 60);
/// Cache duration used when a node has no `cache` attribute.
pub const DEFAULT_CACHE: Duration = Duration::from_secs(24 * 60 * 60);

/// Variant-specific part of a [`Node`].
#[derive(Debug, Clone)]
pub enum NodeKind {
    Entry { title: String },
    View { expr: Regex },
    Search,
    /// Synthetic node whose request hook's output is the final answer.
    Redirect,
}

/// A declared resolution unit.
#[derive(Debug, Clone)]
pub struct Node {
    pub data_type: DataType,
    /// URL template; may contain `%input` and `%page`.
    pub url: Option<String>,
    /// Request hook: script function run before the content fetch.
    pub request: Option<String>,
    /// Parse hook: script function run on the fetched content.
    pub parse: Option<String>,
    pub cache: Duration,
    pub kind: NodeKind,
}

impl Node {
    /// Build a node of the given group (`entry`, `view` or `search`).
    pub fn from_element(group: &str, element: roxmltree::Node<'_, '_>) -> Result<Self> {
        let type_attr = attr(element, "type");
        if type_attr.is_empty() {
            return Err(PluginError::parse(format!(
                "node is missing the 'type' attribute: {}",
                describe(element)
            )));
        }
        let data_type = DataType::parse(type_attr).ok_or_else(|| {
            PluginError::parse(format!(
                "node 'type' must be 'kind.view', got '{type_attr}': {}",
                describe(element)
            ))
        })?;

        let kind = match group {
            "entry" => {
                let title = attr(element, "title");
                if title.trim().is_empty() {
                    return Err(PluginError::parse(format!(
                        "entry node is missing the 'title' attribute: {}",
                        describe(element)
                    )));
                }
                NodeKind::Entry {
                    title: title.to_string(),
                }
            }
            "view" => {
                let expr = attr(element, "expr");
                if expr.trim().is_empty() {
                    return Err(PluginError::parse(format!(
                        "view node is missing the 'expr' attribute: {}",
                        describe(element)
                    )));
                }
                let expr = Regex::new(expr).map_err(|e| {
                    PluginError::parse(format!(
                        "view 'expr' is not a valid regex ({e}): {}",
                        describe(element)
                    ))
                })?;
                NodeKind::View { expr }
            }
            "search" => NodeKind::Search,
            other => {
                return Err(PluginError::parse(format!(
                    "unknown node collection name: '{other}'"
                )))
            }
        };

        Ok(Self {
            data_type,
            url: non_blank(attr(element, "url")),
            request: non_blank(attr(element, "request")),
            parse: non_blank(attr(element, "parse")),
            cache: parse_cache(element.attribute("cache")).map_err(|e| match e {
                PluginError::Parse(msg) => {
                    PluginError::parse(format!("{msg}: {}", describe(element)))
                }
                other => other,
            })?,
            kind,
        })
    }

    /// Synthetic `native.redirect` node driven by the `request` hook alone.
    pub fn redirect(request: impl Into<String>) -> Self {
        Self {
            data_type: DataType::new("native", "redirect"),
            url: None,
            request: Some(request.into()),
            parse: None,
            cache: Duration::ZERO,
            kind: NodeKind::Redirect,
        }
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.kind, NodeKind::Redirect)
    }

    /// Entry title, if this is an entry node.
    pub fn title(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Entry { title } => Some(title.as_str()),
            _ => None,
        }
    }

    /// Whether a view node's expression matches `url`. Other kinds never match.
    pub fn matches(&self, url: &str) -> bool {
        match &self.kind {
            NodeKind::View { expr } => expr.is_match(url),
            NodeKind::Entry { .. } | NodeKind::Search | NodeKind::Redirect => false,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn cache_millis(&self) -> u64 {
        self.cache.as_millis() as u64
    }
}

fn non_blank(value: &str) -> Option<String> {
    (!value.trim().is_empty()).then(|| value.to_string())
}

/// Parse a `cache` attribute: `<count><unit?>` with unit in `h d w m y`.
///
/// A bare count disables caching; no attribute means one day.
pub fn parse_cache(value: Option<&str>) -> Result<Duration> {
    let Some(value) = value else {
        return Ok(DEFAULT_CACHE);
    };
    let caps = CACHE
        .captures(value)
        .ok_or_else(|| PluginError::parse(format!("malformed 'cache' value '{value}'")))?;

    let unit_hours: u32 = match &caps[2] {
        "" => return Ok(Duration::ZERO),
        "h" => 1,
        "d" => 24,
        "w" => 24 * 7,
        "m" => 24 * 30,
        "y" => 24 * 365,
        unit => {
            return Err(PluginError::parse(format!(
                "unknown 'cache' unit '{unit}' in '{value}'"
            )))
        }
    };
    caps[1]
        .parse::<u32>()
        .ok()
        .and_then(|count| count.checked_mul(unit_hours))
        .and_then(|hours| HOUR.checked_mul(hours))
        .ok_or_else(|| PluginError::parse(format!("'cache' value '{value}' is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(group: &str, xml: &str) -> Result<Node> {
        let doc = roxmltree::Document::parse(xml).unwrap();
        Node::from_element(group, doc.root_element())
    }

    fn hours(h: u64) -> Duration {
        Duration::from_secs(h * 3600)
    }

    #[test]
    fn cache_grammar() {
        assert_eq!(parse_cache(Some("5h")).unwrap(), hours(5));
        assert_eq!(parse_cache(Some("2d")).unwrap(), hours(48));
        assert_eq!(parse_cache(Some("1w")).unwrap(), hours(168));
        assert_eq!(parse_cache(Some("1m")).unwrap(), hours(720));
        assert_eq!(parse_cache(Some("1y")).unwrap(), hours(8760));
        assert_eq!(parse_cache(Some("3")).unwrap(), Duration::ZERO);
        assert_eq!(parse_cache(None).unwrap(), hours(24));
    }

    #[test]
    fn cache_rejects_bad_values() {
        assert!(parse_cache(Some("5x")).is_err());
        assert!(parse_cache(Some("h")).is_err());
        assert!(parse_cache(Some("")).is_err());
        assert!(parse_cache(Some(" 5h")).is_err());
        assert!(parse_cache(Some("99999999999y")).is_err());
    }

    #[test]
    fn cache_millis_of_five_hours() {
        let node = build("search", r#"<n type="list.grid" cache="5h"/>"#).unwrap();
        assert_eq!(node.cache_millis(), 5 * 3_600_000);
    }

    #[test]
    fn missing_type_fails() {
        let err = build("search", r#"<n url="http://site/"/>"#).unwrap_err();
        assert!(err.to_string().contains("'type'"));
    }

    #[test]
    fn malformed_type_fails() {
        assert!(build("search", r#"<n type="list"/>"#).is_err());
    }

    #[test]
    fn entry_requires_title() {
        assert!(build("entry", r#"<n type="list.grid"/>"#).is_err());
        assert!(build("entry", r#"<n type="list.grid" title="  "/>"#).is_err());
        let node = build("entry", r#"<n type="list.grid" title="Hot"/>"#).unwrap();
        assert_eq!(node.title(), Some("Hot"));
    }

    #[test]
    fn view_requires_expr() {
        assert!(build("view", r#"<n type="detail.page"/>"#).is_err());
        let node = build("view", r#"<n type="detail.page" expr="/a$"/>"#).unwrap();
        assert!(node.matches("http://site/a"));
        assert!(!node.matches("http://site/b"));
    }

    #[test]
    fn blank_optional_attributes_are_absent() {
        let node = build(
            "search",
            r#"<n type="list.grid" url=" " request="" parse="parseList"/>"#,
        )
        .unwrap();
        assert_eq!(node.url, None);
        assert_eq!(node.request, None);
        assert_eq!(node.parse.as_deref(), Some("parseList"));
        assert_eq!(node.cache, DEFAULT_CACHE);
    }

    #[test]
    fn unknown_group_fails() {
        assert!(build("chapter", r#"<n type="list.grid"/>"#).is_err());
    }

    #[test]
    fn redirect_node_shape() {
        let node = Node::redirect("resolve");
        assert!(node.is_redirect());
        assert_eq!(node.data_type.to_string(), "native.redirect");
        assert_eq!(node.url, None);
        assert_eq!(node.request.as_deref(), Some("resolve"));
        assert_eq!(node.parse, None);
        assert_eq!(node.cache, Duration::ZERO);
        assert!(!node.matches("anything"));
    }
}
