//! Plugin metadata (`<meta>` section).

use std::collections::BTreeMap;

use regex::Regex;

use super::xml::{attr, child, descendant, element_children, text_of};
use crate::error::{PluginError, Result};

/// A host-visible action declared by the plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub title: String,
    pub kind: String,
    pub value: String,
}

/// Plugin metadata.
#[derive(Debug, Clone)]
pub struct Meta {
    pub title: String,
    pub version: i64,
    pub author: String,
    /// `<property name="true|false" .../>` flags.
    pub properties: BTreeMap<String, bool>,
    pub source_url: String,
    /// Admission filter tested against candidate URLs.
    pub source_expr: Regex,
    pub theme_color: String,
    pub logo_url: String,
    pub summary: String,
    pub content_type: String,
    pub tags: Vec<String>,
    pub actions: Vec<Action>,
}

impl Meta {
    /// Build from the `<meta>` element.
    pub fn from_element(meta: roxmltree::Node<'_, '_>) -> Result<Self> {
        let title = descendant(meta, "title").map(text_of).unwrap_or_default();
        let author = child(meta, "author").map(text_of).unwrap_or_default();

        let version_text = child(meta, "version").map(text_of).unwrap_or_default();
        let version = version_text.parse::<i64>().map_err(|_| {
            PluginError::parse(format!("meta 'version' is not an integer: '{version_text}'"))
        })?;

        let properties = child(meta, "property")
            .map(|property| {
                property
                    .attributes()
                    .map(|a| (a.name().to_string(), a.value() == "true"))
                    .collect()
            })
            .unwrap_or_default();

        let source = child(meta, "source");
        let source_url = source.map(|s| attr(s, "url")).unwrap_or_default().to_string();
        let source_pattern = source.map(|s| attr(s, "expr")).unwrap_or_default();
        let source_expr = Regex::new(source_pattern).map_err(|e| {
            PluginError::parse(format!("meta source 'expr' is not a valid regex: {e}"))
        })?;

        let info = child(meta, "info");
        let theme = info.and_then(|i| child(i, "theme"));
        let tags_elem = info.and_then(|i| child(i, "tags"));

        let tags = tags_elem
            .map(|t| {
                element_children(t)
                    .filter(|n| n.tag_name().name() == "tag")
                    .map(text_of)
                    .collect()
            })
            .unwrap_or_default();

        let actions = child(meta, "actions")
            .map(|a| {
                element_children(a)
                    .filter(|n| n.tag_name().name() == "action")
                    .map(|n| Action {
                        title: attr(n, "title").to_string(),
                        kind: attr(n, "type").to_string(),
                        value: attr(n, "value").to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            title,
            version,
            author,
            properties,
            source_url,
            source_expr,
            theme_color: theme.map(|t| attr(t, "color")).unwrap_or_default().to_string(),
            logo_url: theme.map(|t| attr(t, "logo")).unwrap_or_default().to_string(),
            summary: info
                .and_then(|i| child(i, "summary"))
                .map(text_of)
                .unwrap_or_default(),
            content_type: tags_elem.map(|t| attr(t, "type")).unwrap_or_default().to_string(),
            tags,
            actions,
        })
    }

    /// Whether the plugin claims `url` at all.
    pub fn is_match(&self, url: &str) -> bool {
        self.source_expr.is_match(url)
    }

    /// Value of a `<property>` flag; absent flags are `false`.
    pub fn property(&self, name: &str) -> bool {
        self.properties.get(name).copied().unwrap_or(false)
    }
}
