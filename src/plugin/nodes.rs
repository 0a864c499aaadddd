//! The `<nodes>` section: node groups plus `catch` processors.

use std::collections::HashMap;

use super::node::Node;
use super::xml::{attr, element_children};
use crate::error::{PluginError, Result};

/// Catch processor that installs the plugin's redirect node.
pub const CATCH_REDIRECT: &str = "redirect";
/// Catch processor that sets the outgoing `User-Agent`.
pub const CATCH_USER_AGENT: &str = "ua";
/// Catch processor that sets the outgoing charset.
pub const CATCH_ENCODING: &str = "encoding";

/// All nodes declared by a plugin, in document order.
#[derive(Debug, Clone, Default)]
pub struct Nodes {
    pub entries: Vec<Node>,
    pub views: Vec<Node>,
    pub searches: Vec<Node>,
    /// Fallback node built from the `redirect` catch processor.
    pub redirect: Option<Node>,
    /// `<catch><processor type=".." value=".."/></catch>` pairs.
    pub catch: HashMap<String, String>,
}

impl Nodes {
    pub fn from_element(nodes: roxmltree::Node<'_, '_>) -> Result<Self> {
        let mut collection = Self::default();

        for group in element_children(nodes) {
            let name = group.tag_name().name();
            let target = match name {
                "catch" => {
                    for processor in element_children(group)
                        .filter(|n| n.tag_name().name() == "processor")
                    {
                        collection.catch.insert(
                            attr(processor, "type").to_string(),
                            attr(processor, "value").to_string(),
                        );
                    }
                    continue;
                }
                "entry" => &mut collection.entries,
                "view" => &mut collection.views,
                "search" => &mut collection.searches,
                other => {
                    return Err(PluginError::parse(format!(
                        "unknown node collection name: '{other}'"
                    )))
                }
            };
            for element in element_children(group) {
                target.push(Node::from_element(name, element)?);
            }
        }

        collection.redirect = collection
            .catch
            .get(CATCH_REDIRECT)
            .map(|hook| Node::redirect(hook.as_str()));

        Ok(collection)
    }

    /// First view (document order) whose expression matches `url`.
    pub fn find_view(&self, url: &str) -> Option<&Node> {
        self.views.iter().find(|node| node.matches(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> Result<Nodes> {
        let doc = roxmltree::Document::parse(xml).unwrap();
        Nodes::from_element(doc.root_element())
    }

    #[test]
    fn groups_keep_document_order() {
        let nodes = parse(
            r#"<nodes>
                <entry>
                    <node type="list.grid" title="Hot" url="http://site/hot"/>
                    <node type="list.grid" title="New" url="http://site/new"/>
                </entry>
                <view>
                    <node type="detail.page" expr="/book/"/>
                    <node type="list.grid" expr="/"/>
                </view>
                <search>
                    <node type="list.grid" url="http://site/s?q=%input"/>
                </search>
            </nodes>"#,
        )
        .unwrap();
        assert_eq!(nodes.entries.len(), 2);
        assert_eq!(nodes.entries[1].title(), Some("New"));
        assert_eq!(nodes.views.len(), 2);
        assert_eq!(nodes.searches.len(), 1);
        assert!(nodes.redirect.is_none());
        assert_eq!(
            nodes.find_view("http://site/book/1").unwrap().data_type.kind,
            "detail"
        );
        assert_eq!(
            nodes.find_view("http://site/other").unwrap().data_type.kind,
            "list"
        );
    }

    #[test]
    fn catch_processors_are_collected() {
        let nodes = parse(
            r#"<nodes>
                <catch>
                    <processor type="ua" value="Mozilla/5.0"/>
                    <processor type="encoding" value="gbk"/>
                    <processor type="redirect" value="resolve"/>
                    <processor type="custom" value="x"/>
                </catch>
            </nodes>"#,
        )
        .unwrap();
        assert_eq!(nodes.catch.get(CATCH_USER_AGENT).unwrap(), "Mozilla/5.0");
        assert_eq!(nodes.catch.get(CATCH_ENCODING).unwrap(), "gbk");
        assert_eq!(nodes.catch.get("custom").unwrap(), "x");
        let redirect = nodes.redirect.unwrap();
        assert!(redirect.is_redirect());
        assert_eq!(redirect.request.as_deref(), Some("resolve"));
    }

    #[test]
    fn unknown_group_is_fatal() {
        let err = parse(r#"<nodes><chapters><node type="a.b"/></chapters></nodes>"#)
            .unwrap_err();
        assert!(err.to_string().contains("chapters"));
    }

    #[test]
    fn one_bad_node_fails_everything() {
        let result = parse(
            r#"<nodes>
                <entry>
                    <node type="list.grid" title="Ok"/>
                    <node type="list.grid"/>
                </entry>
            </nodes>"#,
        );
        assert!(result.is_err());
    }
}
