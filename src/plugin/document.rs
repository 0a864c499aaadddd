//! Splits a plugin file into its `meta`, `nodes` and `script` sections.

use super::meta::Meta;
use super::nodes::Nodes;
use super::xml::{descendant, text_of};
use crate::error::{PluginError, Result};

/// A fully validated plugin file.
#[derive(Debug, Clone)]
pub struct PluginDocument {
    pub meta: Meta,
    pub nodes: Nodes,
    /// Script block source; empty when the plugin has no `<script>`.
    pub script: String,
}

impl PluginDocument {
    /// Parse and validate plugin XML.
    ///
    /// Fails on the first structural problem; nothing is built partially.
    pub fn parse(source: &str) -> Result<Self> {
        let doc = roxmltree::Document::parse(source)?;
        let root = doc.root_element();

        let meta = descendant(root, "meta")
            .ok_or_else(|| PluginError::parse("plugin has no <meta> section"))?;
        let nodes = descendant(root, "nodes")
            .ok_or_else(|| PluginError::parse("plugin has no <nodes> section"))?;

        Ok(Self {
            meta: Meta::from_element(meta)?,
            nodes: Nodes::from_element(nodes)?,
            script: descendant(root, "script").map(text_of).unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sections() {
        let doc = PluginDocument::parse(
            r#"<plugin>
                <meta><title>T</title><version>1</version><author>A</author></meta>
                <nodes>
                    <entry><node type="list.grid" title="Hot" url="http://site/"/></entry>
                </nodes>
                <script><![CDATA[function hot(b) { return b.length < 2 ? "x" : b; }]]></script>
            </plugin>"#,
        )
        .unwrap();
        assert_eq!(doc.meta.title, "T");
        assert_eq!(doc.nodes.entries.len(), 1);
        assert!(doc.script.contains("b.length < 2"));
    }

    #[test]
    fn missing_script_is_empty() {
        let doc = PluginDocument::parse(
            "<plugin><meta><version>1</version></meta><nodes/></plugin>",
        )
        .unwrap();
        assert!(doc.script.is_empty());
    }

    #[test]
    fn missing_sections_fail() {
        assert!(PluginDocument::parse("<plugin><nodes/></plugin>").is_err());
        assert!(
            PluginDocument::parse("<plugin><meta><version>1</version></meta></plugin>").is_err()
        );
    }

    #[test]
    fn malformed_xml_fails() {
        let err = PluginDocument::parse("<plugin><meta>").unwrap_err();
        assert!(matches!(err, PluginError::Xml(_)));
    }
}
