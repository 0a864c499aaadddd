//! Plugin document model.
//!
//! A plugin is an XML file with three sections:
//!
//! ```xml
//! <plugin>
//!   <meta>
//!     <title>Example</title>
//!     <version>1</version>
//!     <author>someone</author>
//!     <source url="https://example.com/" expr="^https?://example\.com/"/>
//!   </meta>
//!   <nodes>
//!     <entry><node type="list.grid" title="Latest" url="https://example.com/new?p=%page" parse="parseList"/></entry>
//!     <view><node type="detail.page" expr="/item/\d+" parse="parseItem"/></view>
//!     <search><node type="list.grid" url="https://example.com/s?q=%input" parse="parseList"/></search>
//!     <catch><processor type="ua" value="Mozilla/5.0"/></catch>
//!   </nodes>
//!   <script><![CDATA[ function parseList(body, location, request) { ... } ]]></script>
//! </plugin>
//! ```
//!
//! Everything is validated eagerly by [`PluginDocument::parse`].

pub mod document;
pub mod meta;
pub mod node;
pub mod nodes;
mod xml;

pub use document::PluginDocument;
pub use meta::{Action, Meta};
pub use node::{Node, NodeKind};
pub use nodes::Nodes;
