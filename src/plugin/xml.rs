//! Small accessors over `roxmltree` nodes.

use roxmltree::Node;

pub(crate) fn element_children<'a, 'input>(
    node: Node<'a, 'input>,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(Node::is_element)
}

/// First element child called `name`.
pub(crate) fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    element_children(node).find(|n| n.tag_name().name() == name)
}

/// First element called `name` anywhere below (or at) `node`.
pub(crate) fn descendant<'a, 'input>(
    node: Node<'a, 'input>,
    name: &str,
) -> Option<Node<'a, 'input>> {
    node.descendants()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

/// Attribute value, empty when absent.
pub(crate) fn attr<'a>(node: Node<'a, '_>, name: &str) -> &'a str {
    node.attribute(name).unwrap_or("")
}

/// All text and CDATA below `node`, trimmed.
pub(crate) fn text_of(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect::<String>()
        .trim()
        .to_string()
}

/// `<tag a="b">` rendering used in error messages.
pub(crate) fn describe(node: Node<'_, '_>) -> String {
    let attrs: String = node
        .attributes()
        .map(|a| format!(" {}=\"{}\"", a.name(), a.value()))
        .collect();
    format!("<{}{attrs}>", node.tag_name().name())
}
