//! HTML serialisation of the node tree.

use super::node::{AttrValue, Element, Node};

/// Elements that never have children or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Render a node tree into an HTML string.
pub fn render_to_string(node: &Node) -> String {
    let mut out = String::with_capacity(1024);
    write_node(&mut out, node);
    out
}

/// Escape text for use in HTML content and double-quoted attributes.
fn push_escaped(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
}

fn write_node(out: &mut String, node: &Node) {
    match node {
        Node::Empty => {}
        Node::Text(text) => push_escaped(out, text),
        Node::Raw(html) => out.push_str(html),
        Node::Element(el) => write_element(out, el),
        Node::Fragment(children) => children.iter().for_each(|c| write_node(out, c)),
        Node::Shared(inner) => write_node(out, inner),
    }
}

fn write_element(out: &mut String, el: &Element) {
    out.push('<');
    out.push_str(&el.tag);
    for (name, value) in &el.attrs {
        out.push(' ');
        out.push_str(name);
        if let AttrValue::Text(v) = value {
            out.push_str("=\"");
            push_escaped(out, v);
            out.push('"');
        }
    }

    if VOID_ELEMENTS.contains(&el.tag.as_str()) {
        out.push_str("/>");
        return;
    }

    out.push('>');
    for child in &el.children {
        write_node(out, child);
    }
    out.push_str("</");
    out.push_str(&el.tag);
    out.push('>');
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn element(tag: &str, attrs: &[(&str, &str)], children: Vec<Node>) -> Node {
        let mut el = Element::new(tag);
        for (name, value) in attrs {
            el.attrs.push(((*name).into(), AttrValue::Text((*value).to_owned())));
        }
        el.children = children;
        el.into()
    }

    fn escaped(s: &str) -> String {
        let mut out = String::new();
        push_escaped(&mut out, s);
        out
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escaped("a < b & \"c\""), "a &lt; b &amp; &quot;c&quot;");
        assert_eq!(escaped("it's"), "it&#x27;s");
        assert_eq!(escaped("plain"), "plain");
    }

    #[test]
    fn test_render_element_with_attrs() {
        let node = element(
            "a",
            &[("href", "/posts/a?x=1&y=2")],
            vec![Node::text("read <more>")],
        );
        assert_eq!(
            render_to_string(&node),
            r#"<a href="/posts/a?x=1&amp;y=2">read &lt;more&gt;</a>"#
        );
    }

    #[test]
    fn test_render_void_element() {
        let node = element("meta", &[("charset", "UTF-8")], Vec::new());
        assert_eq!(render_to_string(&node), r#"<meta charset="UTF-8"/>"#);
    }

    #[test]
    fn test_render_void_element_ignores_children() {
        let node = element("link", &[("rel", "stylesheet")], vec![Node::text("ignored")]);
        assert_eq!(render_to_string(&node), r#"<link rel="stylesheet"/>"#);
    }

    #[test]
    fn test_render_flag_attribute() {
        let mut el = Element::new("input");
        el.attrs.push(("disabled".into(), AttrValue::Flag));
        assert_eq!(render_to_string(&el.into()), "<input disabled/>");
    }

    #[test]
    fn test_render_fragment_raw_and_shared() {
        let shared = Arc::new(Node::raw("<p>hi</p>"));
        let node = Node::Fragment(vec![
            Node::text("a"),
            Node::Empty,
            Node::Shared(shared),
            Node::text("b"),
        ]);
        assert_eq!(render_to_string(&node), "a<p>hi</p>b");
    }
}
