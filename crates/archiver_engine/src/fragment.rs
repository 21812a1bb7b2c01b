//! Owned, mutable HTML subtree used for an article body.
//!
//! `scraper` documents are read-only, so the content container is copied
//! into this small tree once; sanitizing, image localization and Markdown
//! conversion all work on it.

use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{ElementRef, Html};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentNode {
    Element(ElementNode),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementNode {
    /// Lowercase tag name.
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<FragmentNode>,
}

impl ElementNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(FragmentNode::Text(text.into()));
        self
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(key, _)| key != name);
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> + '_ {
        self.attr("class").into_iter().flat_map(str::split_whitespace)
    }

    /// All descendant text, concatenated in document order.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Replaces every child with a single text node.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children = vec![FragmentNode::Text(text.into())];
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &ElementNode> + '_ {
        self.children.iter().filter_map(|child| match child {
            FragmentNode::Element(element) => Some(element),
            FragmentNode::Text(_) => None,
        })
    }

    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut ElementNode> + '_ {
        self.children.iter_mut().filter_map(|child| match child {
            FragmentNode::Element(element) => Some(element),
            FragmentNode::Text(_) => None,
        })
    }

    /// Descendants with the given tag name, in document order.
    pub fn descendants_named<'a>(&'a self, name: &str) -> Vec<&'a ElementNode> {
        let mut found = Vec::new();
        collect_named(self, name, &mut found);
        found
    }
}

fn collect_text(element: &ElementNode, out: &mut String) {
    for child in &element.children {
        match child {
            FragmentNode::Text(text) => out.push_str(text),
            FragmentNode::Element(inner) => collect_text(inner, out),
        }
    }
}

fn collect_named<'a>(element: &'a ElementNode, name: &str, found: &mut Vec<&'a ElementNode>) {
    for child in element.child_elements() {
        if child.is(name) {
            found.push(child);
        }
        collect_named(child, name, found);
    }
}

fn collect_images<'a>(element: &'a mut ElementNode, found: &mut Vec<&'a mut ElementNode>) {
    for child in element.child_elements_mut() {
        if child.is("img") {
            found.push(child);
        } else {
            collect_images(child, found);
        }
    }
}

/// An article body rooted at its content container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    root: ElementNode,
}

impl Fragment {
    pub fn new(root: ElementNode) -> Self {
        Self { root }
    }

    /// Copies a parsed element (and its subtree) out of a `scraper` document.
    pub fn from_element(element: ElementRef<'_>) -> Self {
        Self {
            root: convert_element(element),
        }
    }

    /// Parses an HTML snippet; the top-level nodes end up under a `div` root.
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_fragment(html);
        let mut root = ElementNode::new("div");
        root.children = document
            .root_element()
            .children()
            .filter_map(convert_node)
            .collect();
        Self { root }
    }

    pub fn root(&self) -> &ElementNode {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut ElementNode {
        &mut self.root
    }

    /// Every `img` element in document order.
    pub fn images_mut(&mut self) -> Vec<&mut ElementNode> {
        let mut found = Vec::new();
        if self.root.is("img") {
            found.push(&mut self.root);
        } else {
            collect_images(&mut self.root, &mut found);
        }
        found
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        write_element(&self.root, &mut out);
        out
    }
}

fn convert_node(node: NodeRef<'_, Node>) -> Option<FragmentNode> {
    match node.value() {
        Node::Text(text) => {
            let text: &str = text;
            Some(FragmentNode::Text(text.to_string()))
        }
        Node::Element(_) => ElementRef::wrap(node).map(|el| FragmentNode::Element(convert_element(el))),
        _ => None,
    }
}

fn convert_element(element: ElementRef<'_>) -> ElementNode {
    ElementNode {
        name: element.value().name().to_ascii_lowercase(),
        attrs: element
            .value()
            .attrs()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect(),
        children: element.children().filter_map(convert_node).collect(),
    }
}

fn write_element(element: &ElementNode, out: &mut String) {
    out.push('<');
    out.push_str(&element.name);
    for (key, value) in &element.attrs {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape(value, true));
        out.push('"');
    }
    out.push('>');
    if VOID_ELEMENTS.contains(&element.name.as_str()) {
        return;
    }
    for child in &element.children {
        match child {
            FragmentNode::Text(text) => out.push_str(&escape(text, false)),
            FragmentNode::Element(inner) => write_element(inner, out),
        }
    }
    out.push_str("</");
    out.push_str(&element.name);
    out.push('>');
}

fn escape(text: &str, in_attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if in_attribute => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}
