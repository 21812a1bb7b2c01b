//! Cleanup for social-page article bodies.
//!
//! The editor behind those pages leaves two kinds of debris: list items whose
//! text repeats the bullet or number the `<ol>`/`<ul>` already renders, and
//! `<pre>` blocks that are empty, hold plain prose, or split one snippet over
//! several `<code>` lines.

use std::sync::LazyLock;

use regex::Regex;

use crate::fragment::{ElementNode, Fragment, FragmentNode};

static ORDINAL_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)\d+\.\s*").expect("static regex"));
static BULLET_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)•\s*").expect("static regex"));

pub fn sanitize_social_fragment(fragment: &mut Fragment) {
    clean_list_leaves(fragment.root_mut());
    clean_code_blocks(fragment.root_mut());
}

/// Drops a leading `N.` and then a leading `•`, keeping any indentation.
pub fn strip_list_markers(text: &str) -> String {
    let without_ordinal = ORDINAL_MARKER.replace(text, "${1}");
    BULLET_MARKER.replace(&without_ordinal, "${1}").into_owned()
}

/// Rewrites the text of every `li > section > span[leaf]`.
pub fn clean_list_leaves(element: &mut ElementNode) {
    if element.is("li") {
        for section in element.child_elements_mut().filter(|child| child.is("section")) {
            for leaf in section
                .child_elements_mut()
                .filter(|child| child.is("span") && child.attr("leaf").is_some())
            {
                let cleaned = strip_list_markers(&leaf.text());
                leaf.set_text(cleaned);
            }
        }
    }
    for child in element.child_elements_mut() {
        clean_list_leaves(child);
    }
}

/// Removes, demotes or merges `<pre>` blocks below `element`.
pub fn clean_code_blocks(element: &mut ElementNode) {
    element.children.retain_mut(|child| match child {
        FragmentNode::Element(pre) if pre.is("pre") => {
            let keep = reshape_code_block(pre);
            if keep {
                clean_code_blocks(pre);
            }
            keep
        }
        FragmentNode::Element(other) => {
            clean_code_blocks(other);
            true
        }
        FragmentNode::Text(_) => true,
    });
}

/// Returns `false` when the block should be dropped.
fn reshape_code_block(pre: &mut ElementNode) -> bool {
    let visible: String = pre
        .text()
        .chars()
        .filter(|ch| *ch != '\n' && *ch != '\r')
        .collect();
    if visible.trim().is_empty() {
        return false;
    }

    let code_texts: Vec<String> = pre
        .descendants_named("code")
        .into_iter()
        .map(ElementNode::text)
        .collect();
    match code_texts.len() {
        0 => pre.name = "p".to_string(),
        1 => {}
        _ => {
            let merged = ElementNode::new("code").with_text(code_texts.join("\n"));
            pre.children = vec![FragmentNode::Element(merged)];
        }
    }
    true
}
