use std::collections::HashMap;

use html2md::common::get_tag_attr;
use html2md::{Handle, NodeData, StructuredPrinter, TagHandler, TagHandlerFactory};

use crate::fragment::Fragment;

pub trait Converter: Send + Sync {
    fn to_markdown(&self, fragment: &Fragment) -> String;
}

/// html2md with ATX headings, fenced code carrying a language hint, and
/// script-like elements dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct Html2MdConverter;

impl Converter for Html2MdConverter {
    fn to_markdown(&self, fragment: &Fragment) -> String {
        let markdown = html2md::parse_html_custom(&fragment.to_html(), &tag_handlers());
        if markdown.is_empty() {
            markdown
        } else {
            markdown + "\n"
        }
    }
}

const SKIPPED: &[&str] = &["script", "style", "noscript", "template"];

const LANGUAGE_PREFIXES: &[&str] = &["language-", "lang-", "brush:", "highlight-"];

fn tag_handlers() -> HashMap<String, Box<dyn TagHandlerFactory>> {
    let mut handlers: HashMap<String, Box<dyn TagHandlerFactory>> = HashMap::new();
    for heading in ["h1", "h2", "h3", "h4", "h5", "h6"] {
        handlers.insert(heading.to_string(), Box::new(AtxHeading::default));
    }
    handlers.insert("pre".to_string(), Box::new(FencedCode::default));
    for tag in SKIPPED {
        handlers.insert(tag.to_string(), Box::new(|| SkipContent));
    }
    handlers
}

fn element_name(node: &Handle) -> Option<String> {
    match node.data {
        NodeData::Element { ref name, .. } => Some(name.local.to_string()),
        _ => None,
    }
}

/// `# Title` style headings; the text is flattened onto one line.
#[derive(Default)]
struct AtxHeading {
    level: usize,
    start: usize,
}

impl TagHandler for AtxHeading {
    fn handle(&mut self, tag: &Handle, printer: &mut StructuredPrinter) {
        self.level = element_name(tag)
            .and_then(|name| name.strip_prefix('h').and_then(|digit| digit.parse().ok()))
            .unwrap_or(1);
        printer.append_str("\n\n");
        self.start = printer.data.len();
    }

    fn after_handle(&mut self, printer: &mut StructuredPrinter) {
        let content = printer.data.split_off(self.start);
        let text = content.split_whitespace().collect::<Vec<_>>().join(" ");
        if !text.is_empty() {
            printer.append_str(&format!("{} {text}\n\n", "#".repeat(self.level)));
        }
    }
}

/// Fenced code block; the fence outgrows any backtick run in the code.
#[derive(Default)]
struct FencedCode {
    language: String,
    start: usize,
}

impl TagHandler for FencedCode {
    fn handle(&mut self, tag: &Handle, printer: &mut StructuredPrinter) {
        self.language = code_language(tag).unwrap_or_default();
        printer.append_str("\n\n");
        self.start = printer.data.len();
    }

    fn after_handle(&mut self, printer: &mut StructuredPrinter) {
        let content = printer.data.split_off(self.start);
        let code = content.trim_end_matches(['\n', '\r']);
        let longest_run = code
            .split(|ch: char| ch != '`')
            .map(str::len)
            .max()
            .unwrap_or(0);
        let fence = "`".repeat(longest_run.max(2) + 1);
        printer.append_str(&format!("{fence}{}\n{code}\n{fence}\n\n", self.language));
    }
}

struct SkipContent;

impl TagHandler for SkipContent {
    fn handle(&mut self, _tag: &Handle, _printer: &mut StructuredPrinter) {}

    fn after_handle(&mut self, _printer: &mut StructuredPrinter) {}

    fn skip_descendants(&self) -> bool {
        true
    }
}

/// Language hint from the `pre` itself or its first `code` child.
fn code_language(pre: &Handle) -> Option<String> {
    let code = pre
        .children
        .borrow()
        .iter()
        .find(|child| element_name(child).as_deref() == Some("code"))
        .cloned();
    std::iter::once(pre.clone())
        .chain(code)
        .find_map(|node| language_hint(&node))
}

fn language_hint(node: &Handle) -> Option<String> {
    if let Some(lang) = get_tag_attr(node, "data-lang") {
        let lang = lang.trim();
        if !lang.is_empty() {
            return Some(lang.to_string());
        }
    }
    // "brush: python; gutter: true" is common in exported blog posts
    let class = get_tag_attr(node, "class")?.replace(": ", ":");
    class.split_whitespace().find_map(|token| {
        LANGUAGE_PREFIXES.iter().find_map(|prefix| {
            let rest = token.strip_prefix(prefix)?;
            let lang = rest.split(';').next().unwrap_or_default().trim();
            (!lang.is_empty()).then(|| lang.to_string())
        })
    })
}
