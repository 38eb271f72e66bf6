// crates/formbuilder-core/src/runtime/markup.rs
// ============================================================================
// Module: Markup Tree
// Description: Minimal HTML element tree with a deterministic pretty printer.
// Purpose: Produce byte-stable, escaped markup for rendered forms and pages.
// Dependencies: none
// ============================================================================

//! ## Overview
//! Elements keep attributes in insertion order and print one tag or text node
//! per line, indented by one space per depth. Elements without children print
//! on a single line. Void elements never print a closing tag.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Elements that never have content or a closing tag.
const VOID_ELEMENTS: &[&str] = &["input", "br", "hr", "meta", "link", "img"];

// ============================================================================
// SECTION: Tree
// ============================================================================

/// Markup node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Nested element.
    Element(Element),
    /// Escaped text.
    Text(String),
    /// Pre-rendered markup inserted verbatim.
    Raw(String),
}

/// Markup element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Tag name.
    tag: &'static str,
    /// Attributes in insertion order; `None` marks a bare boolean attribute.
    attributes: Vec<(String, Option<String>)>,
    /// Child nodes.
    children: Vec<Node>,
}

impl Element {
    /// Creates an element with no attributes or children.
    #[must_use]
    pub const fn new(tag: &'static str) -> Self {
        Self {
            tag,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), Some(value.into())));
        self
    }

    /// Adds a boolean attribute such as `required`.
    #[must_use]
    pub fn flag(mut self, name: impl Into<String>) -> Self {
        self.attributes.push((name.into(), None));
        self
    }

    /// Adds a boolean attribute when `enabled`.
    #[must_use]
    pub fn flag_if(self, name: impl Into<String>, enabled: bool) -> Self {
        if enabled { self.flag(name) } else { self }
    }

    /// Appends a child element.
    #[must_use]
    pub fn child(mut self, child: Self) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Appends a text child.
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    /// Appends verbatim markup.
    #[must_use]
    pub fn raw(mut self, markup: impl Into<String>) -> Self {
        self.children.push(Node::Raw(markup.into()));
        self
    }

    /// Appends a child element in place.
    pub fn push(&mut self, child: Self) {
        self.children.push(Node::Element(child));
    }

    /// Returns true when the element has no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Pretty prints the element and its descendants.
    #[must_use]
    pub fn to_pretty_string(&self) -> String {
        let mut out = String::new();
        self.write_pretty(&mut out, 0);
        out
    }

    /// Writes the element at `depth`.
    fn write_pretty(&self, out: &mut String, depth: usize) {
        indent(out, depth);
        self.write_open_tag(out);
        if VOID_ELEMENTS.contains(&self.tag) {
            out.push('\n');
            return;
        }
        if self.children.is_empty() {
            let _ = writeln!(out, "</{}>", self.tag);
            return;
        }
        out.push('\n');
        for child in &self.children {
            match child {
                Node::Element(element) => element.write_pretty(out, depth + 1),
                Node::Text(text) => {
                    indent(out, depth + 1);
                    out.push_str(&escape_text(text));
                    out.push('\n');
                }
                Node::Raw(markup) => {
                    for line in markup.lines() {
                        indent(out, depth + 1);
                        out.push_str(line);
                        out.push('\n');
                    }
                }
            }
        }
        indent(out, depth);
        let _ = writeln!(out, "</{}>", self.tag);
    }

    /// Writes `<tag attr="value" ...>`.
    fn write_open_tag(&self, out: &mut String) {
        out.push('<');
        out.push_str(self.tag);
        for (name, value) in &self.attributes {
            out.push(' ');
            out.push_str(name);
            if let Some(value) = value {
                let _ = write!(out, "=\"{}\"", escape_attribute(value));
            }
        }
        if VOID_ELEMENTS.contains(&self.tag) {
            out.push('/');
        }
        out.push('>');
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Writes `depth` spaces.
fn indent(out: &mut String, depth: usize) {
    out.extend(std::iter::repeat_n(' ', depth));
}

/// Escapes text content.
#[must_use]
pub fn escape_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}

/// Escapes an attribute value for double-quoted output.
#[must_use]
pub fn escape_attribute(input: &str) -> String {
    escape_text(input).replace('"', "&quot;")
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_elements_indent_by_depth() {
        let markup = Element::new("div")
            .attr("class", "row")
            .child(Element::new("p").text("hi"))
            .to_pretty_string();
        assert_eq!(markup, "<div class=\"row\">\n <p>\n  hi\n </p>\n</div>\n");
    }

    #[test]
    fn void_elements_self_close() {
        let markup = Element::new("input").attr("type", "text").flag("required").to_pretty_string();
        assert_eq!(markup, "<input type=\"text\" required/>\n");
    }

    #[test]
    fn text_and_attributes_are_escaped() {
        let markup = Element::new("option")
            .attr("value", "\"A&B\"")
            .text("<A&B>")
            .to_pretty_string();
        assert_eq!(markup, "<option value=\"&quot;A&amp;B&quot;\">\n &lt;A&amp;B&gt;\n</option>\n");
    }

    #[test]
    fn empty_elements_print_on_one_line() {
        let markup = Element::new("textarea").attr("id", "notes").to_pretty_string();
        assert_eq!(markup, "<textarea id=\"notes\"></textarea>\n");
    }
}
