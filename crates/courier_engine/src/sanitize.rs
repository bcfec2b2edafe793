//! Turns third-party article markup into a quiet, self-contained fragment.
//!
//! One walk over the parsed tree rebuilds the markup from scratch: chrome
//! elements vanish with their subtrees, anchors dissolve into their children,
//! presentation attributes are dropped, and image references are resolved
//! against a base URL when one is supplied. The parser error-recovers rather
//! than failing, so this never errors on malformed input.

use ego_tree::NodeRef;
use scraper::node::{Element, Node};
use scraper::{ElementRef, Html};
use url::Url;

/// Elements dropped wholesale, subtree included.
const STRIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "template", "nav", "footer", "header", "aside", "form",
    "iframe", "button", "input", "select", "textarea",
];

/// Substrings of class/id tokens that mark site chrome rather than content.
const CHROME_MARKERS: &[&str] = &[
    "sidebar",
    "comment",
    "pagination",
    "pager",
    "share",
    "social",
    "related",
    "breadcrumb",
    "advert",
    "banner",
    "widget",
    "subscribe",
    "newsletter",
];

/// The only attributes that survive sanitization.
const KEPT_ATTRIBUTES: &[&str] = &["src", "alt", "colspan", "rowspan", "datetime"];

/// Elements serialized without a closing tag.
const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "wbr"];

/// Sanitize a fragment with no URL context; relative references pass
/// through unchanged.
pub fn sanitize(html: &str) -> String {
    sanitize_with_base(html, None)
}

/// Sanitize a fragment, resolving image references against `base` so the
/// result stays displayable outside the origin page.
pub fn sanitize_with_base(html: &str, base: Option<&Url>) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::with_capacity(html.len());
    for child in fragment.root_element().children() {
        render_node(child, base, &mut out);
    }
    out
}

fn render_node(node: NodeRef<'_, Node>, base: Option<&Url>, out: &mut String) {
    match node.value() {
        Node::Text(text) => push_escaped_text(out, text),
        Node::Element(_) => {
            if let Some(element) = ElementRef::wrap(node) {
                render_element(element, base, out);
            }
        }
        // comments, doctypes and processing instructions are dropped
        _ => {}
    }
}

fn render_element(element: ElementRef<'_>, base: Option<&Url>, out: &mut String) {
    let name = element.value().name();
    if STRIPPED_ELEMENTS.contains(&name) || has_chrome_marker(element.value()) {
        return;
    }
    // Links inside notebook pages are noise; keep the text, drop the anchor.
    if name == "a" {
        render_children(element, base, out);
        return;
    }
    // Paragraphs are only worth keeping when something visible survives the
    // cleanup, so render the children first and inspect the result.
    if name == "p" {
        let mut inner = String::new();
        render_children(element, base, &mut inner);
        if !inner.contains("<img") && rendered_text_is_blank(&inner) {
            return;
        }
        push_open_tag(element.value(), base, out);
        out.push('>');
        out.push_str(&inner);
        out.push_str("</p>");
        return;
    }

    push_open_tag(element.value(), base, out);
    if VOID_ELEMENTS.contains(&name) {
        out.push_str(" />");
        return;
    }
    out.push('>');
    render_children(element, base, out);
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn render_children(element: ElementRef<'_>, base: Option<&Url>, out: &mut String) {
    for child in element.children() {
        render_node(child, base, out);
    }
}

/// Emit `<name` plus the surviving attributes, without the closing `>` so
/// callers choose between void and container forms.
fn push_open_tag(element: &Element, base: Option<&Url>, out: &mut String) {
    out.push('<');
    out.push_str(element.name());
    for (attr, value) in element.attrs() {
        if !KEPT_ATTRIBUTES.contains(&attr) {
            continue;
        }
        let resolved = if attr == "src" {
            resolve_resource(value, base)
        } else {
            value.to_string()
        };
        out.push(' ');
        out.push_str(attr);
        out.push_str("=\"");
        push_escaped_attr(out, &resolved);
        out.push('"');
    }
}

fn has_chrome_marker(element: &Element) -> bool {
    for attr in ["class", "id"] {
        if let Some(value) = element.attr(attr) {
            if value.split_whitespace().any(is_chrome_token) {
                return true;
            }
        }
    }
    false
}

fn is_chrome_token(token: &str) -> bool {
    let token = token.to_ascii_lowercase();
    // "ad" needs word-ish boundaries; plain substring search would flag
    // every "header-line" and "read-more".
    if matches!(token.as_str(), "ad" | "ads" | "advertisement")
        || token.starts_with("ad-")
        || token.ends_with("-ad")
    {
        return true;
    }
    CHROME_MARKERS.iter().any(|marker| token.contains(marker))
}

/// Keep the reference when it is already usable anywhere (absolute or a data
/// URI); otherwise resolve it against the page it came from.
fn resolve_resource(value: &str, base: Option<&Url>) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.starts_with("data:") {
        return trimmed.to_string();
    }
    if Url::parse(trimmed).is_ok() {
        return trimmed.to_string();
    }
    match base.and_then(|base| base.join(trimmed).ok()) {
        Some(resolved) => resolved.into(),
        None => trimmed.to_string(),
    }
}

fn rendered_text_is_blank(html: &str) -> bool {
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag && !c.is_whitespace() => return false,
            _ => {}
        }
    }
    true
}

fn push_escaped_text(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
}

fn push_escaped_attr(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
}
