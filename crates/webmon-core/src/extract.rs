//! XPath-based value extraction from HTML.
//!
//! Expressions are translated into CSS selectors evaluated with `scraper`.
//! The supported subset covers the path expressions watches actually use:
//!
//! - `//` (descendant) and `/` (child) axes
//! - element name steps and the `*` wildcard
//! - attribute predicates: `[@a]`, `[@a='v']`, `[contains(@a,'v')]`
//! - positional predicates on named steps: `[n]`
//! - a terminal `/text()` or `/@attr`
//!
//! Anything outside the subset fails with `InvalidXPath` rather than
//! silently matching nothing. Multiple results are joined with a single
//! space in document order; zero results yield the empty string.

use scraper::{Html, Selector};

use crate::error::AppError;
use crate::traits::Extractor;

/// What to read from each element the path matches.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Terminal {
    /// Full descendant text of the element.
    Node,
    /// Direct child text nodes only (`/text()`).
    Text,
    /// One attribute value (`/@attr`).
    Attr(String),
}

/// A parsed, ready-to-evaluate expression.
pub struct CompiledXPath {
    selector: Selector,
    terminal: Terminal,
}

/// Parse and validate an expression without evaluating it. The API layer
/// uses this to reject bad expressions at watch creation time.
pub fn compile(xpath: &str) -> Result<CompiledXPath, AppError> {
    let (css, terminal) = translate(xpath)?;
    let selector = Selector::parse(&css)
        .map_err(|_| invalid(xpath, "expression does not form a valid selector"))?;
    Ok(CompiledXPath { selector, terminal })
}

/// Stateless [`Extractor`] over the supported XPath subset.
#[derive(Debug, Clone, Copy, Default)]
pub struct XPathExtractor;

impl XPathExtractor {
    pub fn new() -> Self {
        Self
    }

    fn evaluate(doc: &Html, compiled: &CompiledXPath) -> String {
        let mut parts: Vec<String> = Vec::new();
        for element in doc.select(&compiled.selector) {
            match &compiled.terminal {
                Terminal::Text => {
                    for child in element.children() {
                        if let Some(text) = child.value().as_text() {
                            parts.push(text.to_string());
                        }
                    }
                }
                Terminal::Attr(name) => {
                    if let Some(value) = element.value().attr(name) {
                        parts.push(value.to_string());
                    }
                }
                Terminal::Node => {
                    parts.push(element.text().collect::<String>());
                }
            }
        }
        parts.join(" ")
    }
}

impl Extractor for XPathExtractor {
    fn extract(&self, content: &str, xpath: &str) -> Result<String, AppError> {
        if content.trim().is_empty() {
            return Err(AppError::MalformedContent("document is empty".into()));
        }
        let compiled = compile(xpath)?;
        // html5ever recovers from broken markup the way a browser does, so
        // parsing itself cannot fail on non-empty input.
        let doc = Html::parse_document(content);
        Ok(Self::evaluate(&doc, &compiled))
    }
}

// ---------------------------------------------------------------------------
// XPath subset → CSS translation
// ---------------------------------------------------------------------------

fn invalid(expr: &str, why: &str) -> AppError {
    AppError::InvalidXPath(format!("{why}: {expr}"))
}

fn translate(xpath: &str) -> Result<(String, Terminal), AppError> {
    let src = xpath.trim();
    if src.is_empty() {
        return Err(invalid(xpath, "empty expression"));
    }
    if !src.starts_with('/') {
        return Err(invalid(xpath, "expression must start with / or //"));
    }

    let mut css = String::new();
    let mut terminal = Terminal::Node;
    let mut rest = src;
    let mut first = true;

    while !rest.is_empty() {
        let descendant = if let Some(r) = rest.strip_prefix("//") {
            rest = r;
            true
        } else if let Some(r) = rest.strip_prefix('/') {
            rest = r;
            false
        } else {
            return Err(invalid(xpath, "expected / or // between steps"));
        };
        if rest.is_empty() {
            return Err(invalid(xpath, "trailing slash"));
        }

        // Terminal forms close the expression.
        if let Some(after) = rest.strip_prefix("text()") {
            if first || descendant || !after.is_empty() {
                return Err(invalid(xpath, "text() must be the final child step"));
            }
            terminal = Terminal::Text;
            break;
        }
        if let Some(after) = rest.strip_prefix('@') {
            let (name, after) = take_name(after);
            if first || descendant || name.is_empty() || !after.is_empty() {
                return Err(invalid(xpath, "attribute access must be the final child step"));
            }
            terminal = Terminal::Attr(name.to_string());
            break;
        }

        // Element step: name or wildcard, then any predicates.
        let (name, mut after) = take_step_name(rest);
        if name.is_empty() {
            return Err(invalid(xpath, "expected an element name or *"));
        }
        if !first {
            css.push_str(if descendant { " " } else { " > " });
        }
        css.push_str(name);

        while let Some(pred_rest) = after.strip_prefix('[') {
            let end = pred_rest
                .find(']')
                .ok_or_else(|| invalid(xpath, "unterminated predicate"))?;
            let pred = &pred_rest[..end];
            after = &pred_rest[end + 1..];
            css.push_str(&translate_predicate(xpath, name, pred)?);
        }

        rest = after;
        first = false;
    }

    if first {
        return Err(invalid(xpath, "expression has no steps"));
    }
    Ok((css, terminal))
}

fn translate_predicate(expr: &str, step: &str, pred: &str) -> Result<String, AppError> {
    let pred = pred.trim();
    if pred.is_empty() {
        return Err(invalid(expr, "empty predicate"));
    }

    // Positional: [3]. Maps to :nth-of-type, which needs a named element.
    if pred.bytes().all(|b| b.is_ascii_digit()) {
        let n: usize = pred
            .parse()
            .map_err(|_| invalid(expr, "position out of range"))?;
        if n == 0 || step == "*" {
            return Err(invalid(expr, "unsupported positional predicate"));
        }
        return Ok(format!(":nth-of-type({n})"));
    }

    // contains(@attr,'value')
    if let Some(inner) = pred
        .strip_prefix("contains(")
        .and_then(|p| p.strip_suffix(')'))
    {
        let (attr, value) = inner
            .split_once(',')
            .ok_or_else(|| invalid(expr, "malformed contains()"))?;
        let attr = attr
            .trim()
            .strip_prefix('@')
            .ok_or_else(|| invalid(expr, "contains() requires an attribute"))?;
        let value = unquote(value.trim()).ok_or_else(|| invalid(expr, "malformed contains()"))?;
        require_name(expr, attr)?;
        require_literal(expr, value)?;
        return Ok(format!("[{attr}*=\"{value}\"]"));
    }

    // [@attr] or [@attr='value']
    if let Some(body) = pred.strip_prefix('@') {
        let (attr, rest) = take_name(body);
        require_name(expr, attr)?;
        let rest = rest.trim();
        if rest.is_empty() {
            return Ok(format!("[{attr}]"));
        }
        let value = rest
            .strip_prefix('=')
            .map(str::trim)
            .and_then(unquote)
            .ok_or_else(|| invalid(expr, "unsupported attribute predicate"))?;
        require_literal(expr, value)?;
        return Ok(format!("[{attr}=\"{value}\"]"));
    }

    Err(invalid(expr, "unsupported predicate"))
}

/// Strip matching single or double quotes.
fn unquote(s: &str) -> Option<&str> {
    let stripped = s
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| s.strip_prefix('"').and_then(|s| s.strip_suffix('"')))?;
    Some(stripped)
}

fn require_name(expr: &str, name: &str) -> Result<(), AppError> {
    if name.is_empty() || !name.bytes().all(is_name_byte) {
        return Err(invalid(expr, "invalid name"));
    }
    Ok(())
}

fn require_literal(expr: &str, value: &str) -> Result<(), AppError> {
    if value.contains('"') || value.contains('\\') {
        return Err(invalid(expr, "unsupported characters in literal"));
    }
    Ok(())
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

/// Split off a leading identifier.
fn take_name(s: &str) -> (&str, &str) {
    let end = s
        .bytes()
        .position(|b| !is_name_byte(b))
        .unwrap_or(s.len());
    s.split_at(end)
}

/// Split off a leading element name or `*`.
fn take_step_name(s: &str) -> (&str, &str) {
    if let Some(rest) = s.strip_prefix('*') {
        ("*", rest)
    } else {
        take_name(s)
    }
}
