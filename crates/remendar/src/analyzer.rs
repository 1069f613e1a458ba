//! Failure Analyzer: turns a failed reference plus a page snapshot into a
//! structured [`LocatorAnalysis`] and a request for the reasoning service.
//!
//! Everything here is heuristic. Reference expressions are opaque to the
//! pipeline; the extractors pattern-match common CSS, XPath and
//! Playwright-style syntax and return `None` (or nothing) on anything they
//! do not recognize. They never fail.
//!
//! ## Pattern families
//!
//! | family            | example                          |
//! |-------------------|----------------------------------|
//! | id                | `#login-btn`                     |
//! | class             | `button.primary.large`           |
//! | generic attribute | `input[name="email"]`, `//a[@href='/x']` |
//! | data-testid       | `[data-testid=submit]`           |
//! | text-equals       | `text="Login"`, `//b[text()='Go']` |
//! | has-text          | `button:has-text('Login')`       |
//! | xpath contains    | `//a[contains(text(), 'Help')]`  |

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;
use std::sync::OnceLock;

use crate::reference::ReferenceEntry;
use crate::snapshot::{truncate_chars, DomSnapshot};

/// Default character budget for the HTML excerpt in the DOM context
pub const DEFAULT_HTML_BUDGET: usize = 5000;

/// Marker appended when the HTML excerpt is cut
pub const TRUNCATION_MARKER: &str = "\n... [truncated]";

/// Inferred category of the element a reference targets.
///
/// A hint for the reasoning service, not an authoritative classification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    /// Button or submit control
    Button,
    /// Text input
    Input,
    /// Anchor
    Link,
    /// Dropdown
    Select,
    /// Checkbox
    Checkbox,
    /// Radio button
    Radio,
    /// Static text (label, heading)
    Text,
    /// Leading tag name of the reference, when no keyword matched
    Tag(String),
    /// Nothing recognizable
    Unknown,
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Button => f.write_str("button"),
            Self::Input => f.write_str("input"),
            Self::Link => f.write_str("link"),
            Self::Select => f.write_str("select"),
            Self::Checkbox => f.write_str("checkbox"),
            Self::Radio => f.write_str("radio"),
            Self::Text => f.write_str("text"),
            Self::Tag(tag) => f.write_str(tag),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// Structured description of a failed reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocatorAnalysis {
    /// The reference that failed
    pub failed_selector: String,
    /// Inferred element category
    pub element_type: ElementType,
    /// Attributes the target is expected to carry
    pub expected_attributes: BTreeMap<String, String>,
    /// Text the target is expected to show
    pub expected_text: Option<String>,
    /// Formatted page context
    pub dom_context: String,
    /// References already tried, in attempt order
    pub previously_working_selectors: Vec<String>,
}

/// Builds [`LocatorAnalysis`] values and reasoning-service prompts
#[derive(Debug, Clone, Copy)]
pub struct FailureAnalyzer {
    html_budget: usize,
}

impl Default for FailureAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_HTML_BUDGET)
    }
}

impl FailureAnalyzer {
    /// Create an analyzer with the given HTML excerpt budget
    #[must_use]
    pub const fn new(html_budget: usize) -> Self {
        Self { html_budget }
    }

    /// Analyze a failed reference. Pure; never fails.
    #[must_use]
    pub fn analyze(
        &self,
        failed_reference: &str,
        snapshot: &DomSnapshot,
        entry: Option<&ReferenceEntry>,
    ) -> LocatorAnalysis {
        let mut tried: Vec<String> = Vec::new();
        let known = entry.map(|e| e.references().collect::<Vec<_>>());
        for reference in known
            .unwrap_or_default()
            .into_iter()
            .chain(std::iter::once(failed_reference))
        {
            if !reference.is_empty() && !tried.iter().any(|t| t == reference) {
                tried.push(reference.to_string());
            }
        }

        LocatorAnalysis {
            failed_selector: failed_reference.to_string(),
            element_type: infer_element_type(failed_reference),
            expected_attributes: extract_attributes(failed_reference),
            expected_text: extract_text(failed_reference),
            dom_context: format_dom_context(snapshot, self.html_budget),
            previously_working_selectors: tried,
        }
    }

    /// Render the request sent to the reasoning service
    #[must_use]
    pub fn build_prompt(&self, analysis: &LocatorAnalysis) -> String {
        build_prompt(analysis)
    }
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static pattern compiles"))
}

fn leading_tag(reference: &str) -> Option<String> {
    static TAG: OnceLock<Regex> = OnceLock::new();
    let re = regex(
        &TAG,
        r"^\s*(?:\(?/{1,2})?([A-Za-z][A-Za-z0-9-]*)(?:$|[\s.#\[:>~+/(,])",
    );
    re.captures(reference)
        .map(|c| c[1].to_lowercase())
        .filter(|tag| tag != "text" && tag != "role" && tag != "xpath" && tag != "css")
}

/// Infer the element category by keyword matching
#[must_use]
pub fn infer_element_type(reference: &str) -> ElementType {
    let lower = reference.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));
    let tag = leading_tag(reference);

    if has(&["button", "btn", "submit"]) {
        ElementType::Button
    } else if has(&["input", "field"]) {
        ElementType::Input
    } else if has(&["link", "href"]) || tag.as_deref() == Some("a") {
        ElementType::Link
    } else if has(&["select", "dropdown"]) {
        ElementType::Select
    } else if has(&["checkbox"]) {
        ElementType::Checkbox
    } else if has(&["radio"]) {
        ElementType::Radio
    } else if has(&["text", "label", "heading"]) {
        ElementType::Text
    } else {
        tag.map_or(ElementType::Unknown, ElementType::Tag)
    }
}

/// Remove quoted sections so id/class patterns do not fire inside values
fn strip_quoted(reference: &str) -> String {
    static QUOTED: OnceLock<Regex> = OnceLock::new();
    regex(&QUOTED, r#""[^"]*"|'[^']*'"#)
        .replace_all(reference, "\"\"")
        .into_owned()
}

/// Remove `[...]` attribute blocks
fn strip_brackets(reference: &str) -> String {
    static BRACKETS: OnceLock<Regex> = OnceLock::new();
    regex(&BRACKETS, r"\[[^\]]*\]")
        .replace_all(reference, "")
        .into_owned()
}

/// `#id` fragment
#[must_use]
pub fn extract_id(reference: &str) -> Option<String> {
    static ID: OnceLock<Regex> = OnceLock::new();
    let cleaned = strip_brackets(&strip_quoted(reference));
    regex(&ID, r"#([A-Za-z_][\w-]*)")
        .captures(&cleaned)
        .map(|c| c[1].to_string())
}

/// `.class` fragments, in order of appearance
#[must_use]
pub fn extract_classes(reference: &str) -> Vec<String> {
    static CLASS: OnceLock<Regex> = OnceLock::new();
    if reference.trim_start().starts_with('/') {
        // XPath: dots are axes, not classes
        return Vec::new();
    }
    let cleaned = strip_brackets(&strip_quoted(reference));
    let mut classes: Vec<String> = Vec::new();
    for cap in regex(&CLASS, r"\.(-?[A-Za-z_][\w-]*)").captures_iter(&cleaned) {
        let class = cap[1].to_string();
        if !classes.contains(&class) {
            classes.push(class);
        }
    }
    classes
}

/// `[attr=value]` and `[@attr='value']` fragments
#[must_use]
pub fn extract_attribute_pairs(reference: &str) -> Vec<(String, String)> {
    static ATTR: OnceLock<Regex> = OnceLock::new();
    regex(
        &ATTR,
        r#"\[\s*@?([A-Za-z_][\w:.-]*)\s*[~|^$*]?=\s*(?:"([^"]*)"|'([^']*)'|([^\]\s]*))\s*\]"#,
    )
    .captures_iter(reference)
    .map(|c| {
        let value = c
            .get(2)
            .or_else(|| c.get(3))
            .or_else(|| c.get(4))
            .map_or("", |m| m.as_str());
        (c[1].to_string(), value.to_string())
    })
    .collect()
}

/// `data-testid` value, bracketed or Playwright-style
#[must_use]
pub fn extract_test_id(reference: &str) -> Option<String> {
    static TEST_ID: OnceLock<Regex> = OnceLock::new();
    regex(
        &TEST_ID,
        r#"data-testid\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\]\s"']+))"#,
    )
    .captures(reference)
    .and_then(|c| c.get(1).or_else(|| c.get(2)).or_else(|| c.get(3)))
    .map(|m| m.as_str().to_string())
    .filter(|v| !v.is_empty())
}

/// All attributes the target is expected to carry
#[must_use]
pub fn extract_attributes(reference: &str) -> BTreeMap<String, String> {
    let mut attrs = BTreeMap::new();
    if let Some(id) = extract_id(reference) {
        let _ = attrs.insert("id".to_string(), id);
    }
    let classes = extract_classes(reference);
    if !classes.is_empty() {
        let _ = attrs.insert("class".to_string(), classes.join(" "));
    }
    for (name, value) in extract_attribute_pairs(reference) {
        if !value.is_empty() {
            let _ = attrs.entry(name).or_insert(value);
        }
    }
    // Kept under its own key even when the generic pattern missed it
    if let Some(test_id) = extract_test_id(reference) {
        let _ = attrs.insert("data-testid".to_string(), test_id);
    }
    attrs
}

/// `text="…"`, `text=…` or XPath `text()='…'`
#[must_use]
pub fn extract_text_equals(reference: &str) -> Option<String> {
    static QUOTED: OnceLock<Regex> = OnceLock::new();
    static BARE: OnceLock<Regex> = OnceLock::new();
    static XPATH: OnceLock<Regex> = OnceLock::new();
    let quoted = regex(
        &QUOTED,
        r#"(?:^|[\s>])text\s*=\s*(?:"([^"]*)"|'([^']*)')"#,
    );
    let bare = regex(&BARE, r"^\s*text\s*=\s*([^\s\x22'][^>]*?)\s*$");
    let xpath = regex(
        &XPATH,
        r#"text\(\)\s*=\s*(?:"([^"]*)"|'([^']*)')"#,
    );
    quoted
        .captures(reference)
        .or_else(|| xpath.captures(reference))
        .and_then(|c| c.get(1).or_else(|| c.get(2)))
        .or_else(|| bare.captures(reference).and_then(|c| c.get(1)))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// `:has-text("…")` or `:text("…")`
#[must_use]
pub fn extract_has_text(reference: &str) -> Option<String> {
    static HAS_TEXT: OnceLock<Regex> = OnceLock::new();
    regex(
        &HAS_TEXT,
        r#":(?:has-text|text|text-is)\(\s*(?:"([^"]*)"|'([^']*)')\s*\)"#,
    )
    .captures(reference)
    .and_then(|c| c.get(1).or_else(|| c.get(2)))
    .map(|m| m.as_str().trim().to_string())
    .filter(|t| !t.is_empty())
}

/// XPath `contains(text(), '…')` or `contains(., '…')`
#[must_use]
pub fn extract_xpath_contains(reference: &str) -> Option<String> {
    static CONTAINS: OnceLock<Regex> = OnceLock::new();
    regex(
        &CONTAINS,
        r#"contains\(\s*(?:text\(\)|\.|normalize-space\(\s*\.?\s*\))\s*,\s*(?:"([^"]*)"|'([^']*)')\s*\)"#,
    )
    .captures(reference)
    .and_then(|c| c.get(1).or_else(|| c.get(2)))
    .map(|m| m.as_str().trim().to_string())
    .filter(|t| !t.is_empty())
}

/// Expected text: text-equals, then has-text, then XPath contains
#[must_use]
pub fn extract_text(reference: &str) -> Option<String> {
    extract_text_equals(reference)
        .or_else(|| extract_has_text(reference))
        .or_else(|| extract_xpath_contains(reference))
}

/// Deterministic, human-readable page context
#[must_use]
pub fn format_dom_context(snapshot: &DomSnapshot, html_budget: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Page Title: {}", snapshot.page_title);
    let _ = writeln!(out, "Page URL: {}", snapshot.page_url);

    if let Some(ctx) = &snapshot.element_context {
        let _ = writeln!(out, "\nLast Known Element:\n  {ctx}");
    }

    if !snapshot.surrounding_elements.is_empty() {
        out.push_str("\nSimilar Elements on Page:\n");
        for (i, el) in snapshot.surrounding_elements.iter().enumerate() {
            let _ = writeln!(out, "  {}. {el}", i + 1);
        }
    }

    out.push_str("\nHTML Excerpt:\n");
    let excerpt = truncate_chars(&snapshot.html, html_budget);
    out.push_str(excerpt);
    if excerpt.len() < snapshot.html.len() {
        out.push_str(TRUNCATION_MARKER);
    }
    out
}

/// Render the fixed-structure request for the reasoning service
#[must_use]
pub fn build_prompt(analysis: &LocatorAnalysis) -> String {
    let mut out = String::new();
    out.push_str(
        "A UI element reference used by an automated browser test no longer resolves.\n\
         Suggest replacement reference expressions for the same element.\n\n",
    );
    let _ = writeln!(out, "FAILED REFERENCE: {}", analysis.failed_selector);
    let _ = writeln!(out, "ELEMENT TYPE (inferred): {}", analysis.element_type);

    out.push_str("EXPECTED ATTRIBUTES:");
    if analysis.expected_attributes.is_empty() {
        out.push_str(" none identified\n");
    } else {
        out.push('\n');
        for (name, value) in &analysis.expected_attributes {
            let _ = writeln!(out, "  - {name}: {value}");
        }
    }

    let _ = writeln!(
        out,
        "EXPECTED TEXT: {}",
        analysis.expected_text.as_deref().unwrap_or("none identified")
    );

    out.push_str("PREVIOUSLY TRIED REFERENCES (all failed):\n");
    for reference in &analysis.previously_working_selectors {
        let _ = writeln!(out, "  - {reference}");
    }

    let _ = writeln!(out, "\nDOM CONTEXT:\n{}\n", analysis.dom_context);

    out.push_str(
        "INSTRUCTIONS:\n\
         Return 3 to 5 alternative reference expressions for this element, best first.\n\
         Prefer stable, unique references: data-testid, id, role with accessible name,\n\
         then attribute or text based references. Avoid positional and generated class names.\n\
         Do not repeat any previously tried reference.\n\
         Respond with a JSON array of objects: \
         [{\"selector\": \"...\", \"confidence\": 0.0-1.0, \"reasoning\": \"...\"}]\n",
    );
    out
}
