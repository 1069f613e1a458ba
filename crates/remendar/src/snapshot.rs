//! Structural page snapshots captured at failure time.
//!
//! A [`DomSnapshot`] exists for the duration of one healing attempt and is
//! never persisted. Capture itself is delegated to the driver; this module
//! only bounds what is kept.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::driver::HealingDriver;

/// Structural description of one DOM node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementContext {
    /// Lower-case tag name
    pub tag_name: String,
    /// `id` attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Class list
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub classes: BTreeSet<String>,
    /// `name` attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `type` attribute
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    /// ARIA role
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// `aria-label` attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aria_label: Option<String>,
    /// `placeholder` attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Trimmed text content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
}

impl ElementContext {
    /// Create a context for a tag
    #[must_use]
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into().to_lowercase(),
            ..Self::default()
        }
    }

    /// Set the id
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Add a class
    #[must_use]
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        let _ = self.classes.insert(class.into());
        self
    }

    /// Set the name attribute
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the type attribute
    #[must_use]
    pub fn with_type(mut self, input_type: impl Into<String>) -> Self {
        self.input_type = Some(input_type.into());
        self
    }

    /// Set the ARIA role
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Set the aria-label
    #[must_use]
    pub fn with_aria_label(mut self, label: impl Into<String>) -> Self {
        self.aria_label = Some(label.into());
        self
    }

    /// Set the placeholder
    #[must_use]
    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    /// Set the text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text_content = Some(text.into());
        self
    }
}

impl fmt::Display for ElementContext {
    /// Renders as `<tag id="…" class="…" …>text`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.tag_name)?;
        if let Some(id) = &self.id {
            write!(f, " id=\"{id}\"")?;
        }
        if !self.classes.is_empty() {
            let classes: Vec<&str> = self.classes.iter().map(String::as_str).collect();
            write!(f, " class=\"{}\"", classes.join(" "))?;
        }
        let attrs = [
            ("name", &self.name),
            ("type", &self.input_type),
            ("role", &self.role),
            ("aria-label", &self.aria_label),
            ("placeholder", &self.placeholder),
        ];
        for (attr, value) in attrs {
            if let Some(value) = value {
                write!(f, " {attr}=\"{value}\"")?;
            }
        }
        f.write_str(">")?;
        if let Some(text) = self.text_content.as_deref().map(str::trim) {
            if !text.is_empty() {
                write!(f, "{text}")?;
            }
        }
        Ok(())
    }
}

/// Raw page capture returned by the driver
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCapture {
    /// Document title
    pub title: String,
    /// Current URL
    pub url: String,
    /// Serialized HTML
    pub html: String,
}

/// Page-level capture at failure time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomSnapshot {
    /// Document title
    pub page_title: String,
    /// Current URL
    pub page_url: String,
    /// Bounded HTML excerpt
    pub html: String,
    /// Last known description of the target
    pub element_context: Option<ElementContext>,
    /// Structurally similar candidates, bounded count
    pub surrounding_elements: Vec<ElementContext>,
}

/// Captures bounded [`DomSnapshot`]s through a driver
#[derive(Debug, Clone, Copy)]
pub struct SnapshotCapturer {
    max_html_chars: usize,
    max_surrounding: usize,
}

impl SnapshotCapturer {
    /// Create a capturer with the given bounds
    #[must_use]
    pub const fn new(max_html_chars: usize, max_surrounding: usize) -> Self {
        Self {
            max_html_chars,
            max_surrounding,
        }
    }

    /// Capture the page and the last known context of `reference`
    pub async fn capture(&self, driver: &dyn HealingDriver, reference: Option<&str>) -> DomSnapshot {
        let page = driver.capture_page().await;
        let element_context = driver.capture_context(reference).await;
        let mut surrounding = driver
            .similar_elements(element_context.as_ref(), self.max_surrounding)
            .await;
        surrounding.truncate(self.max_surrounding);

        DomSnapshot {
            page_title: page.title,
            page_url: page.url,
            html: truncate_chars(&page.html, self.max_html_chars).to_string(),
            element_context,
            surrounding_elements: surrounding,
        }
    }
}

/// Longest prefix of `s` holding at most `max_chars` characters
#[must_use]
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{MockDriver, MockElement};

    mod element_context_tests {
        use super::*;

        #[test]
        fn test_display_full() {
            let ctx = ElementContext::new("BUTTON")
                .with_id("login-btn")
                .with_class("primary")
                .with_class("btn")
                .with_type("submit")
                .with_text("  Login ");
            assert_eq!(
                ctx.to_string(),
                r#"<button id="login-btn" class="btn primary" type="submit">Login"#
            );
        }

        #[test]
        fn test_display_bare() {
            assert_eq!(ElementContext::new("div").to_string(), "<div>");
        }

        #[test]
        fn test_serialization_uses_type_key() {
            let ctx = ElementContext::new("input").with_type("email");
            let json = serde_json::to_string(&ctx).unwrap();
            assert_eq!(json, r#"{"tagName":"input","type":"email"}"#);
        }
    }

    mod truncate_tests {
        use super::*;

        #[test]
        fn test_truncate_ascii() {
            assert_eq!(truncate_chars("abcdef", 3), "abc");
            assert_eq!(truncate_chars("abc", 10), "abc");
            assert_eq!(truncate_chars("abc", 0), "");
        }

        #[test]
        fn test_truncate_multibyte_boundary() {
            assert_eq!(truncate_chars("héllo", 2), "hé");
            assert_eq!(truncate_chars("日本語", 1), "日");
        }
    }

    mod capturer_tests {
        use super::*;

        #[tokio::test]
        async fn test_capture_bounds_html_and_surrounding() {
            let mut driver = MockDriver::new().with_page("Shop", "https://shop.test", "x".repeat(100));
            for i in 0..5 {
                driver = driver.with_element(
                    MockElement::new(ElementContext::new("button").with_id(format!("b{i}")))
                        .matching(format!("#b{i}")),
                );
            }
            let driver = driver.with_last_known("#gone", ElementContext::new("button"));

            let snapshot = SnapshotCapturer::new(10, 3).capture(&driver, Some("#gone")).await;
            assert_eq!(snapshot.page_title, "Shop");
            assert_eq!(snapshot.html.len(), 10);
            assert_eq!(snapshot.surrounding_elements.len(), 3);
            assert_eq!(snapshot.element_context, Some(ElementContext::new("button")));
        }

        #[tokio::test]
        async fn test_capture_without_context() {
            let driver = MockDriver::new().with_page("Empty", "about:blank", "");
            let snapshot = SnapshotCapturer::new(10, 3).capture(&driver, Some("#gone")).await;
            assert!(snapshot.element_context.is_none());
            assert!(snapshot.surrounding_elements.is_empty());
        }
    }
}
