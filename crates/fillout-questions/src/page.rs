use scraper::{ElementRef, Html};
use thiserror::Error;

/// Hidden input carrying the server-issued page instance token
pub const SCREEN_ID_FIELD: &str = "screenId";
/// Hidden input carrying the token that changes on every accepted answer
pub const HISTORY_ORDER_FIELD: &str = "historyOrder";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PageError {
    #[error("Response body is empty, there is no HTML to parse")]
    EmptyDocument,
}

/// Parsed HTML of one interview page
pub struct PageDocument {
    html: Html,
}

/// The `(screenId, historyOrder)` pair every interview page carries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTokens {
    pub screen_id: String,
    pub history_order: String,
}

impl PageDocument {
    pub fn parse(body: &str) -> Result<Self, PageError> {
        if body.trim().is_empty() {
            return Err(PageError::EmptyDocument);
        }

        Ok(Self {
            html: Html::parse_document(body),
        })
    }

    /// Every element of the page, depth-first in document order.
    ///
    /// Each call starts a fresh traversal, so callers can chain `filter`
    /// and `collect` freely.
    pub fn elements(&self) -> impl Iterator<Item = PageElement<'_>> {
        self.html
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .map(PageElement)
    }

    pub fn elements_by_tag<'a>(
        &'a self,
        tag: &'a str,
    ) -> impl Iterator<Item = PageElement<'a>> + 'a {
        self.elements().filter(move |element| element.tag() == tag)
    }

    pub fn element_by_id(&self, id: &str) -> Option<PageElement<'_>> {
        self.elements().find(|element| element.attr("id") == id)
    }

    /// Read the session tokens from the page's hidden inputs.
    /// Missing inputs yield empty strings.
    pub fn tokens(&self) -> SessionTokens {
        let mut tokens = SessionTokens::default();

        for input in self.elements_by_tag("input") {
            match input.attr("id") {
                SCREEN_ID_FIELD => tokens.screen_id = input.attr("value").to_string(),
                HISTORY_ORDER_FIELD => tokens.history_order = input.attr("value").to_string(),
                _ => {}
            }
        }

        tokens
    }
}

/// A single element of a [`PageDocument`]
#[derive(Clone, Copy)]
pub struct PageElement<'a>(ElementRef<'a>);

impl<'a> PageElement<'a> {
    /// Lowercase tag name
    pub fn tag(&self) -> &'a str {
        self.0.value().name()
    }

    /// Attribute value, or the empty string when the attribute is absent
    pub fn attr(&self, name: &str) -> &'a str {
        self.0.value().attr(name).unwrap_or("")
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class").split_whitespace().any(|c| c == class)
    }

    /// Elements nested below this one, depth-first
    pub fn descendants(&self) -> impl Iterator<Item = PageElement<'a>> {
        self.0
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .map(PageElement)
    }
}

impl std::fmt::Debug for PageElement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageElement")
            .field("tag", &self.tag())
            .field("id", &self.attr("id"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELCOME: &str = r#"
<html><body>
<form method="post">
  <input type="hidden" id="screenId" name="screenId" value="032794ea-dfbb-4c33-95c2-2fbe5befd885" />
  <input type="hidden" id="historyOrder" name="historyOrder" value="0" />
  <div class="welcome"><p>Welcome to the survey</p></div>
  <button name="button-next" value="Next">Next</button>
</form>
</body></html>
"#;

    #[test]
    fn test_parse_empty_body_fails() {
        assert!(matches!(
            PageDocument::parse("   \n"),
            Err(PageError::EmptyDocument)
        ));
    }

    #[test]
    fn test_tokens_read_from_hidden_inputs() {
        let doc = PageDocument::parse(WELCOME).unwrap();
        let tokens = doc.tokens();

        assert_eq!(tokens.screen_id, "032794ea-dfbb-4c33-95c2-2fbe5befd885");
        assert_eq!(tokens.history_order, "0");
    }

    #[test]
    fn test_tokens_default_to_empty() {
        let doc = PageDocument::parse("<p>nothing here</p>").unwrap();
        assert_eq!(doc.tokens(), SessionTokens::default());
    }

    #[test]
    fn test_elements_in_document_order() {
        let doc = PageDocument::parse(WELCOME).unwrap();
        let tags: Vec<&str> = doc
            .elements()
            .map(|e| e.tag())
            .filter(|t| matches!(*t, "input" | "button" | "p"))
            .collect();

        assert_eq!(tags, vec!["input", "input", "p", "button"]);
    }

    #[test]
    fn test_traversal_is_restartable() {
        let doc = PageDocument::parse(WELCOME).unwrap();
        let first = doc.elements_by_tag("input").count();
        let second = doc.elements_by_tag("input").count();

        assert_eq!(first, 2);
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_attribute_is_empty() {
        let doc = PageDocument::parse("<div><input></div>").unwrap();
        let input = doc.elements_by_tag("input").next().unwrap();

        assert_eq!(input.attr("id"), "");
        assert!(!input.has_class("number"));
    }

    #[test]
    fn test_descendants() {
        let doc =
            PageDocument::parse(r#"<div id="outer"><span id="a"></span><em id="b"></em></div>"#)
                .unwrap();
        let outer = doc.element_by_id("outer").unwrap();
        let ids: Vec<&str> = outer.descendants().map(|e| e.attr("id")).collect();

        assert_eq!(ids, vec!["a", "b"]);
    }
}
