use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{PageDocument, PageElement};

lazy_static! {
    static ref CATEGORY_LIST_ID: Regex = Regex::new(r"^categorylist-(q\d+)-multi$").unwrap();
    static ref QUESTION_ID: Regex = Regex::new(r"^q\d+$").unwrap();
}

/// The kind of question an interview page asks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    /// Nothing to answer (welcome and interstitial screens)
    Page,
    /// Single- or multi-select list of options
    Category,
    /// Single-line free text
    OpenSingle,
    /// Multi-line free text
    OpenMulti,
    /// Numeric input
    Number,
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuestionType::Page => write!(f, "page"),
            QuestionType::Category => write!(f, "category"),
            QuestionType::OpenSingle => write!(f, "open-single"),
            QuestionType::OpenMulti => write!(f, "open-multi"),
            QuestionType::Number => write!(f, "number"),
        }
    }
}

/// Kinds of `answer-q<N>` text inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AnswerInput {
    FreeText,
    Numeric,
}

#[derive(Default)]
struct Detected {
    open_multi: bool,
    category: bool,
    open_single: bool,
    number: bool,
}

impl Detected {
    // Pages can carry leftover markup from more than one family, so the
    // order of these checks decides the type.
    fn resolve(&self) -> QuestionType {
        if self.open_multi {
            QuestionType::OpenMulti
        } else if self.category {
            QuestionType::Category
        } else if self.open_single {
            QuestionType::OpenSingle
        } else if self.number {
            QuestionType::Number
        } else {
            QuestionType::Page
        }
    }
}

/// Determine the question type of a page from its markup alone
pub fn classify(doc: &PageDocument) -> QuestionType {
    let mut detected = Detected::default();

    for element in doc.elements() {
        match element.tag() {
            "textarea" => detected.open_multi = true,
            "input" => {
                if CATEGORY_LIST_ID.is_match(element.attr("id")) {
                    detected.category = true;
                }
                match answer_input(&element) {
                    Some(AnswerInput::FreeText) => detected.open_single = true,
                    Some(AnswerInput::Numeric) => detected.number = true,
                    None => {}
                }
            }
            _ => {}
        }
    }

    detected.resolve()
}

/// Question number (`q<N>`) of the first category list on the page
pub(crate) fn category_question(doc: &PageDocument) -> Option<String> {
    doc.elements_by_tag("input").find_map(|input| {
        CATEGORY_LIST_ID
            .captures(input.attr("id"))
            .map(|captures| captures[1].to_string())
    })
}

/// First `answer-q<N>` input of the given kind
pub(crate) fn find_answer_input<'a>(
    doc: &'a PageDocument,
    kind: AnswerInput,
) -> Option<PageElement<'a>> {
    doc.elements_by_tag("input")
        .find(|input| answer_input(input) == Some(kind))
}

/// An input answers a question when its id is `q<N>` and its name is
/// `answer-q<N>`; its class or type says whether it takes text or a number.
pub(crate) fn answer_input(input: &PageElement<'_>) -> Option<AnswerInput> {
    let id = input.attr("id");
    if !QUESTION_ID.is_match(id) {
        return None;
    }
    if input.attr("name").strip_prefix("answer-") != Some(id) {
        return None;
    }

    let input_type = input.attr("type");
    if input_type == "number" || input.has_class("number") {
        Some(AnswerInput::Numeric)
    } else if input_type.is_empty() || input_type == "text" {
        Some(AnswerInput::FreeText)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify_html(html: &str) -> QuestionType {
        classify(&PageDocument::parse(html).unwrap())
    }

    const HIDDEN: &str = r#"
<input type="hidden" id="screenId" name="screenId" value="5b4c" />
<input type="hidden" id="historyOrder" name="historyOrder" value="3" />
"#;

    #[test]
    fn test_welcome_page_is_page() {
        let html = format!("<form>{HIDDEN}<p>Welcome!</p></form>");
        assert_eq!(classify_html(&html), QuestionType::Page);
    }

    #[test]
    fn test_single_category() {
        let html = format!(
            r#"<form>{HIDDEN}
<div id="categorylist-q1">
  <input type="hidden" name="answer-q1-m" id="categorylist-q1-multi" value="" />
  <input id="q1-1" class="category" name="answer-q1" value="q1-1" type="radio" />
  <input id="q1-2" class="category" name="answer-q1" value="q1-2" type="radio" />
</div></form>"#
        );
        assert_eq!(classify_html(&html), QuestionType::Category);
    }

    #[test]
    fn test_multi_category() {
        let html = r#"
<div id="categorylist-q1" data-minimum="2" data-maximum="4">
  <input type="hidden" class="answerOrder" name="answer-q1-m" id="categorylist-q1-multi" value="" />
  <input id="q1-1" class="category" name="answer-q1-1" value="q1-1" type="checkbox" />
  <input id="q1-2" class="category" name="answer-q1-2" value="q1-2" type="checkbox" />
</div>"#;
        assert_eq!(classify_html(html), QuestionType::Category);
    }

    #[test]
    fn test_open_single() {
        let html = r#"<input id="q4" type="text" class="open alpha" name="answer-q4" maxlength="20" />"#;
        assert_eq!(classify_html(html), QuestionType::OpenSingle);
    }

    #[test]
    fn test_number_by_class() {
        let html = r#"<input id="q1" type="text" class="open number required" value="" name="answer-q1" data-minimum="1" data-maximum="3" />"#;
        assert_eq!(classify_html(html), QuestionType::Number);
    }

    #[test]
    fn test_number_by_type() {
        let html = r#"<input id="q7" type="number" name="answer-q7" />"#;
        assert_eq!(classify_html(html), QuestionType::Number);
    }

    #[test]
    fn test_open_multi() {
        let html = r#"<textarea id="q1" name="answer-q1" rows="5"></textarea>"#;
        assert_eq!(classify_html(html), QuestionType::OpenMulti);
    }

    #[test]
    fn test_textarea_wins_over_category_residue() {
        let html = r#"
<input type="hidden" id="categorylist-q9-multi" name="answer-q9-m" />
<textarea id="q1" name="answer-q1"></textarea>"#;
        assert_eq!(classify_html(html), QuestionType::OpenMulti);
    }

    #[test]
    fn test_category_wins_over_open_single() {
        let html = r#"
<input type="hidden" id="categorylist-q2-multi" name="answer-q2-m" />
<input id="q2" type="text" name="answer-q2" />"#;
        assert_eq!(classify_html(html), QuestionType::Category);
    }

    #[test]
    fn test_open_single_wins_over_number() {
        let html = r#"
<input id="q3" type="text" class="number" name="answer-q3" />
<input id="q4" type="text" class="open" name="answer-q4" />"#;
        assert_eq!(classify_html(html), QuestionType::OpenSingle);
    }

    #[test]
    fn test_mismatched_name_is_not_answer_input() {
        let html = r#"<input id="q4" type="text" name="answer-q5" />"#;
        assert_eq!(classify_html(html), QuestionType::Page);
    }

    #[test]
    fn test_inputs_without_attributes_are_tolerated() {
        let html = r#"<input><input type="checkbox"><textarea></textarea>"#;
        assert_eq!(classify_html(html), QuestionType::OpenMulti);
        assert_eq!(classify_html("<input><input>"), QuestionType::Page);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let doc = PageDocument::parse(
            r#"<input id="q1" class="number" name="answer-q1" /><input id="q2" name="answer-q2" />"#,
        )
        .unwrap();
        assert_eq!(classify(&doc), classify(&doc));
    }

    #[test]
    fn test_category_question_number() {
        let doc =
            PageDocument::parse(r#"<input type="hidden" id="categorylist-q12-multi" />"#).unwrap();
        assert_eq!(category_question(&doc), Some("q12".to_string()));
    }
}
