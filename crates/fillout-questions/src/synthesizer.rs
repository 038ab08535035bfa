//! Random but valid answers for classified interview pages.

use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};

use crate::classifier::{category_question, find_answer_input, AnswerInput};
use crate::{
    AnswerForm, PageDocument, PageElement, QuestionType, HISTORY_ORDER_FIELD,
    NEXT_BUTTON_FIELD, NEXT_BUTTON_VALUE, SCREEN_ID_FIELD,
};

pub const DEFAULT_MIN_LENGTH: i64 = 0;
pub const DEFAULT_MAX_LENGTH: i64 = 250;
pub const DEFAULT_NUMBER_MINIMUM: i64 = 0;
pub const DEFAULT_NUMBER_MAXIMUM: i64 = 99;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("Attribute {attribute}=\"{value}\" is not a valid integer")]
    InvalidBound { attribute: String, value: String },

    #[error("Invalid bounds on {question}: minimum {minimum} is above maximum {maximum}")]
    InvertedBounds {
        question: String,
        minimum: i64,
        maximum: i64,
    },

    #[error("Page was classified as {0} but has no matching answer input")]
    MissingInput(QuestionType),
}

/// Build the submission for a classified page
pub fn synthesize(
    doc: &PageDocument,
    question_type: QuestionType,
) -> Result<AnswerForm, SynthesisError> {
    synthesize_with_rng(doc, question_type, &mut rand::thread_rng())
}

/// Same as [`synthesize`], drawing randomness from `rng`
pub fn synthesize_with_rng<R: Rng + ?Sized>(
    doc: &PageDocument,
    question_type: QuestionType,
    rng: &mut R,
) -> Result<AnswerForm, SynthesisError> {
    let mut form = common_fields(doc);

    match question_type {
        QuestionType::Page => {}
        QuestionType::Category => answer_category(doc, &mut form, rng)?,
        QuestionType::OpenSingle => answer_open_single(doc, &mut form, rng)?,
        QuestionType::OpenMulti => answer_open_multi(doc, &mut form, rng)?,
        QuestionType::Number => answer_number(doc, &mut form, rng)?,
    }

    Ok(form)
}

fn common_fields(doc: &PageDocument) -> AnswerForm {
    let tokens = doc.tokens();
    let mut form = AnswerForm::new();
    form.set(SCREEN_ID_FIELD, tokens.screen_id);
    form.set(HISTORY_ORDER_FIELD, tokens.history_order);
    form.set(NEXT_BUTTON_FIELD, NEXT_BUTTON_VALUE);
    form
}

#[derive(Debug, PartialEq, Eq)]
struct CategoryOption {
    /// Option number without the question prefix
    code: String,
    /// Name of the checkbox or radio input
    field: String,
    /// Value of the checkbox or radio input
    value: String,
}

fn answer_category<R: Rng + ?Sized>(
    doc: &PageDocument,
    form: &mut AnswerForm,
    rng: &mut R,
) -> Result<(), SynthesisError> {
    let question =
        category_question(doc).ok_or(SynthesisError::MissingInput(QuestionType::Category))?;
    let group = doc.element_by_id(&format!("categorylist-{}", question));

    let (minimum, maximum) = match group {
        Some(ref group) => (
            bound(group, "data-minimum", 1)?,
            bound(group, "data-maximum", 1)?,
        ),
        None => (1, 1),
    };
    check_bounds(&question, minimum, maximum)?;

    let options = match group {
        Some(group) => category_options(group.descendants(), &question),
        None => category_options(doc.elements(), &question),
    };

    let wanted = usize::try_from(minimum).unwrap_or(0);
    if wanted > options.len() {
        warn!(
            question = %question,
            minimum,
            available = options.len(),
            "Category question has fewer options than its minimum"
        );
    }

    let picks: Vec<&CategoryOption> = options
        .choose_multiple(rng, wanted.min(options.len()))
        .collect();

    debug!(question = %question, minimum, maximum, picked = picks.len(), "Answering category question");

    let short_key = format!("answer-{}-m", question);
    for option in &picks {
        form.add(short_key.as_str(), option.code.as_str());
    }
    for option in &picks {
        form.add(option.field.as_str(), option.value.as_str());
    }

    Ok(())
}

fn category_options<'a>(
    elements: impl Iterator<Item = PageElement<'a>>,
    question: &str,
) -> Vec<CategoryOption> {
    let field_prefix = format!("answer-{}", question);
    let short_key = format!("answer-{}-m", question);
    let value_prefix = format!("{}-", question);

    let mut options: Vec<CategoryOption> = Vec::new();
    for input in elements.filter(|e| e.tag() == "input") {
        if !matches!(input.attr("type"), "checkbox" | "radio") {
            continue;
        }
        let field = input.attr("name");
        let belongs = field
            .strip_prefix(&field_prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('-'));
        if !belongs || field == short_key {
            continue;
        }
        let value = input.attr("value");
        let option = CategoryOption {
            code: value.strip_prefix(&value_prefix).unwrap_or(value).to_string(),
            field: field.to_string(),
            value: value.to_string(),
        };
        if !options.contains(&option) {
            options.push(option);
        }
    }
    options
}

fn answer_open_single<R: Rng + ?Sized>(
    doc: &PageDocument,
    form: &mut AnswerForm,
    rng: &mut R,
) -> Result<(), SynthesisError> {
    let input = find_answer_input(doc, AnswerInput::FreeText)
        .ok_or(SynthesisError::MissingInput(QuestionType::OpenSingle))?;

    let minimum = bound(&input, "minlength", DEFAULT_MIN_LENGTH)?.max(0);
    let maximum = bound(&input, "maxlength", DEFAULT_MAX_LENGTH)?.max(0);
    check_bounds(input.attr("id"), minimum, maximum)?;

    // An empty answer is rarely accepted, so aim for at least one letter.
    let length = if maximum == 0 {
        0
    } else {
        rng.gen_range(minimum.max(1)..=maximum)
    };

    form.set(input.attr("name"), random_word(rng, length as usize));
    Ok(())
}

fn answer_open_multi<R: Rng + ?Sized>(
    doc: &PageDocument,
    form: &mut AnswerForm,
    rng: &mut R,
) -> Result<(), SynthesisError> {
    let textarea = doc
        .elements_by_tag("textarea")
        .next()
        .ok_or(SynthesisError::MissingInput(QuestionType::OpenMulti))?;

    let field = match textarea.attr("name") {
        "" => format!("answer-{}", textarea.attr("id")),
        name => name.to_string(),
    };

    form.set(field, random_paragraph(rng));
    Ok(())
}

fn answer_number<R: Rng + ?Sized>(
    doc: &PageDocument,
    form: &mut AnswerForm,
    rng: &mut R,
) -> Result<(), SynthesisError> {
    let input = find_answer_input(doc, AnswerInput::Numeric)
        .ok_or(SynthesisError::MissingInput(QuestionType::Number))?;

    let minimum = bound(&input, "data-minimum", DEFAULT_NUMBER_MINIMUM)?;
    let maximum = bound(&input, "data-maximum", DEFAULT_NUMBER_MAXIMUM)?;
    check_bounds(input.attr("id"), minimum, maximum)?;

    // Both bounds are valid answers.
    let answer = rng.gen_range(minimum..=maximum);
    form.set(input.attr("name"), answer.to_string());
    Ok(())
}

/// Integer attribute, falling back to `default` when absent or blank
fn bound(element: &PageElement<'_>, attribute: &str, default: i64) -> Result<i64, SynthesisError> {
    let raw = element.attr(attribute).trim();
    if raw.is_empty() {
        return Ok(default);
    }

    raw.parse().map_err(|_| SynthesisError::InvalidBound {
        attribute: attribute.to_string(),
        value: raw.to_string(),
    })
}

fn check_bounds(question: &str, minimum: i64, maximum: i64) -> Result<(), SynthesisError> {
    if minimum > maximum {
        return Err(SynthesisError::InvertedBounds {
            question: question.to_string(),
            minimum,
            maximum,
        });
    }
    Ok(())
}

fn random_word<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| char::from(rng.gen_range(b'a'..=b'z')))
        .collect()
}

fn random_paragraph<R: Rng + ?Sized>(rng: &mut R) -> String {
    let sentences = rng.gen_range(2..=4);
    let mut paragraph: Vec<String> = Vec::with_capacity(sentences);

    for _ in 0..sentences {
        let word_count = rng.gen_range(4..=9);
        let words: Vec<String> = (0..word_count)
            .map(|_| {
                let length = rng.gen_range(2..=9);
                random_word(&mut *rng, length)
            })
            .collect();

        let mut sentence = words.join(" ");
        if let Some(first) = sentence.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        sentence.push('.');
        paragraph.push(sentence);
    }

    paragraph.join(" ")
}
