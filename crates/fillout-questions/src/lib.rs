mod classifier;
mod form;
mod page;
pub mod synthesizer;

pub use classifier::{classify, QuestionType};
pub use form::{AnswerForm, NEXT_BUTTON_FIELD, NEXT_BUTTON_VALUE};
pub use page::{
    PageDocument, PageElement, PageError, SessionTokens, HISTORY_ORDER_FIELD, SCREEN_ID_FIELD,
};
pub use synthesizer::{synthesize, synthesize_with_rng, SynthesisError};
