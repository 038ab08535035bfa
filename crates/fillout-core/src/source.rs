use std::sync::Arc;

use fillout_questions::{synthesize, AnswerForm, PageDocument, QuestionType};
use fillout_replay::ReplayScript;

use crate::SessionError;

/// Where the session driver gets its answers from
pub trait AnswerSource: Send {
    /// Answer for the current page, or `None` once the source has run dry
    fn next_answer(
        &mut self,
        doc: &PageDocument,
        question_type: QuestionType,
    ) -> Result<Option<AnswerForm>, SessionError>;

    /// Whether answers are left after the interview reached its completed page.
    /// A source with answers left makes the driver start a fresh interview.
    fn has_more(&self) -> bool;
}

/// Random answers for every page
#[derive(Debug, Default)]
pub struct SynthesizedAnswers;

impl AnswerSource for SynthesizedAnswers {
    fn next_answer(
        &mut self,
        doc: &PageDocument,
        question_type: QuestionType,
    ) -> Result<Option<AnswerForm>, SessionError> {
        Ok(Some(synthesize(doc, question_type)?))
    }

    fn has_more(&self) -> bool {
        false
    }
}

/// Walks a shared replay script, one step per page
#[derive(Debug, Clone)]
pub struct ReplayCursor {
    script: Arc<ReplayScript>,
    position: usize,
}

impl ReplayCursor {
    pub fn new(script: Arc<ReplayScript>) -> Self {
        Self {
            script,
            position: 0,
        }
    }
}

impl AnswerSource for ReplayCursor {
    fn next_answer(
        &mut self,
        doc: &PageDocument,
        _question_type: QuestionType,
    ) -> Result<Option<AnswerForm>, SessionError> {
        let Some(step) = self.script.step(self.position) else {
            return Ok(None);
        };
        self.position += 1;

        let screen_id = doc.tokens().screen_id;
        Ok(Some(step.with_screen_id(&screen_id)))
    }

    fn has_more(&self) -> bool {
        self.position < self.script.len()
    }
}
