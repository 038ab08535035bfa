use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use fillout_logging::{LogEvent, Logger};
use fillout_questions::{classify, AnswerForm, PageDocument, QuestionType, SessionTokens};
use fillout_transport::{PageContent, Transport};

use crate::outcome::InterviewOutcome;
use crate::{AnswerSource, RespondentKeyTemplate, SessionError};

/// Submissions after which a session that never completes is given up
pub const DEFAULT_MAX_STEPS: usize = 500;

/// Settings shared by every session of a run
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub entry_url: String,
    pub respondent_key: Option<RespondentKeyTemplate>,
    /// Pause before each POST
    pub wait_between_posts: Duration,
    pub max_steps: usize,
}

impl DriverConfig {
    pub fn new(entry_url: impl Into<String>) -> Self {
        Self {
            entry_url: entry_url.into(),
            respondent_key: None,
            wait_between_posts: Duration::ZERO,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_respondent_key(mut self, template: RespondentKeyTemplate) -> Self {
        self.respondent_key = Some(template);
        self
    }

    pub fn with_wait_between_posts(mut self, wait: Duration) -> Self {
        self.wait_between_posts = wait;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Entry URL for the session with the given index
    pub fn start_url(&self, session: usize) -> String {
        match &self.respondent_key {
            Some(template) => template.apply(&self.entry_url, session),
            None => self.entry_url.clone(),
        }
    }
}

/// What was read from a page before answering it
struct PreparedStep {
    tokens: SessionTokens,
    question_type: QuestionType,
    answer: Option<AnswerForm>,
}

/// Walks one interview from its entry URL to the completed page
pub struct SessionDriver<'a> {
    transport: &'a dyn Transport,
    config: &'a DriverConfig,
    logger: Arc<Logger>,
    interrupted: Arc<AtomicBool>,
}

impl<'a> SessionDriver<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        config: &'a DriverConfig,
        logger: Arc<Logger>,
        interrupted: Arc<AtomicBool>,
    ) -> Self {
        Self {
            transport,
            config,
            logger,
            interrupted,
        }
    }

    /// Run the session to its end, turning any error into a failed outcome
    pub async fn run(&self, session: usize, source: &mut dyn AnswerSource) -> InterviewOutcome {
        let started = Instant::now();
        let mut submissions = 0;

        let result = self.drive(session, source, &mut submissions).await;
        let duration = started.elapsed();

        match result {
            Ok(()) => {
                info!(session, submissions, "Interview completed");
                self.logger.log(&LogEvent::SessionCompleted {
                    session,
                    submissions,
                    duration_secs: duration.as_secs_f64(),
                });
                InterviewOutcome::completed(session, submissions, duration)
            }
            Err(SessionError::Interrupted) => {
                info!(session, submissions, "Interview interrupted");
                InterviewOutcome::interrupted(session, submissions, duration)
            }
            Err(e) => {
                warn!(session, submissions, error = %e, "Interview failed");
                self.logger.log(&LogEvent::SessionFailed {
                    session,
                    error: e.to_string(),
                });
                InterviewOutcome::failed(session, submissions, e.to_string(), duration)
            }
        }
    }

    /// Answer pages until the interview is completed and the source has
    /// nothing left to submit
    pub async fn drive(
        &self,
        session: usize,
        source: &mut dyn AnswerSource,
        submissions: &mut usize,
    ) -> Result<(), SessionError> {
        let start_url = self.config.start_url(session);
        let mut page = self.start(session, &start_url).await?;
        let mut previous_history_order: Option<String> = None;
        let mut submitted_since_start = 0;

        loop {
            if page.is_completed() {
                if !source.has_more() {
                    return Ok(());
                }
                if submitted_since_start == 0 {
                    return Err(SessionError::Protocol(
                        "interview is completed right after starting, replay steps cannot be applied"
                            .to_string(),
                    ));
                }

                self.logger.log(&LogEvent::ReplayRestarted {
                    session,
                    step: *submissions,
                });
                page = self.start(session, &start_url).await?;
                previous_history_order = None;
                submitted_since_start = 0;
                continue;
            }

            if self.interrupted.load(Ordering::SeqCst) {
                return Err(SessionError::Interrupted);
            }

            if *submissions >= self.config.max_steps {
                return Err(SessionError::StepLimitExceeded(self.config.max_steps));
            }

            let step = prepare_step(source, &page.body)?;
            self.logger.log(&LogEvent::PageClassified {
                session,
                step: *submissions,
                question_type: step.question_type.to_string(),
                url: page.url.clone(),
            });

            let history_order = step.tokens.history_order;
            if !history_order.is_empty()
                && previous_history_order.as_deref() == Some(history_order.as_str())
            {
                return Err(SessionError::ValidationRejected { history_order });
            }

            let Some(answer) = step.answer else {
                return Err(SessionError::ReplayExhausted);
            };

            if !self.config.wait_between_posts.is_zero() {
                tokio::time::sleep(self.config.wait_between_posts).await;
            }

            self.logger.log(&LogEvent::AnswerSubmitted {
                session,
                step: *submissions,
                fields: answer
                    .pairs()
                    .map(|(key, value)| format!("{}={}", key, value))
                    .collect(),
            });
            debug!(session, url = %page.url, "Submitting answer");

            page = self.transport.submit(&page.url, &answer).await?;
            *submissions += 1;
            submitted_since_start += 1;
            previous_history_order = Some(history_order);
        }
    }

    async fn start(&self, session: usize, url: &str) -> Result<PageContent, SessionError> {
        self.logger.log(&LogEvent::SessionStarted {
            session,
            url: url.to_string(),
        });
        Ok(self.transport.fetch(url).await?)
    }
}

/// Parse, classify and answer a page. The parsed document never lives
/// across an await point.
fn prepare_step(source: &mut dyn AnswerSource, body: &str) -> Result<PreparedStep, SessionError> {
    let doc = PageDocument::parse(body)?;
    let tokens = doc.tokens();
    let question_type = classify(&doc);
    let answer = source.next_answer(&doc, question_type)?;

    Ok(PreparedStep {
        tokens,
        question_type,
        answer,
    })
}
