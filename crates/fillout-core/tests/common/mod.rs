//! In-memory interview server shared by the driver and scheduler tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use fillout_logging::{LogFormat, Logger};
use fillout_questions::AnswerForm;
use fillout_transport::{PageContent, Transport, TransportError, TransportFactory};

pub const ENTRY_URL: &str = "http://interview.test/Interviews/abc";

pub fn logger() -> Arc<Logger> {
    Arc::new(Logger::new(LogFormat::Compact))
}

fn hidden_fields(screen_id: &str, history_order: usize) -> String {
    format!(
        r#"<input type="hidden" id="screenId" name="screenId" value="{screen_id}" />
<input type="hidden" id="historyOrder" name="historyOrder" value="{history_order}" />"#
    )
}

pub fn welcome_page(screen_id: &str, history_order: usize) -> String {
    format!(
        "<html><body><form method=\"post\">{}<p>Welcome</p></form></body></html>",
        hidden_fields(screen_id, history_order)
    )
}

pub fn category_page(screen_id: &str, history_order: usize) -> String {
    format!(
        r#"<html><body><form method="post">{}
<div id="categorylist-q1">
  <input type="hidden" name="answer-q1-m" id="categorylist-q1-multi" value="" />
  <input id="q1-1" class="category" name="answer-q1" value="q1-1" type="radio" />
  <input id="q1-2" class="category" name="answer-q1" value="q1-2" type="radio" />
  <input id="q1-3" class="category" name="answer-q1" value="q1-3" type="radio" />
</div></form></body></html>"#,
        hidden_fields(screen_id, history_order)
    )
}

pub fn number_page(screen_id: &str, history_order: usize) -> String {
    format!(
        r#"<html><body><form method="post">{}
<input id="q2" type="text" class="open number" name="answer-q2" data-minimum="1" data-maximum="5" />
</form></body></html>"#,
        hidden_fields(screen_id, history_order)
    )
}

pub fn open_page(screen_id: &str, history_order: usize) -> String {
    format!(
        r#"<html><body><form method="post">{}
<input id="q3" type="text" class="open" name="answer-q3" minlength="2" maxlength="8" />
</form></body></html>"#,
        hidden_fields(screen_id, history_order)
    )
}

pub type PageBuilder = fn(&str, usize) -> String;

#[derive(Default)]
struct InterviewState {
    current: usize,
    starts: usize,
    submissions: Vec<AnswerForm>,
}

/// A scripted interview: every accepted answer advances one page, and
/// answering the last page lands on the completed page.
pub struct FakeInterview {
    pages: Vec<PageBuilder>,
    accept_answers: bool,
    failing_urls: Vec<String>,
    state: Mutex<InterviewState>,
    total_submissions: Arc<AtomicUsize>,
    most_starts: Arc<AtomicUsize>,
}

impl FakeInterview {
    pub fn new(pages: Vec<PageBuilder>) -> Self {
        Self {
            pages,
            accept_answers: true,
            failing_urls: Vec::new(),
            state: Mutex::new(InterviewState::default()),
            total_submissions: Arc::new(AtomicUsize::new(0)),
            most_starts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Category, then number, then completed
    pub fn three_pages() -> Self {
        Self::new(vec![category_page, number_page])
    }

    /// Serve the same page again after every answer
    pub fn rejecting(mut self) -> Self {
        self.accept_answers = false;
        self
    }

    pub fn failing_on(mut self, url: impl Into<String>) -> Self {
        self.failing_urls.push(url.into());
        self
    }

    fn sharing_counters(mut self, submissions: Arc<AtomicUsize>, starts: Arc<AtomicUsize>) -> Self {
        self.total_submissions = submissions;
        self.most_starts = starts;
        self
    }

    pub fn submissions(&self) -> Vec<AnswerForm> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn starts(&self) -> usize {
        self.state.lock().unwrap().starts
    }

    fn page(&self, state: &InterviewState) -> PageContent {
        match self.pages.get(state.current) {
            Some(build) => {
                let screen_id = format!("screen-{}-{}", state.starts, state.current);
                PageContent::new(
                    build(&screen_id, state.current),
                    format!("{}/Home/Index", ENTRY_URL),
                )
            }
            None => PageContent::new(
                "<html><body><p>Thank you</p></body></html>",
                format!("{}/Home/Completed", ENTRY_URL),
            ),
        }
    }
}

#[async_trait]
impl Transport for FakeInterview {
    async fn fetch(&self, url: &str) -> Result<PageContent, TransportError> {
        if self.failing_urls.iter().any(|failing| failing == url) {
            return Err(TransportError::Status {
                status: 500,
                url: url.to_string(),
            });
        }

        let mut state = self.state.lock().unwrap();
        state.current = 0;
        state.starts += 1;
        self.most_starts.fetch_max(state.starts, Ordering::SeqCst);
        Ok(self.page(&state))
    }

    async fn submit(&self, _url: &str, form: &AnswerForm) -> Result<PageContent, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.submissions.push(form.clone());
        self.total_submissions.fetch_add(1, Ordering::SeqCst);
        if self.accept_answers {
            state.current += 1;
        }
        Ok(self.page(&state))
    }
}

/// Hands out a fresh [`FakeInterview`] per transport
pub struct FakeFactory {
    pages: Vec<PageBuilder>,
    failing_urls: Vec<String>,
    pub created: AtomicUsize,
    pub total_submissions: Arc<AtomicUsize>,
    /// Highest number of interview starts seen on a single transport
    pub most_starts: Arc<AtomicUsize>,
}

impl FakeFactory {
    pub fn new(pages: Vec<PageBuilder>) -> Self {
        Self {
            pages,
            failing_urls: Vec::new(),
            created: AtomicUsize::new(0),
            total_submissions: Arc::new(AtomicUsize::new(0)),
            most_starts: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_on(mut self, url: impl Into<String>) -> Self {
        self.failing_urls.push(url.into());
        self
    }
}

impl TransportFactory for FakeFactory {
    fn create(&self) -> Result<Box<dyn Transport>, TransportError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let mut interview = FakeInterview::new(self.pages.clone())
            .sharing_counters(self.total_submissions.clone(), self.most_starts.clone());
        for url in &self.failing_urls {
            interview = interview.failing_on(url.clone());
        }
        Ok(Box::new(interview))
    }
}
