use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use fillout_questions::AnswerForm;

use crate::PageContent;

/// Errors that can occur while talking to the interview server
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("http request was unsuccessful: {status} (url: {url})")]
    Status { status: u16, url: String },
}

/// Configuration shared by every transport of a run
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

impl TransportConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// The capability the session driver needs from the network
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url`, following redirects
    async fn fetch(&self, url: &str) -> Result<PageContent, TransportError>;

    /// POST `form` to `url` as `application/x-www-form-urlencoded`, following redirects
    async fn submit(&self, url: &str, form: &AnswerForm) -> Result<PageContent, TransportError>;
}

/// Builds one transport per session, so that no two sessions share cookies
pub trait TransportFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn Transport>, TransportError>;
}
