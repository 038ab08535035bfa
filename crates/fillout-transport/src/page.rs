/// Path fragment of the page a finished interview lands on
pub const COMPLETED_PATH: &str = "/Home/Completed";

/// Body and effective (post-redirect) URL of one response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    pub body: String,
    pub url: String,
}

impl PageContent {
    pub fn new(body: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            url: url.into(),
        }
    }

    /// Whether the interview reached its completed page
    pub fn is_completed(&self) -> bool {
        is_completed_url(&self.url)
    }
}

pub fn is_completed_url(url: &str) -> bool {
    url.contains(COMPLETED_PATH)
}
