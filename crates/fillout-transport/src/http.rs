use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, trace};

use fillout_questions::AnswerForm;

use crate::{PageContent, Transport, TransportConfig, TransportError, TransportFactory};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// reqwest-backed transport with its own cookie jar
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .cookie_store(true)
            .build()?;

        Ok(Self { client })
    }

    async fn read_page(response: reqwest::Response) -> Result<PageContent, TransportError> {
        let status = response.status();
        let url = response.url().to_string();

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.text().await?;
        trace!(url = %url, bytes = body.len(), "Read page");
        Ok(PageContent { body, url })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str) -> Result<PageContent, TransportError> {
        debug!(url = %url, "GET");
        let response = self.client.get(url).send().await?;
        Self::read_page(response).await
    }

    async fn submit(&self, url: &str, form: &AnswerForm) -> Result<PageContent, TransportError> {
        debug!(url = %url, fields = form.len(), "POST");
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(form.to_urlencoded())
            .send()
            .await?;
        Self::read_page(response).await
    }
}

/// Creates a fresh [`HttpTransport`] (and cookie jar) per session
#[derive(Debug, Clone, Default)]
pub struct HttpTransportFactory {
    config: TransportConfig,
}

impl HttpTransportFactory {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

impl TransportFactory for HttpTransportFactory {
    fn create(&self) -> Result<Box<dyn Transport>, TransportError> {
        Ok(Box::new(HttpTransport::new(&self.config)?))
    }
}
