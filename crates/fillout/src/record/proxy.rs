use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Redirect, Response};
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, info, warn};
use url::Url;

use fillout_logging::{LogEvent, Logger};
use fillout_questions::{AnswerForm, SCREEN_ID_FIELD};
use fillout_replay::ReplayWriter;
use fillout_transport::is_completed_url;

use super::headers::{
    copy_response_header, forward_request_header, local_target, rewrite_location,
    strip_cookie_domain,
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const NOT_STARTED: &str = "No interview started yet, open / to begin";

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Invalid interview URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Request to interview server failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Failed to write replay file: {0}")]
    Recording(#[from] std::io::Error),

    #[error("Failed to build response: {0}")]
    Response(#[from] axum::http::Error),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        warn!(error = %self, "Proxy request failed");
        (StatusCode::BAD_GATEWAY, self.to_string()).into_response()
    }
}

/// Shared state of the record proxy
pub struct ProxyState {
    entry_url: String,
    target: usize,
    /// Leaves redirects to the browser
    forward_client: reqwest::Client,
    /// Follows redirects to find where the interview lives
    entry_client: reqwest::Client,
    origin: Mutex<Option<Url>>,
    interviews: AtomicUsize,
    writer: ReplayWriter,
    logger: Arc<Logger>,
    finished: Notify,
}

impl ProxyState {
    pub fn new(
        entry_url: String,
        target: usize,
        timeout: Duration,
        writer: ReplayWriter,
        logger: Arc<Logger>,
    ) -> Result<Self, ProxyError> {
        Url::parse(&entry_url).map_err(|source| ProxyError::InvalidUrl {
            url: entry_url.clone(),
            source,
        })?;

        let forward_client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        let entry_client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            entry_url,
            target,
            forward_client,
            entry_client,
            origin: Mutex::new(None),
            interviews: AtomicUsize::new(0),
            writer,
            logger,
            finished: Notify::new(),
        })
    }

    pub fn interviews_recorded(&self) -> usize {
        self.interviews.load(Ordering::SeqCst).min(self.target)
    }

    pub fn steps_recorded(&self) -> usize {
        self.writer.steps_written()
    }

    /// Resolves once the target number of interviews was recorded
    pub async fn finished(&self) {
        self.finished.notified().await
    }

    fn origin(&self) -> Option<Url> {
        self.origin.lock().ok()?.clone()
    }

    /// Fetch the entry URL and remember where it led
    async fn start_interview(&self) -> Result<Url, ProxyError> {
        let response = self.entry_client.get(&self.entry_url).send().await?;
        let landed = response.url().clone();
        info!(url = %landed, "Starting interview");

        if let Ok(mut origin) = self.origin.lock() {
            *origin = Some(landed.clone());
        }
        Ok(landed)
    }

    fn record_step(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), ProxyError> {
        let is_form = headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with(FORM_CONTENT_TYPE));
        if !is_form {
            debug!("Skipping POST that is not a form submission");
            return Ok(());
        }

        let form = AnswerForm::from_urlencoded(body);
        self.writer.append_step(&form)?;

        self.logger.log(&LogEvent::StepRecorded {
            step: self.writer.steps_written(),
            fields: form
                .keys()
                .filter(|key| *key != SCREEN_ID_FIELD)
                .map(str::to_string)
                .collect(),
        });
        Ok(())
    }

    /// Count a completed interview. Returns whether the browser should be
    /// sent to start the next one.
    fn complete_interview(&self) -> bool {
        let recorded = self.interviews.fetch_add(1, Ordering::SeqCst) + 1;
        self.logger.log(&LogEvent::InterviewRecorded {
            completed: recorded.min(self.target),
            target: self.target,
        });

        if recorded == self.target {
            self.finished.notify_one();
        }
        recorded < self.target
    }

    async fn relay(
        &self,
        method: Method,
        remote_url: &str,
        headers: &HeaderMap,
        body: Bytes,
        origin: &Url,
    ) -> Result<Response, ProxyError> {
        let mut request = self.forward_client.request(method, remote_url);
        for (name, value) in headers.iter() {
            if forward_request_header(name) {
                request = request.header(name, value);
            }
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        let upstream = request.send().await?;

        let mut response = Response::builder().status(upstream.status());
        for (name, value) in upstream.headers() {
            if !copy_response_header(name) {
                continue;
            }
            let value = if *name == header::LOCATION {
                rewrite_header(value, |location| rewrite_location(location, origin))
            } else if *name == header::SET_COOKIE {
                rewrite_header(value, strip_cookie_domain)
            } else {
                value.clone()
            };
            response = response.header(name, value);
        }

        let bytes = upstream.bytes().await?;
        Ok(response.body(Body::from(bytes))?)
    }
}

fn rewrite_header(value: &HeaderValue, rewrite: impl Fn(&str) -> String) -> HeaderValue {
    value
        .to_str()
        .ok()
        .and_then(|text| HeaderValue::from_str(&rewrite(text)).ok())
        .unwrap_or_else(|| value.clone())
}

/// Catch-all handler: mirror the request to the interview server
pub async fn forward(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let origin = match state.origin() {
        Some(origin) if uri.path() != "/" => origin,
        None if uri.path() != "/" => {
            debug!(path = uri.path(), "Request before any interview was started");
            return Ok((StatusCode::NOT_FOUND, NOT_STARTED).into_response());
        }
        _ => {
            let landed = state.start_interview().await?;
            let target = local_target(&landed);
            if target != "/" {
                return Ok(Redirect::to(&target).into_response());
            }
            landed
        }
    };

    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let remote_url = format!("{}{}", origin.origin().ascii_serialization(), path_and_query);

    state.logger.log(&LogEvent::ProxyRequest {
        method: method.to_string(),
        path: path_and_query.to_string(),
        remote_url: remote_url.clone(),
    });

    if method == Method::POST {
        state.record_step(&headers, &body)?;
    }

    if method == Method::GET && is_completed_url(&remote_url) && state.complete_interview() {
        return Ok(Redirect::to("/").into_response());
    }

    state
        .relay(method, &remote_url, &headers, body, &origin)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::Html;
    use axum::routing::get;
    use axum::Router;
    use fillout_logging::LogFormat;
    use tempfile::TempDir;

    const PAGE: &str = r#"<form method="post">
<input type="hidden" id="screenId" name="screenId" value="s1" />
<input type="hidden" id="historyOrder" name="historyOrder" value="0" />
</form>"#;

    /// Interview server: /start redirects to the interview, posting an
    /// answer redirects (absolutely) to the completed page.
    async fn spawn_upstream() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let completed = format!("{}/Interviews/abc/Home/Completed", base);

        let app = Router::new()
            .route(
                "/start",
                get(|| async { Redirect::to("/Interviews/abc/Home/Index") }),
            )
            .route(
                "/Interviews/abc/Home/Index",
                get(|| async { ([(header::CACHE_CONTROL, "no-cache")], Html(PAGE)) }).post(
                    move || {
                        let completed = completed.clone();
                        async move { (StatusCode::FOUND, [(header::LOCATION, completed)]) }
                    },
                ),
            )
            .route(
                "/Interviews/abc/Home/Completed",
                get(|| async { ([(header::ETAG, "\"v1\"")], "Thank you") }),
            );

        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        base
    }

    async fn spawn_proxy(state: Arc<ProxyState>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let router = super::super::create_router(state);
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        base
    }

    fn browser() -> reqwest::Client {
        reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap()
    }

    fn proxy_state(upstream: &str, target: usize, dir: &TempDir) -> Arc<ProxyState> {
        let writer = ReplayWriter::create(&dir.path().join("interview.replay")).unwrap();
        Arc::new(
            ProxyState::new(
                format!("{}/start", upstream),
                target,
                Duration::from_secs(5),
                writer,
                Arc::new(Logger::new(LogFormat::Compact)),
            )
            .unwrap(),
        )
    }

    fn location(response: &reqwest::Response) -> &str {
        response.headers()[header::LOCATION].to_str().unwrap()
    }

    #[tokio::test]
    async fn test_records_one_interview() {
        let dir = TempDir::new().unwrap();
        let upstream = spawn_upstream().await;
        let state = proxy_state(&upstream, 1, &dir);
        let proxy = spawn_proxy(state.clone()).await;
        let client = browser();

        let start = client.get(format!("{}/", proxy)).send().await.unwrap();
        assert_eq!(start.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&start), "/Interviews/abc/Home/Index");

        let page = client
            .get(format!("{}/Interviews/abc/Home/Index", proxy))
            .send()
            .await
            .unwrap();
        assert_eq!(page.status(), StatusCode::OK);
        assert!(page.headers().get(header::CACHE_CONTROL).is_none());
        assert!(page.text().await.unwrap().contains("historyOrder"));

        let answer = client
            .post(format!("{}/Interviews/abc/Home/Index", proxy))
            .header(header::CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body("screenId=s1&historyOrder=0&button-next=Next")
            .send()
            .await
            .unwrap();
        assert_eq!(answer.status(), StatusCode::FOUND);
        assert_eq!(location(&answer), "/Interviews/abc/Home/Completed");

        let done = client
            .get(format!("{}/Interviews/abc/Home/Completed", proxy))
            .send()
            .await
            .unwrap();
        assert_eq!(done.status(), StatusCode::OK);
        assert!(done.headers().get(header::ETAG).is_none());
        assert_eq!(done.text().await.unwrap(), "Thank you");

        tokio::time::timeout(Duration::from_secs(1), state.finished())
            .await
            .expect("proxy did not report completion");
        assert_eq!(state.interviews_recorded(), 1);
        assert_eq!(state.steps_recorded(), 1);

        let recorded = std::fs::read_to_string(dir.path().join("interview.replay")).unwrap();
        assert_eq!(recorded, "historyOrder=0\nbutton-next=Next\n---\n");
    }

    #[tokio::test]
    async fn test_completed_interview_restarts_until_target() {
        let dir = TempDir::new().unwrap();
        let upstream = spawn_upstream().await;
        let state = proxy_state(&upstream, 2, &dir);
        let proxy = spawn_proxy(state.clone()).await;
        let client = browser();

        client.get(format!("{}/", proxy)).send().await.unwrap();
        let done = client
            .get(format!("{}/Interviews/abc/Home/Completed", proxy))
            .send()
            .await
            .unwrap();

        assert_eq!(done.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&done), "/");
        assert_eq!(state.interviews_recorded(), 1);
    }

    #[tokio::test]
    async fn test_only_root_starts_an_interview() {
        let dir = TempDir::new().unwrap();
        let upstream = spawn_upstream().await;
        let state = proxy_state(&upstream, 1, &dir);
        let proxy = spawn_proxy(state.clone()).await;
        let client = browser();

        let icon = client
            .get(format!("{}/favicon.ico", proxy))
            .send()
            .await
            .unwrap();
        assert_eq!(icon.status(), StatusCode::NOT_FOUND);
        assert!(state.origin().is_none());

        let start = client.get(format!("{}/", proxy)).send().await.unwrap();
        assert_eq!(start.status(), StatusCode::SEE_OTHER);
        assert!(state.origin().is_some());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_bad_gateway() {
        let dir = TempDir::new().unwrap();
        // Nothing listens on the discard port
        let state = proxy_state("http://127.0.0.1:9", 1, &dir);
        let proxy = spawn_proxy(state).await;

        let response = browser().get(format!("{}/", proxy)).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_invalid_entry_url() {
        let dir = TempDir::new().unwrap();
        let writer = ReplayWriter::create(&dir.path().join("x.replay")).unwrap();
        let result = ProxyState::new(
            "not a url".to_string(),
            1,
            Duration::from_secs(1),
            writer,
            Arc::new(Logger::new(LogFormat::Compact)),
        );
        assert!(matches!(result, Err(ProxyError::InvalidUrl { .. })));
    }
}
