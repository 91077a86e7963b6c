//! Mock webhook server for testing alert delivery
//!
//! Stands in for the Telegram, Pushover and Discord endpoints and captures
//! every JSON body it receives.

use serde_json::Value;
use std::sync::{Arc, Mutex};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, Request, ResponseTemplate,
};

/// Captured webhook request
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub path: String,
    pub body: Value,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Mock webhook server that captures alert requests
pub struct MockWebhookServer {
    pub server: MockServer,
    pub base_url: String,
    captured_requests: Arc<Mutex<Vec<WebhookRequest>>>,
}

impl MockWebhookServer {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let base_url = server.uri();
        Self {
            server,
            base_url,
            captured_requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Accept POSTs on `route` and capture their bodies
    pub async fn mock_success(&self, route: &str) {
        let requests = self.captured_requests.clone();

        Mock::given(method("POST"))
            .and(path(route))
            .respond_with(move |req: &Request| {
                if let Ok(body) = req.body_json::<Value>() {
                    requests.lock().unwrap().push(WebhookRequest {
                        path: req.url.path().to_string(),
                        body,
                        timestamp: chrono::Utc::now(),
                    });
                }
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true }))
            })
            .mount(&self.server)
            .await;
    }

    /// Reject POSTs on `route` with the given status
    pub async fn mock_failure(&self, route: &str, status_code: u16) {
        Mock::given(method("POST"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status_code))
            .mount(&self.server)
            .await;
    }

    /// Reject the next POST on `route`; mount before `mock_success` so later requests fall through
    pub async fn mock_failure_once(&self, route: &str, status_code: u16) {
        Mock::given(method("POST"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status_code))
            .up_to_n_times(1)
            .mount(&self.server)
            .await;
    }

    pub fn get_captured_requests(&self) -> Vec<WebhookRequest> {
        self.captured_requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.captured_requests.lock().unwrap().len()
    }

    pub fn requests_to(&self, route: &str) -> Vec<WebhookRequest> {
        self.get_captured_requests()
            .into_iter()
            .filter(|r| r.path == route)
            .collect()
    }

    pub fn clear(&self) {
        self.captured_requests.lock().unwrap().clear();
    }

    pub fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }
}
