//! Thin HTTP client for exercising the test server.

use serde_json::{json, Value};

pub struct TestClient {
    base_url: String,
    client: reqwest::Client,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    pub async fn get_json(&self, path: &str) -> (reqwest::StatusCode, Value) {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("request");
        let status = response.status();
        let body = response.json().await.expect("json body");
        (status, body)
    }

    pub async fn post_query(&self, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}/query", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("request")
    }

    /// Sends a bare question and returns (status, parsed body, status header).
    pub async fn ask(&self, question: &str) -> (reqwest::StatusCode, Value, String) {
        let response = self.post_query(json!({ "question": question })).await;
        let status = response.status();
        let header = response
            .headers()
            .get("x-quarry-status")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.json().await.expect("json body");
        (status, body, header)
    }

    /// Streams a question and returns the raw SSE transcript.
    pub async fn ask_stream(&self, question: &str) -> String {
        let response = self
            .client
            .post(format!("{}/query/stream", self.base_url))
            .json(&json!({ "question": question }))
            .send()
            .await
            .expect("request");
        assert!(response.status().is_success());
        response.text().await.expect("sse body")
    }
}
