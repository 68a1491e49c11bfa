//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for all converter endpoints.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

#[allow(dead_code)]
impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    // ========================================================================
    // Conversion Endpoints
    // ========================================================================

    /// POST /api/convert
    pub async fn convert(&self, url: &str, quality: Option<Value>) -> Response {
        let mut body = json!({ "url": url });
        if let Some(quality) = quality {
            body["quality"] = quality;
        }
        self.client
            .post(format!("{}/api/convert", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("Convert request failed")
    }

    /// POST /api/convert with a raw body, for malformed input tests
    pub async fn convert_raw(&self, body: &str) -> Response {
        self.client
            .post(format!("{}/api/convert", self.base_url))
            .header("content-type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .expect("Convert request failed")
    }

    /// Submits a conversion and returns the job id, asserting acceptance
    pub async fn submit(&self, url: &str) -> String {
        let response = self.convert(url, None).await;
        assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);
        let body: Value = response.json().await.expect("Invalid convert response");
        body["jobId"]
            .as_str()
            .expect("Missing jobId")
            .to_string()
    }

    /// GET /api/status/{job_id}
    pub async fn status(&self, job_id: &str) -> Response {
        self.client
            .get(format!("{}/api/status/{}", self.base_url, job_id))
            .send()
            .await
            .expect("Status request failed")
    }

    /// GET /api/download/{job_id}
    pub async fn download(&self, job_id: &str) -> Response {
        self.client
            .get(format!("{}/api/download/{}", self.base_url, job_id))
            .send()
            .await
            .expect("Download request failed")
    }

    /// POST /api/videoinfo
    pub async fn video_info(&self, url: &str) -> Response {
        self.client
            .post(format!("{}/api/videoinfo", self.base_url))
            .json(&json!({ "url": url }))
            .send()
            .await
            .expect("Video info request failed")
    }

    /// GET on an arbitrary path
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("Request failed")
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Polls the status endpoint until the job leaves `processing`.
    ///
    /// Returns every status document observed, the terminal one last.
    pub async fn wait_for_terminal(&self, job_id: &str) -> Vec<Value> {
        let start = std::time::Instant::now();
        let mut seen = Vec::new();
        loop {
            let response = self.status(job_id).await;
            assert_eq!(response.status(), reqwest::StatusCode::OK);
            let body: Value = response.json().await.expect("Invalid status response");
            let done = body["status"] != "processing";
            seen.push(body);
            if done {
                return seen;
            }
            if start.elapsed() > Duration::from_millis(JOB_TIMEOUT_MS) {
                panic!("Job {} did not finish within {}ms", job_id, JOB_TIMEOUT_MS);
            }
            tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
    }
}
