//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestServer, TestClient, VALID_VIDEO_URL};
//! use reqwest::StatusCode;
//!
//! #[tokio::test]
//! async fn test_convert() {
//!     let server = TestServer::spawn().await;
//!     let client = TestClient::new(server.base_url.clone());
//!
//!     let response = client.convert(VALID_VIDEO_URL, None).await;
//!     assert_eq!(response.status(), StatusCode::ACCEPTED);
//! }
//! ```

mod client;
mod constants;
mod fake_provider;
mod server;

// Public API - this is what tests import
pub use client::TestClient;
pub use constants::*;
#[allow(unused_imports)]
pub use fake_provider::FakeProvider;
pub use server::TestServer;
