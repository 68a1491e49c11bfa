//! Shared constants for end-to-end tests
//!
//! When the fake provider's data changes, update only this file.

// ============================================================================
// Request data
// ============================================================================

/// A URL the server accepts
pub const VALID_VIDEO_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

/// Short-link form of a supported URL
#[allow(dead_code)]
pub const VALID_SHORT_URL: &str = "https://youtu.be/dQw4w9WgXcQ";

/// A URL on an unsupported host
pub const INVALID_VIDEO_URL: &str = "https://vimeo.com/123456";

// ============================================================================
// Fake provider data
// ============================================================================

/// Raw title the fake provider reports
pub const FAKE_VIDEO_TITLE: &str = "Never Gonna: Give You Up!";

/// The same title after sanitization
#[allow(dead_code)]
pub const FAKE_SANITIZED_TITLE: &str = "Never Gonna Give You Up";

/// Duration reported in the fake metadata document
#[allow(dead_code)]
pub const FAKE_VIDEO_DURATION: u64 = 212;

/// Bytes written as the converted artifact
#[allow(dead_code)]
pub const FAKE_MP3_BYTES: &[u8] = b"ID3\x04\x00\x00\x00\x00\x00\x00fake mp3 payload";

// ============================================================================
// Timing
// ============================================================================

/// Progress tick used by test servers
pub const TEST_PROGRESS_TICK_MS: u64 = 20;

/// Download grace period used by test servers
pub const TEST_DOWNLOAD_GRACE_MS: u64 = 300;

/// Maximum time to wait for a job to reach a terminal state
#[allow(dead_code)]
pub const JOB_TIMEOUT_MS: u64 = 5000;

/// Maximum time to wait for the server to become ready
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Poll interval while waiting for the server or a job
pub const POLL_INTERVAL_MS: u64 = 10;

/// Timeout for individual HTTP requests
pub const REQUEST_TIMEOUT_SECS: u64 = 10;
