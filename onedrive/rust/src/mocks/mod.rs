//! Mock implementations for testing.
//!
//! [`MockTransport`] replays queued responses and records every request, so
//! tests can count transport calls and inspect what was sent.

mod transport;

pub use transport::{MockResponse, MockResponseBuilder, MockTransport};

use crate::auth::{ClientIdentity, TokenPair};

/// Test fixtures for OneDrive operations.
pub struct TestFixtures;

impl TestFixtures {
    /// A client identity with placeholder values.
    pub fn identity() -> ClientIdentity {
        ClientIdentity::new("test-client-id", "test-client-secret")
    }

    /// A token pair with placeholder values.
    pub fn token_pair() -> TokenPair {
        TokenPair::new("access-token-1", "refresh-token-1")
    }

    /// A token endpoint body carrying the given tokens.
    pub fn token_response_body(access_token: &str, refresh_token: &str) -> String {
        serde_json::json!({
            "token_type": "Bearer",
            "scope": "https://graph.microsoft.com/User.Read",
            "expires_in": 3599,
            "ext_expires_in": 3599,
            "access_token": access_token,
            "refresh_token": refresh_token,
        })
        .to_string()
    }

    /// A Graph error body with the expired-token code.
    pub fn expired_token_body() -> String {
        Self::graph_error_body(
            "InvalidAuthenticationToken",
            "Access token has expired or is not yet valid.",
        )
    }

    /// A Graph error body with the given code and message.
    pub fn graph_error_body(code: &str, message: &str) -> String {
        serde_json::json!({
            "error": {
                "code": code,
                "message": message,
            }
        })
        .to_string()
    }

    /// JSON body for a completed drive item.
    pub fn drive_item_json(name: &str, size: u64) -> serde_json::Value {
        serde_json::json!({
            "id": "01BYE5RZ6QN3ZWBTUFOFD3GSPGOHDJD36K",
            "name": name,
            "size": size,
            "file": {
                "mimeType": "application/octet-stream",
                "hashes": {
                    "sha1Hash": "A94A8FE5CCB19BA61C4C0873D391E987982FBBD3",
                    "quickXorHash": "aGVsbG8gd29ybGQ="
                }
            }
        })
    }

    /// JSON body for a freshly created upload session.
    pub fn upload_session_json(upload_url: &str) -> String {
        serde_json::json!({
            "uploadUrl": upload_url,
            "expirationDateTime": "2026-10-20T10:00:00Z",
            "nextExpectedRanges": ["0-"],
        })
        .to_string()
    }
}
