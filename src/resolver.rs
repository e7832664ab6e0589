#![forbid(unsafe_code)]

//! Turns a user-submitted TikTok link into a [`VideoInfo`].

use axum::http::StatusCode;
use serde_json::Value;
use tracing::{info, warn};

use crate::upstream::{FetchError, UpstreamClient};
use crate::validate::is_valid_tiktok_url;
use crate::video::VideoInfo;

pub const MSG_EMPTY_URL: &str = "URL tidak boleh kosong";
pub const MSG_INVALID_URL: &str = "URL tidak valid. Masukkan link TikTok yang benar.";
pub const MSG_UNREACHABLE: &str = "Gagal menghubungi API";
pub const MSG_NOT_FOUND: &str = "Video tidak ditemukan atau tidak dapat diakses";
pub const MSG_INTERNAL: &str = "Terjadi kesalahan server";

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The submitted link is missing or not an accepted TikTok URL.
    #[error("{0}")]
    InvalidInput(&'static str),
    /// The provider could not be reached or answered with a failure status.
    #[error("{}", MSG_UNREACHABLE)]
    Unreachable(#[source] FetchError),
    /// The provider answered but could not resolve the link.
    #[error("{0}")]
    Rejected(String),
    /// The blocking worker died before producing a result.
    #[error("{}", MSG_INTERNAL)]
    Internal,
}

impl ResolveError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Unreachable(_) | Self::Rejected(_) | Self::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Pulls the link out of a raw request body and checks it against the
/// allow-list. Returns the trimmed link.
pub fn extract_url(body: &[u8]) -> Result<String, ResolveError> {
    let payload: Value =
        serde_json::from_slice(body).map_err(|_| ResolveError::InvalidInput(MSG_EMPTY_URL))?;
    let raw = payload
        .get("url")
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .ok_or(ResolveError::InvalidInput(MSG_EMPTY_URL))?;
    check_url(raw)
}

/// Trims `raw` and validates it. Shared by the JSON endpoint and the
/// server-rendered page.
pub fn check_url(raw: &str) -> Result<String, ResolveError> {
    let trimmed = raw.trim();
    if !is_valid_tiktok_url(trimmed) {
        return Err(ResolveError::InvalidInput(MSG_INVALID_URL));
    }
    Ok(trimmed.to_string())
}

/// Performs the single provider round trip for an already validated link.
pub async fn resolve(client: &UpstreamClient, url: String) -> Result<VideoInfo, ResolveError> {
    let client = client.clone();
    let target = url.clone();
    let result = tokio::task::spawn_blocking(move || resolve_blocking(&client, &target))
        .await
        .map_err(|err| {
            warn!(error = %err, "resolver worker failed");
            ResolveError::Internal
        })?;

    match &result {
        Ok(info) => info!(%url, author = %info.author, "resolved video"),
        Err(err) => warn!(%url, error = %err, "failed to resolve video"),
    }
    result
}

fn resolve_blocking(client: &UpstreamClient, url: &str) -> Result<VideoInfo, ResolveError> {
    let envelope = client.lookup(url).map_err(|err| {
        warn!(endpoint = client.api_endpoint(), error = %err, "provider call failed");
        ResolveError::Unreachable(err)
    })?;

    let data = match envelope.data() {
        Some(data) if envelope.is_success() => data,
        _ => {
            let message = envelope.message().unwrap_or(MSG_NOT_FOUND);
            return Err(ResolveError::Rejected(message.to_string()));
        }
    };

    Ok(VideoInfo::from_upstream(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_url_trims_valid_links() {
        let url = extract_url(br#"{"url":"  https://vt.tiktok.com/ZSabc/  "}"#).unwrap();
        assert_eq!(url, "https://vt.tiktok.com/ZSabc/");
    }

    #[test]
    fn extract_url_rejects_missing_or_empty() {
        let bodies: [&[u8]; 7] = [
            br#"{"url":""}"#,
            br#"{}"#,
            br#"{"url":null}"#,
            br#"{"url":42}"#,
            br#"[]"#,
            b"not json",
            b"",
        ];
        for body in bodies {
            let err = extract_url(body).unwrap_err();
            assert!(matches!(err, ResolveError::InvalidInput(MSG_EMPTY_URL)));
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
            assert!(!err.to_string().is_empty());
        }
    }

    #[test]
    fn extract_url_rejects_foreign_hosts() {
        let err = extract_url(br#"{"url":"https://fake.tiktok.com.evil.com/v"}"#).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidInput(MSG_INVALID_URL)));
    }

    #[test]
    fn whitespace_only_url_is_invalid_not_empty() {
        let err = extract_url(br#"{"url":"   "}"#).unwrap_err();
        assert_eq!(err.to_string(), MSG_INVALID_URL);
    }

    #[test]
    fn upstream_errors_map_to_server_errors() {
        assert_eq!(
            ResolveError::Rejected("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let unreachable = ResolveError::Unreachable(FetchError::Status(503));
        assert_eq!(unreachable.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(unreachable.to_string(), MSG_UNREACHABLE);
    }
}
