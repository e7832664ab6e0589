#![forbid(unsafe_code)]

//! The normalized record handed to the front end, and the rules that map the
//! upstream provider's loosely shaped payload onto it.
//!
//! The provider omits fields freely, so each public field is resolved from an
//! ordered list of JSON pointers into the provider's `data` object. The first
//! candidate holding a usable value wins; when none does, the field falls
//! back to a constant. The resulting record is therefore always complete.

use serde::Serialize;
use serde_json::Value;

pub const DEFAULT_TITLE: &str = "TikTok Video";
pub const DEFAULT_AUTHOR: &str = "unknown";

pub const TITLE_FIELDS: &[&str] = &["/title"];
pub const AUTHOR_FIELDS: &[&str] = &["/author/unique_id", "/author/nickname"];
pub const THUMBNAIL_FIELDS: &[&str] = &["/cover", "/origin_cover"];
pub const DURATION_FIELDS: &[&str] = &["/duration"];
pub const VIDEO_URL_FIELDS: &[&str] = &["/play"];
pub const AUDIO_URL_FIELDS: &[&str] = &["/music", "/music_info/play"];

/// Metadata for a single resolved video.
///
/// Empty `video_url` / `audio_url` mean the provider had no media of that
/// kind; the page hides the matching download button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    pub title: String,
    pub author: String,
    pub thumbnail: String,
    pub duration: u64,
    pub video_url: String,
    pub audio_url: String,
}

impl VideoInfo {
    /// Builds the record from the provider's `data` object.
    pub fn from_upstream(data: &Value) -> Self {
        Self {
            title: pick_title(data),
            author: pick_author(data),
            thumbnail: pick_thumbnail(data),
            duration: pick_duration(data),
            video_url: pick_video_url(data),
            audio_url: pick_audio_url(data),
        }
    }
}

/// Returns the first candidate that is a non-empty string.
pub fn first_text<'a>(data: &'a Value, pointers: &[&str]) -> Option<&'a str> {
    pointers
        .iter()
        .filter_map(|pointer| data.pointer(pointer))
        .filter_map(Value::as_str)
        .find(|value| !value.is_empty())
}

/// Returns the first candidate that holds a positive number of seconds.
/// Numeric strings are accepted and fractions are truncated.
pub fn first_seconds(data: &Value, pointers: &[&str]) -> Option<u64> {
    pointers
        .iter()
        .filter_map(|pointer| data.pointer(pointer))
        .filter_map(as_seconds)
        .find(|seconds| *seconds > 0)
}

fn as_seconds(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|f| f.is_finite() && *f > 0.0).map(|f| f as u64)),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<u64>().ok().or_else(|| {
                text.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && *f > 0.0)
                    .map(|f| f as u64)
            })
        }
        _ => None,
    }
}

pub fn pick_title(data: &Value) -> String {
    first_text(data, TITLE_FIELDS)
        .unwrap_or(DEFAULT_TITLE)
        .to_string()
}

pub fn pick_author(data: &Value) -> String {
    first_text(data, AUTHOR_FIELDS)
        .unwrap_or(DEFAULT_AUTHOR)
        .to_string()
}

pub fn pick_thumbnail(data: &Value) -> String {
    first_text(data, THUMBNAIL_FIELDS)
        .unwrap_or_default()
        .to_string()
}

pub fn pick_duration(data: &Value) -> u64 {
    first_seconds(data, DURATION_FIELDS).unwrap_or(0)
}

pub fn pick_video_url(data: &Value) -> String {
    first_text(data, VIDEO_URL_FIELDS)
        .unwrap_or_default()
        .to_string()
}

pub fn pick_audio_url(data: &Value) -> String {
    first_text(data, AUDIO_URL_FIELDS)
        .unwrap_or_default()
        .to_string()
}
