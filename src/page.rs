#![forbid(unsafe_code)]

//! Bundled front end plus the server-side renderer used when the form is
//! submitted without script.

use std::fmt::Write as _;

use url::form_urlencoded::byte_serialize;

use crate::video::VideoInfo;

pub const INDEX_TEMPLATE: &str = include_str!("../assets/index.html");
pub const API_DOCS_HTML: &str = include_str!("../assets/api-docs.html");
pub const APP_JS: &str = include_str!("../assets/app.js");
pub const STYLE_CSS: &str = include_str!("../assets/style.css");

const URL_SLOT: &str = "{{url}}";
const RESULT_SLOT: &str = "{{result}}";

/// What the server-rendered page shows below the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageView {
    Idle,
    Failed(String),
    Ready(VideoInfo),
}

/// Formats seconds as `m:ss`.
pub fn format_duration(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Relay URL for a remote resource, as the page links to it.
pub fn proxy_href(target: &str) -> String {
    let encoded: String = byte_serialize(target.as_bytes()).collect();
    format!("/api/proxy?url={encoded}")
}

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Renders the home page with `submitted` echoed into the input.
pub fn render_index(submitted: &str, view: &PageView) -> String {
    let fragment = match view {
        PageView::Idle => String::new(),
        PageView::Failed(message) => render_error(message),
        PageView::Ready(info) => render_result(info),
    };
    let echoed = escape_html(submitted);
    fill_slots(
        INDEX_TEMPLATE,
        &[(URL_SLOT, echoed.as_str()), (RESULT_SLOT, fragment.as_str())],
    )
}

/// Substitutes every slot in one left-to-right pass, so text that lands in
/// the output is never scanned for slots again.
fn fill_slots(template: &str, slots: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    loop {
        let next = slots
            .iter()
            .filter_map(|(slot, value)| rest.find(slot).map(|at| (at, slot.len(), *value)))
            .min_by_key(|(at, _, _)| *at);
        let Some((at, slot_len, value)) = next else {
            out.push_str(rest);
            return out;
        };
        out.push_str(&rest[..at]);
        out.push_str(value);
        rest = &rest[at + slot_len..];
    }
}

fn render_error(message: &str) -> String {
    format!(
        r#"<div class="error-box" role="alert"><span>⚠</span> {}</div>"#,
        escape_html(message)
    )
}

fn render_result(info: &VideoInfo) -> String {
    let mut html = String::new();
    html.push_str(r#"<section class="result"><div class="result-card"><div class="result-left">"#);
    if !info.thumbnail.is_empty() {
        let _ = write!(
            html,
            r#"<img class="thumbnail" alt="thumbnail" src="{}">"#,
            escape_html(&proxy_href(&info.thumbnail))
        );
    }
    if info.duration > 0 {
        let _ = write!(
            html,
            r#"<span class="duration">{}</span>"#,
            format_duration(info.duration)
        );
    }
    let _ = write!(
        html,
        r#"</div><div class="result-right"><p class="video-author">@{}</p><p class="video-title">{}</p><div class="download-buttons">"#,
        escape_html(&info.author),
        escape_html(&info.title)
    );
    if !info.video_url.is_empty() {
        html.push_str(&download_link(&info.video_url, "video", "↓ Download Video"));
    }
    if !info.audio_url.is_empty() {
        html.push_str(&download_link(&info.audio_url, "audio", "♫ Download MP3"));
    }
    html.push_str("</div></div></div></section>");
    html
}

fn download_link(target: &str, kind: &str, label: &str) -> String {
    let ext = if kind == "audio" { "mp3" } else { "mp4" };
    format!(
        r#"<a class="dl-btn dl-btn-{kind}" data-kind="{kind}" data-src="{src}" href="{href}" download="tiktok-{kind}.{ext}">{label}</a>"#,
        src = escape_html(target),
        href = escape_html(&proxy_href(target)),
    )
}
