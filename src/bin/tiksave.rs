#![forbid(unsafe_code)]

//! HTTP front for TikSave.
//!
//! Serves the bundled page, the metadata endpoint and the media relay. No
//! request leaves anything behind: every handler makes at most one outbound
//! call and forgets about it afterwards.

use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
};

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{RawQuery, State},
    http::{HeaderMap, HeaderValue, Request, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use clap::Parser;
use tiksave::{
    config::{Settings, SettingsOverrides, resolve_settings},
    logging::{LogFormat, init_logging},
    page::{self, PageView},
    relay::{RelayError, relay},
    resolver::{ResolveError, check_url, extract_url, resolve},
    upstream::{FALLBACK_CONTENT_TYPE, UpstreamClient},
    video::VideoInfo,
};
use tokio::signal;
use tracing::{error, info};
use url::form_urlencoded;

const PREFLIGHT_METHODS: &str = "GET, POST, OPTIONS";
const PREFLIGHT_HEADERS: &str = "Content-Type, Authorization";

#[derive(Parser, Debug)]
#[command(author, version, about = "TikTok link resolver and media relay", long_about = None)]
struct ServerArgs {
    /// Address to listen on (TIKSAVE_HOST)
    #[arg(long)]
    host: Option<String>,
    /// Port to listen on (TIKSAVE_PORT)
    #[arg(long)]
    port: Option<u16>,
    /// Path of the .env file to read
    #[arg(long)]
    env_file: Option<PathBuf>,
    /// Provider endpoint that resolves TikTok links (TIKSAVE_API_ENDPOINT)
    #[arg(long)]
    api_endpoint: Option<String>,
    /// Seconds before an outbound call is abandoned; 0 disables (TIKSAVE_UPSTREAM_TIMEOUT_SECS)
    #[arg(long)]
    upstream_timeout: Option<u64>,
    /// Log output format: text or json (TIKSAVE_LOG_FORMAT)
    #[arg(long)]
    log_format: Option<LogFormat>,
}

impl ServerArgs {
    fn into_settings(self) -> Result<Settings> {
        resolve_settings(SettingsOverrides {
            host: self.host,
            port: self.port,
            api_endpoint: self.api_endpoint,
            upstream_timeout_secs: self.upstream_timeout,
            log_format: self.log_format,
            env_path: self.env_file,
        })
    }
}

fn parse_host_arg(value: &str) -> Result<IpAddr> {
    value
        .parse::<IpAddr>()
        .context("expected a valid IPv4 or IPv6 address for --host/TIKSAVE_HOST")
}

#[derive(Clone)]
struct AppState {
    upstream: UpstreamClient,
}

impl AppState {
    fn from_settings(settings: &Settings) -> Self {
        Self {
            upstream: UpstreamClient::new(
                settings.api_endpoint.clone(),
                settings.user_agent.clone(),
                settings.upstream_timeout,
            ),
        }
    }
}

/// JSON error envelope. Always carries the open CORS header so cross-origin
/// callers can read the message.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        Self {
            status: err.status(),
            message: err.to_string(),
        }
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        Self {
            status: err.status(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        allow_any_origin(&mut headers);
        let body = serde_json::json!({
            "error": self.message,
        });
        (self.status, headers, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn allow_any_origin(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = ServerArgs::parse().into_settings()?;
    init_logging(settings.log_format);

    let host = parse_host_arg(&settings.host)?;
    let addr = SocketAddr::new(host, settings.port);
    let app = build_router(AppState::from_settings(&settings));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    info!(
        %addr,
        provider = %settings.api_endpoint,
        timeout_secs = settings.upstream_timeout.map(|t| t.as_secs()),
        "TikSave listening on http://{addr}"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running HTTP server")?;

    Ok(())
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api-docs", get(api_docs))
        .route("/assets/app.js", get(app_js))
        .route("/assets/style.css", get(style_css))
        .route(
            "/api/download",
            post(resolve_video).options(download_preflight),
        )
        .route("/api/proxy", get(proxy_media))
        .fallback(not_found)
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!(error = %err, "failed to install Ctrl+C handler");
    }
}

fn query_param(query: Option<&str>, key: &str) -> Option<String> {
    form_urlencoded::parse(query?.as_bytes())
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.into_owned())
}

async fn index(State(state): State<AppState>, RawQuery(query): RawQuery) -> Response {
    let submitted = query_param(query.as_deref(), "url").unwrap_or_default();
    if submitted.trim().is_empty() {
        return Html(page::render_index(&submitted, &PageView::Idle)).into_response();
    }

    match lookup_video(&state, &submitted).await {
        Ok(info) => Html(page::render_index(&submitted, &PageView::Ready(info))).into_response(),
        Err(err) => {
            let status = err.status();
            let view = PageView::Failed(err.to_string());
            (status, Html(page::render_index(&submitted, &view))).into_response()
        }
    }
}

async fn lookup_video(state: &AppState, raw: &str) -> Result<VideoInfo, ResolveError> {
    let url = check_url(raw)?;
    resolve(&state.upstream, url).await
}

async fn api_docs() -> Html<&'static str> {
    Html(page::API_DOCS_HTML)
}

async fn app_js() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/javascript; charset=utf-8")],
        page::APP_JS,
    )
}

async fn style_css() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], page::STYLE_CSS)
}

async fn download_preflight() -> Response {
    let mut headers = HeaderMap::new();
    allow_any_origin(&mut headers);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(PREFLIGHT_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(PREFLIGHT_HEADERS),
    );
    (StatusCode::NO_CONTENT, headers).into_response()
}

async fn resolve_video(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let url = extract_url(&body)?;
    let info = resolve(&state.upstream, url).await?;
    let mut headers = HeaderMap::new();
    allow_any_origin(&mut headers);
    Ok((headers, Json(info)).into_response())
}

async fn proxy_media(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> ApiResult<Response> {
    let target = query_param(query.as_deref(), "url");
    let media = relay(&state.upstream, target.as_deref()).await?;

    let content_type = HeaderValue::from_str(&media.content_type)
        .unwrap_or(HeaderValue::from_static(FALLBACK_CONTENT_TYPE));
    let mut response = Body::from_stream(media.body).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    allow_any_origin(headers);
    Ok(response)
}

/// Unclaimed `/api` paths answer with the JSON envelope; anything else is a
/// bare 404.
async fn not_found(req: Request<Body>) -> Response {
    let path = req.uri().path();
    if path == "/api" || path.starts_with("/api/") {
        return ApiError::not_found("endpoint not found").into_response();
    }
    (StatusCode::NOT_FOUND, "not found").into_response()
}
