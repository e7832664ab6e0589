#![forbid(unsafe_code)]

//! Media relay: fetches an arbitrary remote resource on behalf of the browser
//! and streams it back so the page can save it despite cross-origin rules.
//!
//! The target is not checked against the TikTok allow-list. Thumbnails and
//! media URLs handed out by the provider live on CDNs outside tiktok.com.

use std::io::{self, Read};

use axum::{body::Bytes, http::StatusCode};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::upstream::{FetchError, UpstreamClient};

/// Bytes read from the upstream per chunk.
const CHUNK_SIZE: usize = 64 * 1024;
/// Chunks buffered ahead of a slow client.
const CHANNEL_DEPTH: usize = 4;

pub const MSG_MISSING_URL: &str = "Parameter url wajib diisi";
pub const MSG_RELAY_FAILED: &str = "Download gagal";

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("{}", MSG_MISSING_URL)]
    MissingUrl,
    #[error("{}", MSG_RELAY_FAILED)]
    Upstream(#[source] FetchError),
    #[error("{}", MSG_RELAY_FAILED)]
    Internal,
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingUrl => StatusCode::BAD_REQUEST,
            Self::Upstream(_) | Self::Internal => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Body chunks as they arrive. A read failure after the headers went out shows
/// up as a trailing `Err` item, which aborts the response instead of ending it.
pub type RelayBody = ReceiverStream<io::Result<Bytes>>;

/// An upstream response that has been accepted and is being piped through.
#[derive(Debug)]
pub struct RelayedMedia {
    pub content_type: String,
    pub body: RelayBody,
}

/// Opens `url` and starts streaming its body. Failures before the first byte
/// (transport errors, non-2xx statuses) are reported as errors so that no
/// error page is ever passed off as media.
///
/// The parameter is forwarded exactly as received; only an absent or empty
/// value is rejected here.
pub async fn relay(client: &UpstreamClient, url: Option<&str>) -> Result<RelayedMedia, RelayError> {
    let target = url
        .filter(|url| !url.is_empty())
        .ok_or(RelayError::MissingUrl)?
        .to_string();

    let opener = client.clone();
    let requested = target.clone();
    let opened = tokio::task::spawn_blocking(move || opener.open_media(&requested))
        .await
        .map_err(|err| {
            warn!(error = %err, "relay worker failed");
            RelayError::Internal
        })?;

    let media = match opened {
        Ok(media) => media,
        Err(err) => {
            warn!(url = %target, error = %err, "relay fetch failed");
            return Err(RelayError::Upstream(err));
        }
    };

    info!(url = %target, content_type = %media.content_type, "relaying media");

    let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
    let source = media.reader;
    tokio::task::spawn_blocking(move || pump(source, &tx, &target));

    Ok(RelayedMedia {
        content_type: media.content_type,
        body: ReceiverStream::new(rx),
    })
}

/// Copies `source` into the channel until EOF, a read error, or the client
/// going away.
fn pump(mut source: impl Read, tx: &mpsc::Sender<io::Result<Bytes>>, url: &str) {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total: u64 = 0;
    loop {
        match source.read(&mut buf) {
            Ok(0) => {
                debug!(url, bytes = total, "relay finished");
                return;
            }
            Ok(n) => {
                total += n as u64;
                if tx.blocking_send(Ok(Bytes::copy_from_slice(&buf[..n]))).is_err() {
                    debug!(url, bytes = total, "client went away");
                    return;
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => {
                warn!(url, bytes = total, error = %err, "relay interrupted by upstream");
                let _ = tx.blocking_send(Err(err));
                return;
            }
        }
    }
}
