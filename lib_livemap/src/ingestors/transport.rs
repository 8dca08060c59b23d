//! # Feed Transport
//!
//! The seam between the connection manager and the network. A transport opens
//! one connection to the feed and yields its raw payloads; the connection
//! manager owns retrying, decoding and fan-out.

use std::future::Future;

use futures_util::stream::{BoxStream, StreamExt};
use thiserror::Error;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use url::Url;

/// Stream of raw payloads from one open connection. Ends when the peer closes.
///
/// Payloads are passed on as bytes; checking that they are UTF-8 JSON is the
/// decoder's job, so a bad payload fails alone and never ends the connection.
pub type FrameStream = BoxStream<'static, Result<Vec<u8>, TransportError>>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("socket error: {0}")]
    Socket(String),

    #[error("connection closed by remote host")]
    Closed,
}

/// Opens connections to the location feed.
pub trait FeedTransport: Send + Sync + 'static {
    fn open(&self, url: &Url) -> impl Future<Output = Result<FrameStream, TransportError>> + Send;
}

/// # WebSocket Transport
///
/// Default transport on top of `tokio-tungstenite`. Text and binary frames are
/// passed on as payloads, ping / pong are consumed, a close frame ends the
/// connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

impl FeedTransport for WsTransport {
    fn open(&self, url: &Url) -> impl Future<Output = Result<FrameStream, TransportError>> + Send {
        let url = url.to_string();
        async move {
            let (ws_stream, _) = connect_async(url.as_str())
                .await
                .map_err(|e| TransportError::Connect {
                    url: url.clone(),
                    reason: e.to_string(),
                })?;

            let frames = ws_stream.filter_map(|msg| async move {
                match msg {
                    Ok(Message::Text(text)) => Some(Ok(text.as_str().as_bytes().to_vec())),
                    // Binary frames carry the same JSON, undecoded.
                    Ok(Message::Binary(bin)) => Some(Ok(bin.to_vec())),
                    Ok(Message::Close(_)) => Some(Err(TransportError::Closed)),
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => None,
                    Err(e) => Some(Err(TransportError::Socket(e.to_string()))),
                }
            });

            Ok(frames.boxed())
        }
    }
}
