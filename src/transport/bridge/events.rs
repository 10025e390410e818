use anyhow::{Context, Result};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::types::{BridgeEvent, EVENTS_PATH};
use crate::error::TransportError;
use crate::transport::SessionEvent;

/// Builds the websocket URL for the event stream from the REST base URL.
pub fn build_events_url(base_url: &Url, token: &str) -> Result<Url> {
    let mut url = base_url
        .join(EVENTS_PATH.trim_start_matches('/'))
        .context("build bridge events URL")?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    url.set_scheme(scheme)
        .map_err(|()| anyhow::anyhow!("cannot use {scheme} scheme for {url}"))?;
    url.query_pairs_mut().append_pair("token", token);
    Ok(url)
}

/// Forwards bridge events into `tx` until the socket closes.
///
/// A closed socket is reported as [`TransportError::Disconnected`] so the
/// session lifecycle reconnects. A dropped receiver ends the stream quietly.
pub async fn stream_events(url: &Url, tx: &mpsc::Sender<SessionEvent>) -> Result<()> {
    let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| TransportError::Disconnected(format!("connect event stream: {e}")))?;
    let (_write, mut read) = ws_stream.split();
    tracing::info!("bridge event stream connected");

    loop {
        tokio::select! {
            () = tx.closed() => return Ok(()),
            message = read.next() => {
                let Some(message) = message else {
                    anyhow::bail!(TransportError::Disconnected("event stream closed".into()));
                };
                let message = message
                    .map_err(|e| TransportError::Disconnected(format!("read event stream: {e}")))?;
                if matches!(message, Message::Close(_)) {
                    anyhow::bail!(TransportError::Disconnected("event stream closed by bridge".into()));
                }
                let Some(text) = websocket_message_to_text(message) else {
                    continue;
                };
                let Some(event) = parse_event(&text) else {
                    continue;
                };
                if tx.send(event).await.is_err() {
                    return Ok(());
                }
            }
        }
    }
}

pub fn parse_event(text: &str) -> Option<SessionEvent> {
    match serde_json::from_str::<BridgeEvent>(text) {
        Ok(event) => event.into_session_event(),
        Err(error) => {
            tracing::warn!("ignoring undecodable bridge event: {error}");
            None
        }
    }
}

fn websocket_message_to_text(message: Message) -> Option<String> {
    match message {
        Message::Text(text) => Some(text.to_string()),
        Message::Binary(bytes) => String::from_utf8(bytes.to_vec()).ok(),
        _ => None,
    }
}
