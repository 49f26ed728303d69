//! Transport abstraction and the WebSocket implementation.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite;
use url::Url;

use crate::Error;

/// Outbound half of an open link. Accepts text frames.
pub type LinkSink = Pin<Box<dyn Sink<String, Error = Error> + Send>>;

/// Inbound half of an open link.
///
/// Yields one item per received text frame. An `Err` item is the transport
/// reporting an error; the end of the stream is the transport reporting
/// closed.
pub type LinkStream = Pin<Box<dyn Stream<Item = Result<String, Error>> + Send>>;

/// An open bidirectional text channel.
pub struct Link {
    pub sink: LinkSink,
    pub stream: LinkStream,
}

/// Opens links to a channel endpoint.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Resolves once the link is open.
    async fn open(&self, url: &Url) -> Result<Link, Error>;
}

/// Derive the endpoint of `channel` from the hosting origin.
///
/// `https` origins map to `wss`, `http` origins to `ws`; host and port are
/// kept and the path becomes `/ws/<channel>`.
pub fn endpoint_url(origin: &Url, channel: &str) -> Result<Url, Error> {
    let scheme = match origin.scheme() {
        "https" => "wss",
        "http" => "ws",
        _ => return Err(Error::InvalidOrigin(origin.to_string())),
    };
    let host = origin
        .host_str()
        .ok_or_else(|| Error::InvalidOrigin(origin.to_string()))?;
    let authority = match origin.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    let mut url = Url::parse(&format!("{scheme}://{authority}/"))?;
    url.path_segments_mut()
        .map_err(|()| Error::InvalidOrigin(origin.to_string()))?
        .clear()
        .push("ws")
        .push(channel);
    Ok(url)
}

// ---------------------------------------------------------------------------
// WebSocket transport
// ---------------------------------------------------------------------------

/// [`Connector`] backed by `tokio-tungstenite`.
///
/// Text frames are delivered as-is and binary frames are decoded as lossy
/// UTF-8. Ping, pong and close frames are handled by tungstenite and never
/// reach the channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, url: &Url) -> Result<Link, Error> {
        let (ws, _resp) = tokio_tungstenite::connect_async(url.as_str()).await?;
        let (ws_write, ws_read) = ws.split();

        let sink = ws_write.with(|text: String| async move {
            Ok::<_, Error>(tungstenite::Message::text(text))
        });
        let stream = ws_read.filter_map(|frame| async move {
            match frame {
                Ok(tungstenite::Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(tungstenite::Message::Binary(data)) => {
                    Some(Ok(String::from_utf8_lossy(&data).into_owned()))
                }
                Ok(_) => None,
                Err(e) => Some(Err(Error::from(e))),
            }
        });

        Ok(Link {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn https_origin_uses_wss() {
        let url = endpoint_url(&origin("https://wms.example.com"), "orders").unwrap();
        assert_eq!(url.as_str(), "wss://wms.example.com/ws/orders");
    }

    #[test]
    fn http_origin_uses_ws() {
        let url = endpoint_url(&origin("http://localhost:5173"), "dashboard").unwrap();
        assert_eq!(url.as_str(), "ws://localhost:5173/ws/dashboard");
    }

    #[test]
    fn origin_path_and_query_are_ignored() {
        let url =
            endpoint_url(&origin("https://wms.example.com/app/orders?tab=2#x"), "stock").unwrap();
        assert_eq!(url.as_str(), "wss://wms.example.com/ws/stock");
    }

    #[test]
    fn channel_name_is_a_single_segment() {
        let url = endpoint_url(&origin("http://127.0.0.1:8000"), "a/b c").unwrap();
        assert_eq!(url.path(), "/ws/a%2Fb%20c");
    }

    #[test]
    fn rejects_non_http_origins() {
        assert!(matches!(
            endpoint_url(&origin("ftp://files.example.com"), "orders"),
            Err(Error::InvalidOrigin(_))
        ));
        assert!(matches!(
            endpoint_url(&origin("file:///tmp/index.html"), "orders"),
            Err(Error::InvalidOrigin(_))
        ));
    }
}
