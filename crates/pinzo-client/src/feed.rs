//! Change feed transports.
//!
//! A [`ChangeFeed`] carries [`ServerMessage`]s in and [`ClientMessage`]s out
//! for one session. [`WsFeed`] talks to a Pinzo server over WebSocket;
//! [`channel_feed`] gives an in-process pair for embedding and tests.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header, HeaderValue};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use pinzo_proto::{ClientMessage, ServerMessage};

use crate::config::ClientConfig;
use crate::error::Error;

/// Bidirectional frame transport for one session.
#[async_trait]
pub trait ChangeFeed: Send {
    /// Next server frame, or `None` once the feed has ended.
    ///
    /// Must be cancel safe: dropping the future loses no frame.
    async fn recv(&mut self) -> Result<Option<ServerMessage>, Error>;

    /// Send a frame to the server.
    async fn send(&mut self, message: ClientMessage) -> Result<(), Error>;

    /// Close the feed. Later calls are no-ops.
    async fn close(&mut self) -> Result<(), Error>;
}

/// WebSocket change feed.
pub struct WsFeed {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

impl WsFeed {
    /// Connect to the change feed at `config.url`.
    pub async fn connect(config: &ClientConfig) -> Result<Self, Error> {
        let mut request = config
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| Error::Connection(format!("invalid feed url {}: {}", config.url, e)))?;

        if let Some(credential) = &config.credential {
            let value = HeaderValue::from_str(&format!("Bearer {}", credential))
                .map_err(|e| Error::Connection(format!("invalid credential: {}", e)))?;
            request.headers_mut().insert(header::AUTHORIZATION, value);
        }

        let (stream, _response) =
            tokio::time::timeout(config.connect_timeout, tokio_tungstenite::connect_async(request))
                .await
                .map_err(|_| Error::Timeout)?
                .map_err(|e| {
                    Error::Connection(format!("failed to connect to {}: {}", config.url, e))
                })?;

        tracing::debug!(url = %config.url, "change feed connected");

        Ok(Self {
            stream,
            closed: false,
        })
    }
}

#[async_trait]
impl ChangeFeed for WsFeed {
    async fn recv(&mut self) -> Result<Option<ServerMessage>, Error> {
        if self.closed {
            return Ok(None);
        }

        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(ServerMessage::from_json(text.as_str())?));
                }
                Some(Ok(Message::Close(_))) | None => {
                    self.closed = true;
                    return Ok(None);
                }
                // Pings are answered by tungstenite itself.
                Some(Ok(_)) => continue,
                Some(Err(tungstenite::Error::ConnectionClosed)) => {
                    self.closed = true;
                    return Ok(None);
                }
                Some(Err(e)) => {
                    self.closed = true;
                    return Err(Error::Connection(e.to_string()));
                }
            }
        }
    }

    async fn send(&mut self, message: ClientMessage) -> Result<(), Error> {
        if self.closed {
            return Err(Error::Closed);
        }
        let text = message.to_json()?;
        self.stream
            .send(Message::text(text))
            .await
            .map_err(|e| Error::Connection(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), Error> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.stream.close(None).await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(Error::Connection(e.to_string())),
        }
    }
}

/// In-process change feed.
pub struct ChannelFeed {
    incoming: mpsc::UnboundedReceiver<ServerMessage>,
    outgoing: Option<mpsc::UnboundedSender<ClientMessage>>,
}

/// The server side of a [`ChannelFeed`].
pub struct FeedPeer {
    /// Frames delivered to the client.
    pub to_client: mpsc::UnboundedSender<ServerMessage>,
    /// Frames the client sent. Yields `None` once the client closed the feed.
    pub from_client: mpsc::UnboundedReceiver<ClientMessage>,
}

/// Create a connected in-process feed and its peer.
pub fn channel_feed() -> (ChannelFeed, FeedPeer) {
    let (to_client, incoming) = mpsc::unbounded_channel();
    let (outgoing, from_client) = mpsc::unbounded_channel();
    (
        ChannelFeed {
            incoming,
            outgoing: Some(outgoing),
        },
        FeedPeer {
            to_client,
            from_client,
        },
    )
}

#[async_trait]
impl ChangeFeed for ChannelFeed {
    async fn recv(&mut self) -> Result<Option<ServerMessage>, Error> {
        Ok(self.incoming.recv().await)
    }

    async fn send(&mut self, message: ClientMessage) -> Result<(), Error> {
        let outgoing = self.outgoing.as_ref().ok_or(Error::Closed)?;
        outgoing.send(message).map_err(|_| Error::Closed)
    }

    async fn close(&mut self) -> Result<(), Error> {
        self.outgoing = None;
        self.incoming.close();
        Ok(())
    }
}
