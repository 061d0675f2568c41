//! Socket transport seam
//!
//! The connection state machine talks to the server through `Connector`
//! and `Transport` so it can run against a real WebSocket or an in-memory
//! script. `WebSocketConnector` is the production implementation on top of
//! `tokio-tungstenite`.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, AUTHORIZATION, USER_AGENT};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::{ListenerError, Result};

/// User agent sent with every connection
pub const DEFAULT_USER_AGENT: &str = "EagleApi/Rust";

/// Close code for a graceful stop
pub const NORMAL_CLOSURE: u16 = 1000;

/// Everything needed to open the event socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub url: String,
    pub bearer_token: String,
    pub user_agent: String,
}

impl ConnectRequest {
    pub fn new(url: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            bearer_token: bearer_token.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// One inbound unit from the socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A text message carrying protocol JSON
    Text(String),
    /// Protocol-level ping/pong; no payload for the application
    Heartbeat,
    /// The peer closed the connection
    Closed { code: Option<u16>, reason: String },
}

/// Opens connections to the event socket
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, request: ConnectRequest) -> Result<Box<dyn Transport>>;
}

/// An open connection
///
/// Dropping a transport terminates it without a close handshake.
#[async_trait]
pub trait Transport: Send {
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Next inbound frame, `None` once the stream has ended
    ///
    /// Must be cancel-safe: it is polled inside `select!`.
    async fn next_frame(&mut self) -> Option<Result<Frame>>;

    /// Close with a handshake
    async fn close(&mut self, code: u16, reason: &str) -> Result<()>;
}

// ============================================================================
// tokio-tungstenite implementation
// ============================================================================

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// `Connector` backed by `tokio-tungstenite`
#[derive(Debug, Default, Clone)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

fn validate_ws_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ListenerError::Configuration(format!("Invalid event listener URL '{raw}': {e}")))?;

    match url.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(ListenerError::Configuration(format!(
                "Unsupported event listener URL scheme '{other}'; expected ws or wss"
            )))
        }
    }

    if url.host_str().is_none() {
        return Err(ListenerError::Configuration(
            "Event listener URL must include a host".to_string(),
        ));
    }

    Ok(url)
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, request: ConnectRequest) -> Result<Box<dyn Transport>> {
        let url = validate_ws_url(&request.url)?;

        let mut ws_request = url
            .as_str()
            .into_client_request()
            .map_err(|e| ListenerError::WebSocket(format!("Failed to build request: {e}")))?;

        let bearer = HeaderValue::from_str(&format!("Bearer {}", request.bearer_token))
            .map_err(|e| ListenerError::AuthFailed(format!("Invalid bearer token: {e}")))?;
        let agent = HeaderValue::from_str(&request.user_agent)
            .map_err(|e| ListenerError::Configuration(format!("Invalid user agent: {e}")))?;

        let headers = ws_request.headers_mut();
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(USER_AGENT, agent);

        let (socket, _response) = tokio_tungstenite::connect_async(ws_request)
            .await
            .map_err(|e| ListenerError::WebSocket(format!("Connection failed: {e}")))?;

        Ok(Box::new(WebSocketTransport { socket }))
    }
}

struct WebSocketTransport {
    socket: Socket,
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.socket
            .send(Message::Text(text))
            .await
            .map_err(|e| ListenerError::WebSocket(format!("Send failed: {e}")))
    }

    async fn next_frame(&mut self) -> Option<Result<Frame>> {
        let message = match self.socket.next().await? {
            Ok(message) => message,
            Err(e) => return Some(Err(ListenerError::WebSocket(e.to_string()))),
        };

        let frame = match message {
            Message::Text(text) => Frame::Text(text),
            Message::Binary(bytes) => match String::from_utf8(bytes) {
                Ok(text) => Frame::Text(text),
                Err(_) => {
                    return Some(Err(ListenerError::WebSocket(
                        "Received non UTF-8 binary frame".to_string(),
                    )))
                }
            },
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Frame::Heartbeat,
            Message::Close(frame) => match frame {
                Some(frame) => Frame::Closed {
                    code: Some(frame.code.into()),
                    reason: frame.reason.into_owned(),
                },
                None => Frame::Closed {
                    code: None,
                    reason: String::new(),
                },
            },
        };

        Some(Ok(frame))
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        };

        self.socket
            .close(Some(frame))
            .await
            .map_err(|e| ListenerError::WebSocket(format!("Close failed: {e}")))
    }
}
