//! # Local Test Servers
//!
//! Small stand-ins for the traffic server, bound to `127.0.0.1:0` so the
//! end-to-end tests in `tests/` never leave the machine.
//!
//! - [`ScriptedFeedServer`]: a WebSocket server that plays one [`Session`] per
//!   incoming connection.
//! - [`MockHttpServer`]: a minimal HTTP/1.1 server answering canned JSON by path,
//!   optionally after a delay.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::SinkExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::protocol::Message};

/// What the feed server does with one incoming connection.
#[derive(Debug, Clone)]
pub enum Session {
    /// Drop the TCP connection before the WebSocket handshake.
    Refuse,
    /// Send the payloads, then close the socket.
    SendAndClose(Vec<String>),
    /// Send the payloads and keep the socket open.
    SendAndHold(Vec<String>),
    /// Send the payloads as binary frames and keep the socket open.
    SendBinaryAndHold(Vec<Vec<u8>>),
}

pub struct ScriptedFeedServer {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl ScriptedFeedServer {
    /// Starts the server. Connections beyond the script are held open silently.
    pub async fn start(script: Vec<Session>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let task = tokio::spawn(async move {
            let mut script = script.into_iter();
            while let Ok((stream, _)) = listener.accept().await {
                let session = script.next().unwrap_or(Session::SendAndHold(Vec::new()));
                if matches!(session, Session::Refuse) {
                    drop(stream);
                    continue;
                }

                tokio::spawn(async move {
                    let mut ws = match accept_async(stream).await {
                        Ok(ws) => ws,
                        Err(e) => {
                            log::warn!("Feed server handshake failed: {}", e);
                            return;
                        }
                    };
                    let (frames, close): (Vec<Message>, bool) = match session {
                        Session::SendAndClose(payloads) => (payloads.into_iter().map(Message::text).collect(), true),
                        Session::SendAndHold(payloads) => (payloads.into_iter().map(Message::text).collect(), false),
                        Session::SendBinaryAndHold(payloads) => {
                            (payloads.into_iter().map(Message::binary).collect(), false)
                        }
                        Session::Refuse => return,
                    };
                    for frame in frames {
                        if ws.send(frame).await.is_err() {
                            return;
                        }
                    }
                    if close {
                        let _ = ws.close(None).await;
                    } else {
                        // Hold the socket until the client goes away
                        std::future::pending::<()>().await;
                    }
                });
            }
        });

        Ok(Self { addr, task })
    }

    /// `http://` base address pointing at this server.
    pub fn base_address(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for ScriptedFeedServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl CannedResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

pub struct MockHttpServer {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl MockHttpServer {
    /// Serves `routes` by exact request path; anything else is a 404. Every
    /// connection is handled on its own task, so delayed answers do not hold
    /// up others.
    pub async fn start(routes: HashMap<String, CannedResponse>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let routes = Arc::new(routes);

        let task = tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let routes = Arc::clone(&routes);
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let read = stream.read(&mut buf).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buf[..read]).into_owned();
                    let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();

                    let canned = routes.get(&path).cloned().unwrap_or(CannedResponse {
                        status: 404,
                        body: "not found".into(),
                        delay: Duration::ZERO,
                    });
                    tokio::time::sleep(canned.delay).await;

                    let response = format!(
                        "HTTP/1.1 {} X\r\nContent-Length: {}\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n{}",
                        canned.status,
                        canned.body.len(),
                        canned.body
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        Ok(Self { addr, task })
    }

    pub fn base_address(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for MockHttpServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// One feed message as the traffic server sends it.
pub fn location_json(id: &str, lat: f64, lon: f64, stop_id: Option<&str>) -> String {
    let mut message = serde_json::json!({ "id": id, "loc": [lat, lon] });
    if let Some(stop_id) = stop_id {
        message["stopId"] = serde_json::Value::from(stop_id);
    }
    message.to_string()
}
