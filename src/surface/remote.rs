//! WebSocket hub for browser page agents.
//!
//! A page agent runs inside a chat tab, connects to the hub on loopback and
//! announces itself with `{"type":"hello","surface":"claude"}`. From then on
//! the hub sends correlated [`PageCommand`]s and the agent answers each with
//! a `reply` carrying the same id.
//!
//! One connection per surface kind is live at a time; a newer connection for
//! the same kind replaces the older one, whose socket is then closed by the
//! hub. A closed socket removes the surface
//! and fails every operation still waiting on it with
//! [`PageError::Disconnected`].

use super::page::{Page, PageError, PageResult};
use super::{SurfaceDirectory, SurfaceKind};
use crate::config::SurfacesConfig;
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use autobridge_dom::Locator;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_tungstenite::tungstenite::Message;

// ---------------------------------------------------------------------------
// Wire protocol
// ---------------------------------------------------------------------------

/// Operation requested from a page agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PageOp {
    Snapshot,
    Focus { target: Locator },
    Clear { target: Locator },
    Paste { target: Locator, text: String },
    InsertAtSelection { target: Locator, text: String },
    Click { target: Locator },
}

impl PageOp {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot",
            Self::Focus { .. } => "focus",
            Self::Clear { .. } => "clear",
            Self::Paste { .. } => "paste",
            Self::InsertAtSelection { .. } => "insert_at_selection",
            Self::Click { .. } => "click",
        }
    }
}

/// Hub -> agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCommand {
    pub id: String,
    #[serde(flatten)]
    pub op: PageOp,
}

/// Agent -> hub answer to one [`PageCommand`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageReply {
    pub id: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything an agent may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentMessage {
    Hello { surface: SurfaceKind },
    Reply(PageReply),
}

// ---------------------------------------------------------------------------
// RemotePage
// ---------------------------------------------------------------------------

/// A [`Page`] backed by one agent connection.
pub struct RemotePage {
    kind: SurfaceKind,
    outbound: mpsc::UnboundedSender<String>,
    pending: Mutex<HashMap<String, oneshot::Sender<PageReply>>>,
    closed: AtomicBool,
    cancel: CancellationToken,
    op_timeout: Duration,
}

impl RemotePage {
    fn new(kind: SurfaceKind, outbound: mpsc::UnboundedSender<String>, op_timeout: Duration) -> Self {
        Self {
            kind,
            outbound,
            pending: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            op_timeout,
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, HashMap<String, oneshot::Sender<PageReply>>> {
        match self.pending.lock() {
            Ok(p) => p,
            Err(p) => p.into_inner(),
        }
    }

    async fn call(&self, op: PageOp) -> PageResult<PageReply> {
        if self.is_closed() {
            return Err(PageError::Disconnected);
        }
        let name = op.name();
        let id = uuid::Uuid::new_v4().to_string();
        let json = serde_json::to_string(&PageCommand { id: id.clone(), op }).map_err(|e| {
            PageError::Rejected {
                op: name,
                reason: format!("unencodable command: {e}"),
            }
        })?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending().insert(id.clone(), reply_tx);
        if self.outbound.send(json).is_err() {
            self.pending().remove(&id);
            return Err(PageError::Disconnected);
        }

        match tokio::time::timeout(self.op_timeout, reply_rx).await {
            Ok(Ok(reply)) if reply.ok => Ok(reply),
            Ok(Ok(reply)) => Err(PageError::Rejected {
                op: name,
                reason: reply.error.unwrap_or_else(|| "unspecified".to_owned()),
            }),
            Ok(Err(_)) => Err(PageError::Disconnected),
            Err(_) => {
                self.pending().remove(&id);
                tracing::warn!(surface = %self.kind, op = name, "page operation timed out");
                Err(PageError::TimedOut { op: name })
            }
        }
    }

    fn resolve(&self, reply: PageReply) {
        match self.pending().remove(&reply.id) {
            Some(tx) => {
                let _ = tx.send(reply);
            }
            None => {
                tracing::debug!(surface = %self.kind, id = %reply.id, "reply for unknown or expired command");
            }
        }
    }

    /// Mark closed, fail every waiting operation and stop the connection task.
    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.pending().clear();
        self.cancel.cancel();
    }
}

#[async_trait]
impl Page for RemotePage {
    fn surface(&self) -> SurfaceKind {
        self.kind
    }

    async fn snapshot(&self) -> PageResult<String> {
        let reply = self.call(PageOp::Snapshot).await?;
        reply.html.ok_or(PageError::Rejected {
            op: "snapshot",
            reason: "reply carried no html".to_owned(),
        })
    }

    async fn focus(&self, target: &Locator) -> PageResult<()> {
        self.call(PageOp::Focus {
            target: target.clone(),
        })
        .await
        .map(drop)
    }

    async fn clear(&self, target: &Locator) -> PageResult<()> {
        self.call(PageOp::Clear {
            target: target.clone(),
        })
        .await
        .map(drop)
    }

    async fn paste(&self, target: &Locator, text: &str) -> PageResult<()> {
        self.call(PageOp::Paste {
            target: target.clone(),
            text: text.to_owned(),
        })
        .await
        .map(drop)
    }

    async fn insert_at_selection(&self, target: &Locator, text: &str) -> PageResult<()> {
        self.call(PageOp::InsertAtSelection {
            target: target.clone(),
            text: text.to_owned(),
        })
        .await
        .map(drop)
    }

    async fn click(&self, target: &Locator) -> PageResult<()> {
        self.call(PageOp::Click {
            target: target.clone(),
        })
        .await
        .map(drop)
    }
}

// ---------------------------------------------------------------------------
// SurfaceHub
// ---------------------------------------------------------------------------

/// Accepts page-agent connections and exposes them as a [`SurfaceDirectory`].
pub struct SurfaceHub {
    sessions: Mutex<HashMap<SurfaceKind, Arc<RemotePage>>>,
    op_timeout: Duration,
    handshake_timeout: Duration,
}

impl SurfaceHub {
    #[must_use]
    pub fn new(config: &SurfacesConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            op_timeout: Duration::from_millis(config.op_timeout_ms),
            handshake_timeout: Duration::from_millis(config.handshake_timeout_ms),
        }
    }

    /// Bind `addr` and spawn the accept loop.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the address cannot be bound.
    pub async fn listen(self: &Arc<Self>, addr: &str) -> Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(addr).await?;
        let local = listener.local_addr()?;
        tracing::info!(addr = %local, "surface hub listening");
        let hub = Arc::clone(self);
        Ok((local, tokio::spawn(hub.accept_loop(listener))))
    }

    fn sessions(&self) -> std::sync::MutexGuard<'_, HashMap<SurfaceKind, Arc<RemotePage>>> {
        match self.sessions.lock() {
            Ok(s) => s,
            Err(p) => p.into_inner(),
        }
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let hub = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(e) = hub.handle_connection(stream, peer).await {
                            tracing::warn!(%peer, error = %e, "page agent connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to accept page agent connection");
                }
            }
        }
    }

    async fn handle_connection(&self, stream: TcpStream, peer: SocketAddr) -> Result<()> {
        let ws = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| BridgeError::Surface(format!("websocket handshake with {peer}: {e}")))?;
        let (mut write, mut read) = ws.split();

        let kind = match tokio::time::timeout(self.handshake_timeout, read.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => match serde_json::from_str(&text)? {
                AgentMessage::Hello { surface } => surface,
                AgentMessage::Reply(_) => {
                    return Err(BridgeError::Surface(format!(
                        "{peer} sent a reply before hello"
                    )));
                }
            },
            Ok(_) => {
                return Err(BridgeError::Surface(format!(
                    "{peer} closed or sent a non-text frame before hello"
                )));
            }
            Err(_) => {
                return Err(BridgeError::Surface(format!("{peer} sent no hello in time")));
            }
        };

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
        let page = Arc::new(RemotePage::new(kind, outbound_tx, self.op_timeout));
        let previous = self.sessions().insert(kind, Arc::clone(&page));
        if let Some(previous) = previous {
            tracing::info!(surface = %kind, "replacing existing page agent");
            previous.close();
        }
        tracing::info!(surface = %kind, %peer, "page agent connected");

        loop {
            tokio::select! {
                _ = page.cancel.cancelled() => {
                    tracing::debug!(surface = %kind, %peer, "closing replaced page agent");
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => match serde_json::from_str::<AgentMessage>(&text) {
                            Ok(AgentMessage::Reply(reply)) => page.resolve(reply),
                            Ok(AgentMessage::Hello { surface }) => {
                                tracing::warn!(surface = %kind, announced = %surface, "ignoring repeated hello");
                            }
                            Err(e) => {
                                tracing::warn!(surface = %kind, error = %e, "unparseable agent message");
                            }
                        },
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(e)) => {
                            tracing::debug!(surface = %kind, error = %e, "page agent read error");
                            break;
                        }
                        _ => {}
                    }
                }
                Some(json) = outbound_rx.recv() => {
                    if let Err(e) = write.send(Message::Text(json)).await {
                        tracing::debug!(surface = %kind, error = %e, "page agent write error");
                        break;
                    }
                }
            }
        }

        page.close();
        {
            let mut sessions = self.sessions();
            if sessions.get(&kind).is_some_and(|p| Arc::ptr_eq(p, &page)) {
                sessions.remove(&kind);
            }
        }
        tracing::info!(surface = %kind, %peer, "page agent disconnected");
        Ok(())
    }
}

#[async_trait]
impl SurfaceDirectory for SurfaceHub {
    async fn page(&self, kind: SurfaceKind) -> Option<Arc<dyn Page>> {
        let page = self.sessions().get(&kind).cloned()?;
        if page.is_closed() {
            return None;
        }
        Some(page as Arc<dyn Page>)
    }
}
