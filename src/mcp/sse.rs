//! SSE transport for the MCP server.
//!
//! Implements the HTTP+SSE transport of the 2024-11-05 protocol generation:
//!
//! - `GET /sse` opens a `text/event-stream`. The first event is `endpoint`,
//!   whose data is the relative URI the client must POST its messages to,
//!   bound to this session. Every subsequent `message` event carries one
//!   server-to-client JSON-RPC message.
//! - `POST /messages?session_id=<id>` accepts one JSON-RPC message and
//!   replies `202 Accepted`; the response is delivered over the session's
//!   event stream. Unknown sessions get `404`.
//!
//! Each session owns an independent [`McpConnection`], so concurrent
//! clients negotiate their own lifecycles while sharing one read-only
//! [`ToolContext`]. Sessions are removed from the map when their event
//! stream is dropped; a client that disconnects leaves nothing behind.

use std::collections::HashMap;
use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use futures::{stream, Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::mcp::protocol::OutgoingMessage;
use crate::mcp::server::McpConnection;
use crate::tools::ToolContext;

/// Server-to-client messages queued per session before POSTs block.
const SESSION_CHANNEL_CAPACITY: usize = 32;

/// Interval between keep-alive comments on an idle stream.
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// One connected client session.
struct Session {
    /// Protocol state for this client.
    connection: AsyncMutex<McpConnection>,
    /// Sender feeding the session's event stream.
    tx: mpsc::Sender<OutgoingMessage>,
}

/// Shared state behind the SSE router.
#[derive(Clone)]
pub struct SseState {
    tools: Arc<ToolContext>,
    sessions: Arc<Mutex<HashMap<String, Arc<Session>>>>,
}

impl SseState {
    /// Creates the transport state around the shared tool context.
    #[must_use]
    pub fn new(tools: Arc<ToolContext>) -> Self {
        Self {
            tools,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of currently connected sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    fn insert(&self, session_id: String, session: Arc<Session>) {
        self.sessions.lock().unwrap().insert(session_id, session);
    }

    fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.lock().unwrap().get(session_id).cloned()
    }
}

/// Removes the session from the map when the client's stream goes away.
struct SessionGuard {
    sessions: Arc<Mutex<HashMap<String, Arc<Session>>>>,
    session_id: String,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.sessions.lock().unwrap().remove(&self.session_id);
        debug!(session_id = %self.session_id, "SSE session closed");
    }
}

/// Event stream that ties the session's lifetime to the client connection.
struct SessionStream<S> {
    inner: S,
    _guard: SessionGuard,
}

impl<S: Stream + Unpin> Stream for SessionStream<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().inner).poll_next(cx)
    }
}

/// Builds the SSE transport router.
#[must_use]
pub fn router(state: SseState) -> Router {
    Router::new()
        .route("/sse", get(open_session))
        .route("/messages", post(receive_message))
        .with_state(state)
}

/// `GET /sse`: registers a new session and opens its event stream.
async fn open_session(
    State(state): State<SseState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session_id = Uuid::new_v4().to_string();
    let (tx, rx) = mpsc::channel(SESSION_CHANNEL_CAPACITY);

    let session = Arc::new(Session {
        connection: AsyncMutex::new(McpConnection::new(Arc::clone(&state.tools))),
        tx,
    });
    state.insert(session_id.clone(), session);
    info!(
        session_id = %session_id,
        sessions = state.session_count(),
        "SSE session opened"
    );

    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("/messages?session_id={session_id}"));
    let guard = SessionGuard {
        sessions: Arc::clone(&state.sessions),
        session_id,
    };

    let events = stream::iter([Ok(endpoint)]).chain(ReceiverStream::new(rx).map(message_event));

    Sse::new(SessionStream {
        inner: events,
        _guard: guard,
    })
    .keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}

/// Renders one JSON-RPC message as a `message` event.
fn message_event(message: OutgoingMessage) -> Result<Event, Infallible> {
    Ok(Event::default().event("message").data(message.to_wire()))
}

/// Query parameters for `POST /messages`.
#[derive(Debug, Deserialize)]
struct MessagesQuery {
    session_id: String,
}

/// `POST /messages?session_id=`: routes one client message into its session.
///
/// The reply body is empty; whatever the connection produces (including
/// parse-error responses) is delivered over the session's event stream.
async fn receive_message(
    State(state): State<SseState>,
    Query(query): Query<MessagesQuery>,
    body: String,
) -> Response {
    let Some(session) = state.get(&query.session_id) else {
        warn!(session_id = %query.session_id, "message for unknown session");
        return (StatusCode::NOT_FOUND, "unknown session").into_response();
    };

    let reply = {
        let mut connection = session.connection.lock().await;
        connection.process_line(&body).await
    };

    if let Some(message) = reply {
        if session.tx.send(message).await.is_err() {
            // The stream dropped while we were processing.
            warn!(session_id = %query.session_id, "session stream closed before reply");
            return (StatusCode::NOT_FOUND, "session closed").into_response();
        }
    }

    StatusCode::ACCEPTED.into_response()
}

/// Serves the SSE transport on `addr` until a shutdown signal arrives.
///
/// # Errors
///
/// Returns an error if the listener cannot bind, signal registration
/// fails, or the server loop fails.
pub async fn run(tools: Arc<ToolContext>, addr: SocketAddr) -> io::Result<()> {
    let state = SseState::new(tools);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "SSE transport listening");

    let shutdown = super::shutdown_signal()?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
