//! HTTP transport: one POST per command, NDJSON event stream back.
//!
//! The request body is one JSON message; the response body is one JSON
//! event per line, streamed as the server core produces them. The HTTP
//! status is always 200; protocol-level failures travel in-band as the
//! terminal `error` event, same as on every other transport.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Json;
use axum::Router;
use futures::StreamExt;
use missive_core::protocol::{Event, EventStream, Transport, TransportError};
use missive_core::Message;

use crate::server::Server;

/// Builds the router serving the command endpoint at `/`.
pub fn router(server: Arc<Server>) -> Router {
    Router::new()
        .route("/", post(handle_command))
        .with_state(server)
}

/// Streams one command's events as NDJSON.
async fn handle_command(
    State(server): State<Arc<Server>>,
    Json(message): Json<Message>,
) -> Response {
    let events = server.handle(message);
    let body = futures::stream::unfold(events, |mut events| async move {
        let event = events.recv().await?;
        let mut line = serde_json::to_string(&event).unwrap_or_else(|_| {
            // An event we produced always serializes; this keeps the
            // stream total rather than panicking mid-response.
            r#"{"type":"error","message":"unencodable event","status_code":500}"#.to_string()
        });
        line.push('\n');
        Some((Ok::<_, std::convert::Infallible>(line), events))
    });
    (
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(body),
    )
        .into_response()
}

/// Client side: posts the message and replays the response lines.
pub struct HttpTransport {
    url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport targeting a server URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, message: &Message) -> Result<EventStream, TransportError> {
        let response = self
            .client
            .post(&self.url)
            .json(message)
            .send()
            .await
            .map_err(|err| TransportError::Connection {
                reason: err.to_string(),
            })?;
        let body = response
            .text()
            .await
            .map_err(|err| TransportError::Connection {
                reason: err.to_string(),
            })?;

        let mut events = Vec::new();
        for line in body.lines().filter(|line| !line.trim().is_empty()) {
            let event: Event = serde_json::from_str(line)?;
            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                break;
            }
        }
        Ok(futures::stream::iter(events).boxed())
    }
}
