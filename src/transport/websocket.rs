//! WebSocket connection backed by tokio-tungstenite.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use super::{Connection, Connector, ReadyState, Transport, TransportEvent};
use crate::{Error, Result};

/// How long to drain the socket after sending a close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens WebSocket connections on the current tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// Create a connector.
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WebSocketConnector {
    fn connect(&self, endpoint: &Url, capacity: usize) -> Transport {
        let (events_tx, events_rx) = mpsc::channel(capacity.max(1));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let ready = Arc::new(AtomicU8::new(ReadyState::Connecting as u8));

        let task = tokio::spawn(run_socket(
            endpoint.to_string(),
            Arc::clone(&ready),
            outbound_rx,
            events_tx,
        ));

        Transport {
            connection: Box::new(WebSocketConnection {
                ready,
                outbound: outbound_tx,
                task,
            }),
            events: events_rx,
        }
    }
}

enum Outbound {
    Text(String),
    Close,
}

/// Handle to a WebSocket driven by a background task.
///
/// Dropping the handle while still connecting aborts the handshake; dropping
/// it once open closes the socket gracefully.
pub struct WebSocketConnection {
    ready: Arc<AtomicU8>,
    outbound: mpsc::UnboundedSender<Outbound>,
    task: JoinHandle<()>,
}

impl WebSocketConnection {
    fn set_ready(&self, state: ReadyState) {
        self.ready.store(state as u8, Ordering::SeqCst);
    }
}

impl Connection for WebSocketConnection {
    fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.ready.load(Ordering::SeqCst))
    }

    fn send(&mut self, text: String) -> Result<()> {
        if self.ready_state() != ReadyState::Open {
            return Err(Error::NotOpen);
        }
        self.outbound
            .send(Outbound::Text(text))
            .map_err(|_| Error::Transport("socket task has exited".into()))
    }

    fn close(&mut self) {
        match self.ready_state() {
            ReadyState::Connecting => {
                self.task.abort();
                self.set_ready(ReadyState::Closed);
            }
            ReadyState::Open => {
                self.set_ready(ReadyState::Closing);
                let _ = self.outbound.send(Outbound::Close);
            }
            ReadyState::Closing | ReadyState::Closed => {}
        }
    }
}

impl Drop for WebSocketConnection {
    fn drop(&mut self) {
        if self.ready_state() == ReadyState::Connecting {
            self.task.abort();
        }
        // Once open, dropping `outbound` ends the task's command stream and it
        // closes the socket on its own.
    }
}

fn store(ready: &AtomicU8, state: ReadyState) {
    ready.store(state as u8, Ordering::SeqCst);
}

/// Background task owning the socket.
async fn run_socket(
    endpoint: String,
    ready: Arc<AtomicU8>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::Sender<TransportEvent>,
) {
    let mut stream = match connect_async(endpoint.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            store(&ready, ReadyState::Closed);
            let _ = events.send(TransportEvent::Error(e.to_string())).await;
            let _ = events.send(TransportEvent::Closed).await;
            return;
        }
    };

    store(&ready, ReadyState::Open);
    if events.send(TransportEvent::Opened).await.is_err() {
        tracing::debug!("event receiver gone before open was reported, closing socket");
        store(&ready, ReadyState::Closing);
        if let Err(e) = stream.close(None).await {
            tracing::debug!(error = %e, "close handshake failed");
        }
        store(&ready, ReadyState::Closed);
        return;
    }

    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        let _ = events.send(TransportEvent::Error(e.to_string())).await;
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    store(&ready, ReadyState::Closing);
                    close_gracefully(&mut sink, &mut source).await;
                    break;
                }
            },
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if events.send(TransportEvent::Message(text)).await.is_err() {
                        tracing::debug!("event receiver gone, closing socket");
                        store(&ready, ReadyState::Closing);
                        close_gracefully(&mut sink, &mut source).await;
                        break;
                    }
                }
                Some(Ok(Message::Binary(bytes))) => {
                    tracing::debug!(len = bytes.len(), "dropping binary frame");
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(?frame, "peer closed connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let _ = events.send(TransportEvent::Error(e.to_string())).await;
                    break;
                }
                None => break,
            },
        }
    }

    store(&ready, ReadyState::Closed);
    let _ = events.send(TransportEvent::Closed).await;
}

/// Send a close frame, then drain until the peer answers or the grace
/// period ends. Frames read here are never delivered.
async fn close_gracefully(
    sink: &mut SplitSink<Socket, Message>,
    source: &mut SplitStream<Socket>,
) {
    if let Err(e) = sink.close().await {
        tracing::debug!(error = %e, "close handshake failed");
    }
    let _ = tokio::time::timeout(CLOSE_GRACE, async {
        while let Some(Ok(_)) = source.next().await {}
    })
    .await;
}
