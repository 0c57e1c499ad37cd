//! Test utilities for agentstream integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tokio::sync::mpsc;
use url::Url;

use agentstream::{Connection, Connector, ReadyState, Transport, TransportEvent};
use agentstream::{Error, Result};

/// What one mock connection has seen.
#[derive(Default)]
pub struct ConnectionRecord {
    sent: Mutex<Vec<String>>,
    closes: AtomicUsize,
    ready: AtomicU8,
}

impl ConnectionRecord {
    /// Frames sent on the connection, parsed as JSON.
    pub fn sent(&self) -> Vec<Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|s| serde_json::from_str(s).expect("sent frames are JSON"))
            .collect()
    }

    /// Number of `close()` calls that reached an open connection.
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn ready_state(&self) -> ReadyState {
        match self.ready.load(Ordering::SeqCst) {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }

    fn set(&self, state: ReadyState) {
        self.ready.store(state as u8, Ordering::SeqCst);
    }
}

/// A connection whose state is driven by the test through [`MockPeer`].
pub struct MockConnection {
    record: Arc<ConnectionRecord>,
}

impl Connection for MockConnection {
    fn ready_state(&self) -> ReadyState {
        self.record.ready_state()
    }

    fn send(&mut self, text: String) -> Result<()> {
        if self.ready_state() != ReadyState::Open {
            return Err(Error::NotOpen);
        }
        self.record.sent.lock().unwrap().push(text);
        Ok(())
    }

    fn close(&mut self) {
        if self.ready_state() == ReadyState::Open {
            self.record.closes.fetch_add(1, Ordering::SeqCst);
            self.record.set(ReadyState::Closing);
        }
    }
}

/// The test's side of one mock connection.
#[derive(Clone)]
pub struct MockPeer {
    pub endpoint: Url,
    pub record: Arc<ConnectionRecord>,
    events: mpsc::Sender<TransportEvent>,
}

impl MockPeer {
    /// Complete the handshake.
    pub async fn open(&self) {
        self.record.set(ReadyState::Open);
        self.emit(TransportEvent::Opened).await;
    }

    /// Deliver a text frame.
    pub async fn message(&self, raw: impl Into<String>) {
        self.emit(TransportEvent::Message(raw.into())).await;
    }

    /// Deliver every frame of a scenario in order.
    pub async fn play(&self, frames: &[String]) {
        for frame in frames {
            self.message(frame.clone()).await;
        }
    }

    /// Report a transport failure.
    pub async fn error(&self, reason: &str) {
        self.emit(TransportEvent::Error(reason.to_string())).await;
    }

    /// Report that the connection is gone.
    pub async fn closed(&self) {
        self.record.set(ReadyState::Closed);
        self.emit(TransportEvent::Closed).await;
    }

    async fn emit(&self, event: TransportEvent) {
        // The driver may already have finished; that is what some tests check.
        let _ = self.events.send(event).await;
    }
}

/// A connector that hands each new connection's peer to the test.
pub struct MockConnector {
    peers: Mutex<Vec<MockPeer>>,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            peers: Mutex::new(Vec::new()),
        })
    }

    /// Number of connections opened so far.
    pub fn connects(&self) -> usize {
        self.peers.lock().unwrap().len()
    }

    /// Peer of the `index`th connection.
    pub fn peer(&self, index: usize) -> MockPeer {
        self.peers.lock().unwrap()[index].clone()
    }

    /// Peer of the most recent connection.
    pub fn last_peer(&self) -> MockPeer {
        self.peers
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no connection opened")
    }
}

impl Connector for MockConnector {
    fn connect(&self, endpoint: &Url, capacity: usize) -> Transport {
        let (tx, rx) = mpsc::channel(capacity);
        let record = Arc::new(ConnectionRecord::default());
        self.peers.lock().unwrap().push(MockPeer {
            endpoint: endpoint.clone(),
            record: Arc::clone(&record),
            events: tx,
        });
        Transport {
            connection: Box::new(MockConnection { record }),
            events: rx,
        }
    }
}

/// Builder for realistic inbound message sequences.
pub struct ScenarioBuilder {
    frames: Vec<String>,
}

impl ScenarioBuilder {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// An agent progress event.
    pub fn agent(mut self, agent: &str, text: &str) -> Self {
        self.frames
            .push(json!({"type": "agent", "agent": agent, "text": text}).to_string());
        self
    }

    /// A backend-side failure report.
    pub fn error(mut self, text: &str) -> Self {
        self.frames
            .push(json!({"type": "error", "text": text}).to_string());
        self
    }

    /// A final event shaped the way the backend sends it.
    pub fn final_answer(mut self, answer: &str, agents_used: &[&str]) -> Self {
        self.frames.push(
            json!({"type": "final", "answer": answer, "agents_used": agents_used}).to_string(),
        );
        self
    }

    /// Any raw frame, valid or not.
    pub fn raw(mut self, frame: &str) -> Self {
        self.frames.push(frame.to_string());
        self
    }

    pub fn build(self) -> Vec<String> {
        self.frames
    }
}

impl Default for ScenarioBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Collects every payload handed to the completion callback.
#[derive(Clone, Default)]
pub struct FinalSink {
    payloads: Arc<Mutex<Vec<Value>>>,
}

impl FinalSink {
    pub fn callback(&self) -> impl Fn(Value) + Send + Sync + 'static {
        let payloads = Arc::clone(&self.payloads);
        move |payload| payloads.lock().unwrap().push(payload)
    }

    pub fn payloads(&self) -> Vec<Value> {
        self.payloads.lock().unwrap().clone()
    }
}
