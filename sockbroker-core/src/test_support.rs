//! Doubles shared by the unit tests.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::protocol::packets::{
    ConnectPacket, DisconnectPacket, PublishPacket, SubscribePacket, UnsubscribePacket,
};
use crate::session::{AuthCallback, Session};
use crate::transport::{PublishSink, Transport};

#[derive(Debug, Default)]
pub struct Record {
    pub sent: Vec<Bytes>,
    pub close_calls: usize,
}

pub struct RecordingTransport {
    record: Arc<Mutex<Record>>,
}

impl RecordingTransport {
    pub fn new() -> (Self, Arc<Mutex<Record>>) {
        let record = Arc::new(Mutex::new(Record::default()));
        (
            Self {
                record: record.clone(),
            },
            record,
        )
    }
}

impl Transport for RecordingTransport {
    fn send_to_client(&mut self, frame: Bytes) {
        self.record.lock().sent.push(frame);
    }

    fn close_connection(&mut self) {
        self.record.lock().close_calls += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Accept,
    Reject,
    /// Park the callback for the test to resolve
    Defer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCall {
    SetPublishSink,
    Connect(ConnectPacket),
    Publish(PublishPacket),
    Subscribe(SubscribePacket),
    Unsubscribe(UnsubscribePacket),
    Disconnect,
    Shutdown,
}

pub struct FakeSession {
    mode: AuthMode,
    calls: Arc<Mutex<Vec<SessionCall>>>,
    pending_auth: Arc<Mutex<Option<AuthCallback>>>,
    client_id: Option<String>,
    sink: Option<PublishSink>,
}

impl FakeSession {
    pub fn new(
        mode: AuthMode,
        calls: Arc<Mutex<Vec<SessionCall>>>,
        pending_auth: Arc<Mutex<Option<AuthCallback>>>,
    ) -> Self {
        Self {
            mode,
            calls,
            pending_auth,
            client_id: None,
            sink: None,
        }
    }
}

impl Session for FakeSession {
    fn handle_connect(&mut self, packet: &ConnectPacket, auth: AuthCallback) {
        self.client_id = Some(packet.client_id.clone());
        self.calls.lock().push(SessionCall::Connect(packet.clone()));
        match self.mode {
            AuthMode::Accept => auth.accept(),
            AuthMode::Reject => auth.reject(),
            AuthMode::Defer => *self.pending_auth.lock() = Some(auth),
        }
    }

    fn handle_publish(&mut self, packet: &PublishPacket) {
        self.calls.lock().push(SessionCall::Publish(packet.clone()));
    }

    fn handle_subscribe(&mut self, packet: &SubscribePacket) {
        self.calls.lock().push(SessionCall::Subscribe(packet.clone()));
    }

    fn handle_unsubscribe(&mut self, packet: &UnsubscribePacket) {
        self.calls
            .lock()
            .push(SessionCall::Unsubscribe(packet.clone()));
    }

    fn handle_disconnect(&mut self, _packet: &DisconnectPacket) {
        self.calls.lock().push(SessionCall::Disconnect);
    }

    fn set_publish_sink(&mut self, sink: PublishSink) {
        self.sink = Some(sink);
        self.calls.lock().push(SessionCall::SetPublishSink);
    }

    fn client_info(&self) -> String {
        format!("Session {}", self.client_id.as_deref().unwrap_or("n/a"))
    }

    fn shutdown(&mut self) {
        self.sink = None;
        self.calls.lock().push(SessionCall::Shutdown);
    }
}
