use std::sync::Arc;

use parking_lot::Mutex;
use sockbroker_core::protocol::packets::{
    ConnectPacket, DisconnectPacket, PublishPacket, SubscribePacket, UnsubscribePacket,
};
use sockbroker_core::{AuthCallback, PublishSink, Session};

/// Slot where a deferred auth callback is parked for the test to resolve.
pub type PendingAuth = Arc<Mutex<Option<AuthCallback>>>;

/// Session double: accepts (or parks) auth and, on SUBSCRIBE, replays a
/// greeting on the subscribed filter through its publish sink.
#[derive(Clone)]
pub struct TestSession {
    pub defer_auth: Option<PendingAuth>,
    pub shutdowns: Arc<Mutex<usize>>,
    client_id: String,
    sink: Option<PublishSink>,
}

impl TestSession {
    pub fn accepting() -> Self {
        Self {
            defer_auth: None,
            shutdowns: Arc::new(Mutex::new(0)),
            client_id: String::new(),
            sink: None,
        }
    }

    pub fn deferring(slot: PendingAuth) -> Self {
        Self {
            defer_auth: Some(slot),
            ..Self::accepting()
        }
    }
}

impl Session for TestSession {
    fn handle_connect(&mut self, packet: &ConnectPacket, auth: AuthCallback) {
        self.client_id = packet.client_id.clone();
        match &self.defer_auth {
            Some(slot) => *slot.lock() = Some(auth),
            None => auth.accept(),
        }
    }

    fn handle_publish(&mut self, _packet: &PublishPacket) {}

    fn handle_subscribe(&mut self, packet: &SubscribePacket) {
        if let (Some(sink), Some(subscription)) = (&self.sink, packet.subscriptions.first()) {
            sink.deliver(PublishPacket::new(
                subscription.topic_filter.clone(),
                &b"hello"[..],
            ));
        }
    }

    fn handle_unsubscribe(&mut self, _packet: &UnsubscribePacket) {}

    fn handle_disconnect(&mut self, _packet: &DisconnectPacket) {}

    fn set_publish_sink(&mut self, sink: PublishSink) {
        self.sink = Some(sink);
    }

    fn client_info(&self) -> String {
        format!("Session {}", self.client_id)
    }

    fn shutdown(&mut self) {
        *self.shutdowns.lock() += 1;
    }
}
