//! The broker-side collaborator the engine hands packets to.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use log::warn;

use crate::protocol::packets::{
    ConnectPacket, DisconnectPacket, PublishPacket, SubscribePacket, UnsubscribePacket,
};
use crate::transport::PublishSink;

/// Broker-side state for one client: subscriptions, in-flight messages, the
/// will, and whatever persistence the broker provides.
///
/// The engine calls every method from the connection's own context. Only
/// authentication is asynchronous: `handle_connect` may keep the
/// [`AuthCallback`] and resolve it later, from any thread.
pub trait Session {
    fn handle_connect(&mut self, packet: &ConnectPacket, auth: AuthCallback);

    /// Route the message to subscribers and honour its retain flag.
    fn handle_publish(&mut self, packet: &PublishPacket);

    /// Install the subscriptions. Retained-message replay is done here too,
    /// through the publish sink.
    fn handle_subscribe(&mut self, packet: &SubscribePacket);

    fn handle_unsubscribe(&mut self, packet: &UnsubscribePacket);

    /// Clean disconnect: suppress the will, then clean or persist the session
    /// according to its clean-session flag.
    fn handle_disconnect(&mut self, packet: &DisconnectPacket);

    /// Where publishes for this subscriber are delivered.
    fn set_publish_sink(&mut self, sink: PublishSink);

    /// Short description used as the prefix of every log line.
    fn client_info(&self) -> String;

    fn shutdown(&mut self);
}

/// Creates one [`Session`] per accepted CONNECT.
pub trait SessionFactory {
    type Session: Session;

    fn create_session(&mut self) -> Self::Session;
}

impl<S, F> SessionFactory for F
where
    S: Session,
    F: FnMut() -> S,
{
    type Session = S;

    fn create_session(&mut self) -> S {
        self()
    }
}

/// Called whenever an auth verdict becomes available.
pub type AuthWaker = Arc<dyn Fn() + Send + Sync>;

const PENDING: u8 = 0;
const ACCEPTED: u8 = 1;
const REJECTED: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Pending,
    Accepted,
    Rejected,
}

/// Shared slot between an [`AuthCallback`] and the engine waiting on it.
pub(crate) struct AuthVerdict {
    state: AtomicU8,
    waker: Option<AuthWaker>,
}

impl AuthVerdict {
    pub(crate) fn new(waker: Option<AuthWaker>) -> Arc<Self> {
        Arc::new(Self {
            state: AtomicU8::new(PENDING),
            waker,
        })
    }

    pub(crate) fn outcome(&self) -> AuthOutcome {
        match self.state.load(Ordering::Acquire) {
            ACCEPTED => AuthOutcome::Accepted,
            REJECTED => AuthOutcome::Rejected,
            _ => AuthOutcome::Pending,
        }
    }

    fn resolve(&self, accepted: bool) {
        let value = if accepted { ACCEPTED } else { REJECTED };
        if self
            .state
            .compare_exchange(PENDING, value, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            if let Some(waker) = &self.waker {
                waker();
            }
        }
    }
}

impl core::fmt::Debug for AuthVerdict {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthVerdict")
            .field("outcome", &self.outcome())
            .finish()
    }
}

/// One-shot authentication verdict for a CONNECT.
///
/// Consumed by [`accept`](Self::accept), [`reject`](Self::reject) or
/// [`complete`](Self::complete). Dropping it unresolved rejects the client.
#[derive(Debug)]
pub struct AuthCallback {
    verdict: Arc<AuthVerdict>,
    completed: bool,
}

impl AuthCallback {
    pub(crate) fn new(verdict: Arc<AuthVerdict>) -> Self {
        Self {
            verdict,
            completed: false,
        }
    }

    pub fn accept(self) {
        self.complete(true);
    }

    pub fn reject(self) {
        self.complete(false);
    }

    pub fn complete(mut self, accepted: bool) {
        self.completed = true;
        self.verdict.resolve(accepted);
    }
}

impl Drop for AuthCallback {
    fn drop(&mut self) {
        if !self.completed {
            warn!("Auth callback dropped without a verdict, rejecting client");
            self.verdict.resolve(false);
        }
    }
}
