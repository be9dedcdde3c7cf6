//! Outbound side of a connection

use std::sync::Arc;

use bytes::Bytes;
use log::{error, trace};
use parking_lot::Mutex;

use crate::error::ConnectionError;
use crate::protocol::packets::{Packet, PublishPacket};

/// What the engine needs from the socket (TCP or WebSocket) it runs on.
pub trait Transport: Send {
    /// Write one complete frame.
    fn send_to_client(&mut self, frame: Bytes);

    /// Force the connection closed.
    fn close_connection(&mut self);
}

struct LinkInner {
    transport: Box<dyn Transport>,
    open: bool,
}

/// Serialized access to a [`Transport`], shared by the engine's replies and
/// the Session's publish delivery.
///
/// Packets are encoded outside the lock and written whole inside it, so
/// frames from the two writers never interleave.
#[derive(Clone)]
pub struct ClientLink {
    inner: Arc<Mutex<LinkInner>>,
}

impl ClientLink {
    pub fn new<T: Transport + 'static>(transport: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LinkInner {
                transport: Box::new(transport),
                open: true,
            })),
        }
    }

    /// Encode and write a packet. Writes after close are silently dropped.
    pub fn send_packet(&self, packet: &Packet) -> Result<(), ConnectionError> {
        let frame = packet.encode().map_err(ConnectionError::EncodeFailed)?;
        let mut inner = self.inner.lock();
        if !inner.open {
            trace!("Link closed, dropping {}", packet.packet_type());
            return Ok(());
        }
        inner.transport.send_to_client(frame);
        Ok(())
    }

    /// Close the transport. Only the first call reaches it.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if inner.open {
            inner.open = false;
            inner.transport.close_connection();
        }
    }

    /// Stop writing without asking the transport to close; used when the
    /// transport is already going away.
    pub fn detach(&self) {
        self.inner.lock().open = false;
    }

    pub fn is_open(&self) -> bool {
        self.inner.lock().open
    }
}

impl core::fmt::Debug for ClientLink {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ClientLink")
            .field("open", &self.is_open())
            .finish()
    }
}

/// Handle a Session uses to push publishes to its client.
#[derive(Debug, Clone)]
pub struct PublishSink {
    link: ClientLink,
}

impl PublishSink {
    pub(crate) fn new(link: ClientLink) -> Self {
        Self { link }
    }

    pub fn deliver(&self, packet: PublishPacket) {
        if let Err(err) = self.link.send_packet(&Packet::Publish(packet)) {
            error!("Publish delivery dropped: {}", err);
        }
    }

    pub fn is_open(&self) -> bool {
        self.link.is_open()
    }
}
