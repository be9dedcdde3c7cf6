use std::sync::Arc;

use bytes::Bytes;
use log::{trace, warn};
use sockbroker_core::Transport;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Notify;

/// Work for the socket writer, in the order the engine produced it.
#[derive(Debug)]
pub(crate) enum Outgoing {
    Frame(Bytes),
    Close,
}

/// Engine-side transport that forwards frames to the connection task.
///
/// The queue is bounded and the engine never blocks on it. When it is full
/// the frame is dropped and `overflowed` is notified so the connection task
/// can hang up on the slow reader.
pub(crate) struct ChannelTransport {
    tx: mpsc::Sender<Outgoing>,
    overflowed: Arc<Notify>,
}

impl ChannelTransport {
    pub(crate) fn new(capacity: usize) -> (Self, mpsc::Receiver<Outgoing>, Arc<Notify>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let overflowed = Arc::new(Notify::new());
        (
            Self {
                tx,
                overflowed: overflowed.clone(),
            },
            rx,
            overflowed,
        )
    }

    fn push(&mut self, outgoing: Outgoing) {
        match self.tx.try_send(outgoing) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Outgoing queue full, dropping connection");
                self.overflowed.notify_one();
            }
            Err(TrySendError::Closed(_)) => trace!("Connection task gone, dropping frame"),
        }
    }
}

impl Transport for ChannelTransport {
    fn send_to_client(&mut self, frame: Bytes) {
        self.push(Outgoing::Frame(frame));
    }

    fn close_connection(&mut self) {
        self.push(Outgoing::Close);
    }
}
