//! Per-connection MQTT protocol engine
//!
//! The engine owns no I/O. The owner feeds it bytes with [`on_bytes`], and
//! the engine answers through the [`Transport`] it was built with. Timers are
//! also the owner's job: it asks [`keep_alive_timeout`] how long the client
//! may stay quiet and calls [`on_keep_alive_timeout`] when that runs out.
//!
//! [`on_bytes`]: ConnectionEngine::on_bytes
//! [`keep_alive_timeout`]: ConnectionEngine::keep_alive_timeout
//! [`on_keep_alive_timeout`]: ConnectionEngine::on_keep_alive_timeout

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use log::{debug, error, info, trace, warn};

use crate::config::EngineConfig;
use crate::error::ConnectionError;
use crate::protocol::packets::{
    ConnAckPacket, ConnectPacket, ConnectReturnCode, Packet, PingRespPacket, PubAckPacket,
    PubCompPacket, PubRecPacket, PubRelPacket, PublishPacket, SubAckPacket, UnsubAckPacket,
};
use crate::protocol::{ProtocolError, QoS};
use crate::session::{AuthCallback, AuthOutcome, AuthVerdict, AuthWaker, Session, SessionFactory};
use crate::tokenizer::Tokenizer;
use crate::transport::{ClientLink, PublishSink, Transport};

const NO_SESSION_INFO: &str = "Session n/a";

/// Where a connection is in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Nothing but CONNECT is acceptable
    AwaitingConnect,
    /// CONNECT handed to the Session, verdict pending
    AwaitingAuth,
    /// CONNACK sent
    Connected,
    Closed,
}

#[derive(Debug)]
enum State {
    AwaitingConnect,
    AwaitingAuth {
        client_id: String,
        username: Option<String>,
        verdict: Arc<AuthVerdict>,
        backlog: VecDeque<Bytes>,
        backlog_bytes: usize,
    },
    Connected,
    Closed,
}

pub struct ConnectionEngine<F: SessionFactory> {
    config: EngineConfig,
    factory: F,
    tokenizer: Option<Tokenizer>,
    state: State,
    session: Option<F::Session>,
    link: ClientLink,
    auth_waker: Option<AuthWaker>,
    keep_alive_secs: u16,
    shut_down: bool,
}

impl<F: SessionFactory> ConnectionEngine<F> {
    pub fn new<T: Transport + 'static>(config: EngineConfig, transport: T, factory: F) -> Self {
        if let Err(err) = config.validate() {
            warn!("Engine config rejected by validation: {}", err);
        }
        let tokenizer = Tokenizer::new(config.max_packet_bytes);
        Self {
            config,
            factory,
            tokenizer: Some(tokenizer),
            state: State::AwaitingConnect,
            session: None,
            link: ClientLink::new(transport),
            auth_waker: None,
            keep_alive_secs: 0,
            shut_down: false,
        }
    }

    /// Register the function called when an auth verdict arrives. The owner
    /// should respond by calling [`poll_auth`](Self::poll_auth) on the
    /// connection's context.
    pub fn set_auth_waker(&mut self, waker: AuthWaker) {
        self.auth_waker = Some(waker);
    }

    pub fn state(&self) -> ConnectionState {
        match self.state {
            State::AwaitingConnect => ConnectionState::AwaitingConnect,
            State::AwaitingAuth { .. } => ConnectionState::AwaitingAuth,
            State::Connected => ConnectionState::Connected,
            State::Closed => ConnectionState::Closed,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    pub fn client_info(&self) -> String {
        self.session
            .as_ref()
            .map(|session| session.client_info())
            .unwrap_or_else(|| NO_SESSION_INFO.to_string())
    }

    /// A sink writing to this connection, the same one the Session receives.
    pub fn publish_sink(&self) -> PublishSink {
        PublishSink::new(self.link.clone())
    }

    /// How long the client may stay silent, `None` when it asked for no
    /// keep-alive or is not connected yet. Saturates at `Duration::MAX`.
    pub fn keep_alive_timeout(&self) -> Option<Duration> {
        if !matches!(self.state, State::Connected) || self.keep_alive_secs == 0 {
            return None;
        }
        let secs = f32::from(self.keep_alive_secs) * self.config.keep_alive_grace_factor;
        Some(Duration::try_from_secs_f32(secs).unwrap_or(Duration::MAX))
    }

    /// Feed raw bytes from the transport.
    pub fn on_bytes(&mut self, chunk: &[u8]) {
        if self.is_closed() {
            trace!("{}: connection closed, dropping {} bytes", self.client_info(), chunk.len());
            return;
        }
        let Some(mut tokenizer) = self.tokenizer.take() else {
            return;
        };

        let result = tokenizer.process(chunk, |frame| self.on_frame(frame, false));
        if let Err(err) = result {
            self.fail(ConnectionError::CorruptedFrame(err));
        }
        self.tokenizer = Some(tokenizer);
    }

    /// Handle one complete frame. A frame flagged `timed_out` is a partial
    /// frame the keep-alive watchdog gave up on and is only logged.
    pub fn on_frame(&mut self, frame: Bytes, timed_out: bool) {
        if timed_out {
            warn!(
                "{}: discarding {} bytes of an incomplete frame",
                self.client_info(),
                frame.len()
            );
            return;
        }

        if let State::AwaitingAuth {
            backlog,
            backlog_bytes,
            ..
        } = &mut self.state
        {
            *backlog_bytes += frame.len();
            if *backlog_bytes <= self.config.max_packet_bytes {
                backlog.push_back(frame);
                return;
            }
            let bytes = *backlog_bytes;
            self.fail(ConnectionError::BacklogOverflow { bytes });
            return;
        }
        if self.is_closed() {
            trace!("{}: connection closed, dropping frame", self.client_info());
            return;
        }

        match Packet::decode(&frame) {
            Ok(packet) => self.dispatch(packet),
            Err(ProtocolError::InvalidPacketType { packet_type }) => {
                if matches!(self.state, State::AwaitingConnect) {
                    warn!(
                        "{}: expected CONNECT, got reserved packet type {}",
                        self.client_info(),
                        packet_type
                    );
                    self.close();
                } else {
                    self.fail(ConnectionError::UnknownPacketType { packet_type });
                }
            }
            Err(err) => self.fail(ConnectionError::MalformedPacket(err)),
        }
    }

    /// Encode and write one packet to the client.
    pub fn send_packet(&self, packet: &Packet) {
        debug!("{}: Sending {}", self.client_info(), packet.packet_type());
        if let Err(err) = self.link.send_packet(packet) {
            self.report(&err);
        }
    }

    /// Apply the auth verdict if it has arrived.
    pub fn poll_auth(&mut self) {
        let outcome = match &self.state {
            State::AwaitingAuth { verdict, .. } => verdict.outcome(),
            _ => return,
        };
        if outcome == AuthOutcome::Pending {
            return;
        }

        let previous = core::mem::replace(&mut self.state, State::Connected);
        let State::AwaitingAuth {
            client_id,
            username,
            mut backlog,
            ..
        } = previous
        else {
            return;
        };

        if outcome == AuthOutcome::Rejected {
            self.fail(ConnectionError::AuthFailed {
                client_id,
                username,
            });
            return;
        }

        info!("{}: connected", self.client_info());
        self.send_packet(&Packet::ConnAck(ConnAckPacket::accepted()));
        while let Some(frame) = backlog.pop_front() {
            self.on_frame(frame, false);
        }
    }

    /// The keep-alive (or connect) timer ran out.
    pub fn on_keep_alive_timeout(&mut self) {
        if self.is_closed() {
            return;
        }
        if let Some(stalled) = self.tokenizer.as_mut().and_then(Tokenizer::take_stalled) {
            self.on_frame(stalled, true);
        }
        info!("{}: keep-alive expired, closing", self.client_info());
        self.close();
    }

    /// Release everything. Safe to call any number of times.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        debug!("{}: shutting down", self.client_info());
        self.tokenizer = None;
        if let Some(mut session) = self.session.take() {
            session.shutdown();
        }
        self.link.detach();
        self.state = State::Closed;
    }

    fn close(&mut self) {
        self.state = State::Closed;
        self.link.close();
    }

    /// Log `err` and close the link when its kind calls for it.
    fn fail(&mut self, err: ConnectionError) {
        self.report(&err);
        if err.closes_connection() {
            self.close();
        }
    }

    fn report(&self, err: &ConnectionError) {
        match err {
            ConnectionError::SessionAlreadyAllocated | ConnectionError::UnknownPacketType { .. } => {
                warn!("{}: {}", self.client_info(), err)
            }
            ConnectionError::MalformedPacket(_) => {
                error!("{}, Bad error in processing the message: {}", self.client_info(), err)
            }
            _ => error!("{}: {}", self.client_info(), err),
        }
    }

    fn dispatch(&mut self, packet: Packet) {
        debug!("{}: Received {}", self.client_info(), packet.packet_type());

        if !matches!(self.state, State::Connected) {
            match packet {
                Packet::Connect(connect) => self.handle_connect(connect),
                other => {
                    warn!(
                        "{}: expected CONNECT, got {}",
                        self.client_info(),
                        other.packet_type()
                    );
                    self.close();
                }
            }
            return;
        }

        match packet {
            Packet::Connect(_) => self.fail(ConnectionError::SessionAlreadyAllocated),
            Packet::Publish(publish) => self.handle_publish(publish),
            Packet::PubAck(_) | Packet::PubComp(_) => {}
            Packet::PubRec(pubrec) => self.send_packet(&Packet::PubRel(PubRelPacket {
                packet_id: pubrec.packet_id,
            })),
            Packet::PubRel(pubrel) => self.send_packet(&Packet::PubComp(PubCompPacket {
                packet_id: pubrel.packet_id,
            })),
            Packet::Subscribe(subscribe) => {
                if let Some(session) = self.session.as_mut() {
                    session.handle_subscribe(&subscribe);
                }
                self.send_packet(&Packet::SubAck(SubAckPacket::granting(&subscribe)));
            }
            Packet::Unsubscribe(unsubscribe) => {
                if let Some(session) = self.session.as_mut() {
                    session.handle_unsubscribe(&unsubscribe);
                }
                self.send_packet(&Packet::UnsubAck(UnsubAckPacket {
                    packet_id: unsubscribe.packet_id,
                }));
            }
            Packet::PingReq(_) => self.send_packet(&Packet::PingResp(PingRespPacket)),
            Packet::Disconnect(disconnect) => {
                info!("{}: disconnected", self.client_info());
                if let Some(mut session) = self.session.take() {
                    session.handle_disconnect(&disconnect);
                }
                self.close();
            }
            other @ (Packet::ConnAck(_)
            | Packet::SubAck(_)
            | Packet::UnsubAck(_)
            | Packet::PingResp(_)) => self.fail(ConnectionError::UnknownPacketType {
                packet_type: other.packet_type() as u8,
            }),
        }
    }

    fn handle_publish(&mut self, publish: PublishPacket) {
        if let Some(session) = self.session.as_mut() {
            session.handle_publish(&publish);
        }
        match (publish.qos, publish.packet_id) {
            (QoS::AtLeastOnce, Some(packet_id)) => {
                self.send_packet(&Packet::PubAck(PubAckPacket { packet_id }))
            }
            (QoS::ExactlyOnce, Some(packet_id)) => {
                self.send_packet(&Packet::PubRec(PubRecPacket { packet_id }))
            }
            _ => {}
        }
    }

    fn handle_connect(&mut self, connect: ConnectPacket) {
        if let Some(return_code) = self.admission_check(&connect) {
            warn!(
                "{}: refusing CONNECT from {:?}: {:?}",
                self.client_info(),
                connect.client_id,
                return_code
            );
            self.send_packet(&Packet::ConnAck(ConnAckPacket::refused(return_code)));
            self.close();
            return;
        }

        let mut session = self.factory.create_session();
        session.set_publish_sink(self.publish_sink());
        self.keep_alive_secs = connect.keep_alive;

        let verdict = AuthVerdict::new(self.auth_waker.clone());
        self.state = State::AwaitingAuth {
            client_id: connect.client_id.clone(),
            username: connect.username.clone(),
            verdict: verdict.clone(),
            backlog: VecDeque::new(),
            backlog_bytes: 0,
        };
        self.session = Some(session);
        info!("{}: session allocated", self.client_info());

        if let Some(session) = self.session.as_mut() {
            session.handle_connect(&connect, AuthCallback::new(verdict));
        }
        self.poll_auth();
    }

    fn admission_check(&self, connect: &ConnectPacket) -> Option<ConnectReturnCode> {
        let level = connect.protocol_level;
        if !self.config.accepts_protocol_level(level) || connect.protocol_name.level() != level {
            return Some(ConnectReturnCode::UnacceptableProtocolVersion);
        }
        if connect.client_id.is_empty() && !connect.clean_session {
            return Some(ConnectReturnCode::IdentifierRejected);
        }
        if !self.config.allow_anonymous && connect.username.is_none() {
            return Some(ConnectReturnCode::NotAuthorized);
        }
        None
    }
}

impl<F: SessionFactory> core::fmt::Debug for ConnectionEngine<F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ConnectionEngine")
            .field("state", &self.state())
            .field("client", &self.client_info())
            .finish()
    }
}
