use std::sync::Arc;

use bytes::BytesMut;
use log::{debug, error, info, trace};
use sockbroker_core::{ConnectionEngine, ConnectionState, EngineConfig, SessionFactory};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Notify;
use tokio::time::{sleep_until, Duration, Instant};

use crate::io::{ChannelTransport, Outgoing};

/// Per-connection settings of the Tokio driver
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// How long a client may take to send CONNECT and be authenticated
    pub connect_timeout: Duration,
    /// Initial size of the socket read buffer
    pub read_buffer_capacity: usize,
    /// Frames waiting for the socket writer. A client that falls this far
    /// behind is disconnected.
    pub outgoing_queue_capacity: usize,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_buffer_capacity: 4096,
            outgoing_queue_capacity: 1024,
        }
    }
}

/// Drive one client connection until either side closes it.
///
/// `io` is any byte stream: a `TcpStream`, or the payload stream of a
/// WebSocket connection.
pub async fn handle_connection<IO, F>(
    io: IO,
    peer_addr: String,
    engine_config: EngineConfig,
    factory: F,
    config: &HandlerConfig,
) -> std::io::Result<()>
where
    IO: AsyncRead + AsyncWrite,
    F: SessionFactory,
{
    let (mut reader, mut writer) = tokio::io::split(io);
    let (transport, mut outgoing_rx, overflowed) =
        ChannelTransport::new(config.outgoing_queue_capacity);
    let mut engine = ConnectionEngine::new(engine_config, transport, factory);

    let auth_ready = Arc::new(Notify::new());
    let waker = auth_ready.clone();
    engine.set_auth_waker(Arc::new(move || waker.notify_one()));

    let mut read_buffer = BytesMut::with_capacity(config.read_buffer_capacity);
    let connect_deadline = Instant::now() + config.connect_timeout;
    let mut last_activity = Instant::now();

    debug!("{}: entering connection loop", peer_addr);

    let result = loop {
        let deadline = match engine.state() {
            ConnectionState::AwaitingConnect | ConnectionState::AwaitingAuth => {
                Some(connect_deadline)
            }
            ConnectionState::Connected => engine
                .keep_alive_timeout()
                .and_then(|timeout| last_activity.checked_add(timeout)),
            ConnectionState::Closed => None,
        };
        let watchdog = async move {
            match deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            read_result = reader.read_buf(&mut read_buffer) => {
                match read_result {
                    Ok(0) => {
                        info!("{}: client closed connection", peer_addr);
                        break Ok(());
                    }
                    Ok(n) => {
                        trace!("{}: read {} bytes", peer_addr, n);
                        last_activity = Instant::now();
                        engine.on_bytes(&read_buffer);
                        read_buffer.clear();
                    }
                    Err(e) => {
                        error!("{}: read error: {}", peer_addr, e);
                        break Err(e);
                    }
                }
            }

            _ = auth_ready.notified() => {
                trace!("{}: auth verdict ready", peer_addr);
                engine.poll_auth();
            }

            Some(outgoing) = outgoing_rx.recv() => {
                match outgoing {
                    Outgoing::Frame(frame) => {
                        trace!("{}: writing {} bytes", peer_addr, frame.len());
                        if let Err(e) = writer.write_all(&frame).await {
                            error!("{}: write error: {}", peer_addr, e);
                            break Err(e);
                        }
                        if let Err(e) = writer.flush().await {
                            error!("{}: flush error: {}", peer_addr, e);
                            break Err(e);
                        }
                    }
                    Outgoing::Close => {
                        info!("{}: closing connection", peer_addr);
                        break Ok(());
                    }
                }
            }

            _ = overflowed.notified() => {
                info!("{}: outgoing queue full, closing", peer_addr);
                break Ok(());
            }

            _ = watchdog => {
                if engine.state() == ConnectionState::Connected {
                    info!("{}: keep-alive timeout", peer_addr);
                } else {
                    info!("{}: no CONNECT within {:?}", peer_addr, config.connect_timeout);
                }
                engine.on_keep_alive_timeout();
            }
        }
    };

    engine.shutdown();
    if let Err(e) = writer.shutdown().await {
        trace!("{}: socket shutdown: {}", peer_addr, e);
    }
    info!("{}: connection finished", peer_addr);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{PendingAuth, TestSession};
    use parking_lot::Mutex;
    use sockbroker_core::protocol::packets::{ConnectPacket, Packet};
    use tokio::io::{duplex, DuplexStream};
    use tokio::task::JoinHandle;

    const CONNECT_V4: &[u8] = &[
        0x10, 0x0C, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0x02, 0x00, 0x3C, 0x00, 0x00,
    ];
    const CONNACK_OK: &[u8] = &[0x20, 0x02, 0x00, 0x00];
    const PINGREQ: &[u8] = &[0xC0, 0x00];
    const PINGRESP: &[u8] = &[0xD0, 0x00];

    fn spawn_handler<F>(factory: F, config: HandlerConfig) -> (DuplexStream, JoinHandle<std::io::Result<()>>)
    where
        F: SessionFactory + Send + 'static,
        F::Session: Send,
    {
        let (client, server) = duplex(1024);
        let handle = tokio::spawn(async move {
            handle_connection(
                server,
                "test-peer".to_string(),
                EngineConfig::default(),
                factory,
                &config,
            )
            .await
        });
        (client, handle)
    }

    async fn read_exact(client: &mut DuplexStream, len: usize) -> Vec<u8> {
        let mut buf = vec![0; len];
        client.read_exact(&mut buf).await.unwrap();
        buf
    }

    async fn read_to_end(client: &mut DuplexStream) -> Vec<u8> {
        let mut buf = Vec::new();
        client.read_to_end(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn test_connect_and_ping() {
        let (mut client, handle) = spawn_handler(TestSession::accepting, HandlerConfig::default());
        client.write_all(CONNECT_V4).await.unwrap();
        client.write_all(PINGREQ).await.unwrap();

        assert_eq!(read_exact(&mut client, 4).await, CONNACK_OK);
        assert_eq!(read_exact(&mut client, 2).await, PINGRESP);

        drop(client);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_refused_connect_then_eof() {
        let (mut client, handle) = spawn_handler(TestSession::accepting, HandlerConfig::default());
        let mut connect = CONNECT_V4.to_vec();
        connect[8] = 0x05;
        client.write_all(&connect).await.unwrap();

        assert_eq!(read_to_end(&mut client).await, vec![0x20, 0x02, 0x00, 0x01]);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_deferred_auth_wakes_connection() {
        let slot: PendingAuth = Arc::new(Mutex::new(None));
        let factory_slot = slot.clone();
        let (mut client, handle) = spawn_handler(
            move || TestSession::deferring(factory_slot.clone()),
            HandlerConfig::default(),
        );
        client.write_all(CONNECT_V4).await.unwrap();
        client.write_all(PINGREQ).await.unwrap();

        let callback = loop {
            if let Some(callback) = slot.lock().take() {
                break callback;
            }
            tokio::task::yield_now().await;
        };
        std::thread::spawn(move || callback.accept()).join().unwrap();

        assert_eq!(read_exact(&mut client, 4).await, CONNACK_OK);
        assert_eq!(read_exact(&mut client, 2).await, PINGRESP);

        drop(client);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_publish_sink_reaches_socket() {
        let (mut client, handle) = spawn_handler(TestSession::accepting, HandlerConfig::default());
        client.write_all(CONNECT_V4).await.unwrap();
        assert_eq!(read_exact(&mut client, 4).await, CONNACK_OK);

        client
            .write_all(&[0x82, 0x08, 0x00, 0x01, 0x00, 0x03, b'a', b'/', b'b', 0x00])
            .await
            .unwrap();

        // PUBLISH "a/b" "hello" from the session, then the SUBACK
        let publish = read_exact(&mut client, 12).await;
        assert_eq!(
            Packet::decode(&publish).unwrap(),
            Packet::Publish(sockbroker_core::protocol::packets::PublishPacket::new(
                "a/b",
                &b"hello"[..]
            ))
        );
        assert_eq!(read_exact(&mut client, 5).await, vec![0x90, 0x03, 0x00, 0x01, 0x00]);

        drop(client);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_keep_alive_expiry_closes() {
        let session = TestSession::accepting();
        let shutdowns = session.shutdowns.clone();
        let (mut client, handle) = spawn_handler(move || session.clone(), HandlerConfig::default());

        let connect = Packet::Connect(ConnectPacket::new("sleepy", 2)).encode().unwrap();
        client.write_all(&connect).await.unwrap();
        assert_eq!(read_exact(&mut client, 4).await, CONNACK_OK);

        let started = Instant::now();
        assert!(read_to_end(&mut client).await.is_empty());
        assert!(started.elapsed() >= Duration::from_secs(2));

        handle.await.unwrap().unwrap();
        assert_eq!(*shutdowns.lock(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_keep_alive_has_no_watchdog() {
        let (mut client, handle) = spawn_handler(TestSession::accepting, HandlerConfig::default());
        let connect = Packet::Connect(ConnectPacket::new("forever", 0)).encode().unwrap();
        client.write_all(&connect).await.unwrap();
        assert_eq!(read_exact(&mut client, 4).await, CONNACK_OK);

        tokio::time::sleep(Duration::from_secs(3600)).await;
        client.write_all(PINGREQ).await.unwrap();
        assert_eq!(read_exact(&mut client, 2).await, PINGRESP);

        drop(client);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout() {
        let config = HandlerConfig {
            connect_timeout: Duration::from_secs(5),
            ..Default::default()
        };
        let (mut client, handle) = spawn_handler(TestSession::accepting, config);
        client.write_all(&CONNECT_V4[..5]).await.unwrap();

        assert!(read_to_end(&mut client).await.is_empty());
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_full_outgoing_queue_closes() {
        let config = HandlerConfig {
            outgoing_queue_capacity: 1,
            ..Default::default()
        };
        let (mut client, handle) = spawn_handler(TestSession::accepting, config);
        let mut input = CONNECT_V4.to_vec();
        input.extend_from_slice(&PINGREQ.repeat(4));
        client.write_all(&input).await.unwrap();

        // Only the CONNACK fit in the queue; the pings overflowed it
        let received = read_to_end(&mut client).await;
        assert!(CONNACK_OK.starts_with(&received), "{received:02x?}");
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_corrupted_frame_closes() {
        let (mut client, handle) = spawn_handler(TestSession::accepting, HandlerConfig::default());
        client.write_all(CONNECT_V4).await.unwrap();
        client
            .write_all(&[0x30, 0xFF, 0xFF, 0xFF, 0xFF, 0x01])
            .await
            .unwrap();

        assert_eq!(read_to_end(&mut client).await, CONNACK_OK);
        handle.await.unwrap().unwrap();
    }
}
