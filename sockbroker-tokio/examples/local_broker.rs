//! Minimal in-memory broker: every client's publishes fan out to the other
//! connected clients whose filters match.
//!
//! Run with `RUST_LOG=debug cargo run --example local_broker`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use sockbroker_core::protocol::packets::{
    ConnectPacket, DisconnectPacket, PublishPacket, SubscribePacket, UnsubscribePacket,
};
use sockbroker_core::protocol::QoS;
use sockbroker_tokio::{AuthCallback, MqttServer, PublishSink, ServerConfig, Session};

#[derive(Default)]
struct Subscriber {
    sink: Option<PublishSink>,
    filters: Vec<String>,
}

#[derive(Default)]
struct Router {
    subscribers: Mutex<HashMap<u64, Subscriber>>,
    next_id: AtomicU64,
}

fn filter_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

struct LocalSession {
    id: u64,
    client_id: String,
    router: Arc<Router>,
}

impl LocalSession {
    fn with_subscriber(&self, f: impl FnOnce(&mut Subscriber)) {
        f(self.router.subscribers.lock().entry(self.id).or_default());
    }
}

impl Session for LocalSession {
    fn handle_connect(&mut self, packet: &ConnectPacket, auth: AuthCallback) {
        self.client_id = packet.client_id.clone();
        auth.accept();
    }

    fn handle_publish(&mut self, packet: &PublishPacket) {
        let subscribers = self.router.subscribers.lock();
        for (id, subscriber) in subscribers.iter() {
            if *id == self.id {
                continue;
            }
            let Some(sink) = &subscriber.sink else {
                continue;
            };
            if subscriber
                .filters
                .iter()
                .any(|filter| filter_matches(filter, &packet.topic_name))
            {
                sink.deliver(PublishPacket {
                    qos: QoS::AtMostOnce,
                    packet_id: None,
                    dup: false,
                    ..packet.clone()
                });
            }
        }
    }

    fn handle_subscribe(&mut self, packet: &SubscribePacket) {
        self.with_subscriber(|subscriber| {
            for subscription in &packet.subscriptions {
                subscriber.filters.push(subscription.topic_filter.clone());
            }
        });
    }

    fn handle_unsubscribe(&mut self, packet: &UnsubscribePacket) {
        self.with_subscriber(|subscriber| {
            subscriber
                .filters
                .retain(|filter| !packet.topic_filters.contains(filter));
        });
    }

    fn handle_disconnect(&mut self, _packet: &DisconnectPacket) {
        self.shutdown();
    }

    fn set_publish_sink(&mut self, sink: PublishSink) {
        self.with_subscriber(|subscriber| subscriber.sink = Some(sink));
    }

    fn client_info(&self) -> String {
        format!("Session {}", self.client_id)
    }

    fn shutdown(&mut self) {
        self.router.subscribers.lock().remove(&self.id);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let router = Arc::new(Router::default());
    let factory = move || LocalSession {
        id: router.next_id.fetch_add(1, Ordering::Relaxed),
        client_id: String::new(),
        router: router.clone(),
    };

    let config = ServerConfig::default();
    log::info!("Starting sockbroker on {}", config.bind_addr);
    MqttServer::with_config(config, factory).run().await?;

    Ok(())
}
