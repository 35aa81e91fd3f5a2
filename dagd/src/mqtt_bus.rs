//! Event bus transport (spec.md §6 "Event bus topics"; §1 "out of scope").
//!
//! Wraps `rumqttc`'s synchronous `Client`/`Connection` pair. The network
//! loop that `Connection::iter()` drives is blocking, so it runs on its own
//! thread and forwards parsed `(topic, payload)` pairs across a bounded
//! `crossbeam` channel; [`crate::host_loop::HostLoop`] owns the bounded poll
//! (§5) by reading from that channel with a timeout instead of touching
//! `rumqttc` directly.

use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use rumqttc::{Client, Event, MqttOptions, Packet, QoS};

use crate::error::DaemonError;

/// A single inbound message: topic and payload, already decoded as UTF-8
/// (malformed payloads are logged and dropped per §7, never surfaced here).
pub struct BusMessage {
    pub topic: String,
    pub payload: String,
}

const SUBSCRIPTIONS: &[&str] = &[
    "/mine/epoch",
    "/mine/+/epoch",
    "/sys/shutdown",
    "/mine/+/state",
    "/mine/running",
    "/mine/+/running",
];

const STATUS_TOPIC: &str = "/mine/dag-cache";

pub struct MqttBus {
    client: Client,
    inbox: Receiver<BusMessage>,
}

impl MqttBus {
    /// Connect to `host:port` and subscribe to every topic named in §6.
    /// A connect failure is fatal (§7: "event-bus connect failure").
    pub fn connect(host: &str, port: u16, client_id: &str) -> Result<Self, DaemonError> {
        let mut opts = MqttOptions::new(client_id, host, port);
        opts.set_keep_alive(Duration::from_secs(30));

        let (client, mut connection) = Client::new(opts, 64);
        for topic in SUBSCRIPTIONS {
            client
                .subscribe(*topic, QoS::AtMostOnce)
                .map_err(|err| DaemonError::BusConnect(err.to_string()))?;
        }

        // First poll forces the actual TCP connect; surface failure here
        // rather than silently on the background thread.
        match connection.iter().next() {
            Some(Ok(_)) => {}
            Some(Err(err)) => return Err(DaemonError::BusConnect(err.to_string())),
            None => return Err(DaemonError::BusConnect("connection closed".into())),
        }

        let (tx, rx) = channel::bounded(256);
        spawn_reader(connection, tx);

        Ok(MqttBus { client, inbox: rx })
    }

    /// Block up to `timeout` for the next message.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<BusMessage> {
        match self.inbox.recv_timeout(timeout) {
            Ok(msg) => Some(msg),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Non-blocking poll (§5: "zero timeout" while a work stream is active).
    pub fn try_recv(&self) -> Option<BusMessage> {
        self.inbox.try_recv().ok()
    }

    /// Publish retained status (§6 "out (retained)"). Best-effort (§7):
    /// a failed publish is logged and never propagated.
    pub fn publish_status(&self, report: &str) {
        if let Err(err) = self
            .client
            .publish(STATUS_TOPIC, QoS::AtMostOnce, true, report.as_bytes())
        {
            log::warn!("status publish failed: {}", err);
        }
    }
}

fn spawn_reader(mut connection: rumqttc::Connection, tx: Sender<BusMessage>) {
    thread::spawn(move || {
        for notification in connection.iter() {
            match notification {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let payload = match std::str::from_utf8(&publish.payload) {
                        Ok(s) => s.to_string(),
                        Err(_) => {
                            log::warn!("non-utf8 payload on {}", publish.topic);
                            continue;
                        }
                    };
                    let msg = BusMessage {
                        topic: publish.topic,
                        payload,
                    };
                    if tx.send(msg).is_err() {
                        return;
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    log::warn!("mqtt connection error: {}", err);
                    return;
                }
            }
        }
    });
}
