use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS, RecvTimeoutError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::traits::{InboundMessage, MessageGateway};
use crate::config::BrokerConfig;
use crate::error::{PinionError, PinionResult};

/// Request queue depth between the client handle and the event loop.
const REQUEST_CAPACITY: usize = 64;

/// MQTT transport on the synchronous `rumqttc` client.
///
/// The connection is only driven from [`MessageGateway::pump`], so the loop thread
/// stays the single owner of all broker I/O. Subscriptions are replayed after every
/// (re)connect.
pub struct MqttGateway {
    client: Client,
    connection: Connection,
    subscriptions: Vec<String>,
    closed: bool,
}

impl MqttGateway {
    pub fn connect(broker: &BrokerConfig, client_id: &str) -> PinionResult<Self> {
        let mut options = MqttOptions::new(client_id, broker.host.clone(), broker.port);
        options.set_keep_alive(Duration::from_secs(broker.keep_alive));
        if let Some(username) = &broker.username {
            options.set_credentials(username.clone(), broker.password.clone().unwrap_or_default());
        }

        let (client, connection) = Client::new(options, REQUEST_CAPACITY);
        info!(
            "MQTT client '{}' connecting to {}:{}",
            client_id, broker.host, broker.port
        );

        Ok(Self {
            client,
            connection,
            subscriptions: Vec::new(),
            closed: false,
        })
    }

    fn resubscribe(&mut self) {
        for topic in &self.subscriptions {
            if let Err(e) = self.client.try_subscribe(topic.clone(), QoS::AtLeastOnce) {
                warn!("Failed to subscribe to '{}': {}", topic, e);
            }
        }
    }

    fn handle_event(&mut self, event: Event, inbound: &mut Vec<InboundMessage>) {
        match event {
            Event::Incoming(Packet::Publish(publish)) => {
                debug!("MQTT message on '{}'", publish.topic);
                inbound.push(InboundMessage::new(publish.topic, publish.payload.to_vec()));
            }
            Event::Incoming(Packet::ConnAck(_)) => {
                info!("MQTT connected, subscribing to {} topic(s)", self.subscriptions.len());
                self.resubscribe();
            }
            _ => {}
        }
    }
}

impl MessageGateway for MqttGateway {
    fn subscribe(&mut self, topic: &str) -> PinionResult<()> {
        if !self.subscriptions.iter().any(|t| t == topic) {
            self.subscriptions.push(topic.to_string());
        }
        self.client
            .try_subscribe(topic, QoS::AtLeastOnce)
            .map_err(PinionError::communication)
    }

    fn publish(&mut self, topic: &str, payload: &str) -> PinionResult<()> {
        if self.closed {
            return Err(PinionError::communication("MQTT gateway is closed"));
        }
        self.client
            .try_publish(topic, QoS::AtLeastOnce, false, payload.as_bytes().to_vec())
            .map_err(PinionError::communication)
    }

    fn pump(&mut self, timeout: Duration) -> PinionResult<Vec<InboundMessage>> {
        let deadline = Instant::now() + timeout;
        let mut inbound = Vec::new();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.connection.recv_timeout(remaining) {
                Ok(Ok(event)) => self.handle_event(event, &mut inbound),
                Ok(Err(e)) => {
                    // rumqttc reconnects on the next poll
                    warn!("MQTT connection error: {}", e);
                    break;
                }
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(PinionError::communication("MQTT event loop has stopped"));
                }
            }
            if remaining.is_zero() {
                break;
            }
        }

        Ok(inbound)
    }

    fn close(&mut self) -> PinionResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.client.disconnect().map_err(PinionError::communication)?;

        // Give the event loop a moment to send the DISCONNECT packet
        let deadline = Instant::now() + Duration::from_millis(200);
        while Instant::now() < deadline {
            match self.connection.recv_timeout(Duration::from_millis(50)) {
                Ok(Ok(Event::Outgoing(rumqttc::Outgoing::Disconnect))) => break,
                Ok(Ok(_)) | Err(RecvTimeoutError::Timeout) => continue,
                Ok(Err(_)) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        info!("MQTT gateway closed");
        Ok(())
    }
}
