use std::collections::{BTreeSet, VecDeque};
use std::time::Duration;
use tracing::debug;

use super::traits::{InboundMessage, MessageGateway};
use crate::error::{PinionError, PinionResult};

/// In-process gateway with no broker behind it.
///
/// Publications are recorded; injected messages are delivered on the next pump when
/// their topic has been subscribed.
#[derive(Debug, Default)]
pub struct LoopbackGateway {
    subscriptions: BTreeSet<String>,
    pending: VecDeque<InboundMessage>,
    published: Vec<(String, String)>,
    closed: bool,
}

impl LoopbackGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message as if it had arrived from a broker.
    pub fn inject(&mut self, topic: impl Into<String>, payload: impl Into<Vec<u8>>) {
        self.pending.push_back(InboundMessage::new(topic, payload));
    }

    pub fn published(&self) -> &[(String, String)] {
        &self.published
    }

    /// Payloads published to one topic, oldest first.
    pub fn published_to(&self, topic: &str) -> Vec<&str> {
        self.published
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, payload)| payload.as_str())
            .collect()
    }

    pub fn clear_published(&mut self) {
        self.published.clear();
    }

    pub fn subscriptions(&self) -> impl Iterator<Item = &str> {
        self.subscriptions.iter().map(String::as_str)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> PinionResult<()> {
        if self.closed {
            return Err(PinionError::communication("gateway is closed"));
        }
        Ok(())
    }
}

impl MessageGateway for LoopbackGateway {
    fn subscribe(&mut self, topic: &str) -> PinionResult<()> {
        self.ensure_open()?;
        self.subscriptions.insert(topic.to_string());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &str) -> PinionResult<()> {
        self.ensure_open()?;
        debug!("{} <- {}", topic, payload);
        self.published.push((topic.to_string(), payload.to_string()));
        Ok(())
    }

    fn pump(&mut self, _timeout: Duration) -> PinionResult<Vec<InboundMessage>> {
        self.ensure_open()?;
        let subscriptions = &self.subscriptions;
        Ok(self
            .pending
            .drain(..)
            .filter(|message| subscriptions.contains(&message.topic))
            .collect())
    }

    fn close(&mut self) -> PinionResult<()> {
        self.closed = true;
        Ok(())
    }
}
