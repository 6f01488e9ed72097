//! Messaging abstraction between the control loop and a broker.

use std::time::Duration;

use crate::error::PinionResult;

/// A message received on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Publish/subscribe transport driven from the control loop thread.
///
/// The loop calls [`MessageGateway::pump`] once per iteration; implementations must not
/// block longer than the given timeout.
pub trait MessageGateway {
    fn subscribe(&mut self, topic: &str) -> PinionResult<()>;

    fn publish(&mut self, topic: &str, payload: &str) -> PinionResult<()>;

    /// Service the transport and return messages that arrived since the last call.
    fn pump(&mut self, timeout: Duration) -> PinionResult<Vec<InboundMessage>>;

    fn close(&mut self) -> PinionResult<()>;
}

impl<G: MessageGateway + ?Sized> MessageGateway for Box<G> {
    fn subscribe(&mut self, topic: &str) -> PinionResult<()> {
        (**self).subscribe(topic)
    }

    fn publish(&mut self, topic: &str, payload: &str) -> PinionResult<()> {
        (**self).publish(topic, payload)
    }

    fn pump(&mut self, timeout: Duration) -> PinionResult<Vec<InboundMessage>> {
        (**self).pump(timeout)
    }

    fn close(&mut self) -> PinionResult<()> {
        (**self).close()
    }
}
