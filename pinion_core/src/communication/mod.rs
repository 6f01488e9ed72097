//! # Messaging
//!
//! The control loop talks to the outside world through a [`MessageGateway`]:
//!
//! - **LoopbackGateway**: in-process gateway for offline runs and tests
//! - **MqttGateway**: MQTT broker connection (feature `mqtt`)
//! - **codec**: command decoding and state encoding

pub mod codec;
pub mod loopback;
pub mod traits;

#[cfg(feature = "mqtt")]
pub mod mqtt;

pub use codec::{decode_inbound, encode_value, ValueEncoding};
pub use loopback::LoopbackGateway;
pub use traits::{InboundMessage, MessageGateway};

#[cfg(feature = "mqtt")]
pub use mqtt::MqttGateway;
