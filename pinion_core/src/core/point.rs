//! Named I/O points and the topic templates they publish on.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::interval::Interval;
use crate::hardware::Pull;

/// The three kinds of point held by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PointCategory {
    Input,
    Output,
    Virtual,
}

impl PointCategory {
    pub const ALL: [PointCategory; 3] = [
        PointCategory::Input,
        PointCategory::Output,
        PointCategory::Virtual,
    ];
}

impl fmt::Display for PointCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PointCategory::Input => write!(f, "Input"),
            PointCategory::Output => write!(f, "Output"),
            PointCategory::Virtual => write!(f, "Virtual"),
        }
    }
}

/// Value substituted for `{action}` in topic templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicAction {
    /// Inbound command topic.
    Set,
    /// Outbound state topic.
    State,
}

impl TopicAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicAction::Set => "set",
            TopicAction::State => "state",
        }
    }
}

/// Whether a point value counts as "on".
pub fn is_truthy(value: f64) -> bool {
    value != 0.0
}

/// Fill in `{key}`, `{name}`, `{action}` and `{topicHostName}` placeholders.
///
/// Unknown placeholders are left untouched.
pub fn render_topic(template: &str, key: &str, name: &str, action: TopicAction, host: &str) -> String {
    template
        .replace("{key}", key)
        .replace("{name}", name)
        .replace("{action}", action.as_str())
        .replace("{topicHostName}", host)
}

/// Attributes common to every point.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub value: f64,
    pub topic: Option<String>,
    interval: Interval,
}

impl Point {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            name: key.clone(),
            key,
            description: None,
            value: 0.0,
            topic: None,
            interval: Interval::every_tick(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_interval(mut self, period: Option<u32>) -> Self {
        self.interval = Interval::new(period);
        self
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = value;
        self
    }

    pub fn interval(&self) -> &Interval {
        &self.interval
    }

    /// Advance this point's countdown; true when the point is due this iteration.
    pub fn interval_expired(&mut self) -> bool {
        self.interval.expired()
    }

    /// Render this point's topic template, if it has one.
    pub fn build_topic(&self, host: &str, action: TopicAction) -> Option<String> {
        self.topic
            .as_deref()
            .map(|template| render_topic(template, &self.key, &self.name, action, host))
    }
}

/// Where an input reads its value from.
#[derive(Debug, Clone, PartialEq)]
pub enum InputSource {
    /// A GPIO line read through the pin driver.
    Gpio { pin: u8, pull: Pull },
    /// A one-wire temperature sensor identified by its bus device id.
    OneWire { device: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Input {
    pub point: Point,
    pub source: InputSource,
}

impl Input {
    pub fn gpio(point: Point, pin: u8, pull: Pull) -> Self {
        Self {
            point,
            source: InputSource::Gpio { pin, pull },
        }
    }

    pub fn one_wire(point: Point, device: impl Into<String>) -> Self {
        Self {
            point,
            source: InputSource::OneWire {
                device: device.into(),
            },
        }
    }

    /// The GPIO line behind this input, if any.
    pub fn pin(&self) -> Option<u8> {
        match self.source {
            InputSource::Gpio { pin, .. } => Some(pin),
            InputSource::OneWire { .. } => None,
        }
    }
}

/// How an output reaches hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputDevice {
    /// Drives a GPIO line directly.
    Direct { pin: u8 },
    /// Drives one bit of a shift-register bank; `pin` is 1-based across the chain.
    SerialBank { bank: String, pin: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub point: Point,
    pub device: OutputDevice,
}

impl Output {
    pub fn direct(point: Point, pin: u8) -> Self {
        Self {
            point,
            device: OutputDevice::Direct { pin },
        }
    }

    pub fn serial_bank(point: Point, bank: impl Into<String>, pin: u32) -> Self {
        Self {
            point,
            device: OutputDevice::SerialBank {
                bank: bank.into(),
                pin,
            },
        }
    }

    /// The GPIO line behind a direct output.
    pub fn direct_pin(&self) -> Option<u8> {
        match self.device {
            OutputDevice::Direct { pin } => Some(pin),
            OutputDevice::SerialBank { .. } => None,
        }
    }
}

/// A software-only value with no hardware binding.
#[derive(Debug, Clone, PartialEq)]
pub struct Virtual {
    pub point: Point,
}

impl Virtual {
    pub fn new(point: Point) -> Self {
        Self { point }
    }
}

/// Access to the common attributes of any point kind.
pub trait HasPoint {
    const CATEGORY: PointCategory;

    fn point(&self) -> &Point;
    fn point_mut(&mut self) -> &mut Point;
}

impl HasPoint for Input {
    const CATEGORY: PointCategory = PointCategory::Input;

    fn point(&self) -> &Point {
        &self.point
    }

    fn point_mut(&mut self) -> &mut Point {
        &mut self.point
    }
}

impl HasPoint for Output {
    const CATEGORY: PointCategory = PointCategory::Output;

    fn point(&self) -> &Point {
        &self.point
    }

    fn point_mut(&mut self) -> &mut Point {
        &mut self.point
    }
}

impl HasPoint for Virtual {
    const CATEGORY: PointCategory = PointCategory::Virtual;

    fn point(&self) -> &Point {
        &self.point
    }

    fn point_mut(&mut self) -> &mut Point {
        &mut self.point
    }
}
