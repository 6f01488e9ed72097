//! # Point model
//!
//! Named points and the countdown that decides when each one is serviced:
//!
//! - **Interval**: per-entity countdown measured in loop iterations
//! - **Point**: key, name, value and topic template shared by every point kind
//! - **PointRegistry**: Inputs, Outputs and Virtuals keyed per category

pub mod interval;
pub mod point;
pub mod registry;

pub use interval::Interval;
pub use point::{
    is_truthy, render_topic, HasPoint, Input, InputSource, Output, OutputDevice, Point, PointCategory,
    TopicAction, Virtual,
};
pub use registry::{AnyPoint, PointRegistry, Publication};
