//! Payload conventions for point values.

use serde::{Deserialize, Serialize};

use crate::core::is_truthy;

/// How output values are rendered on state topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueEncoding {
    /// `1`, `0`, `21.5`
    #[default]
    Numeric,
    /// `on` / `off`
    OnOff,
}

/// Decode a command payload.
///
/// `on` and `1` mean 1, everything else (including `off`, `0` and garbage) means 0.
/// Surrounding whitespace and letter case are ignored.
pub fn decode_inbound(payload: &[u8]) -> f64 {
    let text = String::from_utf8_lossy(payload);
    match text.trim().to_ascii_lowercase().as_str() {
        "on" | "1" => 1.0,
        _ => 0.0,
    }
}

/// Render a value for publication.
pub fn encode_value(value: f64, encoding: ValueEncoding) -> String {
    match encoding {
        ValueEncoding::OnOff => {
            if is_truthy(value) {
                "on".to_string()
            } else {
                "off".to_string()
            }
        }
        ValueEncoding::Numeric => {
            if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
                format!("{}", value as i64)
            } else {
                value.to_string()
            }
        }
    }
}
