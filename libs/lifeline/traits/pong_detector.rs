//! PONG Detection Trait
//!
//! Decides whether an inbound text payload is a reply to one of our heartbeat
//! probes. Replies are consumed by the heartbeat monitor and never reach the
//! application.

/// Trait for detecting heartbeat replies in the message stream
///
/// # Example
///
/// ```rust,ignore
/// use lifeline::traits::PongDetector;
///
/// struct TextPongDetector;
///
/// impl PongDetector for TextPongDetector {
///     fn is_pong(&self, payload: &str) -> bool {
///         payload == "PONG"
///     }
/// }
/// ```
pub trait PongDetector: Send + Sync {
    /// Check if the given payload is a heartbeat reply
    fn is_pong(&self, payload: &str) -> bool;
}

/// Detects replies shaped like `{"pong": 1508493238385}`
///
/// A payload is a reply iff it parses as JSON, is an object and carries the
/// configured field. The value of the field is not inspected. Anything that
/// fails to parse is an ordinary message.
#[derive(Debug, Clone)]
pub struct JsonPongDetector {
    field: String,
}

impl JsonPongDetector {
    /// Field name used by the default heartbeat protocol
    pub const DEFAULT_FIELD: &'static str = "pong";

    /// Create a detector keyed on a custom field name
    pub fn new(field: impl Into<String>) -> Self {
        Self { field: field.into() }
    }
}

impl Default for JsonPongDetector {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FIELD)
    }
}

impl PongDetector for JsonPongDetector {
    fn is_pong(&self, payload: &str) -> bool {
        match serde_json::from_str::<serde_json::Value>(payload) {
            Ok(serde_json::Value::Object(fields)) => fields.contains_key(&self.field),
            _ => false,
        }
    }
}
