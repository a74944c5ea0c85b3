//! Sample event model: three types, each with its own payload shape.

use event_dispatcher::{EventType, Payload};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleType {
    A,
    B,
    C,
}

impl EventType for SampleType {
    fn all() -> &'static [Self] {
        &[SampleType::A, SampleType::B, SampleType::C]
    }

    fn name(&self) -> &'static str {
        match self {
            SampleType::A => "A",
            SampleType::B => "B",
            SampleType::C => "C",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SamplePayload {
    A(i64),
    B(String),
    C(f64),
}

impl SamplePayload {
    /// Payload for the `i`-th generated event. Types cycle A, B, C.
    pub fn nth(i: u64) -> Self {
        match i % 3 {
            0 => SamplePayload::A(i as i64),
            1 => SamplePayload::B(i.to_string()),
            _ => SamplePayload::C(i as f64 * 0.1),
        }
    }

    /// Render the carried value and log it.
    pub fn extract(&self) -> String {
        let rendered = match self {
            SamplePayload::A(value) => format!("EventDataA: {value}"),
            SamplePayload::B(value) => format!("EventDataB: {value}"),
            SamplePayload::C(value) => format!("EventDataC: {value}"),
        };
        info!(event_type = self.event_type().name(), "{}", rendered);
        rendered
    }
}

impl Payload for SamplePayload {
    type Type = SampleType;

    fn event_type(&self) -> SampleType {
        match self {
            SamplePayload::A(_) => SampleType::A,
            SamplePayload::B(_) => SampleType::B,
            SamplePayload::C(_) => SampleType::C,
        }
    }
}
