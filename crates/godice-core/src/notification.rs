//! Decoding of notification frames pushed by the die
//!
//! Every notification on the die's notify characteristic carries exactly one
//! message. Frames are position coded and identified by their leading bytes:
//!
//! | Leading bytes | Message | Payload |
//! |---|---|---|
//! | `R` | rolling | none |
//! | `Bat` | battery level | byte 3 |
//! | `Col` | color code | byte 3 |
//! | `S` | stable orientation | bytes 1..4 |
//! | `FS` / `TS` / `MS` | fake / tilt / move stable orientation | bytes 2..5 |

use thiserror::Error;
use tracing::trace;

use crate::die::{Color, StabilityKind};
use crate::geometry::Vector3;

const TAG_ROLLING: u8 = b'R';
const TAG_STABLE: u8 = b'S';
const TAG_FAKE: u8 = b'F';
const TAG_TILT: u8 = b'T';
const TAG_MOVE: u8 = b'M';
const TAG_BATTERY: &[u8; 3] = b"Bat";
const TAG_COLOR: &[u8; 3] = b"Col";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Empty notification frame")]
    Empty,
    #[error("Truncated {kind} frame: expected {expected} bytes, got {actual}")]
    Truncated {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Unknown color code: {0}")]
    UnknownColor(u8),
    #[error("Unrecognized frame starting with {first:#04x} {second:?}")]
    UnknownFrame { first: u8, second: Option<u8> },
}

/// A decoded notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationEvent {
    Rolling,
    Battery(u8),
    Color(Color),
    Stable(Vector3),
    FakeStable(Vector3),
    TiltStable(Vector3),
    MoveStable(Vector3),
}

impl NotificationEvent {
    /// Orientation carried by the event, with its stability class
    pub fn orientation(&self) -> Option<(Vector3, StabilityKind)> {
        match *self {
            NotificationEvent::Stable(v) => Some((v, StabilityKind::Stable)),
            NotificationEvent::FakeStable(v) => Some((v, StabilityKind::FakeStable)),
            NotificationEvent::TiltStable(v) => Some((v, StabilityKind::TiltStable)),
            NotificationEvent::MoveStable(v) => Some((v, StabilityKind::MoveStable)),
            _ => None,
        }
    }
}

/// Decode one notification payload
pub fn decode(frame: &[u8]) -> Result<NotificationEvent, DecodeError> {
    trace!(frame = ?frame, "Decoding notification");

    let first = *frame.first().ok_or(DecodeError::Empty)?;

    if first == TAG_ROLLING {
        return Ok(NotificationEvent::Rolling);
    }

    if frame.starts_with(TAG_BATTERY) {
        let level = payload_byte(frame, "battery")?;
        return Ok(NotificationEvent::Battery(level));
    }

    if frame.starts_with(TAG_COLOR) {
        let code = payload_byte(frame, "color")?;
        let color = Color::from_code(code).ok_or(DecodeError::UnknownColor(code))?;
        return Ok(NotificationEvent::Color(color));
    }

    if first == TAG_STABLE {
        let vec = vector_at(frame, 1, "stable")?;
        return Ok(NotificationEvent::Stable(vec));
    }

    let second = frame.get(1).copied();
    if second == Some(TAG_STABLE) {
        let event = match first {
            TAG_FAKE => Some(NotificationEvent::FakeStable(vector_at(frame, 2, "fake stable")?)),
            TAG_TILT => Some(NotificationEvent::TiltStable(vector_at(frame, 2, "tilt stable")?)),
            TAG_MOVE => Some(NotificationEvent::MoveStable(vector_at(frame, 2, "move stable")?)),
            _ => None,
        };
        if let Some(event) = event {
            return Ok(event);
        }
    }

    Err(DecodeError::UnknownFrame { first, second })
}

fn payload_byte(frame: &[u8], kind: &'static str) -> Result<u8, DecodeError> {
    frame.get(3).copied().ok_or(DecodeError::Truncated {
        kind,
        expected: 4,
        actual: frame.len(),
    })
}

fn vector_at(frame: &[u8], offset: usize, kind: &'static str) -> Result<Vector3, DecodeError> {
    match frame.get(offset..offset + 3) {
        Some(&[x, y, z]) => Ok(Vector3::from_bytes([x, y, z])),
        _ => Err(DecodeError::Truncated {
            kind,
            expected: offset + 3,
            actual: frame.len(),
        }),
    }
}

/// Encode an event the way the die sends it
///
/// Used by simulators and capture tooling. `decode(&encode(e)) == Ok(e)`.
pub fn encode(event: &NotificationEvent) -> Vec<u8> {
    let with_vector = |tag: &[u8], v: Vector3| {
        let mut frame = tag.to_vec();
        frame.extend_from_slice(&v.to_bytes());
        frame
    };

    match *event {
        NotificationEvent::Rolling => vec![TAG_ROLLING],
        NotificationEvent::Battery(level) => {
            let mut frame = TAG_BATTERY.to_vec();
            frame.push(level);
            frame
        }
        NotificationEvent::Color(color) => {
            let mut frame = TAG_COLOR.to_vec();
            frame.push(color.code());
            frame
        }
        NotificationEvent::Stable(v) => with_vector(&[TAG_STABLE][..], v),
        NotificationEvent::FakeStable(v) => with_vector(&[TAG_FAKE, TAG_STABLE][..], v),
        NotificationEvent::TiltStable(v) => with_vector(&[TAG_TILT, TAG_STABLE][..], v),
        NotificationEvent::MoveStable(v) => with_vector(&[TAG_MOVE, TAG_STABLE][..], v),
    }
}
