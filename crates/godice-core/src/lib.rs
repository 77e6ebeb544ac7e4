//! GoDice Core - Protocol codecs and face classification
//!
//! This crate provides the pure, synchronous parts of the GoDice system:
//! - Reference geometry for the 6, 20 and 24 face housings
//! - Nearest-vector classification and per-shell face relabeling
//! - Decoding of notification frames pushed by the die
//! - Encoding of command frames written to the die

pub mod classify;
pub mod command;
pub mod die;
pub mod geometry;
pub mod notification;

pub use classify::{classify, resolve};
pub use command::{pulse_led, request_battery, request_color, set_led, Command, CommandError, Rgb};
pub use die::{Color, DieType, HousingKind, ParseDieTypeError, StabilityKind};
pub use geometry::Vector3;
pub use notification::{decode, DecodeError, NotificationEvent};
