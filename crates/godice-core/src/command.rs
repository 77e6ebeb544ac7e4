//! Command frames written to the die's write characteristic

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Command codes understood by the die firmware
mod opcode {
    pub const REQUEST_BATTERY: u8 = 3;
    pub const SET_LED: u8 = 8;
    pub const PULSE_LED: u8 = 16;
    pub const REQUEST_COLOR: u8 = 23;
}

/// Fixed trailer bytes of the pulse command
const PULSE_TRAILER: [u8; 2] = [1, 0];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("RGB value must have exactly 3 channels, got {0}")]
    InvalidRgbLength(usize),
}

/// An LED color. Channels are always within 0..=255.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const OFF: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Build a color from wide integers, clamping each channel to 0..=255
    pub fn clamped(r: i32, g: i32, b: i32) -> Self {
        let clamp = |c: i32| c.clamp(0, 255) as u8;
        Self::new(clamp(r), clamp(g), clamp(b))
    }

    /// Build a color from a caller-provided channel list.
    ///
    /// Channel values are clamped, but a list that is not exactly three
    /// channels long is rejected.
    pub fn from_channels(channels: &[i32]) -> Result<Self, CommandError> {
        match *channels {
            [r, g, b] => Ok(Self::clamped(r, g, b)),
            _ => Err(CommandError::InvalidRgbLength(channels.len())),
        }
    }

    pub fn to_bytes(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl From<(u8, u8, u8)> for Rgb {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Self::new(r, g, b)
    }
}

/// A command for the die
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    RequestBattery,
    RequestColor,
    SetLed {
        led1: Rgb,
        led2: Rgb,
    },
    /// Blink both LEDs. Times are in device ticks of 10 ms.
    PulseLed {
        count: u8,
        on_ticks: u8,
        off_ticks: u8,
        color: Rgb,
    },
}

impl Command {
    /// Wire representation of the command
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            Command::RequestBattery => vec![opcode::REQUEST_BATTERY],
            Command::RequestColor => vec![opcode::REQUEST_COLOR],
            Command::SetLed { led1, led2 } => {
                let mut frame = Vec::with_capacity(7);
                frame.push(opcode::SET_LED);
                frame.extend_from_slice(&led1.to_bytes());
                frame.extend_from_slice(&led2.to_bytes());
                frame
            }
            Command::PulseLed {
                count,
                on_ticks,
                off_ticks,
                color,
            } => {
                let mut frame = Vec::with_capacity(9);
                frame.extend_from_slice(&[opcode::PULSE_LED, count, on_ticks, off_ticks]);
                frame.extend_from_slice(&color.to_bytes());
                frame.extend_from_slice(&PULSE_TRAILER);
                frame
            }
        }
    }

    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Command::RequestBattery => "request_battery",
            Command::RequestColor => "request_color",
            Command::SetLed { .. } => "set_led",
            Command::PulseLed { .. } => "pulse_led",
        }
    }
}

pub fn request_battery() -> Vec<u8> {
    Command::RequestBattery.encode()
}

pub fn request_color() -> Vec<u8> {
    Command::RequestColor.encode()
}

/// Set both LEDs. A missing LED color is treated as off.
pub fn set_led(led1: Option<Rgb>, led2: Option<Rgb>) -> Vec<u8> {
    Command::SetLed {
        led1: led1.unwrap_or(Rgb::OFF),
        led2: led2.unwrap_or(Rgb::OFF),
    }
    .encode()
}

pub fn pulse_led(count: u8, on_ticks: u8, off_ticks: u8, color: Rgb) -> Vec<u8> {
    Command::PulseLed {
        count,
        on_ticks,
        off_ticks,
        color,
    }
    .encode()
}
