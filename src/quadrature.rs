//! KY-040 knob decoding from raw GPIO levels
//!
//! Rotation: whenever CLK changes, DT differing from CLK means clockwise.
//! Button: SW is active low; a falling edge is a press unless it lands
//! inside the bounce window of the previously accepted press.

use std::time::{Duration, Instant};

use crate::hardware::PinLevels;

/// Presses closer together than this are contact bounce
pub const DEFAULT_BOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnobEvent {
    Clockwise,
    CounterClockwise,
    Pressed,
}

#[derive(Debug)]
pub struct KnobDecoder {
    last: Option<PinLevels>,
    last_press: Option<Instant>,
    bounce: Duration,
}

impl Default for KnobDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_BOUNCE)
    }
}

impl KnobDecoder {
    pub fn new(bounce: Duration) -> Self {
        Self {
            last: None,
            last_press: None,
            bounce,
        }
    }

    /// Feed one sample of the knob's lines. The first sample only primes
    /// the decoder.
    pub fn sample(&mut self, levels: PinLevels, now: Instant) -> Vec<KnobEvent> {
        let mut events = Vec::new();
        let Some(prev) = self.last.replace(levels) else {
            return events;
        };

        if levels.clk != prev.clk {
            if levels.dt != levels.clk {
                events.push(KnobEvent::Clockwise);
            } else {
                events.push(KnobEvent::CounterClockwise);
            }
        }

        if prev.sw && !levels.sw {
            let bouncing = self
                .last_press
                .is_some_and(|at| now.duration_since(at) < self.bounce);
            if !bouncing {
                self.last_press = Some(now);
                events.push(KnobEvent::Pressed);
            }
        }

        events
    }
}
