//! Hardware seams for the rotary plugin
//!
//! Three peripherals are involved:
//! - An I2C port expander (rotary encoder breakout) exposing the encoder
//!   counter, an interrupt flag and PWM outputs for the RGB LED
//! - A small I2C text display (OLED) showing the current volume
//! - Raw GPIO lines for a KY-040 style knob (clk/dt/sw)
//!
//! The bus transports and the display's rendering are provided elsewhere;
//! this module only names the operations the controller needs.

pub mod sim;

use thiserror::Error;

/// Errors surfaced by hardware implementations.
///
/// The poll loop does not recover from any of these.
#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("i2c transfer to 0x{addr:02x} failed: {reason}")]
    I2c { addr: u8, reason: String },

    #[error("gpio line {line} unavailable: {reason}")]
    Gpio { line: u32, reason: String },

    #[error("encoder channel {0} is not configured")]
    UnknownChannel(u8),

    #[error("device disconnected")]
    Disconnected,
}

pub type HardwareResult<T> = Result<T, HardwareError>;

/// Pin mode on the port expander. Only the LED pins are configured here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Pwm,
}

/// Which buffer a display clear targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearTarget {
    /// The display's own graphic memory
    All,
    /// The host-side page buffer
    Page,
}

/// Rotary encoder breakout (I2C port expander with a quadrature counter).
pub trait EncoderBreakout: Send {
    /// Route the interrupt to the output pin. `pin_swap` is needed on the
    /// encoder breakout, which wires the interrupt to an alternate pin.
    fn enable_interrupt_out(&mut self, pin_swap: bool) -> HardwareResult<()>;

    fn setup_rotary_encoder(
        &mut self,
        channel: u8,
        pin_a: u8,
        pin_b: u8,
        pin_c: Option<u8>,
    ) -> HardwareResult<()>;

    fn set_pwm_period(&mut self, period: u16) -> HardwareResult<()>;

    fn set_pwm_control(&mut self, divider: u8) -> HardwareResult<()>;

    fn set_mode(&mut self, pin: u8, mode: PinMode, invert: bool) -> HardwareResult<()>;

    /// Whether the expander has raised its interrupt flag
    fn get_interrupt(&mut self) -> HardwareResult<bool>;

    fn clear_interrupt(&mut self) -> HardwareResult<()>;

    /// Signed count accumulated since the last clear
    fn read_rotary_encoder(&mut self, channel: u8) -> HardwareResult<i32>;

    fn clear_rotary_encoder(&mut self, channel: u8) -> HardwareResult<()>;

    /// Write a PWM duty value to an output pin
    fn output(&mut self, pin: u8, value: u16) -> HardwareResult<()>;
}

/// Small monochrome text display.
pub trait TextDisplay: Send {
    fn connected(&mut self) -> bool;

    fn begin(&mut self) -> HardwareResult<()>;

    fn clear(&mut self, target: ClearTarget) -> HardwareResult<()>;

    fn set_font_type(&mut self, font: u8) -> HardwareResult<()>;

    fn set_cursor(&mut self, x: u8, y: u8) -> HardwareResult<()>;

    /// Append text to the page buffer at the cursor
    fn print(&mut self, text: &str) -> HardwareResult<()>;

    /// Push the page buffer to the panel
    fn display(&mut self) -> HardwareResult<()>;
}

/// Instantaneous levels of the knob's GPIO lines (true = high)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinLevels {
    pub clk: bool,
    pub dt: bool,
    pub sw: bool,
}

impl Default for PinLevels {
    /// Idle KY-040: all lines pulled up
    fn default() -> Self {
        Self {
            clk: true,
            dt: true,
            sw: true,
        }
    }
}

/// GPIO line numbers the knob is wired to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnobLines {
    pub clk: u32,
    pub dt: u32,
    pub sw: u32,
}

impl KnobLines {
    /// Each signal needs its own line
    pub fn check_distinct(&self) -> HardwareResult<()> {
        let duplicate = if self.clk == self.dt || self.clk == self.sw {
            Some(self.clk)
        } else if self.dt == self.sw {
            Some(self.dt)
        } else {
            None
        };
        match duplicate {
            Some(line) => Err(HardwareError::Gpio {
                line,
                reason: "requested for more than one knob signal".to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// GPIO source for a KY-040 style knob.
pub trait PinInputs: Send {
    /// Lines this source was bound to
    fn lines(&self) -> KnobLines;

    fn read_levels(&mut self) -> HardwareResult<PinLevels>;
}
