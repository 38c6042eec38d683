//! Configuration management
//!
//! Two layers:
//! - `Settings`: loaded once at startup from defaults, an optional config
//!   file and `ROTARY_*` environment variables
//! - `RotaryParams`: the plugin's string parameters (`clk`, `dt`, `sw`,
//!   `step`), parsed leniently. A value that isn't an integer is logged and
//!   the default kept.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use serde::Deserialize;
use tracing::{error, info};

use crate::hardware::KnobLines;

/// Encoder breakout address (0x18 is the plain IO expander)
pub const ENCODER_BREAKOUT_ADDR: u8 = 0x0F;

pub const DEFAULT_BRIGHTNESS: f64 = 0.5;

/// Full-scale LED duty the PWM period is sized for
const LED_FULL_SCALE: f64 = 255.0;

/// PWM period giving 0-255 steps at `brightness`. `None` unless the
/// brightness is in (0, 1] and the period fits the expander's 16-bit counter.
pub fn checked_period(brightness: f64) -> Option<u16> {
    if !(brightness > 0.0 && brightness <= 1.0) {
        return None;
    }
    let period = (LED_FULL_SCALE / brightness).trunc();
    if period > u16::MAX as f64 {
        return None;
    }
    Some(period as u16)
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Plugin parameters as the daemon passes them: string keys and values
    #[serde(default)]
    pub params: HashMap<String, String>,

    #[serde(default)]
    pub board: BoardConfig,

    /// Starting level of the bench mixer
    #[serde(default = "default_initial_volume")]
    pub initial_volume: f32,
}

fn default_initial_volume() -> f32 {
    50.0
}

/// Wiring and LED constants of the encoder breakout
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub i2c_addr: u8,
    pub interrupt_pin: u8,
    pub encoder_channel: u8,

    pub pin_red: u8,
    pub pin_green: u8,
    pub pin_blue: u8,

    pub enc_a: u8,
    pub enc_b: u8,
    pub enc_c: u8,

    /// Maximum fraction of the PWM period the LED is on
    pub brightness: f64,
    pub pwm_divider: u8,
    pub font: u8,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            i2c_addr: ENCODER_BREAKOUT_ADDR,
            interrupt_pin: 4,
            encoder_channel: 1,
            pin_red: 1,
            pin_green: 7,
            pin_blue: 2,
            enc_a: 12,
            enc_b: 3,
            enc_c: 11,
            brightness: DEFAULT_BRIGHTNESS,
            pwm_divider: 2,
            font: 3,
        }
    }
}

impl BoardConfig {
    /// Replace a brightness the PWM period can't be derived from with the
    /// default, logging the rejected value.
    pub fn validated(mut self) -> Self {
        if checked_period(self.brightness).is_none() {
            error!(
                "invalid LED brightness {}, using {}",
                self.brightness, DEFAULT_BRIGHTNESS
            );
            self.brightness = DEFAULT_BRIGHTNESS;
        }
        self
    }

    /// PWM period large enough for 0-255 steps at the configured brightness.
    /// Falls back to the default brightness's period if not `validated`.
    pub fn period(&self) -> u16 {
        checked_period(self.brightness)
            .or_else(|| checked_period(DEFAULT_BRIGHTNESS))
            .unwrap_or(u16::MAX)
    }

    /// The encoder breakout routes its interrupt to a swapped pin
    pub fn needs_pin_swap(&self) -> bool {
        self.i2c_addr == ENCODER_BREAKOUT_ADDR
    }
}

/// GPIO pins and volume step of the rotary plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotaryParams {
    pub clk: u32,
    pub dt: u32,
    pub sw: u32,
    /// Volume change per detent, in percent
    pub step: i32,
}

impl Default for RotaryParams {
    fn default() -> Self {
        Self {
            clk: 4,
            dt: 17,
            sw: 27,
            step: 5,
        }
    }
}

/// A parameter whose value could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedParam {
    pub key: String,
    pub value: String,
}

impl RotaryParams {
    /// Parse from the daemon's parameter map, logging and skipping bad values.
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let (parsed, _) = Self::parse(params);
        info!(
            "initializing rotary controller on GPIOs clk={}, dt={}, sw={}, step={}%",
            parsed.clk, parsed.dt, parsed.sw, parsed.step
        );
        parsed
    }

    /// GPIO lines of the KY-040 knob
    pub fn knob_lines(&self) -> KnobLines {
        KnobLines {
            clk: self.clk,
            dt: self.dt,
            sw: self.sw,
        }
    }

    /// Parse and also return the rejected entries. Each rejected entry has
    /// been logged with `error!` and its default kept.
    pub fn parse(params: &HashMap<String, String>) -> (Self, Vec<RejectedParam>) {
        let mut parsed = Self::default();
        let mut rejected = Vec::new();

        parse_into(params, "clk", &mut parsed.clk, &mut rejected);
        parse_into(params, "dt", &mut parsed.dt, &mut rejected);
        parse_into(params, "sw", &mut parsed.sw, &mut rejected);
        parse_into(params, "step", &mut parsed.step, &mut rejected);

        (parsed, rejected)
    }
}

fn parse_into<T: FromStr>(
    params: &HashMap<String, String>,
    key: &str,
    slot: &mut T,
    rejected: &mut Vec<RejectedParam>,
) {
    let Some(raw) = params.get(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *slot = value,
        Err(_) => {
            error!("can't parse {}", raw);
            rejected.push(RejectedParam {
                key: key.to_string(),
                value: raw.clone(),
            });
        }
    }
}

/// Get config directory (ROTARY_CONFIG_DIR, XDG_CONFIG_HOME or ~/.config)
pub fn get_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("ROTARY_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("rotary-control");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".config/rotary-control");
    }

    // Fallback to current directory
    PathBuf::from(".")
}

pub fn load_settings() -> Result<Settings> {
    let config_dir = get_config_dir();

    let builder = ::config::Config::builder()
        .set_default("initial_volume", 50.0)?
        // Load from config file if it exists
        .add_source(
            ::config::File::with_name(&config_dir.join("config").to_string_lossy()).required(false),
        )
        // Override with environment variables (ROTARY_PARAMS__STEP, ROTARY_BOARD__BRIGHTNESS, etc.)
        .add_source(
            ::config::Environment::with_prefix("ROTARY")
                .separator("__")
                .try_parsing(true),
        );

    let mut settings: Settings = builder.build()?.try_deserialize()?;
    settings.board = settings.board.validated();

    Ok(settings)
}
