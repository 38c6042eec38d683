//! Encoder poll loop
//!
//! Every 1/30 s: service the breakout's interrupt (read and clear the
//! encoder count, then the interrupt), recolour the LED from the count,
//! nudge the volume by sign, and redraw the volume on the display.

use std::thread;
use std::time::Duration;

use rgb::RGB16;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::bus::BusEvent;
use crate::color::led_duty;
use crate::config::BoardConfig;
use crate::controls::format_volume;
use crate::hardware::{ClearTarget, EncoderBreakout, HardwareResult, PinMode, TextDisplay};

use super::dispatch::{volume_action, Dispatcher, VolumeAction};

pub const POLL_RATE_HZ: u32 = 30;

/// Sleep between poll iterations
pub const POLL_INTERVAL: Duration = Duration::from_nanos(1_000_000_000 / POLL_RATE_HZ as u64);

/// Outcome of one poll iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub count: i32,
    pub duty: RGB16,
    pub action: Option<VolumeAction>,
}

pub struct RotaryController<B, D> {
    board: BoardConfig,
    period: u16,
    breakout: B,
    display: Option<D>,
    dispatcher: Dispatcher,
}

impl<B: EncoderBreakout, D: TextDisplay> RotaryController<B, D> {
    /// Configure the breakout's encoder and PWM outputs and bring up the
    /// display. A display that isn't connected is logged and left out; the
    /// loop then runs without it.
    pub fn new(
        board: BoardConfig,
        mut breakout: B,
        display: D,
        dispatcher: Dispatcher,
    ) -> HardwareResult<Self> {
        let board = board.validated();
        let period = board.period();

        if board.needs_pin_swap() {
            breakout.enable_interrupt_out(true)?;
        }
        breakout.setup_rotary_encoder(
            board.encoder_channel,
            board.enc_a,
            board.enc_b,
            Some(board.enc_c),
        )?;
        breakout.set_pwm_period(period)?;
        // PWM as fast as possible to avoid LED flicker
        breakout.set_pwm_control(board.pwm_divider)?;
        for pin in [board.pin_red, board.pin_green, board.pin_blue] {
            breakout.set_mode(pin, PinMode::Pwm, true)?;
        }

        let display = Self::init_display(display, board.font)?;

        info!(
            "Encoder breakout at 0x{:02x} ready (interrupt GPIO {}, PWM period {})",
            board.i2c_addr, board.interrupt_pin, period
        );

        Ok(Self {
            board,
            period,
            breakout,
            display,
            dispatcher,
        })
    }

    fn init_display(mut display: D, font: u8) -> HardwareResult<Option<D>> {
        if !display.connected() {
            error!("The OLED display isn't connected to the system. Please check your connection");
            return Ok(None);
        }

        display.begin()?;
        // Clear graphic memory to get rid of artifacts
        display.clear(ClearTarget::All)?;
        display.display()?;
        display.set_font_type(font)?;
        display.clear(ClearTarget::Page)?;
        Ok(Some(display))
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn has_display(&self) -> bool {
        self.display.is_some()
    }

    /// Count since the last read, zero unless the interrupt is raised.
    /// The encoder register is cleared before the interrupt.
    fn read_count(&mut self) -> HardwareResult<i32> {
        if !self.breakout.get_interrupt()? {
            return Ok(0);
        }
        let channel = self.board.encoder_channel;
        let count = self.breakout.read_rotary_encoder(channel)?;
        self.breakout.clear_rotary_encoder(channel)?;
        self.breakout.clear_interrupt()?;
        Ok(count)
    }

    fn write_led(&mut self, duty: RGB16) -> HardwareResult<()> {
        self.breakout.output(self.board.pin_red, duty.r)?;
        self.breakout.output(self.board.pin_green, duty.g)?;
        self.breakout.output(self.board.pin_blue, duty.b)?;
        Ok(())
    }

    fn refresh_display(&mut self) -> HardwareResult<()> {
        let Some(display) = self.display.as_mut() else {
            return Ok(());
        };
        let text = format_volume(self.dispatcher.current_volume());
        display.clear(ClearTarget::Page)?;
        display.set_cursor(0, 0)?;
        display.print(&text)?;
        display.display()
    }

    /// One poll iteration, without the sleep.
    pub fn tick(&mut self) -> HardwareResult<Tick> {
        let count = self.read_count()?;

        let duty = led_duty(count, self.period, self.board.brightness);
        self.write_led(duty)?;

        let action = volume_action(count);
        if let Some(action) = action {
            debug!("Encoder count {} -> {:?}", count, action);
            self.dispatcher
                .bus()
                .publish(BusEvent::EncoderTurned { count });
            self.dispatcher.apply(action);
        }

        self.refresh_display()?;

        Ok(Tick {
            count,
            duty,
            action,
        })
    }

    /// Poll until `shutdown` is cancelled or the hardware fails.
    pub fn run(mut self, shutdown: &CancellationToken) -> HardwareResult<()> {
        info!("Rotary poll loop started ({} Hz)", POLL_RATE_HZ);
        self.dispatcher.bus().publish(BusEvent::ControllerStarted {
            i2c_addr: self.board.i2c_addr,
        });

        let result = loop {
            if shutdown.is_cancelled() {
                break Ok(());
            }
            if let Err(e) = self.tick() {
                break Err(e);
            }
            thread::sleep(POLL_INTERVAL);
        };

        let reason = match &result {
            Ok(()) => {
                info!("Rotary poll loop stopped");
                "shutdown".to_string()
            }
            Err(e) => {
                error!("Rotary poll loop failed: {}", e);
                e.to_string()
            }
        };
        self.dispatcher
            .bus()
            .publish(BusEvent::ControllerStopped { reason });

        result
    }
}
