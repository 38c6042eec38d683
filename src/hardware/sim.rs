//! In-memory hardware for tests and the bench binary
//!
//! Each simulated device is a cheap clonable handle over shared state, so a
//! test (or the console driver in `main.rs`) can keep one clone to inject
//! input and inspect output while the controller thread owns the other.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{
    ClearTarget, EncoderBreakout, HardwareError, HardwareResult, KnobLines, PinInputs, PinLevels,
    PinMode, TextDisplay,
};

fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// Encoder breakout
// =============================================================================

/// Encoder pins registered through `setup_rotary_encoder`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderPins {
    pub pin_a: u8,
    pub pin_b: u8,
    pub pin_c: Option<u8>,
}

#[derive(Debug, Default)]
pub struct BreakoutState {
    pub interrupt_pin_swap: Option<bool>,
    pub encoders: HashMap<u8, EncoderPins>,
    pub pwm_period: Option<u16>,
    pub pwm_divider: Option<u8>,
    pub modes: HashMap<u8, (PinMode, bool)>,
    /// Last duty written per pin
    pub outputs: HashMap<u8, u16>,
    /// Pending counts per channel, cleared by `clear_rotary_encoder`
    pub counts: HashMap<u8, i32>,
    pub interrupt: bool,
    pub encoder_reads: usize,
    pub encoder_clears: usize,
    pub interrupt_clears: usize,
    /// When set, the next bus transaction fails with an I2C error
    pub fail_next: bool,
}

#[derive(Debug, Clone)]
pub struct SimulatedBreakout {
    addr: u8,
    state: Arc<Mutex<BreakoutState>>,
}

impl SimulatedBreakout {
    pub fn new(addr: u8) -> Self {
        Self {
            addr,
            state: Arc::new(Mutex::new(BreakoutState::default())),
        }
    }

    /// Accumulate rotation on a channel and raise the interrupt, as the
    /// expander firmware does when the quadrature inputs move.
    pub fn turn(&self, channel: u8, ticks: i32) {
        let mut state = lock(&self.state);
        *state.counts.entry(channel).or_insert(0) += ticks;
        state.interrupt = true;
    }

    pub fn fail_next(&self) {
        lock(&self.state).fail_next = true;
    }

    pub fn state(&self) -> MutexGuard<'_, BreakoutState> {
        lock(&self.state)
    }

    fn transact(&self) -> HardwareResult<MutexGuard<'_, BreakoutState>> {
        let mut state = lock(&self.state);
        if state.fail_next {
            state.fail_next = false;
            return Err(HardwareError::I2c {
                addr: self.addr,
                reason: "no ack".to_string(),
            });
        }
        Ok(state)
    }
}

impl EncoderBreakout for SimulatedBreakout {
    fn enable_interrupt_out(&mut self, pin_swap: bool) -> HardwareResult<()> {
        self.transact()?.interrupt_pin_swap = Some(pin_swap);
        Ok(())
    }

    fn setup_rotary_encoder(
        &mut self,
        channel: u8,
        pin_a: u8,
        pin_b: u8,
        pin_c: Option<u8>,
    ) -> HardwareResult<()> {
        self.transact()?.encoders.insert(
            channel,
            EncoderPins {
                pin_a,
                pin_b,
                pin_c,
            },
        );
        Ok(())
    }

    fn set_pwm_period(&mut self, period: u16) -> HardwareResult<()> {
        self.transact()?.pwm_period = Some(period);
        Ok(())
    }

    fn set_pwm_control(&mut self, divider: u8) -> HardwareResult<()> {
        self.transact()?.pwm_divider = Some(divider);
        Ok(())
    }

    fn set_mode(&mut self, pin: u8, mode: PinMode, invert: bool) -> HardwareResult<()> {
        self.transact()?.modes.insert(pin, (mode, invert));
        Ok(())
    }

    fn get_interrupt(&mut self) -> HardwareResult<bool> {
        Ok(self.transact()?.interrupt)
    }

    fn clear_interrupt(&mut self) -> HardwareResult<()> {
        let mut state = self.transact()?;
        state.interrupt = false;
        state.interrupt_clears += 1;
        Ok(())
    }

    fn read_rotary_encoder(&mut self, channel: u8) -> HardwareResult<i32> {
        let mut state = self.transact()?;
        if !state.encoders.contains_key(&channel) {
            return Err(HardwareError::UnknownChannel(channel));
        }
        state.encoder_reads += 1;
        Ok(state.counts.get(&channel).copied().unwrap_or(0))
    }

    fn clear_rotary_encoder(&mut self, channel: u8) -> HardwareResult<()> {
        let mut state = self.transact()?;
        if !state.encoders.contains_key(&channel) {
            return Err(HardwareError::UnknownChannel(channel));
        }
        state.counts.insert(channel, 0);
        state.encoder_clears += 1;
        Ok(())
    }

    fn output(&mut self, pin: u8, value: u16) -> HardwareResult<()> {
        self.transact()?.outputs.insert(pin, value);
        Ok(())
    }
}

// =============================================================================
// Text display
// =============================================================================

#[derive(Debug)]
pub struct DisplayState {
    pub connected: bool,
    pub begun: bool,
    pub font: Option<u8>,
    pub cursor: (u8, u8),
    pub page: String,
    /// Every page pushed with `display()`, oldest first
    pub frames: Vec<String>,
    pub full_clears: usize,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            connected: true,
            begun: false,
            font: None,
            cursor: (0, 0),
            page: String::new(),
            frames: Vec::new(),
            full_clears: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedDisplay {
    state: Arc<Mutex<DisplayState>>,
}

impl SimulatedDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// A display that reports itself absent on the bus
    pub fn disconnected() -> Self {
        let display = Self::default();
        display.state().connected = false;
        display
    }

    pub fn state(&self) -> MutexGuard<'_, DisplayState> {
        lock(&self.state)
    }

    /// Most recently displayed page
    pub fn last_frame(&self) -> Option<String> {
        self.state().frames.last().cloned()
    }
}

impl TextDisplay for SimulatedDisplay {
    fn connected(&mut self) -> bool {
        self.state().connected
    }

    fn begin(&mut self) -> HardwareResult<()> {
        let mut state = self.state();
        if !state.connected {
            return Err(HardwareError::Disconnected);
        }
        state.begun = true;
        Ok(())
    }

    fn clear(&mut self, target: ClearTarget) -> HardwareResult<()> {
        let mut state = self.state();
        state.page.clear();
        if target == ClearTarget::All {
            state.full_clears += 1;
        }
        Ok(())
    }

    fn set_font_type(&mut self, font: u8) -> HardwareResult<()> {
        self.state().font = Some(font);
        Ok(())
    }

    fn set_cursor(&mut self, x: u8, y: u8) -> HardwareResult<()> {
        self.state().cursor = (x, y);
        Ok(())
    }

    fn print(&mut self, text: &str) -> HardwareResult<()> {
        self.state().page.push_str(text);
        Ok(())
    }

    fn display(&mut self) -> HardwareResult<()> {
        let mut state = self.state();
        if !state.connected {
            return Err(HardwareError::Disconnected);
        }
        let page = state.page.clone();
        state.frames.push(page);
        Ok(())
    }
}

// =============================================================================
// Knob GPIO lines
// =============================================================================

/// Scripted pin levels on a fixed set of lines. Each read consumes one
/// queued sample; once the queue is empty the last level is held.
#[derive(Debug, Clone)]
pub struct SimulatedPins {
    lines: KnobLines,
    state: Arc<Mutex<(VecDeque<PinLevels>, PinLevels)>>,
}

impl SimulatedPins {
    /// Claim the knob's lines. Fails if one line is given for two signals.
    pub fn new(lines: KnobLines) -> HardwareResult<Self> {
        lines.check_distinct()?;
        Ok(Self {
            lines,
            state: Arc::new(Mutex::new((VecDeque::new(), PinLevels::default()))),
        })
    }

    pub fn push(&self, levels: PinLevels) {
        lock(&self.state).0.push_back(levels);
    }

    /// Queue a full press and release of the switch
    pub fn press(&self) {
        let idle = PinLevels::default();
        self.push(PinLevels { sw: false, ..idle });
        self.push(idle);
    }

    pub fn pending(&self) -> usize {
        lock(&self.state).0.len()
    }
}

impl PinInputs for SimulatedPins {
    fn lines(&self) -> KnobLines {
        self.lines
    }

    fn read_levels(&mut self) -> HardwareResult<PinLevels> {
        let mut state = lock(&self.state);
        if let Some(next) = state.0.pop_front() {
            state.1 = next;
        }
        Ok(state.1)
    }
}
