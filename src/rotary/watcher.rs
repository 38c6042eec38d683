//! GPIO knob watcher
//!
//! Samples the KY-040 lines at a fixed short interval and feeds decoded
//! events to the dispatcher.

use std::thread;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::hardware::{HardwareResult, PinInputs};
use crate::quadrature::{KnobDecoder, KnobEvent};

use super::dispatch::Dispatcher;

pub const KNOB_SAMPLE_INTERVAL: Duration = Duration::from_millis(1);

pub struct KnobWatcher<P> {
    pins: P,
    decoder: KnobDecoder,
    dispatcher: Dispatcher,
}

impl<P: PinInputs> KnobWatcher<P> {
    pub fn new(pins: P, dispatcher: Dispatcher) -> Self {
        Self {
            pins,
            decoder: KnobDecoder::default(),
            dispatcher,
        }
    }

    /// Read the lines once and dispatch whatever they decode to.
    pub fn poll_once(&mut self, now: Instant) -> HardwareResult<Vec<KnobEvent>> {
        let levels = self.pins.read_levels()?;
        let events = self.decoder.sample(levels, now);
        for event in &events {
            self.dispatcher.dispatch(*event);
        }
        Ok(events)
    }

    pub fn run(mut self, shutdown: &CancellationToken) -> HardwareResult<()> {
        let lines = self.pins.lines();
        info!(
            "GPIO knob watcher started on clk={}, dt={}, sw={}",
            lines.clk, lines.dt, lines.sw
        );
        while !shutdown.is_cancelled() {
            if let Err(e) = self.poll_once(Instant::now()) {
                error!("GPIO knob watcher failed: {}", e);
                return Err(e);
            }
            thread::sleep(KNOB_SAMPLE_INTERVAL);
        }
        info!("GPIO knob watcher stopped");
        Ok(())
    }
}
