//! Rotary encoder plugin
//!
//! - `Dispatcher`: increase/decrease/button callbacks into the collaborators
//! - `RotaryController`: the 30 Hz breakout poll loop (LED, volume, display)
//! - `KnobWatcher`: optional GPIO knob sampled on its own thread
//!
//! `spawn` moves the controller onto a background thread; the returned
//! `RotaryHandle` stops and joins it.

pub mod controller;
pub mod dispatch;
pub mod watcher;

pub use controller::{RotaryController, Tick, POLL_INTERVAL, POLL_RATE_HZ};
pub use dispatch::{volume_action, Dispatcher, VolumeAction, LOOP_STEP};
pub use watcher::{KnobWatcher, KNOB_SAMPLE_INTERVAL};

use std::io;
use std::panic;
use std::thread::{self, JoinHandle};

use tokio_util::sync::CancellationToken;

use crate::hardware::{EncoderBreakout, HardwareResult, PinInputs, TextDisplay};

type Worker = JoinHandle<HardwareResult<()>>;

/// Running plugin threads
pub struct RotaryHandle {
    shutdown: CancellationToken,
    poll: Worker,
    knob: Option<Worker>,
}

impl RotaryHandle {
    /// True once the poll thread has exited (cancelled or failed)
    pub fn is_finished(&self) -> bool {
        self.poll.is_finished()
    }

    /// Cancel both threads and wait for them. The poll loop's error wins
    /// if both failed.
    pub fn stop(self) -> HardwareResult<()> {
        self.shutdown.cancel();
        self.join()
    }

    /// Wait for the poll thread to exit on its own, then stop the watcher.
    pub fn join(self) -> HardwareResult<()> {
        let poll_result = join_worker(self.poll);
        self.shutdown.cancel();
        let knob_result = self.knob.map(join_worker).unwrap_or(Ok(()));
        poll_result.and(knob_result)
    }
}

fn join_worker(worker: Worker) -> HardwareResult<()> {
    match worker.join() {
        Ok(result) => result,
        Err(payload) => panic::resume_unwind(payload),
    }
}

impl<B, D> RotaryController<B, D>
where
    B: EncoderBreakout + 'static,
    D: TextDisplay + 'static,
{
    /// Run the poll loop on a background thread.
    pub fn spawn(self, shutdown: CancellationToken) -> io::Result<RotaryHandle> {
        let poll = self.spawn_poll(shutdown.clone())?;
        Ok(RotaryHandle {
            shutdown,
            poll,
            knob: None,
        })
    }

    /// Run the poll loop and a GPIO knob watcher, each on its own thread.
    pub fn spawn_with_knob<P>(self, pins: P, shutdown: CancellationToken) -> io::Result<RotaryHandle>
    where
        P: PinInputs + 'static,
    {
        let watcher = KnobWatcher::new(pins, self.dispatcher().clone());
        let knob_token = shutdown.clone();
        let knob = thread::Builder::new()
            .name("rotary-knob".into())
            .spawn(move || watcher.run(&knob_token))?;

        let poll = match self.spawn_poll(shutdown.clone()) {
            Ok(poll) => poll,
            Err(e) => {
                shutdown.cancel();
                let _ = knob.join();
                return Err(e);
            }
        };

        Ok(RotaryHandle {
            shutdown,
            poll,
            knob: Some(knob),
        })
    }

    fn spawn_poll(self, shutdown: CancellationToken) -> io::Result<Worker> {
        thread::Builder::new()
            .name("rotary-poll".into())
            .spawn(move || self.run(&shutdown))
    }
}
