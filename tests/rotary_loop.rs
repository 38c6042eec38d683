//! End-to-end tests for the rotary plugin threads
//!
//! The controller runs on its real background thread against simulated
//! hardware. Each test injects input through a clone of the simulated
//! device and waits (bounded) for the effect.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rotary_control::bus::{create_bus, BusEvent, USAGE_ROTARY_BUTTON, USAGE_ROTARY_VOLUME};
use rotary_control::config::{BoardConfig, RotaryParams};
use rotary_control::controls::{LoggingPlayer, SoftwareMixer, VolumeControl};
use rotary_control::hardware::sim::{SimulatedBreakout, SimulatedDisplay, SimulatedPins};
use rotary_control::hardware::{HardwareError, KnobLines, PinInputs, PinLevels};
use rotary_control::rotary::{Dispatcher, RotaryController};
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(2);

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

// =============================================================================
// Poll loop
// =============================================================================

#[test]
fn turn_steps_volume_once_per_tick() {
    let bus = create_bus();
    let mut rx = bus.subscribe();
    let mixer = Arc::new(SoftwareMixer::new(50.0));
    let params = RotaryParams::default();
    let dispatcher = Dispatcher::new(params.step, bus).with_volume_control(mixer.clone());

    let breakout = SimulatedBreakout::new(0x0F);
    let display = SimulatedDisplay::new();
    let controller = RotaryController::new(
        BoardConfig::default(),
        breakout.clone(),
        display.clone(),
        dispatcher,
    )
    .expect("controller setup");
    let handle = controller
        .spawn(CancellationToken::new())
        .expect("spawn poll thread");

    // A big turn still moves the volume by a single step
    breakout.turn(1, 12);
    assert!(wait_for(|| mixer.current_volume() == 55.0));
    assert!(wait_for(|| display.last_frame().as_deref() == Some("55")));

    breakout.turn(1, -1);
    assert!(wait_for(|| mixer.current_volume() == 50.0));

    handle.stop().expect("clean stop");

    let mut usage = 0;
    let mut turned = Vec::new();
    let mut stopped = None;
    while let Ok(event) = rx.try_recv() {
        match event {
            BusEvent::UsageReported { event, .. } if event == USAGE_ROTARY_VOLUME => usage += 1,
            BusEvent::EncoderTurned { count } => turned.push(count),
            BusEvent::ControllerStopped { reason } => stopped = Some(reason),
            _ => {}
        }
    }
    assert_eq!(usage, 2);
    assert_eq!(turned, vec![12, -1]);
    assert_eq!(stopped.as_deref(), Some("shutdown"));
}

#[test]
fn loop_without_collaborators_keeps_running() {
    let breakout = SimulatedBreakout::new(0x0F);
    let display = SimulatedDisplay::new();
    let controller = RotaryController::new(
        BoardConfig::default(),
        breakout.clone(),
        display.clone(),
        Dispatcher::new(5, create_bus()),
    )
    .expect("controller setup");
    let handle = controller
        .spawn(CancellationToken::new())
        .expect("spawn poll thread");

    breakout.turn(1, 3);
    assert!(wait_for(|| breakout.state().encoder_clears >= 1));
    assert!(wait_for(|| display.last_frame().as_deref() == Some("--")));
    assert!(!handle.is_finished());

    handle.stop().expect("clean stop");
}

#[test]
fn hardware_failure_ends_loop_with_error() {
    let bus = create_bus();
    let mut rx = bus.subscribe();
    let breakout = SimulatedBreakout::new(0x0F);
    let controller = RotaryController::new(
        BoardConfig::default(),
        breakout.clone(),
        SimulatedDisplay::new(),
        Dispatcher::new(5, bus),
    )
    .expect("controller setup");
    let handle = controller
        .spawn(CancellationToken::new())
        .expect("spawn poll thread");

    breakout.fail_next();
    assert!(wait_for(|| handle.is_finished()));

    let err = handle.join().unwrap_err();
    assert!(matches!(err, HardwareError::I2c { addr: 0x0F, .. }));

    let mut stopped = None;
    while let Ok(event) = rx.try_recv() {
        if let BusEvent::ControllerStopped { reason } = event {
            stopped = Some(reason);
        }
    }
    assert_eq!(stopped.as_deref(), Some("i2c transfer to 0x0f failed: no ack"));
}

#[test]
fn external_cancel_stops_loop() {
    let shutdown = CancellationToken::new();
    let controller = RotaryController::new(
        BoardConfig::default(),
        SimulatedBreakout::new(0x0F),
        SimulatedDisplay::new(),
        Dispatcher::new(5, create_bus()),
    )
    .expect("controller setup");
    let handle = controller.spawn(shutdown.clone()).expect("spawn poll thread");

    shutdown.cancel();
    assert!(wait_for(|| handle.is_finished()));
    assert!(handle.join().is_ok());
}

// =============================================================================
// GPIO knob
// =============================================================================

#[test]
fn gpio_knob_press_toggles_playback() {
    let bus = create_bus();
    let mut rx = bus.subscribe();
    let player = Arc::new(LoggingPlayer::new());
    let dispatcher = Dispatcher::new(5, bus).with_player_control(player.clone());

    let controller = RotaryController::new(
        BoardConfig::default(),
        SimulatedBreakout::new(0x0F),
        SimulatedDisplay::new(),
        dispatcher,
    )
    .expect("controller setup");

    let params = RotaryParams::from_params(&knob_params("5", "6", "13"));
    let pins = SimulatedPins::new(params.knob_lines()).expect("claim knob lines");
    pins.push(PinLevels::default());
    pins.press();

    let handle = controller
        .spawn_with_knob(pins.clone(), CancellationToken::new())
        .expect("spawn threads");

    assert!(wait_for(|| pins.pending() == 0));
    assert!(wait_for(|| player.is_playing()));

    handle.stop().expect("clean stop");

    let mut presses = 0;
    while let Ok(event) = rx.try_recv() {
        if let BusEvent::UsageReported { event, .. } = event {
            if event == USAGE_ROTARY_BUTTON {
                presses += 1;
            }
        }
    }
    assert_eq!(presses, 1);
}

fn knob_params(clk: &str, dt: &str, sw: &str) -> HashMap<String, String> {
    [("clk", clk), ("dt", dt), ("sw", sw)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn configured_knob_lines_reach_pin_source() {
    let params = RotaryParams::from_params(&knob_params("5", "6", "13"));
    let pins = SimulatedPins::new(params.knob_lines()).expect("claim knob lines");

    assert_eq!(
        pins.lines(),
        KnobLines {
            clk: 5,
            dt: 6,
            sw: 13
        }
    );
}

#[test]
fn default_knob_lines_reach_pin_source() {
    let params = RotaryParams::from_params(&HashMap::new());
    let pins = SimulatedPins::new(params.knob_lines()).expect("claim knob lines");
    assert_eq!(pins.lines(), params.knob_lines());
}

#[test]
fn shared_knob_line_is_rejected() {
    let params = RotaryParams::from_params(&knob_params("5", "13", "13"));

    let err = SimulatedPins::new(params.knob_lines()).unwrap_err();

    assert!(matches!(err, HardwareError::Gpio { line: 13, .. }));
}
