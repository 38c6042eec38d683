//! Rotary Control - hardware knob plugin for a media-player control daemon
//!
//! Reads a rotary encoder breakout over I2C (plus an optional GPIO knob),
//! colours its RGB LED by rotation, steps the daemon's volume and shows the
//! current level on a small OLED.
//!
//! This library provides:
//! - The 30 Hz encoder poll loop and callback dispatch
//! - Lenient plugin parameter parsing and layered settings
//! - Hardware and collaborator traits, with in-memory implementations
//! - A broadcast bus carrying usage telemetry

pub mod bus;
pub mod color;
pub mod config;
pub mod controls;
pub mod hardware;
pub mod quadrature;
pub mod rotary;
