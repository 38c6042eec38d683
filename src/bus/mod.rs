//! Event bus for usage telemetry and controller lifecycle
//!
//! Uses tokio::sync::broadcast for pub/sub pattern. Publishing is a plain
//! synchronous call, so the poll thread can publish without a runtime.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Usage counter for volume changes made with the knob
pub const USAGE_ROTARY_VOLUME: &str = "audiocontrol_rotary_volume";
/// Usage counter for play/pause presses
pub const USAGE_ROTARY_BUTTON: &str = "audiocontrol_rotary_button";

/// Event types that can be published on the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum BusEvent {
    /// Named usage counter increment
    UsageReported { event: String, count: u32 },
    /// Nonzero encoder count serviced by the poll loop
    EncoderTurned { count: i32 },
    ControllerStarted { i2c_addr: u8 },
    ControllerStopped { reason: String },
}

/// Event bus handle for publishing and subscribing
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BusEvent>,
}

impl EventBus {
    /// Create a new event bus with specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: BusEvent) {
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.sender.subscribe()
    }

    /// Get the number of current subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    /// Default capacity (256 events)
    fn default() -> Self {
        Self::new(256)
    }
}

/// Shared event bus wrapped in Arc for thread-safe sharing
pub type SharedBus = Arc<EventBus>;

/// Create a new shared event bus
pub fn create_bus() -> SharedBus {
    Arc::new(EventBus::default())
}

/// Publish a usage counter increment
pub fn report_usage(bus: &EventBus, event: &str, count: u32) {
    bus.publish(BusEvent::UsageReported {
        event: event.to_string(),
        count,
    });
}
