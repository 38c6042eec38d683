//! Callback dispatch to the volume and player collaborators
//!
//! Collaborators are attached by the daemon after the plugin is built and
//! may be absent. A missing collaborator turns the callback into a logged
//! no-op; nothing here returns an error.

use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::bus::{report_usage, SharedBus, USAGE_ROTARY_BUTTON, USAGE_ROTARY_VOLUME};
use crate::controls::{PlayerControl, VolumeControl};
use crate::quadrature::KnobEvent;

/// Magnitude the poll loop passes to `increase`/`decrease` per tick
pub const LOOP_STEP: i32 = 5;

/// What the poll loop asks of the dispatcher for one encoder count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeAction {
    Increase(i32),
    Decrease(i32),
}

/// Map a tick's encoder count to a volume action. The size of the turn
/// doesn't matter, only its sign.
pub fn volume_action(count: i32) -> Option<VolumeAction> {
    match count.signum() {
        1 => Some(VolumeAction::Increase(LOOP_STEP)),
        -1 => Some(VolumeAction::Decrease(LOOP_STEP)),
        _ => None,
    }
}

struct Slots {
    volume: RwLock<Option<Arc<dyn VolumeControl>>>,
    player: RwLock<Option<Arc<dyn PlayerControl>>>,
}

/// Increase/decrease/button callbacks, shared by the poll loop and the
/// GPIO knob watcher.
#[derive(Clone)]
pub struct Dispatcher {
    step: i32,
    bus: SharedBus,
    slots: Arc<Slots>,
}

impl Dispatcher {
    /// `step` is the volume change in percent applied per callback.
    pub fn new(step: i32, bus: SharedBus) -> Self {
        Self {
            step,
            bus,
            slots: Arc::new(Slots {
                volume: RwLock::new(None),
                player: RwLock::new(None),
            }),
        }
    }

    pub fn with_volume_control(self, volume: Arc<dyn VolumeControl>) -> Self {
        self.set_volume_control(Some(volume));
        self
    }

    pub fn with_player_control(self, player: Arc<dyn PlayerControl>) -> Self {
        self.set_player_control(Some(player));
        self
    }

    pub fn set_volume_control(&self, volume: Option<Arc<dyn VolumeControl>>) {
        *self
            .slots
            .volume
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = volume;
    }

    pub fn set_player_control(&self, player: Option<Arc<dyn PlayerControl>>) {
        *self
            .slots
            .player
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = player;
    }

    pub fn bus(&self) -> &SharedBus {
        &self.bus
    }

    fn volume_control(&self) -> Option<Arc<dyn VolumeControl>> {
        self.slots
            .volume
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn player_control(&self) -> Option<Arc<dyn PlayerControl>> {
        self.slots
            .player
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Raise the volume by `step` percent. `ticks` is informational.
    pub fn increase(&self, ticks: i32) {
        self.change_volume(self.step, ticks);
    }

    /// Lower the volume by `step` percent. `ticks` is informational.
    pub fn decrease(&self, ticks: i32) {
        self.change_volume(-self.step, ticks);
    }

    fn change_volume(&self, delta: i32, ticks: i32) {
        match self.volume_control() {
            Some(volume) => {
                debug!("Rotary volume change {:+}% ({} ticks)", delta, ticks);
                volume.change_volume_percent(delta);
                report_usage(&self.bus, USAGE_ROTARY_VOLUME, 1);
            }
            None => info!("no volume control, ignoring rotary control"),
        }
    }

    /// Toggle play/pause
    pub fn button(&self) {
        match self.player_control() {
            Some(player) => {
                player.playpause();
                report_usage(&self.bus, USAGE_ROTARY_BUTTON, 1);
            }
            None => info!("no player control, ignoring press"),
        }
    }

    /// Volume to show on the display, if a volume collaborator is attached
    pub fn current_volume(&self) -> Option<f32> {
        self.volume_control().map(|volume| volume.current_volume())
    }

    /// Route a decoded GPIO knob event to its callback
    pub fn dispatch(&self, event: KnobEvent) {
        match event {
            KnobEvent::Clockwise => self.increase(1),
            KnobEvent::CounterClockwise => self.decrease(1),
            KnobEvent::Pressed => self.button(),
        }
    }

    /// Run a poll-loop volume action
    pub fn apply(&self, action: VolumeAction) {
        match action {
            VolumeAction::Increase(ticks) => self.increase(ticks),
            VolumeAction::Decrease(ticks) => self.decrease(ticks),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{create_bus, BusEvent};
    use crate::controls::{LoggingPlayer, SoftwareMixer};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingVolume {
        deltas: Mutex<Vec<i32>>,
    }

    impl VolumeControl for RecordingVolume {
        fn change_volume_percent(&self, delta: i32) {
            self.deltas.lock().unwrap().push(delta);
        }

        fn current_volume(&self) -> f32 {
            self.deltas.lock().unwrap().iter().sum::<i32>() as f32
        }
    }

    #[test]
    fn test_volume_action_uses_fixed_magnitude() {
        assert_eq!(volume_action(1), Some(VolumeAction::Increase(5)));
        assert_eq!(volume_action(37), Some(VolumeAction::Increase(5)));
        assert_eq!(volume_action(-1), Some(VolumeAction::Decrease(5)));
        assert_eq!(volume_action(-200), Some(VolumeAction::Decrease(5)));
        assert_eq!(volume_action(0), None);
    }

    #[test]
    fn test_increase_decrease_without_volume_control_is_noop() {
        let bus = create_bus();
        let mut rx = bus.subscribe();
        let dispatcher = Dispatcher::new(5, bus);

        dispatcher.increase(5);
        dispatcher.decrease(5);
        dispatcher.button();

        assert!(dispatcher.current_volume().is_none());
        assert!(rx.try_recv().is_err(), "no usage should be reported");
    }

    #[test]
    fn test_step_applied_with_sign() {
        let volume = Arc::new(RecordingVolume::default());
        let dispatcher = Dispatcher::new(3, create_bus()).with_volume_control(volume.clone());

        dispatcher.increase(5);
        dispatcher.decrease(5);
        dispatcher.increase(1);

        assert_eq!(*volume.deltas.lock().unwrap(), vec![3, -3, 3]);
        assert_eq!(dispatcher.current_volume(), Some(3.0));
    }

    #[test]
    fn test_usage_reported_per_call() {
        let bus = create_bus();
        let mut rx = bus.subscribe();
        let dispatcher = Dispatcher::new(5, bus)
            .with_volume_control(Arc::new(SoftwareMixer::new(50.0)))
            .with_player_control(Arc::new(LoggingPlayer::new()));

        dispatcher.decrease(5);
        dispatcher.button();

        assert_eq!(
            rx.try_recv().unwrap(),
            BusEvent::UsageReported {
                event: USAGE_ROTARY_VOLUME.to_string(),
                count: 1
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            BusEvent::UsageReported {
                event: USAGE_ROTARY_BUTTON.to_string(),
                count: 1
            }
        );
    }

    #[test]
    fn test_collaborators_attached_later_are_used() {
        let dispatcher = Dispatcher::new(5, create_bus());
        let worker = dispatcher.clone();
        let player = Arc::new(LoggingPlayer::new());

        worker.button();
        assert!(!player.is_playing());

        dispatcher.set_player_control(Some(player.clone()));
        worker.button();
        assert!(player.is_playing());

        dispatcher.set_player_control(None);
        worker.button();
        assert!(player.is_playing());
    }

    #[test]
    fn test_knob_events_route_to_callbacks() {
        let mixer = Arc::new(SoftwareMixer::new(50.0));
        let player = Arc::new(LoggingPlayer::new());
        let dispatcher = Dispatcher::new(5, create_bus())
            .with_volume_control(mixer.clone())
            .with_player_control(player.clone());

        dispatcher.dispatch(KnobEvent::Clockwise);
        dispatcher.dispatch(KnobEvent::Clockwise);
        dispatcher.dispatch(KnobEvent::CounterClockwise);
        dispatcher.dispatch(KnobEvent::Pressed);

        assert_eq!(mixer.current_volume(), 55.0);
        assert!(player.is_playing());
    }
}
