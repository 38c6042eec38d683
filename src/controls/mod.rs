//! Volume and playback collaborators
//!
//! The daemon owns the real volume and player subsystems and hands the
//! plugin a reference to each. The plugin only ever calls the methods below.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tracing::{debug, info};

/// Volume collaborator
pub trait VolumeControl: Send + Sync {
    /// Relative change in percent (negative lowers the volume)
    fn change_volume_percent(&self, delta: i32);

    /// Current volume in percent
    fn current_volume(&self) -> f32;
}

/// Playback collaborator
pub trait PlayerControl: Send + Sync {
    fn playpause(&self);
}

/// Clamp a value to a range
pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
    value.max(min).min(max)
}

/// In-process percent mixer, clamped to 0-100
#[derive(Debug)]
pub struct SoftwareMixer {
    volume: Mutex<f32>,
}

impl SoftwareMixer {
    pub fn new(initial: f32) -> Self {
        Self {
            volume: Mutex::new(clamp(initial, 0.0, 100.0)),
        }
    }
}

impl VolumeControl for SoftwareMixer {
    fn change_volume_percent(&self, delta: i32) {
        let mut volume = self
            .volume
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *volume = clamp(*volume + delta as f32, 0.0, 100.0);
        debug!("Mixer volume now {}", *volume);
    }

    fn current_volume(&self) -> f32 {
        *self
            .volume
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Player stand-in that tracks play/pause state and logs transitions
#[derive(Debug, Default)]
pub struct LoggingPlayer {
    playing: AtomicBool,
}

impl LoggingPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }
}

impl PlayerControl for LoggingPlayer {
    fn playpause(&self) {
        let was_playing = self.playing.fetch_xor(true, Ordering::SeqCst);
        info!("Player {}", if was_playing { "paused" } else { "playing" });
    }
}

/// Render a volume for the display: whole percent, `--` when unknown.
pub fn format_volume(volume: Option<f32>) -> String {
    match volume {
        Some(v) if v.is_finite() => format!("{}", v.round() as i64),
        _ => "--".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixer_clamps_to_percent_range() {
        let mixer = SoftwareMixer::new(97.0);
        mixer.change_volume_percent(5);
        assert_eq!(mixer.current_volume(), 100.0);

        mixer.change_volume_percent(-150);
        assert_eq!(mixer.current_volume(), 0.0);
    }

    #[test]
    fn test_mixer_initial_out_of_range_is_clamped() {
        assert_eq!(SoftwareMixer::new(140.0).current_volume(), 100.0);
        assert_eq!(SoftwareMixer::new(-3.0).current_volume(), 0.0);
    }

    #[test]
    fn test_player_toggles() {
        let player = LoggingPlayer::new();
        assert!(!player.is_playing());
        player.playpause();
        assert!(player.is_playing());
        player.playpause();
        assert!(!player.is_playing());
    }

    #[test]
    fn test_format_volume() {
        assert_eq!(format_volume(Some(42.0)), "42");
        assert_eq!(format_volume(Some(42.6)), "43");
        assert_eq!(format_volume(None), "--");
        assert_eq!(format_volume(Some(f32::NAN)), "--");
    }
}
