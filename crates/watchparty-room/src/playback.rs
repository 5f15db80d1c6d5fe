//! The room's shared transport state: which video, playing or paused, and
//! where.

use std::time::Instant;

use serde_json::Value;
use watchparty_protocol::MessageKind;

/// Playback state as last declared by the host.
///
/// The position is stored as "position at `updated_at`". While playing,
/// the reported position advances with wall time from that anchor. While
/// paused, it stays put.
#[derive(Debug, Clone)]
pub struct PlaybackState {
    video_url: String,
    is_playing: bool,
    position: f64,
    updated_at: Instant,
}

impl PlaybackState {
    /// No video, paused at 0.
    pub fn new() -> Self {
        Self {
            video_url: String::new(),
            is_playing: false,
            position: 0.0,
            updated_at: Instant::now(),
        }
    }

    pub fn video_url(&self) -> &str {
        &self.video_url
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    /// Current position in seconds.
    pub fn position(&self) -> f64 {
        self.position_at(Instant::now())
    }

    /// Position in seconds as of `now`.
    pub fn position_at(&self, now: Instant) -> f64 {
        if self.is_playing {
            let elapsed = now.saturating_duration_since(self.updated_at);
            self.position + elapsed.as_secs_f64()
        } else {
            self.position
        }
    }

    /// Applies an accepted playback-control message from the host.
    ///
    /// Returns `true` if the state changed. Kinds that don't control
    /// playback, and payload fields that are missing, leave it untouched.
    pub fn apply(&mut self, kind: MessageKind, data: &Value, now: Instant) -> bool {
        match kind {
            MessageKind::VideoUrlChanged => {
                let Some(url) = data.get("url").and_then(Value::as_str) else {
                    return false;
                };
                self.video_url = url.to_string();
                self.is_playing = false;
                self.position = 0.0;
            }
            MessageKind::PlayPause => {
                let position = data
                    .get("position")
                    .and_then(Value::as_f64)
                    .unwrap_or_else(|| self.position_at(now));
                if let Some(flag) = data.get("is_playing").and_then(Value::as_bool) {
                    self.is_playing = flag;
                }
                self.position = position.max(0.0);
            }
            MessageKind::VideoSeek => {
                let Some(position) = data.get("position").and_then(Value::as_f64) else {
                    return false;
                };
                self.position = position.max(0.0);
            }
            _ => return false,
        }
        self.updated_at = now;
        true
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new()
    }
}
