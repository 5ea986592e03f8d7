use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::Instant,
};

/// Live playback collaborator: position reads and seeks.
pub trait Player: Send + Sync {
    /// Current playback position in milliseconds.
    fn current_position(&self) -> i64;

    fn seek_to(&self, position_ms: i64);
}

/// Supplies a transient scrub position while the user drags a seek control.
/// `None` means "use the live player position".
pub trait PreviewSource: Send + Sync {
    fn preview_position(&self) -> Option<i64>;
}

impl<F> PreviewSource for F
where
    F: Fn() -> Option<i64> + Send + Sync,
{
    fn preview_position(&self) -> Option<i64> {
        self()
    }
}

/// Wall-clock driven player used by the command line front end and by tests
/// that do not need deterministic time.
#[derive(Debug, Default)]
pub struct PlaybackClock {
    inner: Mutex<ClockState>,
}

#[derive(Debug, Default)]
struct ClockState {
    anchor_ms: i64,
    started: Option<Instant>,
    duration_ms: Option<i64>,
}

impl ClockState {
    fn position(&self) -> i64 {
        let elapsed = self
            .started
            .map(|started| started.elapsed().as_millis() as i64)
            .unwrap_or(0);
        let position = (self.anchor_ms + elapsed).max(0);
        match self.duration_ms {
            Some(duration) => position.min(duration),
            None => position,
        }
    }
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a clock that is already playing from `position_ms`.
    pub fn playing_from(position_ms: i64) -> Self {
        let clock = Self::new();
        clock.seek_to(position_ms);
        clock.play();
        clock
    }

    /// Clamps reported positions to the track length.
    pub fn set_duration(&self, duration_ms: Option<i64>) {
        self.lock().duration_ms = duration_ms;
    }

    pub fn play(&self) {
        let mut state = self.lock();
        if state.started.is_none() {
            state.started = Some(Instant::now());
        }
    }

    pub fn pause(&self) {
        let mut state = self.lock();
        state.anchor_ms = state.position();
        state.started = None;
    }

    pub fn is_playing(&self) -> bool {
        self.lock().started.is_some()
    }

    /// True once a known duration has been reached.
    pub fn is_finished(&self) -> bool {
        let state = self.lock();
        state
            .duration_ms
            .map(|duration| state.position() >= duration)
            .unwrap_or(false)
    }

    pub fn reset(&self) {
        let mut state = self.lock();
        state.anchor_ms = 0;
        state.started = None;
    }

    fn lock(&self) -> MutexGuard<'_, ClockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Player for PlaybackClock {
    fn current_position(&self) -> i64 {
        self.lock().position()
    }

    fn seek_to(&self, position_ms: i64) {
        let mut state = self.lock();
        state.anchor_ms = position_ms.max(0);
        if state.started.is_some() {
            state.started = Some(Instant::now());
        }
        tracing::debug!(position_ms, "clock seeked");
    }
}
