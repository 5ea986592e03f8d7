//! Current-line tracking and scroll arbitration.
//!
//! [`LyricSyncController`] is a plain state machine: callers feed it position
//! samples and manual scroll events together with the time they happened, and
//! it answers with the scroll the view should perform, if any. Timers live in
//! [`crate::driver`].

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::{LyricDocument, SyncConfig};

/// One position reading taken on a poll tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSample {
    /// Position reported by the player.
    Live(i64),
    /// Scrub position while the user drags the seek control.
    Preview(i64),
}

impl PositionSample {
    /// Prefers the preview position; the live position is only read when no
    /// preview is supplied.
    pub fn resolve(preview: Option<i64>, live: impl FnOnce() -> i64) -> Self {
        match preview {
            Some(position) => Self::Preview(position),
            None => Self::Live(live()),
        }
    }

    pub fn position(self) -> i64 {
        match self {
            Self::Live(position) | Self::Preview(position) => position,
        }
    }

    pub fn is_preview(self) -> bool {
        matches!(self, Self::Preview(_))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScrollMode {
    /// Move instantly, used while the list tracks a scrub.
    Jump,
    Animate,
}

/// Instruction for the list view: bring `index` to the anchor position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollRequest {
    pub index: usize,
    pub offset_px: i32,
    pub mode: ScrollMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncState {
    /// Resolved line for the latest sample, -1 when there is none.
    pub current_line_index: i32,
    pub is_user_seeking: bool,
    /// Line highlighted while the user interacts with the list.
    pub deferred_line_index: i32,
    pub last_manual_scroll: Option<Instant>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            current_line_index: -1,
            is_user_seeking: false,
            deferred_line_index: -1,
            last_manual_scroll: None,
        }
    }
}

impl SyncState {
    pub fn is_interacting(&self) -> bool {
        self.is_user_seeking || self.last_manual_scroll.is_some()
    }

    /// Line that should be drawn with full emphasis.
    pub fn displayed_line_index(&self) -> i32 {
        if self.is_interacting() {
            self.deferred_line_index
        } else {
            self.current_line_index
        }
    }
}

/// State published to the rendering layer after every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSnapshot {
    pub state: SyncState,
    pub displayed_line_index: i32,
    pub synced: bool,
    /// Bumped every time the lyric source is replaced.
    pub generation: u64,
}

impl Default for SyncSnapshot {
    fn default() -> Self {
        Self {
            state: SyncState::default(),
            displayed_line_index: -1,
            synced: false,
            generation: 0,
        }
    }
}

#[derive(Debug)]
pub struct LyricSyncController {
    config: SyncConfig,
    orientation: Orientation,
    document: LyricDocument,
    state: SyncState,
    generation: u64,
}

impl LyricSyncController {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            orientation: Orientation::default(),
            document: LyricDocument::default(),
            state: SyncState::default(),
            generation: 0,
        }
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn document(&self) -> &LyricDocument {
        &self.document
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Replaces the lyrics and forgets everything tied to the previous ones.
    pub fn set_document(&mut self, document: LyricDocument) {
        self.document = document;
        self.state = SyncState::default();
        self.generation += 1;
        tracing::debug!(
            generation = self.generation,
            lines = self.document.len(),
            synced = self.document.is_synced(),
            "lyric source changed"
        );
    }

    /// Resolves the current line for `sample` and decides how the list should
    /// follow it.
    pub fn tick(&mut self, sample: PositionSample, now: Instant) -> Option<ScrollRequest> {
        if !self.document.is_synced() {
            self.state.current_line_index = -1;
            return None;
        }

        let was_seeking = self.state.is_user_seeking;
        let was_interacting = self.state.is_interacting();
        let previous = self.state.current_line_index;

        self.state.is_user_seeking = sample.is_preview();
        if self.state.is_user_seeking || self.grace_elapsed(now) {
            self.state.last_manual_scroll = None;
        }

        let resolved = self.document.current_line_index(sample.position());
        self.state.current_line_index = resolved;

        if self.state.is_user_seeking {
            if !was_seeking || resolved != previous {
                return self.request(resolved, ScrollMode::Jump);
            }
            return None;
        }

        if self.state.is_interacting() {
            return None;
        }

        self.state.deferred_line_index = resolved;
        if was_interacting || resolved != previous {
            return self.request(resolved, ScrollMode::Animate);
        }
        None
    }

    /// Records a manual scroll or fling. The grace period restarts from `now`.
    /// Ignored while seeking, the scrub already owns the list.
    pub fn on_manual_scroll(&mut self, now: Instant) {
        if self.state.is_user_seeking {
            return;
        }
        if self.state.last_manual_scroll.is_none() {
            self.state.deferred_line_index = self.state.current_line_index;
        }
        self.state.last_manual_scroll = Some(now);
    }

    /// When the grace period has run out, resumes auto-scroll with an animated
    /// scroll back to the current line.
    pub fn expire_grace(&mut self, now: Instant) -> Option<ScrollRequest> {
        if self.state.is_user_seeking || !self.grace_elapsed(now) {
            return None;
        }
        self.state.last_manual_scroll = None;
        self.state.deferred_line_index = self.state.current_line_index;
        tracing::debug!(
            line = self.state.current_line_index,
            "manual scroll grace period elapsed"
        );
        self.request(self.state.current_line_index, ScrollMode::Animate)
    }

    pub fn grace_deadline(&self) -> Option<Instant> {
        self.state
            .last_manual_scroll
            .map(|last| last + self.config.grace_period())
    }

    /// Seek target for a tap on line `index`. Plain-text lines are not
    /// clickable.
    pub fn tap_line(&mut self, index: usize) -> Option<i64> {
        if !self.document.is_synced() {
            return None;
        }
        let target = self.document.line(index)?.time_ms;
        self.state.last_manual_scroll = None;
        self.state.deferred_line_index = self.state.current_line_index;
        Some(target)
    }

    pub fn displayed_line_index(&self) -> i32 {
        self.state.displayed_line_index()
    }

    /// Offset that lands line `index` on the anchor whatever its height.
    pub fn scroll_offset(&self, index: usize) -> i32 {
        let per_break = match self.orientation {
            Orientation::Portrait => self.config.line_break_offset_px,
            Orientation::Landscape => self.config.landscape_line_break_offset_px,
        };
        let breaks = self
            .document
            .line(index)
            .map(|line| line.line_breaks())
            .unwrap_or(0);
        self.config.anchor_offset_px + per_break * breaks as i32
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            state: self.state.clone(),
            displayed_line_index: self.displayed_line_index(),
            synced: self.document.is_synced(),
            generation: self.generation,
        }
    }

    fn grace_elapsed(&self, now: Instant) -> bool {
        self.grace_deadline()
            .map(|deadline| now >= deadline)
            .unwrap_or(false)
    }

    fn request(&self, index: i32, mode: ScrollMode) -> Option<ScrollRequest> {
        let index = usize::try_from(index).ok()?;
        Some(ScrollRequest {
            index,
            offset_px: self.scroll_offset(index),
            mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::LyricLine;

    fn document() -> LyricDocument {
        LyricDocument::synced(vec![
            LyricLine::new(0, "A"),
            LyricLine::new(1000, "B"),
            LyricLine::new(2000, "C"),
        ])
    }

    fn controller() -> LyricSyncController {
        let mut controller = LyricSyncController::new(SyncConfig::default());
        controller.set_document(document());
        controller
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn resolves_lines_from_live_samples() {
        let mut sync = controller();
        let t0 = Instant::now();

        sync.tick(PositionSample::Live(1500), t0);
        assert_eq!(sync.state().current_line_index, 1);
        sync.tick(PositionSample::Live(2500), t0);
        assert_eq!(sync.state().current_line_index, 2);
        sync.tick(PositionSample::Live(-5), t0);
        assert_eq!(sync.state().current_line_index, -1);
    }

    #[test]
    fn line_changes_animate_when_idle() {
        let mut sync = controller();
        let t0 = Instant::now();

        let first = sync.tick(PositionSample::Live(100), t0);
        assert_eq!(
            first,
            Some(ScrollRequest {
                index: 0,
                offset_px: 36,
                mode: ScrollMode::Animate
            })
        );
        assert_eq!(sync.tick(PositionSample::Live(200), t0), None);

        let next = sync.tick(PositionSample::Live(1200), t0).unwrap();
        assert_eq!(next.index, 1);
        assert_eq!(next.mode, ScrollMode::Animate);
        assert_eq!(sync.displayed_line_index(), 1);
    }

    #[test]
    fn scrubbing_jumps_and_keeps_deferred_emphasis() {
        let mut sync = controller();
        let t0 = Instant::now();
        sync.tick(PositionSample::Live(100), t0);

        let jump = sync.tick(PositionSample::Preview(1500), t0).unwrap();
        assert_eq!(jump.mode, ScrollMode::Jump);
        assert_eq!(jump.index, 1);
        assert!(sync.state().is_user_seeking);
        assert_eq!(sync.state().current_line_index, 1);
        assert_eq!(sync.displayed_line_index(), 0);

        let jump = sync.tick(PositionSample::Preview(2100), t0).unwrap();
        assert_eq!((jump.index, jump.mode), (2, ScrollMode::Jump));
        assert_eq!(sync.tick(PositionSample::Preview(2200), t0), None);
        assert_eq!(sync.displayed_line_index(), 0);

        let release = sync.tick(PositionSample::Live(2200), t0).unwrap();
        assert_eq!((release.index, release.mode), (2, ScrollMode::Animate));
        assert_eq!(sync.displayed_line_index(), 2);
        assert!(!sync.state().is_interacting());
    }

    #[test]
    fn manual_scroll_suspends_auto_scroll_until_grace_expires() {
        let mut sync = controller();
        let t0 = Instant::now();
        sync.tick(PositionSample::Live(100), t0);

        sync.on_manual_scroll(t0);
        assert_eq!(sync.grace_deadline(), Some(t0 + ms(4000)));
        assert_eq!(sync.tick(PositionSample::Live(1100), t0 + ms(1000)), None);
        assert_eq!(sync.state().current_line_index, 1);
        assert_eq!(sync.displayed_line_index(), 0);

        assert_eq!(sync.expire_grace(t0 + ms(3999)), None);
        let resume = sync.expire_grace(t0 + ms(4000)).unwrap();
        assert_eq!((resume.index, resume.mode), (1, ScrollMode::Animate));
        assert_eq!(sync.state().deferred_line_index, 1);
        assert_eq!(sync.state().last_manual_scroll, None);
        assert_eq!(sync.grace_deadline(), None);
    }

    #[test]
    fn grace_expiry_is_also_noticed_on_tick() {
        let mut sync = controller();
        let t0 = Instant::now();
        sync.tick(PositionSample::Live(100), t0);
        sync.on_manual_scroll(t0);

        let resume = sync.tick(PositionSample::Live(100), t0 + ms(4500)).unwrap();
        assert_eq!((resume.index, resume.mode), (0, ScrollMode::Animate));
    }

    #[test]
    fn latest_manual_scroll_restarts_grace() {
        let mut sync = controller();
        let t0 = Instant::now();
        sync.tick(PositionSample::Live(100), t0);

        sync.on_manual_scroll(t0);
        sync.on_manual_scroll(t0 + ms(3000));
        assert_eq!(sync.expire_grace(t0 + ms(4000)), None);
        assert!(sync.state().is_interacting());
        assert!(sync.expire_grace(t0 + ms(7000)).is_some());
    }

    #[test]
    fn seeking_cancels_pending_grace() {
        let mut sync = controller();
        let t0 = Instant::now();
        sync.tick(PositionSample::Live(100), t0);
        sync.on_manual_scroll(t0);

        sync.tick(PositionSample::Preview(1500), t0 + ms(10));
        assert_eq!(sync.state().last_manual_scroll, None);
        sync.on_manual_scroll(t0 + ms(20));
        assert_eq!(sync.state().last_manual_scroll, None);
    }

    #[test]
    fn new_source_resets_state() {
        let mut sync = controller();
        let t0 = Instant::now();
        sync.tick(PositionSample::Live(2500), t0);
        sync.on_manual_scroll(t0);
        let generation = sync.generation();

        sync.set_document(document());
        assert_eq!(sync.state(), &SyncState::default());
        assert_eq!(sync.displayed_line_index(), -1);
        assert_eq!(sync.generation(), generation + 1);
    }

    #[test]
    fn plain_text_is_never_tracked() {
        let mut sync = LyricSyncController::new(SyncConfig::default());
        sync.set_document(LyricDocument::unsynced("one\ntwo\nthree"));
        let t0 = Instant::now();

        for position in [0, 100, 250, 10_000] {
            assert_eq!(sync.tick(PositionSample::Live(position), t0), None);
            assert_eq!(sync.state().current_line_index, -1);
        }
        assert_eq!(sync.tick(PositionSample::Preview(150), t0), None);
        assert_eq!(sync.tap_line(1), None);
    }

    #[test]
    fn tap_returns_seek_target_and_ends_manual_scroll() {
        let mut sync = controller();
        let t0 = Instant::now();
        sync.tick(PositionSample::Live(100), t0);
        sync.on_manual_scroll(t0);

        assert_eq!(sync.tap_line(2), Some(2000));
        assert!(!sync.state().is_interacting());
        assert_eq!(sync.tap_line(9), None);

        let follow = sync.tick(PositionSample::Live(2000), t0 + ms(50)).unwrap();
        assert_eq!((follow.index, follow.mode), (2, ScrollMode::Animate));
    }

    #[test]
    fn offsets_grow_with_embedded_line_breaks() {
        let mut sync = LyricSyncController::new(SyncConfig::default());
        sync.set_document(LyricDocument::synced(vec![
            LyricLine::new(0, "single"),
            LyricLine::new(1000, "two\nrows"),
            LyricLine::new(2000, "three\nrows\nhere"),
        ]));
        assert_eq!(sync.scroll_offset(0), 36);
        assert_eq!(sync.scroll_offset(1), 56);
        assert_eq!(sync.scroll_offset(2), 76);

        sync.set_orientation(Orientation::Landscape);
        assert_eq!(sync.scroll_offset(2), 68);
        assert_eq!(sync.scroll_offset(42), 36);
    }

    #[test]
    fn preview_sample_skips_live_read() {
        let sample = PositionSample::resolve(Some(700), || panic!("live position read"));
        assert_eq!(sample, PositionSample::Preview(700));
        assert_eq!(PositionSample::resolve(None, || 300).position(), 300);
    }
}
