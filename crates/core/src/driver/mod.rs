//! Async task that drives a [`LyricSyncController`].
//!
//! The task owns the controller outright. It samples the position every poll
//! interval, sleeps until the manual-scroll grace deadline, and applies
//! commands from [`SyncHandle`]s. State goes out on a `watch` channel, scroll
//! requests on an unbounded `mpsc` channel.

use std::{future, sync::Arc};

use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{self, Instant, Interval, MissedTickBehavior},
};

use crate::{
    AppConfig, LyricDocument, LyricSyncController, LyricSyncError, LyricsPreferences,
    LyricsSource, Orientation, Player, PositionSample, PreviewSource, Result, ScrollRequest,
    SyncSnapshot,
};

#[derive(Debug)]
enum SyncCommand {
    SetSource(LyricsSource),
    ManualScroll,
    TapLine(usize),
    SetOrientation(Orientation),
    Shutdown,
}

/// Cloneable front end to a running driver.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    commands: mpsc::UnboundedSender<SyncCommand>,
    state: watch::Receiver<SyncSnapshot>,
}

impl SyncHandle {
    /// Replaces the lyric source. The reset state is published before the
    /// next position sample is taken.
    pub fn set_source(&self, source: LyricsSource) -> Result<()> {
        self.send(SyncCommand::SetSource(source))
    }

    /// Reports a user scroll or fling on the lyrics list.
    pub fn manual_scroll(&self) -> Result<()> {
        self.send(SyncCommand::ManualScroll)
    }

    /// Reports a tap on line `index`; synced lines seek the player.
    pub fn tap_line(&self, index: usize) -> Result<()> {
        self.send(SyncCommand::TapLine(index))
    }

    pub fn set_orientation(&self, orientation: Orientation) -> Result<()> {
        self.send(SyncCommand::SetOrientation(orientation))
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(SyncCommand::Shutdown)
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot> {
        self.state.clone()
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.state.borrow().clone()
    }

    fn send(&self, command: SyncCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| LyricSyncError::DriverClosed)
    }
}

/// Everything returned by [`spawn`].
#[derive(Debug)]
pub struct SyncSession {
    pub handle: SyncHandle,
    pub scrolls: mpsc::UnboundedReceiver<ScrollRequest>,
    pub task: JoinHandle<()>,
}

/// Starts a driver on the current tokio runtime.
pub fn spawn(
    config: &AppConfig,
    player: Arc<dyn Player>,
    preview: Arc<dyn PreviewSource>,
) -> SyncSession {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (scroll_tx, scroll_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(SyncSnapshot::default());

    let driver = SyncDriver {
        controller: LyricSyncController::new(config.sync.clone()),
        preferences: config.lyrics.clone(),
        player,
        preview,
        commands: command_rx,
        scrolls: scroll_tx,
        state: state_tx,
    };
    let task = tokio::spawn(driver.run());

    SyncSession {
        handle: SyncHandle {
            commands: command_tx,
            state: state_rx,
        },
        scrolls: scroll_rx,
        task,
    }
}

struct SyncDriver {
    controller: LyricSyncController,
    preferences: LyricsPreferences,
    player: Arc<dyn Player>,
    preview: Arc<dyn PreviewSource>,
    commands: mpsc::UnboundedReceiver<SyncCommand>,
    scrolls: mpsc::UnboundedSender<ScrollRequest>,
    state: watch::Sender<SyncSnapshot>,
}

impl SyncDriver {
    async fn run(mut self) {
        let period = self.controller.config().poll_interval();
        let mut poll = time::interval_at(Instant::now() + period, period);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::debug!(?period, "lyric sync driver started");

        loop {
            let polling = self.controller.document().is_synced();
            let deadline = self.controller.grace_deadline();

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(SyncCommand::Shutdown) | None => break,
                    Some(command) => self.apply(command, &mut poll),
                },
                _ = poll.tick(), if polling => self.sample(),
                _ = grace_timer(deadline) => {
                    let request = self.controller.expire_grace(now());
                    self.emit(request);
                }
            }
            self.publish();
        }

        tracing::debug!("lyric sync driver stopped");
    }

    fn apply(&mut self, command: SyncCommand, poll: &mut Interval) {
        match command {
            SyncCommand::SetSource(source) => {
                let document = LyricDocument::from_source(&source, &self.preferences);
                self.controller.set_document(document);
                poll.reset();
            }
            SyncCommand::ManualScroll => self.controller.on_manual_scroll(now()),
            SyncCommand::TapLine(index) => {
                if let Some(target) = self.controller.tap_line(index) {
                    tracing::info!(line = index, position_ms = target, "seeking to tapped line");
                    self.player.seek_to(target);
                }
            }
            SyncCommand::SetOrientation(orientation) => {
                self.controller.set_orientation(orientation)
            }
            SyncCommand::Shutdown => {}
        }
    }

    fn sample(&mut self) {
        let player = &self.player;
        let sample = PositionSample::resolve(self.preview.preview_position(), || {
            player.current_position()
        });
        let request = self.controller.tick(sample, now());
        self.emit(request);
    }

    fn emit(&self, request: Option<ScrollRequest>) {
        if let Some(request) = request {
            tracing::trace!(?request, "scroll requested");
            // Nobody listening for scrolls is fine; state still flows.
            let _ = self.scrolls.send(request);
        }
    }

    fn publish(&self) {
        let snapshot = self.controller.snapshot();
        self.state.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });
    }
}

async fn grace_timer(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(Instant::from_std(deadline)).await,
        None => future::pending().await,
    }
}

/// Wall time as seen by the tokio clock, so paused test time applies.
fn now() -> std::time::Instant {
    Instant::now().into_std()
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicI64, Ordering},
            Mutex,
        },
        time::Duration,
    };

    use super::*;
    use crate::ScrollMode;

    const LRC: &str = "[00:01.00]B\n[00:02.00]C";

    #[derive(Default)]
    struct FakePlayer {
        position: AtomicI64,
    }

    impl FakePlayer {
        fn at(position: i64) -> Arc<Self> {
            Arc::new(Self {
                position: AtomicI64::new(position),
            })
        }
    }

    impl Player for FakePlayer {
        fn current_position(&self) -> i64 {
            self.position.load(Ordering::SeqCst)
        }

        fn seek_to(&self, position_ms: i64) {
            self.position.store(position_ms, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct Scrubber {
        position: Mutex<Option<i64>>,
    }

    impl Scrubber {
        fn set(&self, position: Option<i64>) {
            *self.position.lock().unwrap() = position;
        }
    }

    impl PreviewSource for Scrubber {
        fn preview_position(&self) -> Option<i64> {
            *self.position.lock().unwrap()
        }
    }

    fn start(player: Arc<FakePlayer>, scrubber: Arc<Scrubber>) -> SyncSession {
        let session = spawn(&AppConfig::default(), player, scrubber);
        session
            .handle
            .set_source(LyricsSource::Text(LRC.to_string()))
            .unwrap();
        session
    }

    #[tokio::test(start_paused = true)]
    async fn polls_player_and_requests_scroll() {
        let mut session = start(FakePlayer::at(1500), Arc::default());
        let mut state = session.handle.subscribe();

        state
            .wait_for(|s| s.state.current_line_index == 1)
            .await
            .unwrap();
        let request = session.scrolls.recv().await.unwrap();
        assert_eq!((request.index, request.mode), (1, ScrollMode::Animate));
        assert_eq!(session.handle.snapshot().displayed_line_index, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn new_source_publishes_reset_before_sampling() {
        let session = start(FakePlayer::at(1500), Arc::default());
        let mut state = session.handle.subscribe();
        state
            .wait_for(|s| s.state.current_line_index == 1)
            .await
            .unwrap();

        session
            .handle
            .set_source(LyricsSource::Text("[00:00.50]x".into()))
            .unwrap();
        let reset = state.wait_for(|s| s.generation == 2).await.unwrap().clone();
        assert_eq!(reset.state.current_line_index, -1);
        assert_eq!(reset.displayed_line_index, -1);

        state
            .wait_for(|s| s.state.current_line_index == 1)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn scrubbing_overrides_live_position() {
        let scrubber = Arc::new(Scrubber::default());
        let mut session = start(FakePlayer::at(1500), scrubber.clone());
        let mut state = session.handle.subscribe();
        state
            .wait_for(|s| s.state.current_line_index == 1)
            .await
            .unwrap();
        session.scrolls.recv().await.unwrap();

        scrubber.set(Some(2500));
        let seeking = state
            .wait_for(|s| s.state.is_user_seeking)
            .await
            .unwrap()
            .clone();
        assert_eq!(seeking.state.current_line_index, 2);
        assert_eq!(seeking.displayed_line_index, 1);
        let jump = session.scrolls.recv().await.unwrap();
        assert_eq!((jump.index, jump.mode), (2, ScrollMode::Jump));

        scrubber.set(None);
        state
            .wait_for(|s| !s.state.is_user_seeking && s.state.current_line_index == 1)
            .await
            .unwrap();
        let settle = session.scrolls.recv().await.unwrap();
        assert_eq!((settle.index, settle.mode), (1, ScrollMode::Animate));
    }

    #[tokio::test(start_paused = true)]
    async fn manual_scroll_defers_until_grace_period_ends() {
        let player = FakePlayer::at(1500);
        let mut session = start(player.clone(), Arc::default());
        let mut state = session.handle.subscribe();
        state
            .wait_for(|s| s.state.current_line_index == 1)
            .await
            .unwrap();
        session.scrolls.recv().await.unwrap();

        let started = Instant::now();
        session.handle.manual_scroll().unwrap();
        player.seek_to(2500);

        let deferred = state
            .wait_for(|s| s.state.current_line_index == 2)
            .await
            .unwrap()
            .clone();
        assert!(deferred.state.is_interacting());
        assert_eq!(deferred.displayed_line_index, 1);

        state
            .wait_for(|s| !s.state.is_interacting())
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_secs(4));
        assert_eq!(session.handle.snapshot().displayed_line_index, 2);
        let resume = session.scrolls.recv().await.unwrap();
        assert_eq!((resume.index, resume.mode), (2, ScrollMode::Animate));
    }

    #[tokio::test(start_paused = true)]
    async fn tapping_a_line_seeks_the_player() {
        let player = FakePlayer::at(1500);
        let session = start(player.clone(), Arc::default());
        let mut state = session.handle.subscribe();
        state
            .wait_for(|s| s.state.current_line_index == 1)
            .await
            .unwrap();

        session.handle.tap_line(2).unwrap();
        state
            .wait_for(|s| s.state.current_line_index == 2)
            .await
            .unwrap();
        assert_eq!(player.current_position(), 2000);
    }

    #[tokio::test(start_paused = true)]
    async fn plain_text_is_not_polled() {
        let player = FakePlayer::at(150);
        let session = spawn(&AppConfig::default(), player, Arc::new(Scrubber::default()));
        session
            .handle
            .set_source(LyricsSource::Text("one\ntwo\nthree".into()))
            .unwrap();
        let mut state = session.handle.subscribe();
        let snapshot = state.wait_for(|s| s.generation == 1).await.unwrap().clone();
        assert!(!snapshot.synced);

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(session.handle.snapshot().state.current_line_index, -1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_closes_the_handle() {
        let session = start(FakePlayer::at(0), Arc::default());
        session.handle.shutdown().unwrap();
        session.task.await.unwrap();

        let err = session.handle.manual_scroll().unwrap_err();
        assert!(matches!(err, LyricSyncError::DriverClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_every_handle_stops_the_task() {
        let session = start(FakePlayer::at(0), Arc::default());
        let SyncSession { handle, task, .. } = session;
        drop(handle);
        task.await.unwrap();
    }
}
