//! Core library for synchronised lyric scrolling.
//!
//! Raw lyric text is parsed into an ordered [`LyricDocument`]. A
//! [`LyricSyncController`] turns position samples into the current line and
//! decides when the list may auto-scroll, and [`driver`] runs it on tokio
//! timers and publishes its state. [`LyricsView`] is the headless rendering
//! model the front end draws from.

pub mod config;
pub mod driver;
pub mod error;
pub mod lyrics;
pub mod render;
pub mod sync;
pub mod timeline;

pub use config::{AppConfig, LyricsPreferences, SyncConfig, TextPosition};
pub use driver::{spawn, SyncHandle, SyncSession};
pub use error::{LyricSyncError, Result};
pub use lyrics::{
    find_current_line_index, parse_lrc, read_lyric_file, LyricDocument, LyricLine, LyricsSource,
    LYRICS_NOT_FOUND,
};
pub use render::{LyricsContent, LyricsView, RenderedLine};
pub use sync::{
    LyricSyncController, Orientation, PositionSample, ScrollMode, ScrollRequest, SyncSnapshot,
    SyncState,
};
pub use timeline::{PlaybackClock, Player, PreviewSource};
