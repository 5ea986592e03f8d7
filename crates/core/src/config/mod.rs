use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sync: SyncConfig,
    pub lyrics: LyricsPreferences,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing fields fall back to their
    /// defaults so a partial file is enough.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&raw)?;
        tracing::debug!(path = ?path.as_ref(), "loaded configuration");
        Ok(config)
    }

    /// Writes the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }
}

/// Timing and layout constants for the sync controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Delay between two position samples.
    pub poll_interval_ms: u64,
    /// How long auto-scroll stays suspended after the last manual scroll.
    pub grace_period_ms: u64,
    /// Distance from the top of the viewport at which the current line lands.
    pub anchor_offset_px: i32,
    /// Extra offset per embedded line break, portrait layout.
    pub line_break_offset_px: i32,
    /// Extra offset per embedded line break, landscape layout.
    pub landscape_line_break_offset_px: i32,
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        // A zero period would make `tokio::time::interval` panic.
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            grace_period_ms: 4_000,
            anchor_offset_px: 36,
            line_break_offset_px: 20,
            landscape_line_break_offset_px: 16,
        }
    }
}

/// Horizontal alignment of lyric lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextPosition {
    Left,
    #[default]
    Center,
    Right,
}

/// User preferences read by the lyrics view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LyricsPreferences {
    pub font_size: u32,
    pub text_position: TextPosition,
    /// Trim surrounding whitespace from every parsed line.
    pub trim: bool,
    /// Fold untimed lines into the preceding timed line.
    pub multiline: bool,
    /// Hide the lyrics list entirely when false.
    pub show_lyrics: bool,
    /// Show the translated lyrics once a translation is available.
    pub translate: bool,
}

impl Default for LyricsPreferences {
    fn default() -> Self {
        Self {
            font_size: 20,
            text_position: TextPosition::Center,
            trim: false,
            multiline: true,
            show_lyrics: true,
            translate: false,
        }
    }
}
