use std::fmt::Write;

use crate::{LyricDocument, LyricsPreferences, LyricsSource, SyncSnapshot, TextPosition};

/// Emphasis of lines that are not the displayed one.
pub const DIMMED_ALPHA: f32 = 0.5;
/// Rows shown while lyrics are still loading.
pub const PLACEHOLDER_ROWS: usize = 10;
pub const NOT_FOUND_MESSAGE: &str = "Lyrics not found";

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedLine {
    pub text: String,
    pub alpha: f32,
    /// Tapping seeks the player to this line.
    pub clickable: bool,
    pub time_ms: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LyricsContent {
    /// Lyrics are switched off in the preferences.
    Hidden,
    Placeholder { rows: usize },
    NotFound { message: String, alpha: f32 },
    Lines(Vec<RenderedLine>),
}

/// Headless view model for the lyrics list.
#[derive(Debug, Clone, PartialEq)]
pub struct LyricsView {
    pub content: LyricsContent,
    pub align: TextPosition,
    pub font_size: u32,
}

impl LyricsView {
    pub fn build(
        document: &LyricDocument,
        source: &LyricsSource,
        snapshot: &SyncSnapshot,
        prefs: &LyricsPreferences,
    ) -> Self {
        let content = match source {
            _ if !prefs.show_lyrics => LyricsContent::Hidden,
            LyricsSource::Loading => LyricsContent::Placeholder {
                rows: PLACEHOLDER_ROWS,
            },
            LyricsSource::NotFound => LyricsContent::NotFound {
                message: NOT_FOUND_MESSAGE.to_string(),
                alpha: DIMMED_ALPHA,
            },
            LyricsSource::Text(_) => {
                let synced = document.is_synced();
                let displayed = snapshot.displayed_line_index;
                let lines = document
                    .lines()
                    .iter()
                    .enumerate()
                    .map(|(index, line)| RenderedLine {
                        text: line.text.clone(),
                        alpha: if !synced || index as i32 == displayed {
                            1.0
                        } else {
                            DIMMED_ALPHA
                        },
                        clickable: synced,
                        time_ms: line.time_ms,
                    })
                    .collect();
                LyricsContent::Lines(lines)
            }
        };

        Self {
            content,
            align: prefs.text_position,
            font_size: prefs.font_size,
        }
    }

    /// Index of the line drawn at full emphasis, if the lyrics are synced.
    pub fn highlighted(&self) -> Option<usize> {
        match &self.content {
            LyricsContent::Lines(lines) if lines.iter().any(|line| line.clickable) => {
                lines.iter().position(|line| line.alpha >= 1.0)
            }
            _ => None,
        }
    }

    /// Plain-text rendering used by the terminal front end. The highlighted
    /// line is marked with `>`.
    pub fn draw(&self, width: usize) -> String {
        let mut out = String::new();
        match &self.content {
            LyricsContent::Hidden => {}
            LyricsContent::Placeholder { rows } => {
                for _ in 0..*rows {
                    let _ = writeln!(out, "{}", self.aligned("~~~~~~~~", width));
                }
            }
            LyricsContent::NotFound { message, .. } => {
                let _ = writeln!(out, "{}", self.aligned(message, width));
            }
            LyricsContent::Lines(lines) => {
                for line in lines {
                    let marker = if line.clickable && line.alpha >= 1.0 {
                        '>'
                    } else {
                        ' '
                    };
                    for row in line.text.split('\n') {
                        let _ = writeln!(out, "{marker} {}", self.aligned(row, width));
                    }
                }
            }
        }
        out
    }

    fn aligned(&self, text: &str, width: usize) -> String {
        match self.align {
            TextPosition::Left => format!("{text:<width$}"),
            TextPosition::Center => format!("{text:^width$}"),
            TextPosition::Right => format!("{text:>width$}"),
        }
    }
}
