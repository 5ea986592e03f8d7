//! Lyric text parsing and current-line lookup.
//!
//! Synced lyrics use the bracketed LRC layout (`[mm:ss.xx]text`); anything
//! else is treated as plain text and only ever displayed statically.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{LyricSyncError, LyricsPreferences, Result};

/// Sentinel stored by the lyrics provider when a lookup came back empty.
pub const LYRICS_NOT_FOUND: &str = "LYRICS_NOT_FOUND";

/// Spacing of the synthetic timestamps given to plain-text lines.
pub const UNSYNCED_LINE_SPACING_MS: i64 = 100;

/// A single timestamped line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricLine {
    pub time_ms: i64,
    pub text: String,
}

impl LyricLine {
    pub fn new(time_ms: i64, text: impl Into<String>) -> Self {
        Self {
            time_ms,
            text: text.into(),
        }
    }

    /// Empty anchor line placed before the first real line of synced lyrics.
    pub fn head() -> Self {
        Self::new(0, "")
    }

    /// Number of embedded line breaks, i.e. extra display rows.
    pub fn line_breaks(&self) -> usize {
        self.text.matches('\n').count()
    }
}

/// What the lyrics provider currently has for the playing track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LyricsSource {
    /// Nothing fetched yet, or a translation is still running.
    Loading,
    NotFound,
    Text(String),
}

impl LyricsSource {
    pub fn from_provider(raw: Option<&str>, translating: bool) -> Self {
        match raw {
            _ if translating => Self::Loading,
            None => Self::Loading,
            Some(LYRICS_NOT_FOUND) => Self::NotFound,
            Some(text) => Self::Text(text.to_string()),
        }
    }

    /// Picks the text to show under the user's preferences. With
    /// translation enabled, found lyrics stay loading until `translation`
    /// arrives and the translation is shown in their place.
    pub fn for_preferences(
        raw: Option<&str>,
        translation: Option<&str>,
        prefs: &LyricsPreferences,
    ) -> Self {
        if !prefs.translate {
            return Self::from_provider(raw, false);
        }
        match (raw, translation) {
            (Some(LYRICS_NOT_FOUND), _) => Self::NotFound,
            (Some(_), Some(translated)) => Self::from_provider(Some(translated), false),
            (raw, None) => Self::from_provider(raw, raw.is_some()),
            (None, Some(_)) => Self::Loading,
        }
    }

    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Text(text) if text.starts_with('['))
    }
}

/// Reads a lyric file as UTF-8 text, dropping a leading byte order mark.
pub fn read_lyric_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8(bytes).map_err(|err| {
        LyricSyncError::msg(format!(
            "{} is not UTF-8 text (invalid byte at offset {})",
            path.display(),
            err.utf8_error().valid_up_to()
        ))
    })?;
    Ok(match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    })
}

/// Parsed, immutable line sequence for one lyric source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LyricDocument {
    lines: Vec<LyricLine>,
    synced: bool,
}

impl LyricDocument {
    pub fn from_source(source: &LyricsSource, prefs: &LyricsPreferences) -> Self {
        match source {
            LyricsSource::Text(text) if source.is_synced() => {
                let mut lines = vec![LyricLine::head()];
                lines.extend(parse_lrc(text, prefs.trim, prefs.multiline));
                Self::synced(lines)
            }
            LyricsSource::Text(text) => Self::unsynced(text),
            LyricsSource::Loading | LyricsSource::NotFound => Self::default(),
        }
    }

    /// Wraps an already ordered line sequence as synced lyrics.
    pub fn synced(lines: Vec<LyricLine>) -> Self {
        Self {
            lines,
            synced: true,
        }
    }

    /// Splits plain text into lines with evenly spaced synthetic timestamps.
    pub fn unsynced(text: &str) -> Self {
        let lines = text
            .lines()
            .enumerate()
            .map(|(index, line)| LyricLine::new(index as i64 * UNSYNCED_LINE_SPACING_MS, line))
            .collect();
        Self {
            lines,
            synced: false,
        }
    }

    pub fn lines(&self) -> &[LyricLine] {
        &self.lines
    }

    pub fn line(&self, index: usize) -> Option<&LyricLine> {
        self.lines.get(index)
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Current line for `position_ms`, or -1. Always -1 for plain text.
    pub fn current_line_index(&self, position_ms: i64) -> i32 {
        if !self.synced {
            return -1;
        }
        find_current_line_index(&self.lines, position_ms)
    }
}

/// Returns the greatest index whose timestamp is `<= position_ms`, or -1 when
/// the slice is empty or the first line starts after the position. Lines
/// sharing a timestamp resolve to the last of them.
pub fn find_current_line_index(lines: &[LyricLine], position_ms: i64) -> i32 {
    let count = lines.partition_point(|line| line.time_ms <= position_ms);
    count as i32 - 1
}

/// Parses LRC text into lines ordered by timestamp.
///
/// A line carrying several leading timestamps yields one entry per
/// timestamp. Metadata tags such as `[ar:Artist]` are skipped. With
/// `multiline` enabled an untimed line continues the entries of the
/// preceding timed line, otherwise it is dropped.
pub fn parse_lrc(text: &str, trim: bool, multiline: bool) -> Vec<LyricLine> {
    let mut lines: Vec<LyricLine> = Vec::new();
    let mut last_group = 0..0;

    for raw in text.lines() {
        let (timestamps, rest) = split_timestamps(raw);

        if timestamps.is_empty() {
            let continuation = !raw.trim().is_empty() && !raw.trim_start().starts_with('[');
            if multiline && continuation {
                let extra = if trim { raw.trim() } else { raw };
                for entry in &mut lines[last_group.clone()] {
                    entry.text.push('\n');
                    entry.text.push_str(extra);
                }
            } else {
                // Blank lines and tags end the running entry.
                last_group = 0..0;
            }
            continue;
        }

        let body = if trim { rest.trim() } else { rest };
        let start = lines.len();
        lines.extend(timestamps.into_iter().map(|time| LyricLine::new(time, body)));
        last_group = start..lines.len();
    }

    // Stable, so equal timestamps keep their order in the file.
    lines.sort_by_key(|line| line.time_ms);
    lines
}

fn split_timestamps(line: &str) -> (Vec<i64>, &str) {
    let line = line.trim_start();
    let mut timestamps = Vec::new();
    let mut pos = 0;

    while let Some((consumed, time)) = parse_time(&line[pos..]) {
        timestamps.push(time);
        pos += consumed;
    }

    (timestamps, &line[pos..])
}

/// Parses one `[mm:ss]`, `[mm:ss.f]`, `[mm:ss.ff]` or `[mm:ss.fff]` tag
/// (`:` also accepted before the fraction). Returns the bytes consumed and
/// the time in milliseconds.
fn parse_time(src: &str) -> Option<(usize, i64)> {
    if !src.starts_with('[') {
        return None;
    }
    let end = src.find(']')?;
    let parts: Vec<&str> = src[1..end].split([':', '.']).collect();

    fn digits(part: &str) -> Option<i64> {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        part.parse().ok()
    }

    let (minutes, seconds, fraction) = match parts.as_slice() {
        [min, sec] => (digits(min)?, digits(sec)?, 0),
        [min, sec, frac] => {
            let value = digits(frac)?;
            let millis = match frac.len() {
                1 => value * 100,
                2 => value * 10,
                3 => value,
                _ => return None,
            };
            (digits(min)?, digits(sec)?, millis)
        }
        _ => return None,
    };

    // Out-of-range tags are skipped like any other malformed tag.
    let time = minutes
        .checked_mul(60_000)?
        .checked_add(seconds.checked_mul(1_000)?)?
        .checked_add(fraction)?;
    Some((end + 1, time))
}
