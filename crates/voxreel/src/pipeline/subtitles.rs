//! Transcript model and SRT rendering.

use std::path::Path;

use serde::Deserialize;

use super::error::StageError;

/// Transcriber JSON output. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Transcript {
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub words: Vec<Word>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Word {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Formats seconds as an SRT timestamp, `HH:MM:SS,mmm`.
pub fn format_srt_time(seconds: f64) -> String {
    let total_ms = if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).floor() as u64
    } else {
        0
    };
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    format!(
        "{:02}:{:02}:{:02},{:03}",
        total_secs / 3600,
        (total_secs % 3600) / 60,
        total_secs % 60,
        ms
    )
}

/// Groups word timestamps into cues of `words_per_cue` words. Falls back to
/// one cue per segment when the transcript carries no word timings.
pub fn word_level_cues(segments: &[Segment], words_per_cue: usize) -> Vec<Cue> {
    let words: Vec<&Word> = segments.iter().flat_map(|s| s.words.iter()).collect();

    if words.is_empty() {
        return segments
            .iter()
            .map(|s| Cue {
                start: s.start,
                end: s.end,
                text: s.text.trim().to_string(),
            })
            .collect();
    }

    words
        .chunks(words_per_cue.max(1))
        .filter_map(|group| {
            let first = group.first()?;
            let last = group.last()?;
            Some(Cue {
                start: first.start,
                end: last.end,
                text: group
                    .iter()
                    .map(|w| w.word.trim())
                    .collect::<Vec<_>>()
                    .join(" "),
            })
        })
        .collect()
}

/// A single cue spanning the whole audio, used when no transcript exists.
pub fn fallback_cue(duration_secs: Option<f64>, text: &str) -> Cue {
    let end = duration_secs
        .filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(1.0);
    Cue {
        start: 0.0,
        end,
        text: text.to_string(),
    }
}

pub fn render_srt(cues: &[Cue]) -> String {
    cues.iter()
        .enumerate()
        .map(|(i, cue)| {
            format!(
                "{}\n{} --> {}\n{}\n",
                i + 1,
                format_srt_time(cue.start),
                format_srt_time(cue.end),
                cue.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn write_srt(path: &Path, cues: &[Cue]) -> Result<(), StageError> {
    std::fs::write(path, render_srt(cues)).map_err(|e| StageError::io(path, e))
}
