//! Groups transcript segments into scenes, one background image each.

use super::subtitles::Segment;

/// Longest slice of scene text sent as an image prompt, in characters.
const MAX_PROMPT_CHARS: usize = 150;

const MIN_SHOWN_SECS: f64 = 0.1;

const EMPTY_SCENE_PROMPT: &str = "abstract colorful background";

#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl Scene {
    /// Image prompt: the scene text, capped, followed by `style_suffix`.
    pub fn prompt(&self, style_suffix: &str) -> String {
        let text = self.text.trim().replace('\n', " ");
        let text = if text.is_empty() {
            EMPTY_SCENE_PROMPT.to_string()
        } else {
            text.chars().take(MAX_PROMPT_CHARS).collect()
        };
        format!("{}{}", text, style_suffix)
    }
}

/// Accumulates segments until the running span reaches `scene_secs`, then
/// starts a new scene at that segment's end. Leftover segments form a
/// final, shorter scene.
pub fn split_into_scenes(segments: &[Segment], scene_secs: f64) -> Vec<Scene> {
    let Some(first) = segments.first() else {
        return Vec::new();
    };

    let mut scenes = Vec::new();
    let mut start = first.start;
    let mut end = start;
    let mut texts: Vec<&str> = Vec::new();
    for segment in segments {
        texts.push(segment.text.trim());
        end = segment.end;
        if end - start >= scene_secs {
            scenes.push(Scene {
                start,
                end,
                text: texts.join(" "),
            });
            start = end;
            texts.clear();
        }
    }
    if !texts.is_empty() {
        scenes.push(Scene {
            start,
            end,
            text: texts.join(" "),
        });
    }
    scenes
}

/// How long each scene stays on screen so the slideshow spans exactly
/// `total_secs`: the first scene also covers any lead-in, each scene runs
/// until the next one starts, and the last runs to the end of the audio.
pub fn display_durations(scenes: &[Scene], total_secs: f64) -> Vec<f64> {
    scenes
        .iter()
        .enumerate()
        .map(|(i, scene)| {
            let from = if i == 0 { 0.0 } else { scene.start };
            let to = match scenes.get(i + 1) {
                Some(next) => next.start,
                None => total_secs,
            };
            // ffmpeg rejects zero-length entries in a concat list
            (to - from).max(MIN_SHOWN_SECS)
        })
        .collect()
}
