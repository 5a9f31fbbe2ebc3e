//! Scripted external tools.
//!
//! `FakeTools` answers each invocation the way the real command would on
//! success: ffprobe prints a duration, whisper writes a JSON transcript into
//! `--output_dir`, ffmpeg writes a small file at its output path.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crossbeam_channel::Receiver;

use voxreel::tools::{Tool, ToolError, ToolInvocation, ToolInvoker, ToolOutput};

/// How the fake transcriber behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhisperBehavior {
    /// Writes a transcript with one segment of three timed words.
    Transcribes,
    /// Exits non-zero without writing anything.
    Crashes,
    /// Writes a transcript with zero segments.
    Silent,
    /// Exits zero but writes a file that is not JSON.
    Garbled,
}

pub struct FakeTools {
    duration_secs: f64,
    whisper: WhisperBehavior,
    /// Pause before each invocation so pollers can observe intermediate state.
    delay: Duration,
    /// ffmpeg blocks on this until a message arrives or the sender is dropped.
    ffmpeg_gate: Option<Receiver<()>>,
    /// Every ffmpeg run exits non-zero.
    ffmpeg_fails: bool,
    calls: Mutex<Vec<ToolInvocation>>,
}

impl FakeTools {
    pub fn new(duration_secs: f64) -> Self {
        Self {
            duration_secs,
            whisper: WhisperBehavior::Transcribes,
            delay: Duration::ZERO,
            ffmpeg_gate: None,
            ffmpeg_fails: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn whisper(mut self, behavior: WhisperBehavior) -> Self {
        self.whisper = behavior;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn gate_ffmpeg(mut self, gate: Receiver<()>) -> Self {
        self.ffmpeg_gate = Some(gate);
        self
    }

    pub fn failing_ffmpeg(mut self) -> Self {
        self.ffmpeg_fails = true;
        self
    }

    pub fn calls(&self) -> Vec<ToolInvocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, tool: Tool) -> usize {
        self.calls().iter().filter(|c| c.tool == tool).count()
    }

    fn probe(&self) -> ToolOutput {
        ToolOutput::success(format!(
            r#"{{"format": {{"duration": "{:.6}"}}}}"#,
            self.duration_secs
        ))
    }

    fn transcribe(&self, invocation: &ToolInvocation) -> ToolOutput {
        let transcript = match self.whisper {
            WhisperBehavior::Crashes => {
                return ToolOutput {
                    stdout: String::new(),
                    stderr: "RuntimeError: failed to load model".to_string(),
                    exit_code: Some(1),
                }
            }
            WhisperBehavior::Transcribes => sample_transcript(),
            WhisperBehavior::Silent => r#"{"text": "", "segments": []}"#.to_string(),
            WhisperBehavior::Garbled => "not json at all".to_string(),
        };

        let out_dir = PathBuf::from(invocation.flag_value("--output_dir").unwrap());
        let stem = Path::new(&invocation.args[0])
            .file_stem()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        std::fs::create_dir_all(&out_dir).unwrap();
        std::fs::write(out_dir.join(format!("{}.json", stem)), transcript).unwrap();
        ToolOutput::success("")
    }

    fn encode(&self, invocation: &ToolInvocation) -> ToolOutput {
        if let Some(gate) = &self.ffmpeg_gate {
            let _ = gate.recv_timeout(Duration::from_secs(30));
        }
        if self.ffmpeg_fails {
            return ToolOutput {
                stdout: String::new(),
                stderr: "Conversion failed!".to_string(),
                exit_code: Some(1),
            };
        }
        let output = invocation.args.last().unwrap();
        std::fs::write(output, b"\x00\x00\x00\x18ftypmp42").unwrap();
        ToolOutput::success("")
    }
}

impl ToolInvoker for FakeTools {
    fn invoke(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
        self.calls.lock().unwrap().push(invocation.clone());
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        Ok(match invocation.tool {
            Tool::Ffprobe => self.probe(),
            Tool::Whisper => self.transcribe(invocation),
            Tool::Ffmpeg => self.encode(invocation),
        })
    }
}

pub fn sample_transcript() -> String {
    r#"{"text": " Welcome to the show.", "language": "en", "segments": [
        {"start": 0.0, "end": 2.0, "text": " Welcome to the show.",
         "words": [{"word": " Welcome", "start": 0.0, "end": 0.6},
                   {"word": " to", "start": 0.6, "end": 0.8},
                   {"word": " the", "start": 0.8, "end": 1.1},
                   {"word": " show.", "start": 1.1, "end": 2.0}]}
    ]}"#
    .to_string()
}
