use std::path::{Path, PathBuf};

use crate::store::Job;

use super::error::StageError;
use super::subtitles::Segment;

/// State threaded through the stages of one job run.
pub struct PipelineContext {
    // Input
    pub job_id: String,
    pub audio_path: PathBuf,
    pub outputs_dir: PathBuf,

    // Probe result
    pub duration_secs: Option<f64>,

    // Transcription result, always set once that stage has run (real or fallback)
    pub subtitle_path: Option<PathBuf>,
    pub subtitle_fallback: bool,
    /// Empty unless a real transcript was produced.
    pub segments: Vec<Segment>,

    // Render result
    pub background_path: Option<PathBuf>,

    // Encode result
    pub output_path: Option<PathBuf>,

    // Log lines produced since the last progress report
    logs: Vec<String>,
}

impl PipelineContext {
    pub fn new(job_id: impl Into<String>, audio_path: impl Into<PathBuf>, outputs_dir: &Path) -> Self {
        Self {
            job_id: job_id.into(),
            audio_path: audio_path.into(),
            outputs_dir: outputs_dir.to_path_buf(),
            duration_secs: None,
            subtitle_path: None,
            subtitle_fallback: false,
            segments: Vec::new(),
            background_path: None,
            output_path: None,
            logs: Vec::new(),
        }
    }

    pub fn for_job(job: &Job, outputs_dir: &Path) -> Self {
        Self::new(job.id.clone(), job.audio_path.clone(), outputs_dir)
    }

    pub fn log(&mut self, line: impl Into<String>) {
        self.logs.push(line.into());
    }

    pub fn take_logs(&mut self) -> Vec<String> {
        std::mem::take(&mut self.logs)
    }

    pub fn pending_logs(&self) -> &[String] {
        &self.logs
    }

    pub fn duration(&self) -> Result<f64, StageError> {
        self.duration_secs
            .ok_or(StageError::MissingInput("audio duration"))
    }

    /// `<outputs>/<id>.srt`
    pub fn srt_path(&self) -> PathBuf {
        self.outputs_dir.join(format!("{}.srt", self.job_id))
    }

    /// `<outputs>/<id>_background.mp4`
    pub fn background_video_path(&self) -> PathBuf {
        self.outputs_dir
            .join(format!("{}_background.mp4", self.job_id))
    }

    /// `<outputs>/<id>_scene_NNN.jpg`
    pub fn scene_image_path(&self, index: usize) -> PathBuf {
        self.outputs_dir
            .join(format!("{}_scene_{:03}.jpg", self.job_id, index))
    }

    /// Concat list feeding the slideshow render.
    pub fn scene_list_path(&self) -> PathBuf {
        self.outputs_dir.join(format!("{}_scenes.txt", self.job_id))
    }

    /// `<outputs>/<id>.mp4`
    pub fn final_video_path(&self) -> PathBuf {
        self.outputs_dir.join(format!("{}.mp4", self.job_id))
    }

    /// Scratch directory for the transcriber's own output files.
    pub fn transcript_dir(&self) -> PathBuf {
        self.outputs_dir.join(format!("{}_whisper", self.job_id))
    }
}
