use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::{ProgressBand, VideoConfig};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::error::StageError;
use crate::pipeline::stage::{Stage, StageProgress};
use crate::tools::ffmpeg::subtitles_filter;
use crate::tools::{FfmpegArgs, Tool, ToolInvocation, ToolInvoker};

use super::expect_output;

/// Burns the subtitles into the background track and muxes in the original
/// audio as an H.264/AAC MP4.
pub struct SubtitleBurnStage {
    invoker: Arc<dyn ToolInvoker>,
    timeout: Duration,
    video: VideoConfig,
    band: ProgressBand,
}

impl SubtitleBurnStage {
    pub fn new(
        invoker: Arc<dyn ToolInvoker>,
        timeout: Duration,
        video: VideoConfig,
        band: ProgressBand,
    ) -> Self {
        Self {
            invoker,
            timeout,
            video,
            band,
        }
    }
}

impl Stage for SubtitleBurnStage {
    fn name(&self) -> &'static str {
        "encode"
    }

    fn label(&self) -> &'static str {
        "Encode"
    }

    fn band(&self) -> ProgressBand {
        self.band
    }

    fn announcement(&self) -> String {
        "Burning subtitles and combining audio".to_string()
    }

    fn run(&self, ctx: &mut PipelineContext, _progress: &StageProgress<'_>) -> Result<(), StageError> {
        let background = ctx
            .background_path
            .clone()
            .ok_or(StageError::MissingInput("background video"))?;
        let srt = ctx
            .subtitle_path
            .clone()
            .ok_or(StageError::MissingInput("subtitles"))?;
        let output = ctx.final_video_path();

        let args = FfmpegArgs::new()
            .input(&background)
            .input(&ctx.audio_path)
            .video_filter(subtitles_filter(&srt, self.video.font_size))
            .map("0:v:0")
            .map("1:a:0")
            .video_codec("libx264")
            .preset(self.video.preset.as_str())
            .crf(self.video.crf)
            .audio_codec("aac")
            .audio_bitrate(self.video.audio_bitrate.as_str())
            .output_args(["-movflags", "+faststart"])
            .pixel_format("yuv420p")
            .output_arg("-shortest")
            .build(&output);

        self.invoker
            .invoke(&ToolInvocation::new(Tool::Ffmpeg, self.timeout).args(args))?
            .ensure_success(Tool::Ffmpeg)?;
        expect_output(Tool::Ffmpeg, &output)?;

        if let Err(e) = std::fs::remove_file(&background) {
            debug!(path = %background.display(), error = %e, "could not remove background video");
        }

        ctx.log("Video encoded with subtitles");
        ctx.output_path = Some(output);
        Ok(())
    }
}
