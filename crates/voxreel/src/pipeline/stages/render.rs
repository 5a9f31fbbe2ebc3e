//! Background track: a slideshow of one image per transcript scene, or an
//! audio waveform when there is no transcript or the slideshow fails.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::{ImageProvider, ProgressBand, SceneConfig, VideoConfig};
use crate::images::{ImageFetcher, ImageRequest, ImageSource};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::error::StageError;
use crate::pipeline::scenes::{display_durations, split_into_scenes, Scene};
use crate::pipeline::stage::{Stage, StageProgress};
use crate::tools::{FfmpegArgs, Tool, ToolInvocation, ToolInvoker};

use super::{ensure_dir, expect_output};

/// Gradient renders are a single frame.
const GRADIENT_TIMEOUT: Duration = Duration::from_secs(15);

/// Base and accent colour for locally rendered scene images, cycled by
/// scene index.
const GRADIENT_COLORS: [(&str, &str); 10] = [
    ("#0f3460", "#e94560"),
    ("#1a1a2e", "#e94560"),
    ("#16213e", "#533483"),
    ("#0f0f23", "#e94560"),
    ("#1b262c", "#0f4c75"),
    ("#2d132c", "#ee4540"),
    ("#121212", "#1db954"),
    ("#0d1117", "#58a6ff"),
    ("#1c1c3c", "#f39c12"),
    ("#0b0b2b", "#00d2ff"),
];

const IMAGE_SEED_OFFSET: u64 = 42;

pub struct BackgroundRenderStage {
    invoker: Arc<dyn ToolInvoker>,
    images: ImageSource,
    timeout: Duration,
    video: VideoConfig,
    scenes: SceneConfig,
    band: ProgressBand,
}

impl BackgroundRenderStage {
    pub fn new(
        invoker: Arc<dyn ToolInvoker>,
        fetcher: Arc<dyn ImageFetcher>,
        timeout: Duration,
        video: VideoConfig,
        scenes: SceneConfig,
        band: ProgressBand,
    ) -> Self {
        Self {
            invoker,
            images: ImageSource::new(fetcher, &scenes),
            timeout,
            video,
            scenes,
            band,
        }
    }

    fn ffmpeg(&self, args: Vec<String>, timeout: Duration, output: &Path) -> Result<(), StageError> {
        self.invoker
            .invoke(&ToolInvocation::new(Tool::Ffmpeg, timeout).args(args))?
            .ensure_success(Tool::Ffmpeg)?;
        expect_output(Tool::Ffmpeg, output)
    }

    /// Builds the slideshow, then removes the scene images and concat list
    /// whether or not it worked.
    fn render_slideshow(
        &self,
        ctx: &mut PipelineContext,
        progress: &StageProgress<'_>,
        scenes: &[Scene],
        duration: f64,
        output: &Path,
    ) -> Result<(), StageError> {
        let result = self.build_slideshow(ctx, progress, scenes, duration, output);
        remove_scratch_files(ctx, scenes.len());
        result
    }

    fn build_slideshow(
        &self,
        ctx: &mut PipelineContext,
        progress: &StageProgress<'_>,
        scenes: &[Scene],
        duration: f64,
        output: &Path,
    ) -> Result<(), StageError> {
        let total = scenes.len();
        let mut images = Vec::with_capacity(total);
        for (index, scene) in scenes.iter().enumerate() {
            let path = ctx.scene_image_path(index);
            let provider = self.scene_image(scene, index, &path)?;
            let source = provider.map_or("gradient", |p| p.name());
            ctx.log(format!("Image {}/{} ready ({})", index + 1, total, source));
            progress.advance(ctx, index + 1, total)?;
            if provider.is_some() && index + 1 < total && self.scenes.request_delay_ms > 0 {
                thread::sleep(Duration::from_millis(self.scenes.request_delay_ms));
            }
            images.push(path);
        }

        let list_path = ctx.scene_list_path();
        let list = concat_list(&images, &display_durations(scenes, duration));
        std::fs::write(&list_path, list).map_err(|e| StageError::io(&list_path, e))?;

        ctx.log("Building slideshow video");
        let args = FfmpegArgs::new()
            .input_with(["-f", "concat", "-safe", "0"], list_path.to_string_lossy())
            .video_filter(self.slideshow_filter())
            .output_args(["-t".to_string(), format!("{:.3}", duration)])
            .video_codec("libx264")
            .preset(self.video.preset.as_str())
            .pixel_format("yuv420p")
            .output_args(["-r".to_string(), self.video.fps.to_string()])
            .build(output);
        self.ffmpeg(args, self.timeout, output)
    }

    /// Writes the image for `scene` to `path`. Returns the provider it came
    /// from, or `None` for a local gradient.
    fn scene_image(
        &self,
        scene: &Scene,
        index: usize,
        path: &Path,
    ) -> Result<Option<ImageProvider>, StageError> {
        if self.images.has_providers() {
            let request = ImageRequest {
                prompt: scene.prompt(&self.scenes.style_suffix),
                width: self.video.width,
                height: self.video.height,
                seed: index as u64 + IMAGE_SEED_OFFSET,
            };
            if let Some((provider, bytes)) = self.images.fetch(&request) {
                std::fs::write(path, bytes).map_err(|e| StageError::io(path, e))?;
                return Ok(Some(provider));
            }
        }
        self.gradient_image(index, path)?;
        Ok(None)
    }

    /// Two-tone gradient frame; a flat colour if ffmpeg rejects the drawbox
    /// chain.
    fn gradient_image(&self, index: usize, path: &Path) -> Result<(), StageError> {
        let (base, accent) = GRADIENT_COLORS[index % GRADIENT_COLORS.len()];
        let VideoConfig { width, height, .. } = self.video;
        let mid = height / 2;
        let band = height / 4;
        let plain = format!("color=c={}:s={}x{}:d=1", base, width, height);
        let styled = format!(
            "{plain},\
             drawbox=x=0:y={top}:w={w}:h={tall}:color={accent}@0.5:t=fill,\
             drawbox=x=0:y={mid}:w={w}:h={mid}:color={accent}@0.85:t=fill,\
             drawbox=x={quarter}:y={strip}:w={half}:h=4:color=white@0.08:t=fill",
            plain = plain,
            top = mid - band,
            tall = mid + band,
            w = width,
            mid = mid,
            accent = accent,
            quarter = width / 4,
            strip = mid.saturating_sub(2),
            half = width / 2,
        );

        let render = |source: String| {
            let args = FfmpegArgs::new()
                .input_with(["-f", "lavfi"], source)
                .output_args(["-frames:v", "1"])
                .build(path);
            self.ffmpeg(args, GRADIENT_TIMEOUT, path)
        };
        render(styled).or_else(|error| {
            debug!(%error, index, "styled gradient failed, using flat colour");
            render(plain)
        })
    }

    fn slideshow_filter(&self) -> String {
        let VideoConfig {
            width, height, fps, ..
        } = self.video;
        format!(
            "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},fps={fps},format=yuv420p",
            w = width,
            h = height,
            fps = fps,
        )
    }

    fn render_waveform(&self, ctx: &PipelineContext, duration: f64, output: &Path) -> Result<(), StageError> {
        let args = FfmpegArgs::new()
            .input(&ctx.audio_path)
            .filter_complex(self.waveform_filter(duration))
            .map("[v]")
            .output_args(["-t".to_string(), format!("{:.3}", duration)])
            .video_codec("libx264")
            .preset(self.video.preset.as_str())
            .pixel_format("yuv420p")
            .output_args(["-r".to_string(), self.video.fps.to_string()])
            .build(output);
        self.ffmpeg(args, self.timeout, output)
    }

    fn waveform_filter(&self, duration: f64) -> String {
        let VideoConfig {
            width, height, fps, ..
        } = self.video;
        format!(
            "color=c=#0f0f23:s={w}x{h}:d={d:.3}:r={fps}[bg];\
             [0:a]showwaves=s={w}x{wave_h}:mode=cline:rate={fps}:colors=#e94560|#533483:scale=sqrt[wave];\
             [bg][wave]overlay=0:(H-h)/2:format=auto[v]",
            w = width,
            h = height,
            d = duration,
            fps = fps,
            wave_h = height / 4,
        )
    }
}

/// ffconcat script showing each image for its duration. The last image is
/// listed twice so its duration is honoured.
fn concat_list(images: &[PathBuf], durations: &[f64]) -> String {
    let mut list = String::from("ffconcat version 1.0\n");
    for (image, secs) in images.iter().zip(durations) {
        let _ = writeln!(list, "file '{}'", quote_concat_path(image));
        let _ = writeln!(list, "duration {:.3}", secs);
    }
    if let Some(last) = images.last() {
        let _ = writeln!(list, "file '{}'", quote_concat_path(last));
    }
    list
}

fn quote_concat_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', "'\\''")
}

fn remove_scratch_files(ctx: &PipelineContext, scene_count: usize) {
    let paths = (0..scene_count)
        .map(|i| ctx.scene_image_path(i))
        .chain(std::iter::once(ctx.scene_list_path()));
    for path in paths {
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "could not remove scene file"),
        }
    }
}

impl Stage for BackgroundRenderStage {
    fn name(&self) -> &'static str {
        "render"
    }

    fn label(&self) -> &'static str {
        "Background render"
    }

    fn band(&self) -> ProgressBand {
        self.band
    }

    fn announcement(&self) -> String {
        "Generating background video".to_string()
    }

    fn run(&self, ctx: &mut PipelineContext, progress: &StageProgress<'_>) -> Result<(), StageError> {
        let duration = ctx.duration()?;
        ensure_dir(&ctx.outputs_dir)?;
        let output = ctx.background_video_path();

        let scenes = split_into_scenes(&ctx.segments, self.scenes.scene_duration_secs);
        if !scenes.is_empty() {
            ctx.log(format!("Split transcript into {} scenes", scenes.len()));
            match self.render_slideshow(ctx, progress, &scenes, duration, &output) {
                Ok(()) => {
                    ctx.log("Background video rendered");
                    ctx.background_path = Some(output);
                    return Ok(());
                }
                Err(error @ StageError::Report(_)) => return Err(error),
                Err(error) => {
                    warn!(job_id = %ctx.job_id, %error, "slideshow failed, rendering waveform");
                    ctx.log(format!("Scene images failed: {}. Falling back to waveform.", error));
                }
            }
        }

        ctx.log("Generating waveform video");
        self.render_waveform(ctx, duration, &output)?;
        ctx.log("Background video rendered");
        ctx.background_path = Some(output);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::testing::{jpeg, ScriptedFetcher};
    use crate::images::FetchError;
    use crate::pipeline::progress::{ProgressEvent, ProgressReporter, RecordingProgress};
    use crate::pipeline::stages::testing::{
        exit_failure, no_progress, write_ffmpeg_output, ScriptedInvoker,
    };
    use crate::pipeline::subtitles::Segment;
    use crate::store::StoreError;
    use crate::tools::ToolOutput;
    use std::sync::Mutex;

    const BAND: ProgressBand = ProgressBand::new(50, 70);

    fn no_providers() -> SceneConfig {
        SceneConfig {
            providers: Vec::new(),
            request_delay_ms: 0,
            retry_backoff_secs: vec![0],
            ..SceneConfig::default()
        }
    }

    fn stage_with(invoker: Arc<ScriptedInvoker>, fetcher: Arc<ScriptedFetcher>, scenes: SceneConfig) -> BackgroundRenderStage {
        BackgroundRenderStage::new(
            invoker,
            fetcher,
            Duration::from_secs(300),
            VideoConfig::default(),
            scenes,
            BAND,
        )
    }

    fn stage(invoker: Arc<ScriptedInvoker>) -> BackgroundRenderStage {
        stage_with(invoker, unreachable_fetcher(), no_providers())
    }

    fn unreachable_fetcher() -> Arc<ScriptedFetcher> {
        Arc::new(ScriptedFetcher::new(|provider, _| {
            Err(FetchError::Status {
                provider,
                status: 500,
            })
        }))
    }

    fn ffmpeg_ok() -> Arc<ScriptedInvoker> {
        Arc::new(ScriptedInvoker::new(|inv| {
            write_ffmpeg_output(inv);
            Ok(ToolOutput::success(""))
        }))
    }

    fn segment(start: f64, end: f64, text: &str) -> Segment {
        Segment {
            start,
            end,
            text: text.to_string(),
            words: Vec::new(),
        }
    }

    /// Three five-second scenes over 15s of audio.
    fn transcribed(dir: &Path) -> PipelineContext {
        let mut ctx = PipelineContext::new("job1", dir.join("a.mp3"), dir);
        ctx.duration_secs = Some(15.0);
        ctx.segments = vec![
            segment(0.0, 5.0, "A quiet harbour at dawn."),
            segment(5.0, 10.0, "Fishing boats head out."),
            segment(10.0, 15.0, "Gulls circle overhead."),
        ];
        ctx
    }

    fn is_concat(args: &[String]) -> bool {
        args.iter().any(|a| a == "concat")
    }

    /// Every log line the stage produced, flushed or still pending.
    fn all_logs(recorder: &RecordingProgress, ctx: &PipelineContext) -> Vec<String> {
        let mut logs: Vec<String> = recorder
            .events()
            .into_iter()
            .flat_map(|e| match e {
                ProgressEvent::StageProgress { logs, .. } => logs,
                _ => Vec::new(),
            })
            .collect();
        logs.extend(ctx.pending_logs().iter().cloned());
        logs
    }

    fn leftover_scene_files(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.contains("_scene"))
            .collect()
    }

    #[test]
    fn test_slideshow_from_downloaded_images() {
        let tmp = tempfile::tempdir().unwrap();
        let list = Arc::new(Mutex::new(String::new()));
        let seen = Arc::clone(&list);
        let invoker = Arc::new(ScriptedInvoker::new(move |inv| {
            if is_concat(&inv.args) {
                let path = inv.flag_value("-i").unwrap();
                *seen.lock().unwrap() = std::fs::read_to_string(path).unwrap();
            }
            write_ffmpeg_output(inv);
            Ok(ToolOutput::success(""))
        }));
        let fetcher = Arc::new(ScriptedFetcher::new(|_, _| Ok(jpeg(8000))));
        let scenes = SceneConfig {
            providers: vec![ImageProvider::Pollinations],
            ..no_providers()
        };
        let recorder = RecordingProgress::new();
        let progress = StageProgress::new("render", BAND, &recorder);
        let mut ctx = transcribed(tmp.path());

        stage_with(invoker.clone(), fetcher.clone(), scenes)
            .run(&mut ctx, &progress)
            .unwrap();

        assert_eq!(ctx.background_path, Some(ctx.background_video_path()));
        assert_eq!(invoker.calls().len(), 1);
        let call = &invoker.calls()[0];
        assert_eq!(call.flag_value("-f"), Some("concat"));
        assert_eq!(call.flag_value("-t"), Some("15.000"));

        let requests = fetcher.calls();
        assert_eq!(requests.len(), 3);
        assert!(requests[0].1.prompt.starts_with("A quiet harbour at dawn., cinematic lighting"));
        assert_eq!(requests[2].1.seed, 44);

        let first = ctx.scene_image_path(0).to_string_lossy().into_owned();
        let last = ctx.scene_image_path(2).to_string_lossy().into_owned();
        let list = list.lock().unwrap().clone();
        assert!(list.starts_with(&format!("ffconcat version 1.0\nfile '{}'\nduration 5.000\n", first)));
        assert!(list.ends_with(&format!("duration 5.000\nfile '{}'\n", last)));

        let values: Vec<u8> = recorder
            .events()
            .iter()
            .map(|e| match e {
                ProgressEvent::StageProgress { progress, .. } => *progress,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(values, vec![56, 63, 70]);
        assert!(matches!(
            &recorder.events()[0],
            ProgressEvent::StageProgress { logs, .. }
                if logs == &["Split transcript into 3 scenes", "Image 1/3 ready (pollinations)"]
        ));
        assert!(leftover_scene_files(tmp.path()).is_empty());
    }

    #[test]
    fn test_gradient_images_without_providers() {
        let tmp = tempfile::tempdir().unwrap();
        let invoker = ffmpeg_ok();
        let fetcher = unreachable_fetcher();
        let recorder = RecordingProgress::new();
        let mut ctx = transcribed(tmp.path());

        stage_with(invoker.clone(), fetcher.clone(), no_providers())
            .run(&mut ctx, &StageProgress::new("render", BAND, &recorder))
            .unwrap();

        assert!(fetcher.calls().is_empty());
        let calls = invoker.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0].flag_value("-f"), Some("lavfi"));
        assert_eq!(calls[0].flag_value("-frames:v"), Some("1"));
        let source = calls[0].flag_value("-i").unwrap();
        assert!(source.starts_with("color=c=#0f3460:s=1280x720:d=1,drawbox=x=0:y=180:w=1280:h=540:color=#e94560@0.5"));
        assert!(calls[1].flag_value("-i").unwrap().starts_with("color=c=#1a1a2e"));
        assert!(is_concat(&calls[3].args));
        assert!(all_logs(&recorder, &ctx).contains(&"Image 2/3 ready (gradient)".to_string()));
    }

    #[test]
    fn test_failed_downloads_fall_back_to_gradient() {
        let tmp = tempfile::tempdir().unwrap();
        let invoker = ffmpeg_ok();
        let fetcher = Arc::new(ScriptedFetcher::new(|_, _| Ok(b"<html>busy</html>".to_vec())));
        let scenes = SceneConfig {
            providers: vec![ImageProvider::Pollinations, ImageProvider::Picsum],
            max_attempts: 2,
            ..no_providers()
        };
        let recorder = RecordingProgress::new();
        let mut ctx = transcribed(tmp.path());
        ctx.segments.truncate(1);

        stage_with(invoker.clone(), fetcher.clone(), scenes)
            .run(&mut ctx, &StageProgress::new("render", BAND, &recorder))
            .unwrap();

        assert_eq!(fetcher.calls().len(), 4);
        assert_eq!(invoker.calls().len(), 2);
        assert_eq!(invoker.calls()[0].flag_value("-f"), Some("lavfi"));
        assert!(all_logs(&recorder, &ctx).contains(&"Image 1/1 ready (gradient)".to_string()));
    }

    #[test]
    fn test_flat_colour_when_gradient_filter_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let invoker = Arc::new(ScriptedInvoker::new(|inv| {
            if inv.args.iter().any(|a| a.contains("drawbox")) {
                return Ok(exit_failure("No such filter: 'drawbox'"));
            }
            write_ffmpeg_output(inv);
            Ok(ToolOutput::success(""))
        }));
        let mut ctx = transcribed(tmp.path());
        ctx.segments.truncate(1);

        stage(invoker.clone()).run(&mut ctx, &no_progress()).unwrap();

        let calls = invoker.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].flag_value("-i"), Some("color=c=#0f3460:s=1280x720:d=1"));
        assert!(is_concat(&calls[2].args));
    }

    #[test]
    fn test_slideshow_failure_falls_back_to_waveform() {
        let tmp = tempfile::tempdir().unwrap();
        let invoker = Arc::new(ScriptedInvoker::new(|inv| {
            if is_concat(&inv.args) {
                return Ok(exit_failure("Impossible to open scenes.txt"));
            }
            write_ffmpeg_output(inv);
            Ok(ToolOutput::success(""))
        }));
        let mut ctx = transcribed(tmp.path());

        stage(invoker.clone()).run(&mut ctx, &no_progress()).unwrap();

        assert_eq!(ctx.background_path, Some(ctx.background_video_path()));
        let calls = invoker.calls();
        assert_eq!(calls.len(), 5);
        assert!(calls[4]
            .flag_value("-filter_complex")
            .unwrap()
            .contains("showwaves"));
        assert!(ctx
            .pending_logs()
            .iter()
            .any(|l| l.starts_with("Scene images failed:") && l.ends_with("Falling back to waveform.")));
        assert!(leftover_scene_files(tmp.path()).is_empty());
    }

    #[test]
    fn test_waveform_without_transcript() {
        let tmp = tempfile::tempdir().unwrap();
        let invoker = ffmpeg_ok();
        let mut ctx = PipelineContext::new("job1", tmp.path().join("a.mp3"), tmp.path());
        ctx.duration_secs = Some(12.5);

        stage(invoker.clone()).run(&mut ctx, &no_progress()).unwrap();

        assert_eq!(ctx.background_path, Some(ctx.background_video_path()));
        assert_eq!(invoker.calls().len(), 1);
        let call = &invoker.calls()[0];
        assert_eq!(call.tool, Tool::Ffmpeg);
        assert_eq!(call.flag_value("-t"), Some("12.500"));
        assert_eq!(call.flag_value("-map"), Some("[v]"));
        let filter = call.flag_value("-filter_complex").unwrap();
        assert!(filter.starts_with("color=c=#0f0f23:s=1280x720:d=12.500:r=30[bg];"));
        assert!(filter.contains("showwaves=s=1280x180"));
    }

    #[test]
    fn test_progress_failure_is_not_swallowed_by_fallback() {
        struct Rejecting;
        impl ProgressReporter for Rejecting {
            fn report(&self, _event: ProgressEvent) -> Result<(), StoreError> {
                Err(StoreError::NotFound("job1".to_string()))
            }
        }
        let tmp = tempfile::tempdir().unwrap();
        let invoker = ffmpeg_ok();
        let progress = StageProgress::new("render", BAND, &Rejecting);
        let mut ctx = transcribed(tmp.path());

        let result = stage(invoker.clone()).run(&mut ctx, &progress);

        assert!(matches!(result, Err(StageError::Report(StoreError::NotFound(_)))));
        assert_eq!(invoker.calls().len(), 1);
        assert!(ctx.background_path.is_none());
        assert!(leftover_scene_files(tmp.path()).is_empty());
    }

    #[test]
    fn test_requires_duration() {
        let tmp = tempfile::tempdir().unwrap();
        let invoker = Arc::new(ScriptedInvoker::new(|_| Ok(ToolOutput::success(""))));
        let mut ctx = PipelineContext::new("job1", tmp.path().join("a.mp3"), tmp.path());

        assert!(matches!(
            stage(invoker.clone()).run(&mut ctx, &no_progress()),
            Err(StageError::MissingInput(_))
        ));
        assert!(invoker.calls().is_empty());
    }

    #[test]
    fn test_missing_output_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let invoker = Arc::new(ScriptedInvoker::new(|_| Ok(ToolOutput::success(""))));
        let mut ctx = PipelineContext::new("job1", tmp.path().join("a.mp3"), tmp.path());
        ctx.duration_secs = Some(3.0);

        assert!(matches!(
            stage(invoker).run(&mut ctx, &no_progress()),
            Err(StageError::InvalidOutput {
                tool: Tool::Ffmpeg,
                ..
            })
        ));
        assert!(ctx.background_path.is_none());
    }

    #[test]
    fn test_concat_list_quotes_paths() {
        let list = concat_list(&[PathBuf::from("/out/it's_scene_000.jpg")], &[2.5]);
        assert_eq!(
            list,
            "ffconcat version 1.0\nfile '/out/it'\\''s_scene_000.jpg'\nduration 2.500\nfile '/out/it'\\''s_scene_000.jpg'\n"
        );
    }
}
