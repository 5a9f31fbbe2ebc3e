//! FFmpeg argument builder and filter helpers.

use std::path::Path;

/// Builder for an ffmpeg argument list with any number of inputs.
#[derive(Debug, Clone)]
pub struct FfmpegArgs {
    inputs: Vec<String>,
    output_args: Vec<String>,
}

impl Default for FfmpegArgs {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegArgs {
    pub fn new() -> Self {
        Self {
            inputs: Vec::new(),
            output_args: Vec::new(),
        }
    }

    /// Adds an input file (`-i <path>`).
    pub fn input(mut self, path: impl AsRef<Path>) -> Self {
        self.inputs.push("-i".to_string());
        self.inputs.push(path.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Adds an input with options placed before its `-i`.
    pub fn input_with<I, S>(mut self, options: I, source: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.extend(options.into_iter().map(Into::into));
        self.inputs.push("-i".to_string());
        self.inputs.push(source.into());
        self
    }

    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    pub fn map(self, stream: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(stream)
    }

    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    pub fn crf(self, crf: u8) -> Self {
        self.output_arg("-crf").output_arg(crf.to_string())
    }

    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.output_arg("-preset").output_arg(preset)
    }

    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.output_arg("-b:a").output_arg(bitrate)
    }

    pub fn pixel_format(self, format: impl Into<String>) -> Self {
        self.output_arg("-pix_fmt").output_arg(format)
    }

    /// Finishes the argument list with the output file.
    pub fn build(&self, output: impl AsRef<Path>) -> Vec<String> {
        let mut args = Vec::with_capacity(self.inputs.len() + self.output_args.len() + 4);
        args.push("-y".to_string());
        args.push("-v".to_string());
        args.push("error".to_string());
        args.extend(self.inputs.iter().cloned());
        args.extend(self.output_args.iter().cloned());
        args.push(output.as_ref().to_string_lossy().into_owned());
        args
    }
}

/// Escapes a file path for use inside a quoted `subtitles=` filter option.
pub fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// ASS style overrides for burned-in subtitles: white text with a dark
/// outline and translucent box, bottom-centred.
pub fn subtitle_force_style(font_size: u32) -> String {
    format!(
        "FontSize={},PrimaryColour=&H00FFFFFF,OutlineColour=&H00000000,Outline=2,Shadow=1,\
         BackColour=&H80000000,Alignment=2,MarginV=50,FontName=Arial",
        font_size
    )
}

/// Full `subtitles` filter burning `srt_path` with the standard style.
pub fn subtitles_filter(srt_path: &Path, font_size: u32) -> String {
    format!(
        "subtitles='{}':force_style='{}'",
        escape_filter_path(srt_path),
        subtitle_force_style(font_size)
    )
}
