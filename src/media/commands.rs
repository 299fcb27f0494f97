use std::path::Path;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::debug;

use crate::config::MediaConfig;
use crate::error::{BurnerError, Result};
use super::VideoProperties;

/// Abstract media processing command representation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    /// Only report errors on stderr
    pub fn quiet(self) -> Self {
        self.arg("-v").arg("error")
    }

    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    pub fn pixel_format<S: Into<String>>(self, format: S) -> Self {
        self.arg("-pix_fmt").arg(format)
    }

    /// Raw rgb24 frames, as container format for stdin/stdout pipes
    pub fn raw_rgb(self) -> Self {
        self.arg("-f").arg("rawvideo").pixel_format("rgb24")
    }

    pub fn no_audio(self) -> Self {
        self.arg("-an")
    }

    pub fn no_subtitles(self) -> Self {
        self.arg("-sn")
    }

    pub fn duration_limit(self, seconds: f64) -> Self {
        self.arg("-t").arg(format!("{:.3}", seconds))
    }

    pub fn map<S: Into<String>>(self, stream: S) -> Self {
        self.arg("-map").arg(stream)
    }

    /// Run to completion, returning stdout
    pub async fn execute(&self) -> Result<String> {
        debug!("Executing media processing command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.launch_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BurnerError::Media(format!("{} failed: {}", self.description, stderr.trim())));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Start the command with piped stdio for streaming frames
    pub fn spawn(&self, pipe_stdin: bool, pipe_stdout: bool) -> Result<Child> {
        debug!("Spawning media processing command: {} {:?}", self.binary_path, self.args);

        let piped = |enabled: bool| if enabled { Stdio::piped() } else { Stdio::null() };
        Command::new(&self.binary_path)
            .args(&self.args)
            .stdin(piped(pipe_stdin))
            .stdout(piped(pipe_stdout))
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.launch_error(e))
    }

    fn launch_error(&self, error: std::io::Error) -> BurnerError {
        if error.kind() == std::io::ErrorKind::NotFound {
            BurnerError::Media(format!(
                "{} not found ({}). Install FFmpeg or set media.ffmpeg_path / media.ffprobe_path",
                self.binary_path, self.description
            ))
        } else {
            BurnerError::Media(format!("Failed to execute {}: {}", self.binary_path, error))
        }
    }
}

/// Builder for the ffmpeg/ffprobe invocations the burner needs
pub struct MediaCommandBuilder {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl MediaCommandBuilder {
    pub fn new<S1: Into<String>, S2: Into<String>>(ffmpeg_path: S1, ffprobe_path: S2) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Stream properties as JSON
    pub fn probe<P: AsRef<Path>>(&self, video_path: P) -> MediaCommand {
        MediaCommand::new(&self.ffprobe_path, "Video probe")
            .quiet()
            .arg("-show_entries")
            .arg("stream=codec_type,width,height,r_frame_rate,avg_frame_rate,nb_frames,duration:format=duration")
            .arg("-of")
            .arg("json")
            .output(video_path)
    }

    /// Decode video to raw rgb24 frames on stdout
    pub fn decode_frames<P: AsRef<Path>>(&self, video_path: P, limit_seconds: Option<f64>) -> MediaCommand {
        let mut cmd = MediaCommand::new(&self.ffmpeg_path, "Frame decoding").quiet().input(video_path);
        if let Some(seconds) = limit_seconds {
            cmd = cmd.duration_limit(seconds);
        }
        cmd.raw_rgb().no_audio().no_subtitles().arg("pipe:1")
    }

    /// Encode raw rgb24 frames from stdin, optionally muxing the audio of `audio_source`
    pub fn encode_frames<P: AsRef<Path>>(
        &self,
        properties: &VideoProperties,
        output_path: P,
        audio_source: Option<&Path>,
        config: &MediaConfig,
    ) -> MediaCommand {
        let mut cmd = MediaCommand::new(&self.ffmpeg_path, "Frame encoding")
            .overwrite()
            .quiet()
            .raw_rgb()
            .arg("-s")
            .arg(format!("{}x{}", properties.width, properties.height))
            .arg("-r")
            .arg(format!("{}/{}", properties.fps_num, properties.fps_den))
            .arg("-i")
            .arg("pipe:0");

        if let Some(source) = audio_source {
            cmd = cmd
                .input(source)
                .map("0:v:0")
                .map("1:a:0")
                .audio_codec(&config.audio_codec)
                .arg("-shortest");
        }

        cmd.video_codec(&config.video_codec)
            .pixel_format(&config.pixel_format)
            .args(config.encoder_options.iter().cloned())
            .output(output_path)
    }

    pub fn ffmpeg_version(&self) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "FFmpeg version check").arg("-version")
    }

    pub fn ffprobe_version(&self) -> MediaCommand {
        MediaCommand::new(&self.ffprobe_path, "FFprobe version check").arg("-version")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn properties() -> VideoProperties {
        VideoProperties {
            width: 1280,
            height: 720,
            fps_num: 30000,
            fps_den: 1001,
            frame_count: 100,
            duration: 3.3,
            has_audio: true,
        }
    }

    #[test]
    fn test_decode_command() {
        let builder = MediaCommandBuilder::new("ffmpeg", "ffprobe");
        let cmd = builder.decode_frames("in.mp4", Some(10.0));

        assert_eq!(cmd.binary_path, "ffmpeg");
        assert_eq!(
            cmd.args,
            vec![
                "-v", "error", "-i", "in.mp4", "-t", "10.000", "-f", "rawvideo", "-pix_fmt", "rgb24", "-an", "-sn",
                "pipe:1"
            ]
        );
        assert!(!builder.decode_frames("in.mp4", None).args.contains(&"-t".to_string()));
    }

    #[test]
    fn test_encode_command_with_audio() {
        let builder = MediaCommandBuilder::new("ffmpeg", "ffprobe");
        let mut config = MediaConfig::default();
        config.encoder_options = vec!["-crf".to_string(), "20".to_string()];
        let source = PathBuf::from("in.mp4");

        let cmd = builder.encode_frames(&properties(), "out.mp4", Some(&source), &config);
        let args = cmd.args.join(" ");

        assert!(args.starts_with("-y -v error -f rawvideo -pix_fmt rgb24 -s 1280x720 -r 30000/1001 -i pipe:0"));
        assert!(args.contains("-i in.mp4 -map 0:v:0 -map 1:a:0 -c:a aac -shortest"));
        assert!(args.ends_with("-c:v libx264 -pix_fmt yuv420p -crf 20 out.mp4"));
    }

    #[test]
    fn test_encode_command_without_audio() {
        let builder = MediaCommandBuilder::new("ffmpeg", "ffprobe");
        let cmd = builder.encode_frames(&properties(), "out.mp4", None, &MediaConfig::default());
        assert!(!cmd.args.contains(&"-map".to_string()));
        assert_eq!(cmd.args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn test_probe_command_uses_ffprobe() {
        let builder = MediaCommandBuilder::new("/opt/ffmpeg", "/opt/ffprobe");
        let cmd = builder.probe("clip.mkv");
        assert_eq!(cmd.binary_path, "/opt/ffprobe");
        assert!(cmd.args.contains(&"json".to_string()));
        assert_eq!(cmd.args.last().map(String::as_str), Some("clip.mkv"));
    }

    #[tokio::test]
    async fn test_missing_binary_reports_media_error() {
        let cmd = MediaCommand::new("/nonexistent/ffmpeg-binary", "Version check").arg("-version");
        let err = cmd.execute().await.unwrap_err();
        assert!(matches!(err, BurnerError::Media(msg) if msg.contains("not found")));
    }
}
