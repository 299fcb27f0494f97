use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::fs as async_fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{BurnerError, Result};
use crate::furigana::FuriganaGenerator;
use crate::media::MediaProcessorTrait;
use crate::render::find_font;
use crate::subtitle::tokens_inline_text;

const SAMPLE_TEXT: &str = "今日は空が青い";

pub struct SetupManager {
    client: Client,
    home_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct FontInfo {
    pub name: String,
    pub filename: String,
    pub url: String,
    pub size_mb: f64,
}

impl SetupManager {
    pub fn new() -> Result<Self> {
        Self::with_root(".furigana")
    }

    /// Use `root` instead of `./.furigana` for fonts and logs
    pub fn with_root<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let home_dir = root.into();

        fs::create_dir_all(home_dir.join("fonts"))?;
        fs::create_dir_all(home_dir.join("log"))?;

        let client = Client::builder()
            .user_agent(concat!("furigana-burner/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, home_dir })
    }

    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    pub fn fonts_dir(&self) -> PathBuf {
        self.home_dir.join("fonts")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.home_dir.join("log")
    }

    /// Directories searched for font files before the system locations
    pub fn font_dirs(&self) -> Vec<PathBuf> {
        vec![self.fonts_dir(), PathBuf::from("fonts")]
    }

    pub fn available_fonts(&self) -> Vec<FontInfo> {
        vec![
            FontInfo {
                name: "Noto Sans JP".to_string(),
                filename: "NotoSansJP-Regular.otf".to_string(),
                url: "https://github.com/notofonts/noto-cjk/raw/main/Sans/SubsetOTF/JP/NotoSansJP-Regular.otf"
                    .to_string(),
                size_mb: 4.5,
            },
            FontInfo {
                name: "Noto Sans JP (Google Fonts early access)".to_string(),
                filename: "NotoSansJP-Regular.otf".to_string(),
                url: "https://fonts.gstatic.com/ea/notosansjapanese/v6/NotoSansJP-Regular.otf".to_string(),
                size_mb: 4.5,
            },
        ]
    }

    /// Download the first font that can be fetched; returns the local path
    pub async fn ensure_font(&self) -> Result<PathBuf> {
        let mut last_error = None;
        for font in self.available_fonts() {
            match self.download_font(&font).await {
                Ok(path) => return Ok(path),
                Err(e) => {
                    warn!("Could not download {} from {}: {}", font.name, font.url, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| BurnerError::Font("No downloadable fonts configured".to_string())))
    }

    pub async fn download_font(&self, font: &FontInfo) -> Result<PathBuf> {
        let local_path = self.fonts_dir().join(&font.filename);

        if local_path.exists() {
            info!("Font {} already exists at {}", font.name, local_path.display());
            return Ok(local_path);
        }

        info!("Downloading {} ({:.1} MB)...", font.name, font.size_mb);

        let mut response = self.client.get(&font.url).send().await?;
        if !response.status().is_success() {
            return Err(BurnerError::Font(format!(
                "Failed to download font {}: HTTP {}",
                font.name,
                response.status()
            )));
        }

        let total = response
            .content_length()
            .unwrap_or((font.size_mb * 1_000_000.0) as u64);
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        let temp_path = local_path.with_extension("tmp");
        let written = async {
            let mut file = async_fs::File::create(&temp_path).await?;
            let mut downloaded: u64 = 0;

            while let Some(chunk) = response.chunk().await? {
                file.write_all(&chunk).await?;
                downloaded += chunk.len() as u64;
                pb.set_position(downloaded);
            }

            file.flush().await?;
            Ok::<(), BurnerError>(())
        }
        .await;

        if let Err(e) = written {
            pb.abandon();
            remove_partial(&temp_path).await;
            return Err(e);
        }

        async_fs::rename(&temp_path, &local_path).await?;

        pb.finish_with_message(format!("Downloaded {}", font.name));
        info!("Successfully downloaded {} to {}", font.name, local_path.display());

        Ok(local_path)
    }
}

async fn remove_partial(path: &Path) {
    if let Err(e) = async_fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Could not remove partial download {}: {}", path.display(), e);
        }
    }
}

/// Outcome of the environment check
#[derive(Debug, Clone)]
pub struct EnvironmentReport {
    pub media: std::result::Result<String, String>,
    pub font: std::result::Result<(PathBuf, bool), String>,
    pub backend: String,
    pub sample: std::result::Result<String, String>,
}

impl EnvironmentReport {
    /// Everything needed for burning is usable
    pub fn is_ready(&self) -> bool {
        self.media.is_ok() && self.font.is_ok() && self.sample.is_ok()
    }
}

impl fmt::Display for EnvironmentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Environment check")?;
        writeln!(f, "=================")?;

        match &self.media {
            Ok(versions) => {
                for line in versions.lines() {
                    writeln!(f, "  [ok] {}", line)?;
                }
            }
            Err(e) => writeln!(f, "  [!!] FFmpeg: {}", e)?,
        }

        match &self.font {
            Ok((path, true)) => writeln!(f, "  [ok] Font: {}", path.display())?,
            Ok((path, false)) => writeln!(f, "  [!!] Font without Japanese glyphs: {}", path.display())?,
            Err(e) => writeln!(f, "  [!!] Font: {}", e)?,
        }

        writeln!(f, "  [ok] Furigana backend: {}", self.backend)?;
        match &self.sample {
            Ok(sample) => writeln!(f, "  [ok] Sample: {}", sample)?,
            Err(e) => writeln!(f, "  [!!] Sample annotation failed: {}", e)?,
        }

        if self.is_ready() {
            write!(f, "Ready to burn subtitles.")
        } else {
            write!(f, "Some components are missing, see above.")
        }
    }
}

/// Probe ffmpeg, the font search and the reading backend
pub async fn check_environment(
    config: &Config,
    media: &dyn MediaProcessorTrait,
    setup: &SetupManager,
) -> EnvironmentReport {
    let media_status = match media.check_availability() {
        Ok(()) => media.get_version_info().await.map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    let font = find_font(config.style.font_path.as_deref(), &setup.font_dirs())
        .map(|face| (face.path().to_path_buf(), face.covers_japanese()))
        .map_err(|e| e.to_string());

    let (backend, sample) = match FuriganaGenerator::from_config(&config.furigana) {
        Ok(generator) => (
            generator.backend_name().to_string(),
            Ok(tokens_inline_text(&generator.generate(SAMPLE_TEXT))),
        ),
        Err(e) => (format!("{:?}", config.furigana.backend).to_lowercase(), Err(e.to_string())),
    };

    EnvironmentReport {
        media: media_status,
        font,
        backend,
        sample,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnalyzerBackend, MediaConfig};
    use crate::media::MediaProcessorFactory;

    #[test]
    fn test_setup_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join(".furigana");
        let setup = SetupManager::with_root(&root).unwrap();

        assert!(root.join("fonts").is_dir());
        assert!(root.join("log").is_dir());
        assert_eq!(setup.font_dirs()[0], root.join("fonts"));
        assert_eq!(setup.log_dir(), root.join("log"));
    }

    #[tokio::test]
    async fn test_existing_font_is_not_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        let setup = SetupManager::with_root(dir.path()).unwrap();
        let font = FontInfo {
            name: "Local".to_string(),
            filename: "Local.otf".to_string(),
            url: "http://127.0.0.1:9/unreachable.otf".to_string(),
            size_mb: 0.1,
        };
        std::fs::write(setup.fonts_dir().join("Local.otf"), b"font").unwrap();

        let path = setup.download_font(&font).await.unwrap();
        assert_eq!(path, setup.fonts_dir().join("Local.otf"));
    }

    #[tokio::test]
    async fn test_interrupted_download_leaves_no_temp_file() {
        use tokio::io::AsyncReadExt;
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            // promise more bytes than are sent, then hang up
            let _ = socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100000\r\n\r\npartial")
                .await;
        });

        let dir = tempfile::tempdir().unwrap();
        let setup = SetupManager::with_root(dir.path()).unwrap();
        let font = FontInfo {
            name: "Truncated".to_string(),
            filename: "Truncated.otf".to_string(),
            url: format!("http://{}/Truncated.otf", addr),
            size_mb: 0.1,
        };

        assert!(setup.download_font(&font).await.is_err());
        assert!(!setup.fonts_dir().join("Truncated.tmp").exists());
        assert!(!setup.fonts_dir().join("Truncated.otf").exists());
    }

    #[tokio::test]
    async fn test_report_without_ffmpeg() {
        let dir = tempfile::tempdir().unwrap();
        let setup = SetupManager::with_root(dir.path()).unwrap();

        let mut config = Config::default();
        config.furigana.backend = AnalyzerBackend::Dictionary;
        let media = MediaProcessorFactory::create_processor(MediaConfig {
            ffmpeg_path: "/nonexistent/ffmpeg".to_string(),
            ffprobe_path: "/nonexistent/ffprobe".to_string(),
            ..MediaConfig::default()
        });

        let report = check_environment(&config, media.as_ref(), &setup).await;
        assert!(report.media.is_err());
        assert!(!report.is_ready());
        assert_eq!(report.backend, "dictionary");
        assert_eq!(report.sample.as_deref(), Ok("今(いま)日(ひ)は空(そら)が青い"));

        let printed = report.to_string();
        assert!(printed.contains("[!!] FFmpeg"));
        assert!(printed.contains("Sample: 今(いま)日(ひ)は"));
    }
}
