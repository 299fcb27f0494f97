//! furigana-burner - burn Japanese subtitles with furigana onto video

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use furigana_burner::cli::{Args, Commands};
use furigana_burner::config::Config;
use furigana_burner::media::MediaProcessorFactory;
use furigana_burner::setup::{check_environment, SetupManager};
use furigana_burner::subtitle::SubtitleFormat;
use furigana_burner::workflow::Workflow;

const DEFAULT_CONFIG_FILE: &str = "furigana.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let setup = SetupManager::new()?;
    setup_logging(&setup.log_dir(), args.verbose)?;

    let mut config = load_config(args.config.as_deref())?;

    match args.command {
        Commands::Burn { video, subtitles, output, overrides } => {
            overrides.apply(&mut config);
            let workflow = Workflow::new(config, setup.font_dirs())?;
            let stats = workflow.burn_file(&video, &subtitles, &output, overrides.preview).await?;
            println!(
                "Wrote {} ({} frames, {} subtitle images)",
                output.display(),
                stats.frames,
                stats.rendered
            );
        }
        Commands::Batch { input_dir, output_dir, overrides } => {
            overrides.apply(&mut config);
            let workflow = Workflow::new(config, setup.font_dirs())?;
            let summary = workflow
                .process_directory(&input_dir, output_dir.as_deref(), overrides.preview)
                .await?;
            println!(
                "Processed {} videos, skipped {}, failed {}",
                summary.processed, summary.skipped, summary.failed
            );
            if summary.failed > 0 {
                anyhow::bail!("{} videos failed, see the log for details", summary.failed);
            }
        }
        Commands::Annotate { input, output, format, backend } => {
            if let Some(backend) = backend {
                config.furigana.backend = backend;
            }
            let format = format.as_deref().map(SubtitleFormat::parse).transpose()?;
            let workflow = Workflow::new(config, setup.font_dirs())?.with_progress(false);
            let count = workflow.annotate(&input, &output, format).await?;
            println!("Annotated {} segments into {}", count, output.display());
        }
        Commands::Check { download_font } => {
            if download_font {
                match setup.ensure_font().await {
                    Ok(path) => info!("Font available at {}", path.display()),
                    Err(e) => warn!("Font download failed: {}", e),
                }
            }

            let media = MediaProcessorFactory::create_processor(config.media.clone());
            let report = check_environment(&config, media.as_ref(), &setup).await;
            println!("{}", report);
            if !report.is_ready() {
                anyhow::bail!("Environment is not ready");
            }
        }
        Commands::Config { output } => {
            config.save_to_file(&output)?;
            println!("Configuration written to {}", output.display());
        }
    }

    Ok(())
}

/// `--config`, then `./furigana.toml`, then built-in defaults
fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path: Option<PathBuf> = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            info!("Found {} in current directory, loading...", DEFAULT_CONFIG_FILE);
            Some(PathBuf::from(DEFAULT_CONFIG_FILE))
        }
        None => None,
    };

    let config = match path {
        Some(path) => Config::from_file(&path)?,
        None => Config::default(),
    };
    Ok(config)
}

fn setup_logging(log_dir: &Path, verbose: bool) -> Result<()> {
    let file_appender = rolling::daily(log_dir, "furigana-burner.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // The writer must outlive main
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}
