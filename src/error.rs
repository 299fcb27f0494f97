use thiserror::Error;

#[derive(Error, Debug)]
pub enum BurnerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Subtitle error: {0}")]
    Subtitle(String),

    #[error("Furigana generation error: {0}")]
    Furigana(String),

    #[error("Font error: {0}")]
    Font(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, BurnerError>;
