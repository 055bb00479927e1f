use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Tab has no favicon")]
    Missing,

    #[error("Unsupported favicon source: {0}")]
    Unsupported(String),

    #[error("Failed to load favicon {src}: {source}")]
    Load {
        src: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode favicon {src}: {reason}")]
    Decode { src: String, reason: String },
}

/// Decoded RGBA8 pixels, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl DecodedImage {
    pub fn solid(width: u32, height: u32, pixel: [u8; 4]) -> Self {
        let rgba = pixel
            .iter()
            .copied()
            .cycle()
            .take((width * height * 4) as usize)
            .collect();
        Self {
            width,
            height,
            rgba,
        }
    }

    pub fn pixels(&self) -> impl Iterator<Item = &[u8]> {
        self.rgba.chunks_exact(4)
    }
}

/// The host's favicon loading pipeline.
#[async_trait]
pub trait FaviconDecoder: Send + Sync {
    async fn decode(&self, src: &str) -> Result<DecodedImage, DecodeError>;
}

/// Loads favicons from local paths or `file://` URLs.
#[derive(Debug, Clone, Default)]
pub struct FileFaviconDecoder {
    base_dir: Option<PathBuf>,
}

impl FileFaviconDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative sources against `base_dir`.
    pub fn with_base_dir(mut self, base_dir: PathBuf) -> Self {
        self.base_dir = Some(base_dir);
        self
    }

    fn resolve(&self, src: &str) -> Result<PathBuf, DecodeError> {
        let raw = match src.split_once("://") {
            Some(("file", path)) => path,
            Some(_) => return Err(DecodeError::Unsupported(src.to_string())),
            None if src.starts_with("data:") => {
                return Err(DecodeError::Unsupported(src.to_string()))
            }
            None => src,
        };

        let path = PathBuf::from(raw);
        Ok(match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        })
    }
}

#[async_trait]
impl FaviconDecoder for FileFaviconDecoder {
    async fn decode(&self, src: &str) -> Result<DecodedImage, DecodeError> {
        let path = self.resolve(src)?;
        let bytes = tokio::fs::read(&path).await.map_err(|source| DecodeError::Load {
            src: src.to_string(),
            source,
        })?;

        let image = image::load_from_memory(&bytes)
            .map_err(|e| DecodeError::Decode {
                src: src.to_string(),
                reason: e.to_string(),
            })?
            .to_rgba8();
        let (width, height) = image.dimensions();

        Ok(DecodedImage {
            width,
            height,
            rgba: image.into_raw(),
        })
    }
}
