use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use image::ImageFormat;
use reqwest::{Client as HttpClient, Url};
use tracing::info;

const KNOWN_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "gif"];
const FALLBACK_EXTENSION: &str = "png";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedImage {
    pub path: PathBuf,
    pub bytes: u64,
    pub extension: String,
}

#[derive(Debug, Clone, Default)]
pub struct ImageDownloader {
    http: HttpClient,
}

impl ImageDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_http_client(http: HttpClient) -> Self {
        Self { http }
    }

    /// Fetches `url` into `out_dir`. Without a filename one is derived from the
    /// current time and the image type.
    pub async fn download(
        &self,
        url: &str,
        out_dir: &Path,
        filename: Option<&str>,
    ) -> Result<DownloadedImage> {
        if !is_http_url(url) {
            bail!("refusing to download non-http(s) url: {url}");
        }
        if let Some(name) = filename {
            check_plain_filename(name)?;
        }

        let response = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("failed downloading image ({url})"))?;
        let status = response.status();
        if !status.is_success() {
            bail!(
                "image download failed: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            );
        }
        let bytes = response
            .bytes()
            .await
            .context("failed reading image bytes")?;

        let extension = extension_from_url(url)
            .or_else(|| extension_from_bytes(&bytes))
            .unwrap_or(FALLBACK_EXTENSION)
            .to_string();
        let name = filename.map(str::to_string).unwrap_or_else(|| {
            format!(
                "generated-image-{}.{extension}",
                chrono::Utc::now().timestamp_millis()
            )
        });

        tokio::fs::create_dir_all(out_dir)
            .await
            .with_context(|| format!("failed creating {}", out_dir.display()))?;
        let path = out_dir.join(name);
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("failed writing {}", path.display()))?;

        info!(path = %path.display(), bytes = bytes.len(), "image downloaded");
        Ok(DownloadedImage {
            path,
            bytes: bytes.len() as u64,
            extension,
        })
    }
}

pub fn is_http_url(raw: &str) -> bool {
    Url::parse(raw)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Image extension named by the URL path, if it is one we recognise.
pub fn extension_from_url(raw: &str) -> Option<&'static str> {
    let url = Url::parse(raw).ok()?;
    let last = url.path_segments()?.next_back()?;
    let (_, ext) = last.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    KNOWN_EXTENSIONS
        .iter()
        .find(|known| **known == ext)
        .copied()
}

pub fn extension_from_bytes(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Png => Some("png"),
        ImageFormat::Jpeg => Some("jpg"),
        ImageFormat::WebP => Some("webp"),
        ImageFormat::Gif => Some("gif"),
        _ => None,
    }
}

fn check_plain_filename(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains(['/', '\\'])
    {
        bail!("invalid download filename: {name:?}");
    }
    Ok(())
}
