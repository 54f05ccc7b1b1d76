//! Byte fetching for resolved asset URLs.
//!
//! Three sources are understood:
//!
//! * `http://` / `https://`: downloaded with a shared `reqwest` client;
//! * `data:` URIs: decoded in place (base64 or literal payload);
//! * `file://` URLs and plain filesystem paths: read with `tokio::fs`.
//!
//! Every fetch is bounded by the caller's timeout so one slow host cannot
//! stall the page sequence.

use crate::error::ExportError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Why an asset could not be fetched.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("HTTP {status}")]
    Status { status: u16 },

    #[error("{0}")]
    Failed(String),

    #[error("not a decodable image: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout { .. })
    }
}

/// Build the HTTP client shared by every fetch of one export.
pub fn http_client(timeout_secs: u64) -> Result<reqwest::Client, ExportError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("profile-export/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ExportError::Internal(format!("HTTP client: {e}")))
}

/// Check if the string is an HTTP(S) URL.
pub fn is_url(input: &str) -> bool {
    let lower = input.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Fetch the raw bytes behind `url`, giving up after `timeout`.
pub async fn fetch_asset(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<Vec<u8>, FetchError> {
    let secs = timeout.as_secs().max(1);
    match tokio::time::timeout(timeout, fetch_unbounded(client, url, secs)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout { secs }),
    }
}

/// Fetch and decode an image.
pub async fn fetch_image(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<DynamicImage, FetchError> {
    let bytes = fetch_asset(client, url, timeout).await?;
    let image = image::load_from_memory(&bytes).map_err(|e| FetchError::Decode(e.to_string()))?;
    debug!("Decoded {} → {}x{} px", short(url), image.width(), image.height());
    Ok(image)
}

async fn fetch_unbounded(client: &reqwest::Client, url: &str, secs: u64) -> Result<Vec<u8>, FetchError> {
    if is_url(url) {
        download(client, url, secs).await
    } else if url.get(..5).is_some_and(|s| s.eq_ignore_ascii_case("data:")) {
        decode_data_uri(url)
    } else {
        read_local(url).await
    }
}

async fn download(client: &reqwest::Client, url: &str, secs: u64) -> Result<Vec<u8>, FetchError> {
    debug!("Downloading {}", url);
    let map_err = |e: reqwest::Error| {
        if e.is_timeout() {
            FetchError::Timeout { secs }
        } else {
            FetchError::Failed(e.to_string())
        }
    };

    let response = client.get(url).send().await.map_err(map_err)?;
    if !response.status().is_success() {
        return Err(FetchError::Status {
            status: response.status().as_u16(),
        });
    }
    let bytes = response.bytes().await.map_err(map_err)?;
    debug!("Downloaded {} bytes from {}", bytes.len(), url);
    Ok(bytes.to_vec())
}

/// Decode `data:[<mediatype>][;base64],<payload>`.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, FetchError> {
    let rest = uri
        .get(..5)
        .filter(|s| s.eq_ignore_ascii_case("data:"))
        .and_then(|_| uri.get(5..))
        .ok_or_else(|| FetchError::Failed("not a data URI".into()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| FetchError::Failed("data URI without payload".into()))?;
    if meta.to_ascii_lowercase().ends_with(";base64") {
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        STANDARD
            .decode(compact)
            .map_err(|e| FetchError::Failed(format!("data URI: {e}")))
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}

async fn read_local(reference: &str) -> Result<Vec<u8>, FetchError> {
    let path = match reference.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("file://") => PathBuf::from(&reference[7..]),
        _ => PathBuf::from(reference),
    };
    tokio::fs::read(&path)
        .await
        .map_err(|e| FetchError::Failed(format!("{}: {e}", path.display())))
}

fn short(url: &str) -> &str {
    if url.len() > 64 && url.is_char_boundary(64) {
        &url[..64]
    } else {
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 2, Rgb([10, 20, 30])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png).unwrap();
        buf
    }

    fn client() -> reqwest::Client {
        http_client(5).unwrap()
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/a.png"));
        assert!(is_url("HTTP://example.com/a.png"));
        assert!(!is_url("/tmp/a.png"));
        assert!(!is_url("data:image/png;base64,AAAA"));
    }

    #[test]
    fn data_uri_base64_and_literal() {
        assert_eq!(decode_data_uri("data:text/plain;base64,aGk=").unwrap(), b"hi");
        assert_eq!(decode_data_uri("data:,hello").unwrap(), b"hello");
        assert!(decode_data_uri("data:nothing").is_err());
    }

    #[tokio::test]
    async fn fetches_image_from_data_uri() {
        let uri = format!("data:image/png;base64,{}", STANDARD.encode(png_bytes()));
        let img = fetch_image(&client(), &uri, Duration::from_secs(5)).await.unwrap();
        assert_eq!((img.width(), img.height()), (3, 2));
    }

    #[tokio::test]
    async fn reads_local_paths_and_file_urls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bg.png");
        std::fs::write(&path, png_bytes()).unwrap();

        let plain = fetch_asset(&client(), path.to_str().unwrap(), Duration::from_secs(5))
            .await
            .unwrap();
        let url = format!("file://{}", path.display());
        let via_url = fetch_asset(&client(), &url, Duration::from_secs(5)).await.unwrap();
        assert_eq!(plain, via_url);
    }

    #[test]
    fn missing_file_fails_without_timeout() {
        let err = tokio_test::block_on(fetch_asset(
            &client(),
            "/definitely/not/here.png",
            Duration::from_secs(5),
        ))
        .unwrap_err();
        assert!(!err.is_timeout());
    }

    #[tokio::test]
    async fn non_image_bytes_fail_to_decode() {
        let err = fetch_image(&client(), "data:,not-an-image", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }
}
