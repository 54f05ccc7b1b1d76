//! Bounded wait for the images embedded in a composition.
//!
//! Every `<img src>` of a page is fetched concurrently; each fetch gets its
//! own deadline of `image_timeout_secs`. An image that misses the deadline
//! or fails to load is reported and its area stays blank. Rasterisation
//! then proceeds with whatever loaded.

use crate::error::PageError;
use crate::pipeline::assets::{resolve_asset_url, AssetClass, AssetContext};
use crate::pipeline::fetch::{self, FetchError};
use futures::future::join_all;
use image::DynamicImage;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::{debug, warn};

static RE_IMG_SRC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<img\b[^>]*?\bsrc\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).unwrap()
});

/// One embedded image, in document flow order.
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    /// `src` as written in the markup.
    pub src: String,
    /// `None` when the image did not load in time; its area renders blank.
    pub image: Option<DynamicImage>,
}

impl EmbeddedImage {
    pub fn is_loaded(&self) -> bool {
        self.image.is_some()
    }
}

/// Every distinct non-empty `src` in `markup`, in first-seen order.
pub fn extract_image_sources(markup: &str) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for caps in RE_IMG_SRC.captures_iter(markup) {
        let src = caps
            .get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .map(|m| m.as_str().trim().replace("&amp;", "&"))
            .unwrap_or_default();
        if !src.is_empty() && !sources.contains(&src) {
            sources.push(src);
        }
    }
    sources
}

/// Load every source concurrently, each bounded by `timeout_secs`.
///
/// Returns one [`EmbeddedImage`] per source in input order plus the
/// warnings for those that did not load.
pub async fn await_images(
    client: &reqwest::Client,
    sources: &[String],
    ctx: &AssetContext,
    page_label: &str,
    timeout_secs: u64,
) -> (Vec<EmbeddedImage>, Vec<PageError>) {
    if sources.is_empty() {
        return (Vec::new(), Vec::new());
    }
    debug!("{}: waiting for {} images", page_label, sources.len());
    let timeout = Duration::from_secs(timeout_secs);

    let loads = sources.iter().map(|src| async move {
        let result = match resolve_asset_url(src, AssetClass::Image, ctx) {
            Ok(Some(url)) => fetch::fetch_image(client, &url, timeout)
                .await
                .map_err(|e| load_error(page_label, src, timeout_secs, e)),
            Ok(None) => Err(PageError::ImageLoadFailed {
                page: page_label.to_string(),
                src: src.clone(),
                detail: "empty source".into(),
            }),
            Err(e) => Err(PageError::ImageLoadFailed {
                page: page_label.to_string(),
                src: src.clone(),
                detail: e.to_string(),
            }),
        };
        (src.clone(), result)
    });

    let mut images = Vec::with_capacity(sources.len());
    let mut warnings = Vec::new();
    for (src, result) in join_all(loads).await {
        match result {
            Ok(image) => images.push(EmbeddedImage { src, image: Some(image) }),
            Err(err) => {
                warn!("{}", err);
                warnings.push(err);
                images.push(EmbeddedImage { src, image: None });
            }
        }
    }
    (images, warnings)
}

fn load_error(page: &str, src: &str, secs: u64, err: FetchError) -> PageError {
    if err.is_timeout() {
        PageError::ImageLoadTimeout {
            page: page.to_string(),
            src: src.to_string(),
            secs,
        }
    } else {
        PageError::ImageLoadFailed {
            page: page.to_string(),
            src: src.to_string(),
            detail: err.to_string(),
        }
    }
}
