//! Streaming export API: emit page bitmaps as they are rasterised.
//!
//! Unlike the eager [`crate::export::export`], which returns only after the
//! whole PDF is assembled, [`export_stream`] yields one [`RasterizedPage`]
//! per logical page. Pages are produced strictly in sequence, cover first,
//! so items always arrive in page order. Attachments are not streamed.

use crate::config::ExportConfig;
use crate::error::{ExportError, PageError};
use crate::model::Document;
use crate::pipeline::sequence;
use futures::future;
use futures::stream::{self, StreamExt};
use image::DynamicImage;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::{info, warn};

/// One rasterised logical page.
#[derive(Debug, Clone)]
pub struct RasterizedPage {
    /// 0-based position among the logical pages (cover included).
    pub index: usize,
    /// `"cover"` or `"page N"`.
    pub label: String,
    pub title: String,
    pub image: DynamicImage,
    /// Non-fatal problems met while producing this page.
    pub warnings: Vec<PageError>,
}

/// A boxed stream of page results.
pub type PageStream = Pin<Box<dyn Stream<Item = Result<RasterizedPage, PageError>> + Send>>;

/// Export a document, streaming rasterised pages as they are ready.
///
/// A page that fails to rasterise is yielded as `Err(PageError)` and the
/// stream continues with the next one. A cancelled [`crate::CancelToken`]
/// ends the stream before the next page.
///
/// # Returns
/// - `Ok(PageStream)`: a stream of `Result<RasterizedPage, PageError>`
/// - `Err(ExportError)`: fatal error (empty document, surface too large)
///
/// # Example
/// ```rust,no_run
/// use futures::StreamExt;
/// use profile_export::{export_stream, Document, ExportConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let document = Document::from_json(&std::fs::read_to_string("profile.json")?)?;
/// let mut pages = export_stream(&document, &ExportConfig::default()).await?;
/// while let Some(page) = pages.next().await {
///     match page {
///         Ok(p) => p.image.save(format!("{}.png", p.label.replace(' ', "-")))?,
///         Err(e) => eprintln!("skipped: {e}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub async fn export_stream(document: &Document, config: &ExportConfig) -> Result<PageStream, ExportError> {
    info!("Starting streaming export of '{}'", document.name);
    let plan = Arc::new(sequence::plan_export(document, config).await?);
    for w in &plan.warnings {
        warn!("{}", w);
    }

    let cancel = config.cancel_token.clone();
    let s = stream::iter(0..plan.pages.len())
        .take_while(move |_| future::ready(!cancel.as_ref().is_some_and(|t| t.is_cancelled())))
        .then(move |index| {
            let plan = Arc::clone(&plan);
            async move {
                let page = &plan.pages[index];
                let render = plan.render(page).await.map_err(|e| PageError::PageRasterizationFailed {
                    page: page.label.clone(),
                    detail: e.to_string(),
                })?;
                let image = render.image?;
                Ok(RasterizedPage {
                    index,
                    label: page.label.clone(),
                    title: page.title.clone(),
                    image,
                    warnings: render.warnings,
                })
            }
        });

    Ok(Box::pin(s))
}
