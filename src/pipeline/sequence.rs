//! Export planning and per-page rendering.
//!
//! [`plan_export`] does everything that happens once per export: it checks
//! that there is something to render, sizes the composition surface,
//! resolves and fetches the background once, and turns the cover and every
//! page into a [`LogicalPage`] with its substituted header/footer and
//! resolved body markup. [`ExportPlan::render`] then takes one logical page
//! through composition, the bounded image wait and rasterisation.
//!
//! The plan owns everything it needs so the streaming API can move it into
//! a `'static` stream.

use crate::config::{ExportConfig, Rgb};
use crate::error::{ExportError, PageError};
use crate::model::Document;
use crate::pipeline::assets::{resolve_asset_url, AssetClass, AssetContext};
use crate::pipeline::compose::{ComposeRequest, CompositionSurface};
use crate::pipeline::content::resolve_section_markup_with_warning;
use crate::pipeline::placeholders::{page_chrome, substitute_page_title};
use crate::pipeline::raster::{self, Rasterizer};
use crate::pipeline::{fetch, images};
use image::DynamicImage;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Label used for problems that concern the whole document.
const DOCUMENT_LABEL: &str = "document";

/// Which kind of logical page this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Cover,
    /// A page at this 0-based position in `order`.
    Page { position: usize },
}

/// One logical page, ready to compose.
#[derive(Debug, Clone)]
pub struct LogicalPage {
    pub kind: PageKind,
    /// `"cover"` or `"page N"` (N 1-based over the pages).
    pub label: String,
    /// Page title; the document name for the cover.
    pub title: String,
    pub request: ComposeRequest,
    /// Decode fallbacks met while resolving the body.
    pub warnings: Vec<PageError>,
}

/// An attachment to append after the pages.
#[derive(Debug, Clone)]
pub struct PlannedAttachment {
    pub label: String,
    pub title: String,
    pub reference: String,
}

/// Result of rendering one logical page.
#[derive(Debug)]
pub struct PageRender {
    /// The bitmap, or why the page is skipped.
    pub image: Result<DynamicImage, PageError>,
    /// Non-fatal problems met on the way, in order.
    pub warnings: Vec<PageError>,
    pub duration_ms: u64,
}

/// Everything one export needs, owned.
pub struct ExportPlan {
    pub pages: Vec<LogicalPage>,
    pub attachments: Vec<PlannedAttachment>,
    /// Problems met while planning (background resolution).
    pub warnings: Vec<PageError>,
    surface: CompositionSurface,
    client: reqwest::Client,
    assets: AssetContext,
    rasterizer: Arc<dyn Rasterizer>,
    scale: f32,
    image_timeout_secs: u64,
    download_timeout: Duration,
}

impl std::fmt::Debug for ExportPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportPlan")
            .field("pages", &self.pages.len())
            .field("attachments", &self.attachments.len())
            .field("warnings", &self.warnings.len())
            .field("surface", &self.surface)
            .field("rasterizer", &self.rasterizer.name())
            .finish()
    }
}

/// Build the plan for exporting `document`.
///
/// Fails with [`ExportError::EmptyDocument`] when there is neither a cover
/// nor a page, and with [`ExportError::CompositionConstructionFailed`] when
/// the configured surface cannot be allocated.
pub async fn plan_export(document: &Document, config: &ExportConfig) -> Result<ExportPlan, ExportError> {
    let cover = document.cover_markup();
    if cover.is_none() && document.pages.is_empty() {
        return Err(ExportError::EmptyDocument {
            name: document.name.clone(),
        });
    }

    let surface = CompositionSurface::from_config(config);
    let first_label = if cover.is_some() { "cover" } else { "page 1" };
    let (w, h) = surface.allocate(first_label)?;
    debug!("Composition surface {}x{} px (scale {})", w, h, config.scale);

    let client = fetch::http_client(config.download_timeout_secs)?;
    let assets = AssetContext::from_config(config);
    let download_timeout = Duration::from_secs(config.download_timeout_secs);
    let mut warnings = Vec::new();

    // ── Background, once per export ──────────────────────────────────────
    let background_color = document.background_color.as_deref().and_then(|hex| {
        let parsed = Rgb::parse_hex(hex);
        if parsed.is_none() && !hex.trim().is_empty() {
            warn!("Ignoring invalid background colour '{}'", hex);
        }
        parsed
    });
    let reference = document.background_image.as_deref().unwrap_or_default();
    let (background_url, background_image) =
        match load_background(&client, reference, &assets, download_timeout).await {
            Ok(Some((url, image))) => (Some(url), Some(Arc::new(image))),
            Ok(None) => (None, None),
            Err(err) => {
                warn!("{}", err);
                warnings.push(err);
                (None, None)
            }
        };

    let base = ComposeRequest {
        background_color,
        background_url,
        background_image,
        locale: config.locale,
        ..Default::default()
    };

    // ── Logical pages ────────────────────────────────────────────────────
    let ordered = document.ordered_pages();
    let total = ordered.len();
    let mut pages = Vec::with_capacity(total + 1);

    if let Some(cover) = cover {
        pages.push(LogicalPage {
            kind: PageKind::Cover,
            label: "cover".into(),
            title: document.name.clone(),
            request: ComposeRequest {
                label: "cover".into(),
                body: substitute_page_title(cover, &document.name),
                ..base.clone()
            },
            warnings: Vec::new(),
        });
    }

    for (position, page) in ordered.into_iter().enumerate() {
        let label = format!("page {}", position + 1);
        let chrome = page_chrome(document, page, position + 1, total, config.locale);
        let mut page_warnings = Vec::new();
        let body = page
            .ordered_sections()
            .into_iter()
            .map(|section| {
                let (markup, warning) = resolve_section_markup_with_warning(section, &label);
                page_warnings.extend(warning);
                markup
            })
            .collect::<Vec<_>>()
            .join("\n");

        pages.push(LogicalPage {
            kind: PageKind::Page { position },
            label: label.clone(),
            title: page.title.clone(),
            request: ComposeRequest {
                label,
                title: Some(page.title.clone()).filter(|t| !t.trim().is_empty()),
                header: chrome.header,
                body,
                footer: chrome.footer,
                ..base.clone()
            },
            warnings: page_warnings,
        });
    }

    let attachments = if config.include_attachments {
        document
            .ordered_attachments()
            .into_iter()
            .enumerate()
            .map(|(i, a)| PlannedAttachment {
                label: format!("attachment {}", i + 1),
                title: a.caption.clone().unwrap_or_else(|| a.url.clone()),
                reference: a.url.clone(),
            })
            .collect()
    } else {
        Vec::new()
    };

    info!(
        "Planned '{}': {} logical pages, {} attachments, locale {}",
        document.name,
        pages.len(),
        attachments.len(),
        config.locale.code()
    );

    Ok(ExportPlan {
        pages,
        attachments,
        warnings,
        surface,
        client,
        assets,
        rasterizer: Arc::clone(&config.rasterizer),
        scale: config.scale,
        image_timeout_secs: config.image_timeout_secs,
        download_timeout,
    })
}

async fn load_background(
    client: &reqwest::Client,
    reference: &str,
    assets: &AssetContext,
    timeout: Duration,
) -> Result<Option<(String, DynamicImage)>, PageError> {
    let unresolved = |detail: String| PageError::AssetUnresolved {
        page: DOCUMENT_LABEL.into(),
        reference: reference.to_string(),
        detail,
    };
    let url = match resolve_asset_url(reference, AssetClass::Background, assets) {
        Ok(Some(url)) => url,
        Ok(None) => return Ok(None),
        Err(PageError::AssetUnresolved { detail, .. }) => return Err(unresolved(detail)),
        Err(other) => return Err(unresolved(other.to_string())),
    };
    let image = fetch::fetch_image(client, &url, timeout)
        .await
        .map_err(|e| unresolved(format!("{url}: {e}")))?;
    debug!("Background {} loaded ({}x{})", url, image.width(), image.height());
    Ok(Some((url, image)))
}

impl ExportPlan {
    /// Compose, wait for images and rasterise one logical page.
    ///
    /// Only a composition failure is returned as `Err`; everything else is
    /// carried in the [`PageRender`].
    pub async fn render(&self, page: &LogicalPage) -> Result<PageRender, ExportError> {
        let start = Instant::now();
        let mut composition = self.surface.compose(page.request.clone())?;
        let mut warnings = page.warnings.clone();

        let sources = images::extract_image_sources(&composition.markup);
        let (embedded, image_warnings) = images::await_images(
            &self.client,
            &sources,
            &self.assets,
            &page.label,
            self.image_timeout_secs,
        )
        .await;
        composition.images = embedded;
        warnings.extend(image_warnings);

        let image = raster::rasterize_page(Arc::clone(&self.rasterizer), composition, self.scale).await;
        Ok(PageRender {
            image,
            warnings,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Fetch and decode one attachment.
    pub async fn load_attachment(&self, attachment: &PlannedAttachment) -> Result<DynamicImage, PageError> {
        let skipped = |detail: String| PageError::AttachmentSkipped {
            page: attachment.label.clone(),
            detail,
        };
        let url = resolve_asset_url(&attachment.reference, AssetClass::Attachment, &self.assets)
            .map_err(|e| skipped(e.to_string()))?
            .ok_or_else(|| skipped("attachment has no URL".into()))?;
        fetch::fetch_image(&self.client, &url, self.download_timeout)
            .await
            .map_err(|e| skipped(format!("{url}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Page, Section};
    use serde_json::json;

    fn document() -> Document {
        Document {
            name: "Acme".into(),
            cover: Some("<h1>our project</h1>".into()),
            header: Some("<b>page title</b>".into()),
            footer: Some("<i><!--PAGE_NUMBER--></i>".into()),
            pages: vec![
                Page {
                    title: "Team".into(),
                    has_header: true,
                    has_footer: true,
                    order: 2,
                    sections: vec![
                        Section { id: "b".into(), order: 2, data: json!("<p>second</p>") },
                        Section { id: "a".into(), order: 1, data: json!({"htmlCode": "<p>first</p>"}) },
                    ],
                    ..Default::default()
                },
                Page {
                    title: "About".into(),
                    has_header: false,
                    has_footer: true,
                    order: 1,
                    sections: vec![Section { id: "c".into(), order: 0, data: json!("{broken") }],
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn plans_cover_then_pages_in_order() {
        let plan = plan_export(&document(), &ExportConfig::default()).await.unwrap();
        let labels: Vec<&str> = plan.pages.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, ["cover", "page 1", "page 2"]);
        assert_eq!(plan.pages[0].request.body, "<h1>Acme</h1>");
        assert_eq!(plan.pages[1].title, "About");
        assert_eq!(plan.pages[2].kind, PageKind::Page { position: 1 });
    }

    #[tokio::test]
    async fn cover_is_not_numbered() {
        let plan = plan_export(&document(), &ExportConfig::default()).await.unwrap();
        assert_eq!(plan.pages[0].request.footer, None);
        assert_eq!(plan.pages[1].request.footer.as_deref(), Some("<i>1 of 2</i>"));
        assert_eq!(plan.pages[2].request.footer.as_deref(), Some("<i>2 of 2</i>"));
    }

    #[tokio::test]
    async fn headers_follow_flags_and_sections_follow_order() {
        let plan = plan_export(&document(), &ExportConfig::default()).await.unwrap();
        assert_eq!(plan.pages[1].request.header, None);
        assert_eq!(plan.pages[2].request.header.as_deref(), Some("<b>Team</b>"));
        assert_eq!(plan.pages[2].request.body, "<p>first</p>\n<p>second</p>");
    }

    #[tokio::test]
    async fn untitled_page_gets_no_heading() {
        let mut doc = document();
        doc.pages[1].title = "   ".into();
        let plan = plan_export(&doc, &ExportConfig::default()).await.unwrap();
        assert_eq!(plan.pages[1].request.title, None);

        let composition = plan.surface.compose(plan.pages[1].request.clone()).unwrap();
        assert!(!composition.markup.contains("page-title"), "{}", composition.markup);
    }

    #[tokio::test]
    async fn decode_fallbacks_are_carried_per_page() {
        let plan = plan_export(&document(), &ExportConfig::default()).await.unwrap();
        assert_eq!(plan.pages[1].request.body, "{broken");
        assert!(matches!(&plan.pages[1].warnings[..], [PageError::DecodeFailure { page, .. }] if page == "page 1"));
    }

    #[tokio::test]
    async fn empty_document_is_rejected() {
        let doc = Document {
            name: "Blank".into(),
            cover: Some("  ".into()),
            ..Default::default()
        };
        let err = plan_export(&doc, &ExportConfig::default()).await.unwrap_err();
        assert!(matches!(err, ExportError::EmptyDocument { name } if name == "Blank"));
    }

    #[tokio::test]
    async fn unresolvable_background_is_a_warning() {
        let doc = Document {
            background_image: Some("backgrounds/a.png".into()),
            ..document()
        };
        let plan = plan_export(&doc, &ExportConfig::default()).await.unwrap();
        assert!(matches!(&plan.warnings[..], [PageError::AssetUnresolved { page, .. }] if page == "document"));
        assert!(plan.pages.iter().all(|p| p.request.background_image.is_none()));
    }

    #[tokio::test]
    async fn document_colour_overrides_config() {
        let doc = Document {
            background_color: Some("#102030".into()),
            ..document()
        };
        let plan = plan_export(&doc, &ExportConfig::default()).await.unwrap();
        assert_eq!(plan.pages[1].request.background_color, Some(Rgb(0x10, 0x20, 0x30)));
    }

    #[tokio::test]
    async fn renders_a_page_with_the_canvas_rasterizer() {
        let config = ExportConfig::builder().scale(1.0).build().unwrap();
        let plan = plan_export(&document(), &config).await.unwrap();
        let render = plan.render(&plan.pages[2]).await.unwrap();
        let image = render.image.unwrap();
        assert_eq!((image.width(), image.height()), (794, 1123));
        assert!(render.warnings.is_empty());
    }

    #[tokio::test]
    async fn attachments_respect_the_switch() {
        let mut doc = document();
        doc.attachments = vec![crate::model::Attachment {
            url: "certificates/iso.png".into(),
            ..Default::default()
        }];
        let plan = plan_export(&doc, &ExportConfig::default()).await.unwrap();
        assert_eq!(plan.attachments.len(), 1);
        let err = plan.load_attachment(&plan.attachments[0]).await.unwrap_err();
        assert!(matches!(err, PageError::AttachmentSkipped { page, .. } if page == "attachment 1"));

        let config = ExportConfig::builder().include_attachments(false).build().unwrap();
        assert!(plan_export(&doc, &config).await.unwrap().attachments.is_empty());
    }
}
