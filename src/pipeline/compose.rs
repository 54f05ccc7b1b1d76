//! Off-screen composition of one logical page.
//!
//! A [`CompositionSurface`] is sized once per export from the page geometry
//! and scale. [`CompositionSurface::compose`] stacks header, title, body and
//! footer into a single fixed-width container with the page background and
//! returns a [`Composition`] the rasteriser can paint.
//!
//! ```text
//! ┌ div.export-page (width_px, background) ┐
//! │ header.page-header      (has_header)   │
//! │ h1.page-title           (pages only)   │
//! │ main.page-body          (sections)     │
//! │ footer.page-footer      (has_footer)   │
//! └────────────────────────────────────────┘
//! ```

use crate::config::{ExportConfig, Locale, Rgb};
use crate::error::ExportError;
use crate::pipeline::images::EmbeddedImage;
use crate::templates::preview::escape_html;
use image::DynamicImage;
use std::fmt::Write as _;
use std::sync::Arc;

/// Everything needed to lay out one logical page.
#[derive(Debug, Clone, Default)]
pub struct ComposeRequest {
    /// `"cover"` or `"page N"`; used in errors and logs.
    pub label: String,
    /// Rendered as the page heading; `None` for the cover.
    pub title: Option<String>,
    pub header: Option<String>,
    pub body: String,
    pub footer: Option<String>,
    pub background_color: Option<Rgb>,
    pub background_url: Option<String>,
    pub background_image: Option<Arc<DynamicImage>>,
    pub locale: Locale,
}

/// A laid-out page, ready for rasterisation.
#[derive(Debug, Clone)]
pub struct Composition {
    pub label: String,
    /// The full container markup.
    pub markup: String,
    pub header: Option<String>,
    pub title: Option<String>,
    pub body: String,
    pub footer: Option<String>,
    pub background_color: Rgb,
    pub background_url: Option<String>,
    pub background_image: Option<Arc<DynamicImage>>,
    /// Embedded images in flow order; filled in after the bounded wait.
    pub images: Vec<EmbeddedImage>,
    /// Layout width in CSS pixels.
    pub width_px: u32,
    /// Minimum layout height in CSS pixels.
    pub height_px: u32,
}

impl Composition {
    /// Bitmap size at `scale`.
    pub fn scaled_size(&self, scale: f32) -> (u32, u32) {
        scaled(self.width_px, self.height_px, scale)
    }
}

/// The off-screen surface every page of one export is composed on.
#[derive(Debug, Clone, Copy)]
pub struct CompositionSurface {
    pub width_px: u32,
    pub height_px: u32,
    pub scale: f32,
    pub max_surface_pixels: u64,
    pub default_background: Rgb,
}

impl CompositionSurface {
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            width_px: config.geometry.width_px,
            height_px: config.geometry.height_px,
            scale: config.scale,
            max_surface_pixels: config.max_surface_pixels,
            default_background: config.background_color,
        }
    }

    /// Scaled surface size, or [`ExportError::CompositionConstructionFailed`]
    /// when it would be empty or larger than `max_surface_pixels`.
    pub fn allocate(&self, label: &str) -> Result<(u32, u32), ExportError> {
        let (w, h) = scaled(self.width_px, self.height_px, self.scale);
        if w == 0 || h == 0 {
            return Err(ExportError::CompositionConstructionFailed {
                page: label.to_string(),
                detail: format!("surface {w}x{h} px is empty"),
            });
        }
        let pixels = u64::from(w) * u64::from(h);
        if pixels > self.max_surface_pixels {
            return Err(ExportError::CompositionConstructionFailed {
                page: label.to_string(),
                detail: format!(
                    "surface {w}x{h} px ({pixels} px) exceeds the limit of {} px",
                    self.max_surface_pixels
                ),
            });
        }
        Ok((w, h))
    }

    /// Build the composition for one page.
    pub fn compose(&self, request: ComposeRequest) -> Result<Composition, ExportError> {
        self.allocate(&request.label)?;
        let background_color = request.background_color.unwrap_or(self.default_background);
        let markup = container_markup(&request, background_color, self.width_px, self.height_px);

        Ok(Composition {
            label: request.label,
            markup,
            header: request.header,
            title: request.title,
            body: request.body,
            footer: request.footer,
            background_color,
            background_url: request.background_url,
            background_image: request.background_image,
            images: Vec::new(),
            width_px: self.width_px,
            height_px: self.height_px,
        })
    }
}

fn scaled(width_px: u32, height_px: u32, scale: f32) -> (u32, u32) {
    (
        (width_px as f32 * scale).round() as u32,
        (height_px as f32 * scale).round() as u32,
    )
}

fn container_markup(request: &ComposeRequest, background: Rgb, width_px: u32, height_px: u32) -> String {
    let mut html = String::with_capacity(request.body.len() + 512);
    let dir = match request.locale {
        Locale::Ar => "rtl",
        Locale::En => "ltr",
    };
    let _ = write!(
        html,
        r#"<div class="export-page" lang="{}" dir="{dir}" style="box-sizing:border-box;width:{width_px}px;min-height:{height_px}px;background-color:{background}"#,
        request.locale.code(),
    );
    if let Some(url) = &request.background_url {
        let _ = write!(
            html,
            ";background-image:url('{}');background-size:cover;background-position:center",
            escape_html(url)
        );
    }
    html.push_str(r#"">"#);

    if let Some(header) = &request.header {
        let _ = write!(html, r#"<header class="page-header">{header}</header>"#);
    }
    if let Some(title) = &request.title {
        let _ = write!(html, r#"<h1 class="page-title">{}</h1>"#, escape_html(title));
    }
    let _ = write!(html, r#"<main class="page-body">{}</main>"#, request.body);
    if let Some(footer) = &request.footer {
        let _ = write!(html, r#"<footer class="page-footer">{footer}</footer>"#);
    }
    html.push_str("</div>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface() -> CompositionSurface {
        CompositionSurface::from_config(&ExportConfig::default())
    }

    fn request() -> ComposeRequest {
        ComposeRequest {
            label: "page 1".into(),
            title: Some("About <us>".into()),
            header: Some("<nav>Acme</nav>".into()),
            body: "<p>Body</p>".into(),
            footer: Some("<small>1 of 2</small>".into()),
            ..Default::default()
        }
    }

    #[test]
    fn stacks_parts_in_order() {
        let c = surface().compose(request()).unwrap();
        let header = c.markup.find("page-header").unwrap();
        let title = c.markup.find("page-title").unwrap();
        let body = c.markup.find("page-body").unwrap();
        let footer = c.markup.find("page-footer").unwrap();
        assert!(header < title && title < body && body < footer);
        assert!(c.markup.contains("About &lt;us&gt;"));
        assert!(c.markup.contains("width:794px"));
        assert_eq!(c.scaled_size(2.0), (1588, 2246));
    }

    #[test]
    fn omitted_parts_leave_no_element() {
        let c = surface()
            .compose(ComposeRequest {
                label: "cover".into(),
                body: "<h1>Acme</h1>".into(),
                ..Default::default()
            })
            .unwrap();
        assert!(!c.markup.contains("<header"));
        assert!(!c.markup.contains("<footer"));
        assert!(!c.markup.contains("page-title"));
    }

    #[test]
    fn background_colour_and_image() {
        let c = surface()
            .compose(ComposeRequest {
                background_color: Some(Rgb(0, 0, 0)),
                background_url: Some("https://cdn.example.com/bg.png".into()),
                ..request()
            })
            .unwrap();
        assert_eq!(c.background_color, Rgb(0, 0, 0));
        assert!(c.markup.contains("background-color:#000000"));
        assert!(c.markup.contains("background-image:url('https://cdn.example.com/bg.png')"));

        let c = surface().compose(request()).unwrap();
        assert_eq!(c.background_color, Rgb::WHITE);
        assert!(!c.markup.contains("background-image"));
    }

    #[test]
    fn arabic_pages_are_right_to_left() {
        let c = surface()
            .compose(ComposeRequest {
                locale: Locale::Ar,
                ..request()
            })
            .unwrap();
        assert!(c.markup.contains(r#"lang="ar" dir="rtl""#));
    }

    #[test]
    fn oversized_surface_is_fatal() {
        let s = CompositionSurface {
            max_surface_pixels: 1_000,
            ..surface()
        };
        let err = s.compose(request()).unwrap_err();
        assert!(matches!(err, ExportError::CompositionConstructionFailed { page, .. } if page == "page 1"));
    }

    #[test]
    fn empty_surface_is_fatal() {
        let s = CompositionSurface {
            width_px: 0,
            ..surface()
        };
        assert!(s.compose(request()).is_err());
    }
}
