//! Rasterisation: [`Composition`] → `DynamicImage`.
//!
//! ## Why spawn_blocking?
//!
//! Painting a 1588 × 2246 bitmap and resampling backgrounds is CPU-bound,
//! and external rasterisers (a headless browser bridge, a native layout
//! engine) usually block. [`rasterize_page`] moves the work onto Tokio's
//! blocking pool so async workers keep serving image fetches.
//!
//! The built-in [`CanvasRasterizer`] paints the page background, the
//! cover-scaled background image and the loaded embedded images in flow
//! order. It does not lay out text; plug a full layout engine in through
//! the [`Rasterizer`] trait for that.

use crate::error::PageError;
use crate::pipeline::compose::Composition;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("surface {width}x{height} px cannot be painted")]
    Surface { width: u32, height: u32 },

    #[error("{0}")]
    Paint(String),
}

/// Turns a composition into a bitmap at a given scale.
///
/// Implementations run on a blocking thread and may block freely.
pub trait Rasterizer: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Paint `composition` at `scale` device pixels per CSS pixel.
    fn rasterize(&self, composition: &Composition, scale: f32) -> Result<DynamicImage, RasterError>;
}

/// Paints backgrounds and embedded images with the `image` crate.
#[derive(Debug, Clone)]
pub struct CanvasRasterizer {
    /// Inset of embedded images from the page edges, in CSS pixels.
    pub margin_px: u32,
    /// Vertical gap between embedded images, in CSS pixels.
    pub gap_px: u32,
    pub filter: FilterType,
}

impl Default for CanvasRasterizer {
    fn default() -> Self {
        Self {
            margin_px: 48,
            gap_px: 16,
            filter: FilterType::Triangle,
        }
    }
}

impl Rasterizer for CanvasRasterizer {
    fn name(&self) -> &str {
        "canvas"
    }

    fn rasterize(&self, composition: &Composition, scale: f32) -> Result<DynamicImage, RasterError> {
        let (width, height) = composition.scaled_size(scale);
        if width == 0 || height == 0 {
            return Err(RasterError::Surface { width, height });
        }

        let bg = composition.background_color;
        let mut canvas = RgbaImage::from_pixel(width, height, Rgba([bg.0, bg.1, bg.2, 255]));

        if let Some(background) = &composition.background_image {
            let cover = background.resize_to_fill(width, height, self.filter);
            imageops::overlay(&mut canvas, &cover.to_rgba8(), 0, 0);
        }

        let margin = (self.margin_px as f32 * scale).round() as u32;
        let gap = (self.gap_px as f32 * scale).round() as u32;
        let content_width = width.saturating_sub(margin * 2).max(1);
        let mut cursor = margin;

        for embedded in &composition.images {
            let Some(img) = &embedded.image else {
                continue;
            };
            if cursor >= height {
                debug!("{}: content overflows the page; remaining images clipped", composition.label);
                break;
            }
            // Natural size is in CSS pixels; never wider than the content box.
            let natural_w = (img.width() as f32 * scale).round().max(1.0) as u32;
            let target_w = natural_w.min(content_width);
            let target_h = ((img.height() as f64 * target_w as f64) / img.width().max(1) as f64)
                .round()
                .max(1.0) as u32;
            let placed = img.resize_exact(target_w, target_h, self.filter).to_rgba8();
            let x = margin + (content_width - target_w) / 2;
            imageops::overlay(&mut canvas, &placed, i64::from(x), i64::from(cursor));
            cursor = cursor.saturating_add(target_h + gap);
        }

        Ok(DynamicImage::ImageRgba8(canvas))
    }
}

/// Rasterise `composition` on the blocking pool.
///
/// Any failure, including a panicking rasteriser, becomes a
/// [`PageError::PageRasterizationFailed`] for this page only.
pub async fn rasterize_page(
    rasterizer: Arc<dyn Rasterizer>,
    composition: Composition,
    scale: f32,
) -> Result<DynamicImage, PageError> {
    let label = composition.label.clone();
    let result = tokio::task::spawn_blocking(move || rasterizer.rasterize(&composition, scale))
        .await
        .map_err(|e| PageError::PageRasterizationFailed {
            page: label.clone(),
            detail: format!("rasteriser task panicked: {e}"),
        })?;

    let image = result.map_err(|e| PageError::PageRasterizationFailed {
        page: label.clone(),
        detail: e.to_string(),
    })?;
    debug!("Rasterised {} → {}x{} px", label, image.width(), image.height());
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExportConfig, Rgb};
    use crate::pipeline::compose::{ComposeRequest, CompositionSurface};
    use crate::pipeline::images::EmbeddedImage;
    use image::RgbImage;

    fn composition(request: ComposeRequest) -> Composition {
        CompositionSurface::from_config(&ExportConfig::default())
            .compose(request)
            .unwrap()
    }

    fn solid(w: u32, h: u32, rgb: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, image::Rgb(rgb)))
    }

    #[test]
    fn paints_background_colour_at_scale() {
        let c = composition(ComposeRequest {
            background_color: Some(Rgb(10, 20, 30)),
            ..Default::default()
        });
        let img = CanvasRasterizer::default().rasterize(&c, 2.0).unwrap();
        assert_eq!((img.width(), img.height()), (1588, 2246));
        assert_eq!(img.to_rgba8().get_pixel(5, 5), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn background_image_covers_the_page() {
        let c = composition(ComposeRequest {
            background_image: Some(Arc::new(solid(10, 10, [0, 0, 255]))),
            ..Default::default()
        });
        let img = CanvasRasterizer::default().rasterize(&c, 1.0).unwrap().to_rgba8();
        assert_eq!(img.get_pixel(0, 0), &Rgba([0, 0, 255, 255]));
        assert_eq!(img.get_pixel(793, 1122), &Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn embedded_images_flow_top_down_and_failures_stay_blank() {
        let mut c = composition(ComposeRequest::default());
        c.images = vec![
            EmbeddedImage {
                src: "a".into(),
                image: Some(solid(100, 50, [255, 0, 0])),
            },
            EmbeddedImage {
                src: "missing".into(),
                image: None,
            },
            EmbeddedImage {
                src: "b".into(),
                image: Some(solid(100, 50, [0, 255, 0])),
            },
        ];
        let img = CanvasRasterizer::default().rasterize(&c, 1.0).unwrap().to_rgba8();
        let x = 794 / 2;
        // First image starts at the margin, second one after a 16 px gap.
        assert_eq!(img.get_pixel(x, 48 + 10), &Rgba([255, 0, 0, 255]));
        assert_eq!(img.get_pixel(x, 48 + 50 + 16 + 10), &Rgba([0, 255, 0, 255]));
        assert_eq!(img.get_pixel(5, 5), &Rgba([255, 255, 255, 255]));
    }

    struct Failing;

    impl Rasterizer for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn rasterize(&self, _: &Composition, _: f32) -> Result<DynamicImage, RasterError> {
            Err(RasterError::Paint("out of memory".into()))
        }
    }

    #[tokio::test]
    async fn failures_become_page_errors() {
        let c = composition(ComposeRequest {
            label: "page 2".into(),
            ..Default::default()
        });
        let err = rasterize_page(Arc::new(Failing), c, 2.0).await.unwrap_err();
        assert_eq!(
            err,
            PageError::PageRasterizationFailed {
                page: "page 2".into(),
                detail: "out of memory".into()
            }
        );
    }
}
