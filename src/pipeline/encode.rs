//! Image encoding: `DynamicImage` → JPEG bytes for embedding in the PDF.
//!
//! PDF readers decode `DCTDecode` streams natively, so a JPEG can be copied
//! into the output as-is. Quality 90 keeps rendered text edges clean while a
//! 2× A4 page stays in the low hundreds of kilobytes.

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use thiserror::Error;
use tracing::debug;

/// JPEG quality used for page bitmaps.
pub const PAGE_JPEG_QUALITY: u8 = 90;

/// An encoded page bitmap.
#[derive(Debug, Clone)]
pub struct EncodedPage {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Why a bitmap could not become a page image.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("bitmap is empty ({width}x{height} px)")]
    Empty { width: u32, height: u32 },

    #[error("JPEG encoding failed: {0}")]
    Jpeg(#[from] image::ImageError),
}

/// Encode a rasterised page as baseline RGB JPEG.
///
/// Alpha is dropped: pages are always painted onto an opaque background.
/// Bitmaps wider or taller than 65535 px are rejected by the encoder.
pub fn encode_page(img: &DynamicImage) -> Result<EncodedPage, EncodeError> {
    if img.width() == 0 || img.height() == 0 {
        return Err(EncodeError::Empty {
            width: img.width(),
            height: img.height(),
        });
    }
    let rgb = img.to_rgb8();
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, PAGE_JPEG_QUALITY).encode_image(&rgb)?;
    debug!("Encoded {}x{} page → {} bytes JPEG", rgb.width(), rgb.height(), jpeg.len());
    Ok(EncodedPage {
        jpeg,
        width: rgb.width(),
        height: rgb.height(),
    })
}
