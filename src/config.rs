//! Configuration types for document export.
//!
//! All export behaviour is controlled through [`ExportConfig`], built via its
//! [`ExportConfigBuilder`]. The same config drives the eager and streaming
//! entry points.
//!
//! The UI language is an explicit field ([`ExportConfig::locale`]) passed
//! into every export; nothing reads it from ambient state.

use crate::error::ExportError;
use crate::pipeline::assets::AssetClass;
use crate::pipeline::raster::{CanvasRasterizer, Rasterizer};
use crate::progress::{CancelToken, ProgressCallback};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Configuration for one export.
///
/// Built via [`ExportConfig::builder()`] or using [`ExportConfig::default()`].
///
/// # Example
/// ```rust
/// use profile_export::{ExportConfig, Locale};
///
/// let config = ExportConfig::builder()
///     .locale(Locale::Ar)
///     .image_timeout_secs(5)
///     .storage_base_url("https://cdn.example.com/storage")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExportConfig {
    /// UI language used for page-number phrases. Default: English.
    pub locale: Locale,

    /// Rasterisation scale factor. Default: 2.0.
    ///
    /// Every composition is rendered at twice its CSS pixel size so the
    /// bitmaps stay sharp when printed.
    pub scale: f32,

    /// Output page geometry. Default: A4.
    pub geometry: PageGeometry,

    /// Background colour painted behind every page unless the document
    /// carries its own. Default: white.
    pub background_color: Rgb,

    /// Upper bound on waiting for one embedded image, in seconds. Default: 10.
    pub image_timeout_secs: u64,

    /// Timeout for fetching backgrounds and attachments, in seconds. Default: 30.
    pub download_timeout_secs: u64,

    /// Storage base URL per asset class, used for relative and temp-file
    /// references.
    pub storage_base_urls: HashMap<AssetClass, String>,

    /// URLs already resolved by the caller per asset class; these win over
    /// anything derived from the stored reference.
    pub resolved_asset_urls: HashMap<AssetClass, String>,

    /// Largest composition surface (scaled width × height) that may be
    /// allocated. Default: 40 000 000 pixels.
    pub max_surface_pixels: u64,

    /// Append the document's attachments after the pages. Default: true.
    pub include_attachments: bool,

    /// The rasteriser that turns a composition into a bitmap.
    pub rasterizer: Arc<dyn Rasterizer>,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,

    /// Optional cancellation, checked once per page.
    pub cancel_token: Option<CancelToken>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            locale: Locale::default(),
            scale: 2.0,
            geometry: PageGeometry::a4(),
            background_color: Rgb::WHITE,
            image_timeout_secs: 10,
            download_timeout_secs: 30,
            storage_base_urls: HashMap::new(),
            resolved_asset_urls: HashMap::new(),
            max_surface_pixels: 40_000_000,
            include_attachments: true,
            rasterizer: Arc::new(CanvasRasterizer::default()),
            progress_callback: None,
            cancel_token: None,
        }
    }
}

impl fmt::Debug for ExportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportConfig")
            .field("locale", &self.locale)
            .field("scale", &self.scale)
            .field("geometry", &self.geometry)
            .field("background_color", &self.background_color)
            .field("image_timeout_secs", &self.image_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("storage_base_urls", &self.storage_base_urls)
            .field("resolved_asset_urls", &self.resolved_asset_urls)
            .field("max_surface_pixels", &self.max_surface_pixels)
            .field("include_attachments", &self.include_attachments)
            .field("rasterizer", &self.rasterizer.name())
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExportProgressCallback>"),
            )
            .field("cancel_token", &self.cancel_token)
            .finish()
    }
}

impl ExportConfig {
    /// Create a new builder for `ExportConfig`.
    pub fn builder() -> ExportConfigBuilder {
        ExportConfigBuilder {
            config: Self::default(),
        }
    }

    /// Scaled surface size for one page in pixels.
    pub fn surface_size(&self) -> (u32, u32) {
        let w = (self.geometry.width_px as f32 * self.scale).round() as u32;
        let h = (self.geometry.height_px as f32 * self.scale).round() as u32;
        (w, h)
    }
}

/// Builder for [`ExportConfig`].
pub struct ExportConfigBuilder {
    config: ExportConfig,
}

impl fmt::Debug for ExportConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ExportConfigBuilder {
    pub fn locale(mut self, locale: Locale) -> Self {
        self.config.locale = locale;
        self
    }

    pub fn scale(mut self, scale: f32) -> Self {
        self.config.scale = scale.clamp(1.0, 4.0);
        self
    }

    pub fn geometry(mut self, geometry: PageGeometry) -> Self {
        self.config.geometry = geometry;
        self
    }

    pub fn background_color(mut self, color: Rgb) -> Self {
        self.config.background_color = color;
        self
    }

    pub fn image_timeout_secs(mut self, secs: u64) -> Self {
        self.config.image_timeout_secs = secs.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    /// Set the same storage base URL for every asset class.
    pub fn storage_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        for class in AssetClass::ALL {
            self.config.storage_base_urls.insert(class, url.clone());
        }
        self
    }

    /// Set the storage base URL for one asset class.
    pub fn storage_base_url_for(mut self, class: AssetClass, url: impl Into<String>) -> Self {
        self.config.storage_base_urls.insert(class, url.into());
        self
    }

    pub fn resolved_asset_url(mut self, class: AssetClass, url: impl Into<String>) -> Self {
        self.config.resolved_asset_urls.insert(class, url.into());
        self
    }

    pub fn max_surface_pixels(mut self, px: u64) -> Self {
        self.config.max_surface_pixels = px;
        self
    }

    pub fn include_attachments(mut self, v: bool) -> Self {
        self.config.include_attachments = v;
        self
    }

    pub fn rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.config.rasterizer = rasterizer;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.config.cancel_token = Some(token);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExportConfig, ExportError> {
        let c = &self.config;
        if !(1.0..=4.0).contains(&c.scale) {
            return Err(ExportError::InvalidConfig(format!(
                "scale must be 1.0–4.0, got {}",
                c.scale
            )));
        }
        if c.geometry.width_pt <= 0.0 || c.geometry.height_pt <= 0.0 {
            return Err(ExportError::InvalidConfig(
                "page geometry must have a positive size".into(),
            ));
        }
        if c.geometry.width_px == 0 || c.geometry.height_px == 0 {
            return Err(ExportError::InvalidConfig(
                "page pixel size must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Value types ──────────────────────────────────────────────────────────

/// The two supported UI languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    Ar,
    #[default]
    En,
}

impl Locale {
    /// Render the "current of total" page-number phrase.
    pub fn page_number_phrase(self, current: usize, total: usize) -> String {
        match self {
            Locale::Ar => format!("{current} من {total}"),
            Locale::En => format!("{current} of {total}"),
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Locale::Ar => "ar",
            Locale::En => "en",
        }
    }
}

impl FromStr for Locale {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ar" | "arabic" => Ok(Locale::Ar),
            "en" | "english" => Ok(Locale::En),
            other => Err(ExportError::InvalidConfig(format!(
                "unsupported locale '{other}' (expected 'ar' or 'en')"
            ))),
        }
    }
}

/// Output page size in PDF points plus the CSS pixel box the composition is
/// laid out in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width_pt: f32,
    pub height_pt: f32,
    pub width_px: u32,
    pub height_px: u32,
}

impl PageGeometry {
    /// A4 portrait: 210 × 297 mm, laid out at 96 CSS px per inch.
    pub fn a4() -> Self {
        Self {
            width_pt: 595.28,
            height_pt: 841.89,
            width_px: 794,
            height_px: 1123,
        }
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::a4()
    }
}

/// An opaque RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(255, 255, 255);

    /// Parse `#rgb` or `#rrggbb` (the leading `#` is optional).
    pub fn parse_hex(s: &str) -> Option<Rgb> {
        let hex = s.trim().trim_start_matches('#');
        let expand = |c: u8| c * 16 + c;
        let digit = |c: char| c.to_digit(16).map(|d| d as u8);
        let chars: Vec<char> = hex.chars().collect();
        match chars.len() {
            3 => Some(Rgb(
                expand(digit(chars[0])?),
                expand(digit(chars[1])?),
                expand(digit(chars[2])?),
            )),
            6 => {
                let byte = |i: usize| Some(digit(chars[i])? * 16 + digit(chars[i + 1])?);
                Some(Rgb(byte(0)?, byte(2)?, byte(4)?))
            }
            _ => None,
        }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ExportConfig::default();
        assert_eq!(c.locale, Locale::En);
        assert_eq!(c.scale, 2.0);
        assert_eq!(c.geometry, PageGeometry::a4());
        assert_eq!(c.surface_size(), (1588, 2246));
    }

    #[test]
    fn builder_clamps_scale() {
        let c = ExportConfig::builder().scale(10.0).build().unwrap();
        assert_eq!(c.scale, 4.0);
    }

    #[test]
    fn builder_rejects_empty_geometry() {
        let err = ExportConfig::builder()
            .geometry(PageGeometry {
                width_pt: 0.0,
                height_pt: 100.0,
                width_px: 10,
                height_px: 10,
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, ExportError::InvalidConfig(_)));
    }

    #[test]
    fn storage_base_applies_to_every_class() {
        let c = ExportConfig::builder()
            .storage_base_url("https://cdn.example.com/storage")
            .build()
            .unwrap();
        for class in AssetClass::ALL {
            assert_eq!(
                c.storage_base_urls.get(&class).map(String::as_str),
                Some("https://cdn.example.com/storage")
            );
        }
    }

    #[test]
    fn locale_phrases() {
        assert_eq!(Locale::En.page_number_phrase(1, 2), "1 of 2");
        assert_eq!(Locale::Ar.page_number_phrase(1, 2), "1 من 2");
    }

    #[test]
    fn locale_parse() {
        assert_eq!("AR".parse::<Locale>().unwrap(), Locale::Ar);
        assert_eq!("en".parse::<Locale>().unwrap(), Locale::En);
        assert!("fr".parse::<Locale>().is_err());
    }

    #[test]
    fn rgb_parse() {
        assert_eq!(Rgb::parse_hex("#ffffff"), Some(Rgb::WHITE));
        assert_eq!(Rgb::parse_hex("0a0B0c"), Some(Rgb(10, 11, 12)));
        assert_eq!(Rgb::parse_hex("#f00"), Some(Rgb(255, 0, 0)));
        assert_eq!(Rgb::parse_hex("#12"), None);
        assert_eq!(Rgb::parse_hex("#zzzzzz"), None);
        assert_eq!(Rgb(1, 2, 255).to_hex(), "#0102ff");
    }
}
