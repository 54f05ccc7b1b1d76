//! # profile-export
//!
//! Assemble company-profile documents from page templates and export them
//! as paginated PDF.
//!
//! A document is an optional cover, shared header/footer fragments and an
//! ordered list of pages, each a list of content sections. Exporting walks
//! the logical pages strictly in sequence, composes each one off-screen,
//! rasterises it at 2× and appends the bitmap as one PDF page.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Document
//!  │
//!  ├─ 1. Plan       order pages, resolve section markup, substitute
//!  │                page title / page number, fetch the background once
//!  ├─ 2. Compose    header + title + body + footer on an A4-wide surface
//!  ├─ 3. Images     wait for embedded images (concurrent, bounded)
//!  ├─ 4. Rasterise  Rasterizer trait, spawn_blocking, scale 2.0
//!  ├─ 5. Assemble   one JPEG page per bitmap, top-anchored (lopdf)
//!  └─ 6. Output     PDF bytes + per-page outcomes, warnings, stats
//! ```
//!
//! The template side ([`templates`]) holds the registry of page kinds, the
//! merge of persisted data over defaults and the preview markup.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use profile_export::{export_from_json, ExportConfig, Locale};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExportConfig::builder()
//!         .locale(Locale::Ar)
//!         .storage_base_url("https://cdn.example.com/storage")
//!         .build()?;
//!     let json = std::fs::read_to_string("profile.json")?;
//!     let output = export_from_json(&json, &config).await?;
//!     std::fs::write("profile.pdf", &output.pdf)?;
//!     for w in &output.warnings {
//!         eprintln!("warning: {w}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `profile-export` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! profile-export = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;
pub mod templates;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExportConfig, ExportConfigBuilder, Locale, PageGeometry, Rgb};
pub use error::{ExportError, PageError};
pub use export::{export, export_from_json, export_sync, export_to_file};
pub use model::{Attachment, Document, Page, Section};
pub use output::{ExportOutput, ExportState, ExportStats, PageOutcome};
pub use pipeline::assemble::DocumentAssembler;
pub use pipeline::assets::{resolve_asset_url, AssetClass, AssetContext};
pub use pipeline::compose::{ComposeRequest, Composition, CompositionSurface};
pub use pipeline::content::{resolve_section_markup, MarkupSource};
pub use pipeline::placeholders::{
    substitute_page_number, substitute_page_title, PAGE_NUMBER_SENTINEL, TITLE_TOKENS,
};
pub use pipeline::raster::{CanvasRasterizer, RasterError, Rasterizer};
pub use progress::{CancelToken, ExportProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{export_stream, PageStream, RasterizedPage};
pub use templates::{
    registry, render_preview, resolve_template, resolve_template_data, FieldDescriptor, FieldType,
    PageData, TemplateDefinition, TemplateKind, TemplateRegistry,
};
