//! Pipeline stages for document export.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//! content ─┐
//!          ├─▶ sequence ──▶ compose ──▶ images ──▶ raster ──▶ assemble
//! placeholders    │          (surface)   (bounded)  (blocking)   (lopdf)
//!                 └── assets ──▶ fetch (background, attachments)
//! ```
//!
//! 1. [`content`]: section payload → markup (tagged decode, alias probe)
//! 2. [`placeholders`]: page-title and page-number substitution
//! 3. [`assets`]: stored reference → fetchable URL
//! 4. [`fetch`]: bytes for http(s), `data:` and local references
//! 5. [`sequence`]: plans the logical pages once per export
//! 6. [`compose`]: one off-screen container per logical page
//! 7. [`images`]: concurrent, individually bounded image loads
//! 8. [`raster`]: composition → bitmap; runs in `spawn_blocking`
//! 9. [`encode`]: bitmap → JPEG for embedding
//! 10. [`assemble`]: bitmaps → paginated PDF

pub mod assemble;
pub mod assets;
pub mod compose;
pub mod content;
pub mod encode;
pub mod fetch;
pub mod images;
pub mod placeholders;
pub mod raster;
pub mod sequence;
