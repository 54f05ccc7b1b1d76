//! Error types for the profile-export library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExportError`] (**fatal**): the export cannot produce a trustworthy
//!   document (unknown template kind, the composition surface cannot be
//!   built, the assembler was misused). Returned as `Err(ExportError)` from
//!   the top-level `export*` functions; any partially assembled document is
//!   dropped before returning.
//!
//! * [`PageError`] (**recoverable**): one payload failed to decode, one
//!   background could not be resolved, one image timed out, or one page
//!   failed to rasterise. Logged and absorbed where it happens and collected
//!   in [`crate::output::ExportOutput::warnings`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the profile-export library.
///
/// Recoverable problems use [`PageError`] and are stored in
/// [`crate::output::ExportOutput`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ExportError {
    // ── Template errors ───────────────────────────────────────────────────
    /// A template kind name did not match any registered template.
    #[error("Unknown template kind '{kind}'\nKnown kinds: cover, toc, about, staff, content, projects")]
    UnknownTemplateKind { kind: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// The document record could not be parsed.
    #[error("Invalid document record: {reason}")]
    InvalidInput { reason: String },

    /// The document has neither a cover nor any page.
    #[error("Document '{name}' has no cover and no pages; nothing to export")]
    EmptyDocument { name: String },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// The off-screen composition for a logical page could not be built.
    #[error("Could not construct composition for {page}: {detail}")]
    CompositionConstructionFailed { page: String, detail: String },

    /// `append_page` was called after `finalize`.
    #[error("Document assembler is closed; no pages can be appended after finalize")]
    AssemblerClosed,

    /// Every logical page failed; the output would be empty.
    #[error("All {total} pages failed to rasterise.\nFirst error: {first_error}")]
    AllPagesFailed { total: usize, first_error: String },

    /// Some pages were skipped or degraded.
    ///
    /// Returned by [`crate::output::ExportOutput::into_result`] when the
    /// caller wants to treat any warning as an error.
    #[error("{warnings} warnings during export ({skipped}/{total} pages skipped)")]
    PartialExport {
        warnings: usize,
        skipped: usize,
        total: usize,
    },

    /// The caller aborted the export between two pages.
    #[error("Export cancelled after {completed} of {total} pages")]
    Cancelled { completed: usize, total: usize },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The PDF writer failed to serialise the assembled document.
    #[error("Failed to write PDF: {0}")]
    PdfWriteFailed(String),

    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A recoverable problem scoped to one logical page (or one attachment).
///
/// `page` is the human label of the logical page (`"cover"`, `"page 2"`,
/// `"attachment 1"`).
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// A section payload looked encoded but did not decode; the raw payload
    /// was used as markup instead.
    #[error("{page}: section {section} payload did not decode ({detail}); using raw payload")]
    DecodeFailure {
        page: String,
        section: String,
        detail: String,
    },

    /// A background/asset reference could not be turned into a fetchable
    /// URL or the fetch failed; the background is omitted.
    #[error("{page}: asset '{reference}' unresolved: {detail}")]
    AssetUnresolved {
        page: String,
        reference: String,
        detail: String,
    },

    /// An embedded image did not finish loading within the bounded wait.
    #[error("{page}: image '{src}' did not load within {secs}s")]
    ImageLoadTimeout { page: String, src: String, secs: u64 },

    /// An embedded image failed to load or decode; its area renders blank.
    #[error("{page}: image '{src}' failed to load: {detail}")]
    ImageLoadFailed {
        page: String,
        src: String,
        detail: String,
    },

    /// Rasterisation of one page failed; the page was skipped.
    #[error("{page}: rasterisation failed: {detail}")]
    PageRasterizationFailed { page: String, detail: String },

    /// An attachment could not be fetched or decoded; it was skipped.
    #[error("{page}: attachment skipped: {detail}")]
    AttachmentSkipped { page: String, detail: String },
}

impl PageError {
    /// True when this warning means a whole page is missing from the output.
    pub fn is_page_skip(&self) -> bool {
        matches!(
            self,
            PageError::PageRasterizationFailed { .. } | PageError::AttachmentSkipped { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_export_display() {
        let e = ExportError::PartialExport {
            warnings: 3,
            skipped: 1,
            total: 10,
        };
        let msg = e.to_string();
        assert!(msg.contains("1/10"), "got: {msg}");
        assert!(msg.contains("3 warnings"), "got: {msg}");
    }

    #[test]
    fn unknown_kind_names_the_kind() {
        let e = ExportError::UnknownTemplateKind {
            kind: "brochure".into(),
        };
        assert!(e.to_string().contains("brochure"));
    }

    #[test]
    fn cancelled_display() {
        let e = ExportError::Cancelled {
            completed: 2,
            total: 5,
        };
        assert!(e.to_string().contains("2 of 5"));
    }

    #[test]
    fn image_timeout_display() {
        let e = PageError::ImageLoadTimeout {
            page: "page 3".into(),
            src: "https://cdn.example.com/a.png".into(),
            secs: 10,
        };
        let msg = e.to_string();
        assert!(msg.contains("page 3"));
        assert!(msg.contains("10s"));
    }

    #[test]
    fn only_rasterisation_and_attachment_errors_skip_pages() {
        let skip = PageError::PageRasterizationFailed {
            page: "page 2".into(),
            detail: "boom".into(),
        };
        let soft = PageError::DecodeFailure {
            page: "page 1".into(),
            section: "7".into(),
            detail: "EOF".into(),
        };
        assert!(skip.is_page_skip());
        assert!(!soft.is_page_skip());
    }

    #[test]
    fn page_error_roundtrips_through_json() {
        let e = PageError::AssetUnresolved {
            page: "cover".into(),
            reference: "bg.png".into(),
            detail: "no storage base".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        let back: PageError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
