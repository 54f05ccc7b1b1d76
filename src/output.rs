//! Export results: the finished document plus per-page outcomes and stats.

use crate::error::{ExportError, PageError};
use serde::{Deserialize, Serialize};

/// States of the rasterisation sequencer, recorded in order in
/// [`ExportOutput::state_trace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportState {
    Idle,
    RenderingCover,
    /// Rendering the page at this 0-based position in `order`.
    RenderingPage(usize),
    Assembling,
    Done,
    Failed,
}

/// What happened to one logical page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageOutcome {
    /// `"cover"`, `"page N"` or `"attachment N"`.
    pub label: String,
    /// Page title (document name for the cover, caption for attachments).
    pub title: String,
    /// 1-based position in the output PDF, `None` when skipped.
    pub output_page: Option<usize>,
    /// Pixel size of the rasterised bitmap.
    pub bitmap_size: Option<(u32, u32)>,
    pub duration_ms: u64,
    /// Why the page is missing, when it is.
    pub error: Option<PageError>,
}

impl PageOutcome {
    pub fn is_rendered(&self) -> bool {
        self.output_page.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportStats {
    /// Logical pages the document declares (cover + pages).
    pub logical_pages: usize,
    pub rendered_pages: usize,
    pub skipped_pages: usize,
    pub attachment_pages: usize,
    /// Pages in the final PDF.
    pub output_pages: usize,
    pub page_breaks: usize,
    pub warnings: usize,
    pub output_bytes: usize,
    pub total_duration_ms: u64,
    pub raster_duration_ms: u64,
}

/// The assembled document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportOutput {
    /// The paginated PDF.
    #[serde(skip)]
    pub pdf: Vec<u8>,
    pub pages: Vec<PageOutcome>,
    /// Every recoverable problem absorbed during the export, in order.
    pub warnings: Vec<PageError>,
    pub state_trace: Vec<ExportState>,
    pub stats: ExportStats,
}

impl ExportOutput {
    /// Treat any warning as an error.
    pub fn into_result(self) -> Result<Self, ExportError> {
        if self.warnings.is_empty() {
            Ok(self)
        } else {
            Err(ExportError::PartialExport {
                warnings: self.warnings.len(),
                skipped: self.stats.skipped_pages,
                total: self.stats.logical_pages,
            })
        }
    }

    /// Warnings that caused whole pages to be skipped.
    pub fn skipped(&self) -> impl Iterator<Item = &PageError> {
        self.warnings.iter().filter(|w| w.is_page_skip())
    }
}
