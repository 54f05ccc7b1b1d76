//! Eager (full-document) export entry points.
//!
//! [`export`] walks the logical pages strictly in sequence (cover first,
//! then the pages in `order`), appends every successfully rasterised page
//! to one [`DocumentAssembler`], appends the attachments and returns the
//! finished PDF with per-page outcomes. Use [`crate::stream::export_stream`]
//! to receive page bitmaps one at a time instead.

use crate::config::ExportConfig;
use crate::error::{ExportError, PageError};
use crate::model::Document;
use crate::output::{ExportOutput, ExportState, ExportStats, PageOutcome};
use crate::pipeline::assemble::DocumentAssembler;
use crate::pipeline::encode::{encode_page, EncodedPage};
use crate::pipeline::sequence::{self, PageKind};
use image::DynamicImage;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Export a document to PDF.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(ExportOutput)` even if some pages were skipped (check
/// `output.warnings` or call [`ExportOutput::into_result`]).
///
/// # Errors
/// Returns `Err(ExportError)` only for fatal errors:
/// - the document has neither a cover nor a page
/// - the composition surface cannot be built
/// - every logical page failed
/// - the export was cancelled (checked before each page and attachment)
///
/// A bitmap the PDF cannot embed (empty, or wider or taller than the JPEG
/// limit) skips its page or attachment with a warning.
pub async fn export(document: &Document, config: &ExportConfig) -> Result<ExportOutput, ExportError> {
    let total_start = Instant::now();
    info!("Starting export of '{}' ({})", document.name, document.id);

    let mut trace = vec![ExportState::Idle];
    let plan = sequence::plan_export(document, config).await.inspect_err(|e| {
        error!("Export of '{}' failed before the first page: {}", document.name, e);
    })?;
    let total = plan.pages.len();
    let cb = config.progress_callback.as_ref();

    if let Some(cb) = cb {
        cb.on_export_start(total);
    }

    let mut warnings: Vec<PageError> = plan.warnings.clone();
    let mut assembler = DocumentAssembler::new(config.geometry).with_title(document.name.clone());
    let mut outcomes: Vec<PageOutcome> = Vec::with_capacity(total + plan.attachments.len());
    let mut raster_duration_ms = 0;

    // ── Logical pages, strictly in sequence ──────────────────────────────
    for (i, page) in plan.pages.iter().enumerate() {
        let page_num = i + 1;
        if is_cancelled(config) {
            transition(&mut trace, ExportState::Failed);
            warn!("Export cancelled before {}", page.label);
            return Err(ExportError::Cancelled { completed: i, total });
        }

        transition(
            &mut trace,
            match page.kind {
                PageKind::Cover => ExportState::RenderingCover,
                PageKind::Page { position } => ExportState::RenderingPage(position),
            },
        );
        if let Some(cb) = cb {
            cb.on_page_start(page_num, total);
        }

        let render = match plan.render(page).await {
            Ok(render) => render,
            Err(e) => {
                // The partial document is dropped with `assembler`.
                transition(&mut trace, ExportState::Failed);
                error!("Aborting export: {}", e);
                return Err(e);
            }
        };
        raster_duration_ms += render.duration_ms;
        warnings.extend(render.warnings);

        let encoded = render.image.and_then(|bitmap| {
            encode_page_image(&bitmap, |detail| PageError::PageRasterizationFailed {
                page: page.label.clone(),
                detail,
            })
        });
        let outcome = match encoded {
            Ok((encoded, size)) => {
                assembler
                    .append_encoded(encoded)
                    .inspect_err(|_| transition(&mut trace, ExportState::Failed))?;
                if let Some(cb) = cb {
                    cb.on_page_complete(page_num, total);
                }
                PageOutcome {
                    label: page.label.clone(),
                    title: page.title.clone(),
                    output_page: Some(assembler.page_count()),
                    bitmap_size: Some(size),
                    duration_ms: render.duration_ms,
                    error: None,
                }
            }
            Err(err) => {
                warn!("Skipping {}: {}", page.label, err);
                if let Some(cb) = cb {
                    cb.on_page_error(page_num, total, &err.to_string());
                }
                warnings.push(err.clone());
                PageOutcome {
                    label: page.label.clone(),
                    title: page.title.clone(),
                    output_page: None,
                    bitmap_size: None,
                    duration_ms: render.duration_ms,
                    error: Some(err),
                }
            }
        };
        outcomes.push(outcome);
    }

    let rendered_pages = outcomes.iter().filter(|o| o.is_rendered()).count();
    if rendered_pages == 0 {
        transition(&mut trace, ExportState::Failed);
        let first_error = outcomes
            .iter()
            .find_map(|o| o.error.as_ref())
            .map(ToString::to_string)
            .unwrap_or_else(|| "Unknown error".to_string());
        if let Some(cb) = cb {
            cb.on_export_complete(total, 0);
        }
        return Err(ExportError::AllPagesFailed { total, first_error });
    }

    // ── Attachments and assembly ─────────────────────────────────────────
    transition(&mut trace, ExportState::Assembling);
    let mut attachment_pages = 0;
    let grand_total = total + plan.attachments.len();
    for (i, attachment) in plan.attachments.iter().enumerate() {
        if is_cancelled(config) {
            transition(&mut trace, ExportState::Failed);
            warn!("Export cancelled before {}", attachment.label);
            return Err(ExportError::Cancelled {
                completed: total + i,
                total: grand_total,
            });
        }

        let start = Instant::now();
        let loaded = plan.load_attachment(attachment).await.and_then(|bitmap| {
            encode_page_image(&bitmap, |detail| PageError::AttachmentSkipped {
                page: attachment.label.clone(),
                detail,
            })
        });
        let outcome = match loaded {
            Ok((encoded, size)) => {
                assembler
                    .append_encoded(encoded)
                    .inspect_err(|_| transition(&mut trace, ExportState::Failed))?;
                attachment_pages += 1;
                PageOutcome {
                    label: attachment.label.clone(),
                    title: attachment.title.clone(),
                    output_page: Some(assembler.page_count()),
                    bitmap_size: Some(size),
                    duration_ms: start.elapsed().as_millis() as u64,
                    error: None,
                }
            }
            Err(err) => {
                warn!("{}", err);
                warnings.push(err.clone());
                PageOutcome {
                    label: attachment.label.clone(),
                    title: attachment.title.clone(),
                    output_page: None,
                    bitmap_size: None,
                    duration_ms: start.elapsed().as_millis() as u64,
                    error: Some(err),
                }
            }
        };
        outcomes.push(outcome);
    }

    let page_breaks = assembler.page_break_count();
    let output_pages = assembler.page_count();
    let pdf = assembler
        .finalize()
        .inspect_err(|_| transition(&mut trace, ExportState::Failed))?;
    transition(&mut trace, ExportState::Done);

    let stats = ExportStats {
        logical_pages: total,
        rendered_pages,
        skipped_pages: total - rendered_pages,
        attachment_pages,
        output_pages,
        page_breaks,
        warnings: warnings.len(),
        output_bytes: pdf.len(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        raster_duration_ms,
    };

    info!(
        "Export complete: {}/{} logical pages, {} output pages, {} warnings, {}ms",
        rendered_pages, total, output_pages, stats.warnings, stats.total_duration_ms
    );
    if let Some(cb) = cb {
        cb.on_export_complete(total, rendered_pages);
    }

    Ok(ExportOutput {
        pdf,
        pages: outcomes,
        warnings,
        state_trace: trace,
        stats,
    })
}

/// Export a document and write the PDF to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn export_to_file(
    document: &Document,
    output_path: impl AsRef<Path>,
    config: &ExportConfig,
) -> Result<ExportStats, ExportError> {
    let output = export(document, config).await?;
    let path = output_path.as_ref();
    let write_err = |source| ExportError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp_path, &output.pdf).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    debug!("Wrote {} bytes to {}", output.pdf.len(), path.display());

    Ok(output.stats)
}

/// Synchronous wrapper around [`export`].
///
/// Creates a temporary tokio runtime internally.
pub fn export_sync(document: &Document, config: &ExportConfig) -> Result<ExportOutput, ExportError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExportError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(export(document, config))
}

/// Parse a JSON document record and export it.
///
/// # Example
/// ```rust,no_run
/// use profile_export::{export_from_json, ExportConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let json = std::fs::read_to_string("profile.json")?;
/// let output = export_from_json(&json, &ExportConfig::default()).await?;
/// std::fs::write("profile.pdf", &output.pdf)?;
/// # Ok(())
/// # }
/// ```
pub async fn export_from_json(json: &str, config: &ExportConfig) -> Result<ExportOutput, ExportError> {
    let document = Document::from_json(json).map_err(|e| ExportError::InvalidInput {
        reason: e.to_string(),
    })?;
    export(&document, config).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn transition(trace: &mut Vec<ExportState>, next: ExportState) {
    if let Some(prev) = trace.last() {
        debug!("Sequencer: {:?} → {:?}", prev, next);
    }
    trace.push(next);
}

/// Encode one bitmap for the assembler; a bitmap the encoder refuses
/// becomes the page-level error built by `skip`.
fn encode_page_image(
    bitmap: &DynamicImage,
    skip: impl FnOnce(String) -> PageError,
) -> Result<(EncodedPage, (u32, u32)), PageError> {
    encode_page(bitmap)
        .map(|encoded| (encoded, (bitmap.width(), bitmap.height())))
        .map_err(|e| skip(e.to_string()))
}

fn is_cancelled(config: &ExportConfig) -> bool {
    config.cancel_token.as_ref().is_some_and(|t| t.is_cancelled())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Page;

    fn doc() -> Document {
        Document {
            name: "Acme".into(),
            cover: Some("<h1>Acme</h1>".into()),
            pages: vec![Page {
                title: "About".into(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn transition_appends_in_order() {
        let mut trace = vec![ExportState::Idle];
        transition(&mut trace, ExportState::RenderingCover);
        transition(&mut trace, ExportState::RenderingPage(0));
        assert_eq!(
            trace,
            [ExportState::Idle, ExportState::RenderingCover, ExportState::RenderingPage(0)]
        );
    }

    #[tokio::test]
    async fn exports_cover_and_page_with_default_rasterizer() {
        let config = ExportConfig::builder().scale(1.0).build().unwrap();
        let output = export(&doc(), &config).await.unwrap();
        assert_eq!(output.stats.output_pages, 2);
        assert_eq!(output.stats.page_breaks, 1);
        assert_eq!(
            output.state_trace,
            [
                ExportState::Idle,
                ExportState::RenderingCover,
                ExportState::RenderingPage(0),
                ExportState::Assembling,
                ExportState::Done
            ]
        );
        assert!(output.pdf.starts_with(b"%PDF-1.5"));
    }

    #[tokio::test]
    async fn invalid_json_is_invalid_input() {
        let err = export_from_json("{not json", &ExportConfig::default()).await.unwrap_err();
        assert!(matches!(err, ExportError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn writes_pdf_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("profile.pdf");
        let config = ExportConfig::builder().scale(1.0).build().unwrap();
        let stats = export_to_file(&doc(), &path, &config).await.unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), stats.output_bytes);
        assert!(!path.with_extension("pdf.tmp").exists());
    }

    #[test]
    fn sync_wrapper_runs_its_own_runtime() {
        let config = ExportConfig::builder().scale(1.0).build().unwrap();
        let output = export_sync(&doc(), &config).unwrap();
        assert_eq!(output.stats.rendered_pages, 2);
    }
}
