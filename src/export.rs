//! # Document Export
//!
//! Bounded, cancellable PDF export. The caller gets either a complete
//! document or a typed [`ExportError`] naming why there is none.
//!
//! Photos that fail to load do not fail the export: they are drawn as grey
//! placeholders and listed in [`ExportedDocument::fallbacks`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::error::ExportError;
use crate::image_loader::ImageCache;
use crate::model::Metadata;
use crate::pdf::PdfWriter;
use crate::render::{ElementContent, Frame, RenderSummary};

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Abort with [`ExportError::TimedOut`] once this instant has passed.
    pub deadline: Option<Instant>,
    pub metadata: Metadata,
    pub cancel: CancelToken,
}

/// A photo drawn as a placeholder instead of its image.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFallback {
    pub element_id: String,
    pub page_number: usize,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct ExportedDocument {
    pub bytes: Vec<u8>,
    pub summary: RenderSummary,
    pub fallbacks: Vec<ImageFallback>,
}

/// Export frames as a PDF.
pub fn export_pdf(
    frames: &[Frame],
    options: &ExportOptions,
) -> Result<ExportedDocument, ExportError> {
    if frames.is_empty() {
        return Err(ExportError::EmptyDocument(
            "no sections are included in the report".to_string(),
        ));
    }

    let total_pages = frames.len();
    let check = |written: usize| -> Result<(), ExportError> {
        if options.cancel.is_cancelled() {
            log::info!("export cancelled after {} of {} pages", written, total_pages);
            return Err(ExportError::Cancelled {
                pages_written: written,
                total_pages,
            });
        }
        if options.deadline.map_or(false, |d| Instant::now() >= d) {
            log::warn!("export deadline passed after {} of {} pages", written, total_pages);
            return Err(ExportError::TimedOut);
        }
        Ok(())
    };

    check(0)?;
    let images = ImageCache::for_frames(frames);
    let output = PdfWriter::new().write_checked(frames, &options.metadata, &images, check)?;

    let fallbacks = collect_fallbacks(frames, &output.placeholders, &images);
    if !fallbacks.is_empty() {
        log::warn!("{} photo(s) exported as placeholders", fallbacks.len());
    }
    log::debug!("exported {} pages, {} bytes", total_pages, output.bytes.len());

    Ok(ExportedDocument {
        bytes: output.bytes,
        summary: output.summary,
        fallbacks,
    })
}

fn collect_fallbacks(
    frames: &[Frame],
    placeholders: &[String],
    images: &ImageCache,
) -> Vec<ImageFallback> {
    let mut fallbacks = Vec::new();
    for frame in frames {
        for element in &frame.elements {
            let ElementContent::Photo { src, .. } = &element.content else {
                continue;
            };
            if !placeholders.contains(&element.id) {
                continue;
            }
            fallbacks.push(ImageFallback {
                element_id: element.id.clone(),
                page_number: frame.page_number,
                reason: images
                    .error(src)
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "image not loaded".to_string()),
            });
        }
    }
    fallbacks
}
