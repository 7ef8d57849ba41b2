//! Page-count inspection and bounded page-range splitting.
//!
//! Documents over the split threshold are cut into chunks of at most
//! `max_chunk_pages` pages, in order, greedily: pages 1-12, 13-24, and so
//! on. Chunk boundaries never fall mid-page, and the no-split path returns
//! the same types as the split path so everything downstream is agnostic
//! to whether splitting happened.

use crate::config::ChunkingConfig;
use crate::error::AnalysisError;
use crate::models::{Chunk, PageRange};

/// What the planner decided for one document.
#[derive(Debug)]
pub struct ChunkPlan {
    pub total_pages: u32,
    /// Normalized MIME type for the chunk payloads
    /// (`application/pdf`, `image/jpeg`, or `image/png`).
    pub mime_type: &'static str,
    pub chunks: Vec<Chunk>,
}

/// Inspect the document and plan its chunks.
///
/// Images always become a single chunk wrapping the whole file. PDFs are
/// parsed with lopdf; each chunk's payload is a standalone PDF produced by
/// deleting the out-of-range pages from a copy of the source. Anything
/// that is neither a parseable PDF nor a recognized image fails with
/// [`AnalysisError::InvalidDocumentFormat`].
pub fn plan(bytes: &[u8], mime_type: &str, config: &ChunkingConfig) -> Result<ChunkPlan, AnalysisError> {
    match sniff(bytes, mime_type)? {
        Sniffed::Image(mime) => Ok(ChunkPlan {
            total_pages: 1,
            mime_type: mime,
            chunks: vec![Chunk {
                index: 0,
                pages: PageRange::new(1, 1),
                bytes: bytes.to_vec(),
            }],
        }),
        Sniffed::Pdf => plan_pdf(bytes, config),
    }
}

enum Sniffed {
    Pdf,
    Image(&'static str),
}

/// Resolve the declared content type against the payload's magic bytes.
/// The declared type wins when consistent; bytes win when the caller sent
/// a bare or wrong label.
fn sniff(bytes: &[u8], mime_type: &str) -> Result<Sniffed, AnalysisError> {
    let declared = mime_type.trim().to_lowercase();
    let looks_pdf = bytes.starts_with(b"%PDF-");
    let looks_jpeg = bytes.starts_with(&[0xFF, 0xD8, 0xFF]);
    let looks_png = bytes.starts_with(&[0x89, b'P', b'N', b'G']);

    match declared.as_str() {
        "pdf" | "application/pdf" if looks_pdf => Ok(Sniffed::Pdf),
        "jpg" | "jpeg" | "image/jpeg" if looks_jpeg => Ok(Sniffed::Image("image/jpeg")),
        "png" | "image/png" if looks_png => Ok(Sniffed::Image("image/png")),
        _ if looks_pdf => Ok(Sniffed::Pdf),
        _ if looks_jpeg => Ok(Sniffed::Image("image/jpeg")),
        _ if looks_png => Ok(Sniffed::Image("image/png")),
        _ => Err(AnalysisError::InvalidDocumentFormat(format!(
            "content type '{}' is not a parseable PDF or supported image",
            mime_type
        ))),
    }
}

fn plan_pdf(bytes: &[u8], config: &ChunkingConfig) -> Result<ChunkPlan, AnalysisError> {
    let document = lopdf::Document::load_mem(bytes)
        .map_err(|e| AnalysisError::InvalidDocumentFormat(e.to_string()))?;
    let total_pages = document.get_pages().len() as u32;
    if total_pages == 0 {
        return Err(AnalysisError::InvalidDocumentFormat(
            "PDF contains no pages".to_string(),
        ));
    }

    if total_pages <= config.split_threshold {
        return Ok(ChunkPlan {
            total_pages,
            mime_type: "application/pdf",
            chunks: vec![Chunk {
                index: 0,
                pages: PageRange::new(1, total_pages),
                bytes: bytes.to_vec(),
            }],
        });
    }

    let mut chunks = Vec::new();
    for (index, pages) in split_ranges(total_pages, config.max_chunk_pages)
        .into_iter()
        .enumerate()
    {
        let payload = extract_page_range(&document, total_pages, pages)
            .map_err(|e| AnalysisError::InvalidDocumentFormat(e.to_string()))?;
        chunks.push(Chunk {
            index,
            pages,
            bytes: payload,
        });
    }

    Ok(ChunkPlan {
        total_pages,
        mime_type: "application/pdf",
        chunks,
    })
}

/// Greedy contiguous partition: full-size chunks in page order, remainder
/// in the last chunk.
fn split_ranges(total_pages: u32, max_chunk_pages: u32) -> Vec<PageRange> {
    let mut ranges = Vec::new();
    let mut start = 1u32;
    while start <= total_pages {
        let end = (start + max_chunk_pages - 1).min(total_pages);
        ranges.push(PageRange::new(start, end));
        start = end + 1;
    }
    ranges
}

/// Produce a standalone PDF containing only `pages` of the source.
fn extract_page_range(
    document: &lopdf::Document,
    total_pages: u32,
    pages: PageRange,
) -> anyhow::Result<Vec<u8>> {
    let mut slice = document.clone();
    let delete: Vec<u32> = (1..=total_pages)
        .filter(|p| *p < pages.start || *p > pages.end)
        .collect();
    if !delete.is_empty() {
        slice.delete_pages(&delete);
    }
    slice.prune_objects();
    let mut out = Vec::new();
    slice.save_to(&mut out)?;
    Ok(out)
}
