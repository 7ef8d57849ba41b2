//! Merging partial chunk analyses into one coherent summary.
//!
//! Successful chunks are re-sorted by index (completion order is not
//! meaningful under concurrent OCR) and concatenated under page-range
//! headers. A synthetic framing block is prefixed so the extraction
//! prompt sees identical structure whether or not the document was split,
//! and the optional header/footer scan is appended as its own delimited
//! section.

use crate::models::{ChunkAnalysis, MergedSummary, RegionScan};

/// Document-level facts for the synthetic framing block.
#[derive(Debug)]
pub struct MergeMeta<'a> {
    pub filename: &'a str,
    pub ship_name: Option<&'a str>,
    pub total_pages: u32,
    pub chunk_count: usize,
}

/// Delimiter for the targeted first-page scan section. The extraction
/// prompt names this section when telling the model where to look for
/// form codes and issuing authorities.
pub const REGION_SECTION_HEADER: &str = "=== Header/Footer (page 1) ===";

/// Merge chunk analyses into a single summary.
///
/// Failed chunks are excluded from the text but their indices were
/// already reported by the orchestrator; this function assumes at least
/// one success (the orchestrator's invariant).
///
/// Candidate selection is first-non-empty by chunk order, so merging is
/// associative: `merge([A, B, C])` selects the same candidates as merging
/// `[A, B]` and then appending `C`.
pub fn merge(analyses: &[ChunkAnalysis], meta: &MergeMeta) -> MergedSummary {
    let mut ordered: Vec<&ChunkAnalysis> = analyses.iter().filter(|a| a.success).collect();
    ordered.sort_by_key(|a| a.chunk_index);

    let mut summary = MergedSummary::default();

    summary.formatted_text.push_str("=== Document ===\n");
    summary
        .formatted_text
        .push_str(&format!("file: {}\n", meta.filename));
    summary
        .formatted_text
        .push_str(&format!("ship: {}\n", meta.ship_name.unwrap_or("unknown")));
    summary
        .formatted_text
        .push_str(&format!("pages: {}\n", meta.total_pages));
    summary
        .formatted_text
        .push_str(&format!("chunks: {}\n", meta.chunk_count));

    for analysis in &ordered {
        summary
            .formatted_text
            .push_str(&format!("\n=== Pages {} ===\n", analysis.pages));
        summary.formatted_text.push_str(analysis.raw_text.trim_end());
        summary.formatted_text.push('\n');

        if !summary.raw_text.is_empty() {
            summary.raw_text.push('\n');
        }
        summary.raw_text.push_str(&analysis.raw_text);

        for entity in &analysis.entities {
            let value = entity.mention_text.trim();
            if value.is_empty() {
                continue;
            }
            summary
                .field_candidates
                .entry(entity.entity_type.to_lowercase())
                .or_default()
                .push(value.to_string());
        }
    }

    summary
}

/// Append the header/footer scan as a delimited section. Empty scans are
/// dropped so the prompt never advertises a section with nothing in it.
pub fn append_region_scan(summary: &mut MergedSummary, scan: &RegionScan) {
    if scan.is_empty() {
        return;
    }
    summary.formatted_text.push('\n');
    summary.formatted_text.push_str(REGION_SECTION_HEADER);
    summary.formatted_text.push('\n');
    if !scan.header_text.trim().is_empty() {
        summary
            .formatted_text
            .push_str(&format!("[header] {}\n", scan.header_text.trim()));
    }
    if !scan.footer_text.trim().is_empty() {
        summary
            .formatted_text
            .push_str(&format!("[footer] {}\n", scan.footer_text.trim()));
    }
}
