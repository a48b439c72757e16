//! Page-merge post-processing.
//!
//! Adapters produce an initial page segmentation driven by word-count
//! thresholds and structural boundaries. Structure-heavy sources (front
//! matter, dedication pages, image-only plates) leave a trail of tiny pages;
//! this pass merges consecutive undersized pages while never moving a
//! chapter start off a page boundary.

use crate::document::Document;

/// Replace a document's page segmentation and restamp every word's page
/// index. `starts` must be strictly increasing and begin at 0.
pub(crate) fn set_page_starts(doc: &mut Document, starts: Vec<u32>) {
    debug_assert!(starts.first().copied().unwrap_or(0) == 0);
    debug_assert!(starts.windows(2).all(|w| w[0] < w[1]));

    let mut page = 0usize;
    for (i, word) in doc.words.iter_mut().enumerate() {
        while page + 1 < starts.len() && starts[page + 1] as usize <= i {
            page += 1;
        }
        word.page = page as u32;
    }
    doc.page_starts = starts;
}

/// Merge pages holding fewer than `min_words` readable words into their
/// successors.
///
/// Boundaries are dropped by accumulating consecutive pages' non-placeholder
/// word counts until the threshold is reached. A boundary is always kept when
/// the following page starts a chapter, and a page consisting solely of image
/// placeholders is never merged with what follows it. No-op when every page
/// already meets the threshold. `chapter_starts` must be sorted ascending.
pub fn merge_short_pages(doc: &mut Document, chapter_starts: &[u32], min_words: usize) {
    if doc.page_starts.len() <= 1 {
        return;
    }

    let total = doc.words.len() as u32;
    let mut new_starts: Vec<u32> = vec![0];
    let mut readable_in_group = 0usize;

    for k in 0..doc.page_starts.len() {
        let start = doc.page_starts[k] as usize;
        let end = doc
            .page_starts
            .get(k + 1)
            .copied()
            .unwrap_or(total) as usize;

        let readable = doc.words[start..end]
            .iter()
            .filter(|w| !w.is_image_placeholder())
            .count();
        let images_only = readable == 0 && end > start;
        readable_in_group += readable;

        let Some(&next_start) = doc.page_starts.get(k + 1) else {
            break;
        };

        let chapter_boundary = chapter_starts.binary_search(&next_start).is_ok();
        if readable_in_group >= min_words || chapter_boundary || images_only {
            new_starts.push(next_start);
            readable_in_group = 0;
        }
    }

    if new_starts.len() == doc.page_starts.len() {
        return;
    }

    log::debug!(
        "page merge: {} pages -> {}",
        doc.page_starts.len(),
        new_starts.len()
    );
    set_page_starts(doc, new_starts);
}
