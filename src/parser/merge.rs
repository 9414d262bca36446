//! Combine documentation blocks into one page per target entity.
//!
//! The same model may be documented incrementally across several header
//! fragments; those fragments are merged rather than rejected.

use crate::model::*;
use std::collections::HashMap;

/// Merge blocks into pages, grouped by entity name.
///
/// Blocks must arrive in scan order (files lexically, blocks in file order).
/// Bodies are concatenated in that order, separated by a blank line. For
/// fields, a later duplicate key overrides the earlier value but keeps the
/// earlier position. Pages come out ordered by first appearance.
pub fn merge(blocks: Vec<DocBlock>) -> Vec<DocumentPage> {
    let mut page_map: HashMap<String, DocumentPage> = HashMap::new();
    let mut page_order: Vec<String> = Vec::new();

    for block in blocks {
        if let Some(existing) = page_map.get_mut(&block.entity) {
            merge_block(existing, block);
        } else {
            page_order.push(block.entity.clone());
            let mut page = DocumentPage {
                entity: block.entity.clone(),
                ..Default::default()
            };
            merge_block(&mut page, block);
            page_map.insert(page.entity.clone(), page);
        }
    }

    // Preserve insertion order
    page_order
        .into_iter()
        .filter_map(|name| page_map.remove(&name))
        .collect()
}

fn merge_block(page: &mut DocumentPage, block: DocBlock) {
    for (key, value) in block.fields {
        match page.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => page.fields.push((key, value)),
        }
    }

    if !block.body.is_empty() {
        if !page.body.is_empty() {
            page.body.push_str("\n\n");
        }
        page.body.push_str(&block.body);
    }

    if !page.sources.contains(&block.source) {
        page.sources.push(block.source);
    }
}
