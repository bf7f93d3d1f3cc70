//! Merging one source's new elements into a page
//!
//! Sources without dependencies append to the page tail. Sources with
//! dependencies place their elements around dependency elements: the
//! source is asked, dependency by dependency, how many of its remaining
//! items go right before and right after each one.
//!
//! The placement plan is computed before the pager lock is taken, so
//! source callbacks never run under it. The plan refers to dependency
//! elements by identity and is applied atomically; a dependency element
//! that left the page in between has its planned items dropped.

use super::element::{Element, ElementId};
use super::pager::{Page, PageError, PageResult};
use crate::source::{Source, SourceId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// What to do with items a source left unplaced during ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnderflowPolicy {
    /// Fail the merge without touching the page.
    #[default]
    Reject,
    /// Append unplaced items to the page tail.
    Append,
    /// Discard unplaced items.
    Drop,
}

/// Everything the merge needs to know about the source being merged.
pub struct MergeContext<'a> {
    pub source: &'a dyn Source,
    /// Direct dependencies of the source; empty means append.
    pub dependencies: &'a BTreeSet<SourceId>,
    pub underflow: UnderflowPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged {
        removed: usize,
        inserted: usize,
        dropped: usize,
    },
    /// The page was cleared since the handle was opened; nothing changed.
    Discarded,
}

struct Placement {
    dependency: ElementId,
    before: usize,
    after: usize,
}

/// Ask the source where its `total` items go.
///
/// The position handed to the ordering callbacks is the dependency's
/// index among dependency elements plus the items placed so far, which is
/// where the dependency sits in a page holding only this source's items
/// and its dependencies' items.
fn plan_placements(
    page: &Page,
    source: &dyn Source,
    dependency_elements: &[Element],
    total: usize,
) -> Vec<Placement> {
    let mut placements = Vec::new();
    let mut placed = 0;
    for (index, dependency) in dependency_elements.iter().enumerate() {
        if placed >= total {
            break;
        }
        let before = source
            .order_before(page, index + placed, dependency)
            .min(total - placed);
        placed += before;
        let after = source
            .order_after(page, index + placed, dependency)
            .min(total - placed);
        placed += after;
        if before + after > 0 {
            placements.push(Placement {
                dependency: dependency.id(),
                before,
                after,
            });
        }
    }
    placements
}

impl Page {
    /// Replace every element of `source_id` on this page with `elements`.
    ///
    /// Old elements are removed one event per element; new elements are
    /// inserted in ranged events. A stale handle discards the merge.
    pub fn merge_for_source(
        &self,
        source_id: SourceId,
        elements: Vec<Element>,
        context: &MergeContext<'_>,
    ) -> PageResult<MergeOutcome> {
        if context.dependencies.is_empty() {
            return Ok(self.append_for_source(source_id, elements));
        }

        let dependency_elements = self.elements_by_sources(context.dependencies);
        context
            .source
            .on_prepare_order(self, &elements, &dependency_elements);
        let total = elements.len();
        let placements = plan_placements(self, context.source, &dependency_elements, total);
        let planned: usize = placements.iter().map(|p| p.before + p.after).sum();

        if planned < total && context.underflow == UnderflowPolicy::Reject {
            warn!(
                page = self.number(),
                source = %source_id,
                planned,
                total,
                "source left items unplaced"
            );
            return Err(PageError::OrderingUnderflow {
                page: self.number(),
                source_id,
                placed: planned,
                total,
            });
        }

        let number = self.number();
        let mut state = self.lock_state();
        if state.is_stale(self) {
            debug!(page = number, source = %source_id, "discarding merge for stale page");
            return Ok(MergeOutcome::Discarded);
        }

        let removed = state.remove_source(number, source_id);
        let mut pending = elements.into_iter();
        let mut inserted = 0;
        let mut dropped = 0;

        for placement in placements {
            let before: Vec<Element> = pending.by_ref().take(placement.before).collect();
            let after: Vec<Element> = pending.by_ref().take(placement.after).collect();
            match state.position_of(number, placement.dependency) {
                Some(position) => {
                    let count_before = before.len();
                    inserted += state.insert_at(number, position, before);
                    inserted += state.insert_at(number, position + count_before + 1, after);
                }
                None => {
                    warn!(
                        page = number,
                        source = %source_id,
                        dependency = %placement.dependency,
                        "dependency element left the page before ordering"
                    );
                    dropped += before.len() + after.len();
                }
            }
        }

        let leftover: Vec<Element> = pending.collect();
        if !leftover.is_empty() {
            if context.underflow == UnderflowPolicy::Append {
                let tail = state.len(number);
                inserted += state.insert_at(number, tail, leftover);
            } else {
                warn!(
                    page = number,
                    source = %source_id,
                    count = leftover.len(),
                    "dropping unplaced items"
                );
                dropped += leftover.len();
            }
        }

        Ok(MergeOutcome::Merged {
            removed,
            inserted,
            dropped,
        })
    }

    fn append_for_source(&self, source_id: SourceId, elements: Vec<Element>) -> MergeOutcome {
        let number = self.number();
        let mut state = self.lock_state();
        if state.is_stale(self) {
            debug!(page = number, source = %source_id, "discarding merge for stale page");
            return MergeOutcome::Discarded;
        }
        let removed = state.remove_source(number, source_id);
        let tail = state.len(number);
        let inserted = state.insert_at(number, tail, elements);
        MergeOutcome::Merged {
            removed,
            inserted,
            dropped: 0,
        }
    }
}
