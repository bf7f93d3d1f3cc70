//! Source trait: the contract data sources implement
//!
//! A source supplies the items for a page and decides where they go
//! relative to the items of the sources it depends on. It holds no item
//! data itself; items are pushed into pages by the adapter.

use super::types::{ElementTag, FindError, FindResult, Item};
use crate::page::{Element, Page};
use crate::state::ItemCodec;
use async_trait::async_trait;
use std::sync::Arc;

/// A policy object supplying items for a page and governing their order.
///
/// # Find protocol
///
/// For every page load, in this order:
///
/// 1. [`on_prepare_find`](Source::on_prepare_find) receives the elements
///    already placed by this source's dependencies.
/// 2. [`find`](Source::find) produces the raw items.
/// 3. [`on_after_find`](Source::on_after_find) may rewrite the result, then
///    every dependent source may rewrite it again through
///    [`on_dependency_after_find`](Source::on_dependency_after_find).
/// 4. If the final result is an error,
///    [`on_find_error`](Source::on_find_error) may substitute items.
///
/// # Ordering protocol
///
/// A source without dependencies has its items appended to the page tail.
/// A source with dependencies places its items relative to dependency
/// elements through [`order_before`](Source::order_before) and
/// [`order_after`](Source::order_after). Positions passed to those
/// callbacks refer to a virtual page made only of this source's items
/// and its dependencies' items, not to the absolute page index.
///
/// # Example
///
/// ```ignore
/// struct Names;
///
/// #[async_trait]
/// impl Source for Names {
///     fn name(&self) -> &str { "names" }
///
///     async fn find(&self, _page: &Page) -> FindResult {
///         Ok(vec![Item::from("ada"), Item::from("grace")])
///     }
/// }
/// ```
#[async_trait]
pub trait Source: Send + Sync {
    /// Name of this source, used for dependency declarations and state keys.
    fn name(&self) -> &str;

    /// True if this source must run after `other` and order its items
    /// relative to `other`'s items.
    fn depends_on(&self, _other: &dyn Source) -> bool {
        false
    }

    /// Classification tag for one of this source's items.
    fn classify(&self, _item: &Item) -> ElementTag {
        ElementTag::DEFAULT
    }

    /// Called right before [`find`](Source::find) with the page elements
    /// that belong to this source's direct dependencies.
    fn on_prepare_find(&self, _page: &Page, _dependency_elements: &[Element]) {}

    /// Fetch the items for a page.
    async fn find(&self, page: &Page) -> FindResult;

    /// Rewrite this source's own result after `find` completes.
    async fn on_after_find(&self, _page: &Page, result: FindResult) -> FindResult {
        result
    }

    /// Rewrite the result of a dependency after its own `on_after_find`.
    async fn on_dependency_after_find(
        &self,
        _page: &Page,
        _dependency: &dyn Source,
        result: FindResult,
    ) -> FindResult {
        result
    }

    /// Offer replacement items after a failed find chain.
    ///
    /// Returning `None` makes the failure fatal for this source's branch.
    async fn on_find_error(&self, _page: &Page, _error: &FindError) -> Option<Vec<Item>> {
        None
    }

    /// Called once before the ordering callbacks with the whole new item
    /// list and the already placed dependency elements.
    fn on_prepare_order(
        &self,
        _page: &Page,
        _elements: &[Element],
        _dependency_elements: &[Element],
    ) {
    }

    /// Number of not yet placed items to lay out right before
    /// `dependency_element`.
    fn order_before(&self, _page: &Page, _position: usize, _dependency_element: &Element) -> usize {
        0
    }

    /// Number of not yet placed items to lay out right after
    /// `dependency_element`.
    fn order_after(&self, _page: &Page, _position: usize, _dependency_element: &Element) -> usize {
        0
    }

    /// Called on every source once all sources have settled for a page.
    fn on_page_loaded(&self, _page: &Page, _page_elements: &[Element]) {}

    /// Codec used to save and restore this source's items.
    ///
    /// Sources without a codec restore as empty.
    fn codec(&self) -> Option<Arc<dyn ItemCodec>> {
        None
    }

    /// Called after this source's items were decoded during restoration.
    /// The list may be edited in place.
    fn on_page_state_restored(&self, _page: &Page, _items: &mut Vec<Item>) {}
}
