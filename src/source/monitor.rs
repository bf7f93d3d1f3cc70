//! SourceMonitor: observe another source without contributing items

use super::traits::Source;
use super::types::{FindResult, Item};
use crate::page::{Element, Page};
use async_trait::async_trait;

/// Hooks invoked by a [`SourceMonitor`].
pub trait MonitorCallback: Send + Sync {
    /// Sees (and may rewrite) the monitored source's adjusted result.
    fn on_after_find(&self, _page: &Page, _source: &dyn Source, result: FindResult) -> FindResult {
        result
    }

    /// Receives the monitored source's items once the page has loaded.
    fn on_page_loaded(&self, page: &Page, items: &[Item]);
}

/// A source with no items of its own that depends on the source named
/// `target` and reports its results to a callback.
pub struct SourceMonitor<C> {
    name: String,
    target: String,
    callback: C,
}

impl<C: MonitorCallback> SourceMonitor<C> {
    pub fn new(target: impl Into<String>, callback: C) -> Self {
        let target = target.into();
        Self {
            name: format!("monitor:{}", target),
            target,
            callback,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn callback(&self) -> &C {
        &self.callback
    }
}

#[async_trait]
impl<C: MonitorCallback> Source for SourceMonitor<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn depends_on(&self, other: &dyn Source) -> bool {
        other.name() == self.target
    }

    async fn find(&self, _page: &Page) -> FindResult {
        Ok(Vec::new())
    }

    async fn on_dependency_after_find(
        &self,
        page: &Page,
        dependency: &dyn Source,
        result: FindResult,
    ) -> FindResult {
        self.callback.on_after_find(page, dependency, result)
    }

    fn on_page_loaded(&self, page: &Page, page_elements: &[Element]) {
        let items: Vec<Item> = page_elements
            .iter()
            .filter(|element| {
                page.source_for(element)
                    .is_some_and(|source| self.depends_on(source.as_ref()))
            })
            .map(|element| element.data().clone())
            .collect();
        self.callback.on_page_loaded(page, &items);
    }
}
