//! ElementAdapter: drives sources through page loads
//!
//! A page load runs the dependency groups one after another. Inside a
//! group every source runs as its own task:
//!
//! ```text
//! on_prepare_find → find → on_after_find → dependents' on_dependency_after_find
//!                 → (on failure) on_find_error → element factory → merge
//! ```
//!
//! A group is finished only when all of its branches have settled, so the
//! next group always sees its dependencies' final, adjusted elements.

use super::config::{AdapterConfig, FailurePolicy};
use super::factory::ElementFactory;
use crate::graph::{DependencyGraph, GraphError};
use crate::page::{
    ChangeListener, Element, ElementId, MergeContext, MergeOutcome, Page, PageError, Pager,
};
use crate::render::{RenderError, RendererRegistry};
use crate::source::{ElementTag, FindError, Item, Source, SourceId};
use crate::state::{source_key, AdapterState, SourceState, StateError};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Why one source's branch of a page load failed.
#[derive(Debug, Error)]
pub enum BranchError {
    #[error(transparent)]
    Find(#[from] FindError),

    #[error(transparent)]
    Merge(#[from] PageError),

    #[error("adapter error: {0}")]
    Internal(String),

    #[error("branch task panicked")]
    Panicked,
}

/// A failed branch, attributed to its source.
#[derive(Debug)]
pub struct BranchFailure {
    pub source_id: SourceId,
    pub source_name: String,
    pub error: BranchError,
}

impl fmt::Display for BranchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.source_name, self.source_id, self.error)
    }
}

/// Errors that can occur in adapter operations
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("page {page} failed to load ({} failed sources)", .failures.len())]
    LoadFailed {
        page: usize,
        failures: Vec<BranchFailure>,
    },

    #[error("unknown source: {0}")]
    UnknownSource(SourceId),

    #[error("page {0} was never opened")]
    PageNotOpened(usize),

    #[error("no element at position {0}")]
    NoElementAt(usize),

    #[error(transparent)]
    Page(#[from] PageError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Result type for adapter operations
pub type AdapterResult<T> = Result<T, AdapterError>;

/// How a page load treats existing content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Clear every page after the loaded one.
    pub clear_subsequent: bool,
    /// Clear right away instead of once the load has settled. Also clears
    /// the loaded page itself before its sources run.
    pub immediately: bool,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clearing_subsequent(mut self) -> Self {
        self.clear_subsequent = true;
        self
    }

    pub fn immediate(mut self) -> Self {
        self.immediately = true;
        self
    }
}

struct AdapterInner {
    sources: Arc<[Arc<dyn Source>]>,
    graph: DependencyGraph,
    pager: Pager,
    factory: ElementFactory,
    config: AdapterConfig,
    initialized: AtomicBool,
}

/// Aggregates the items of many sources into one paged element list.
///
/// Cheap to clone; clones share the same pages and sources.
#[derive(Clone)]
pub struct ElementAdapter {
    inner: Arc<AdapterInner>,
}

impl ElementAdapter {
    /// Register `sources` with the default configuration.
    ///
    /// Source ids are positions in `sources`. Fails if the sources'
    /// dependencies form a cycle.
    pub fn new(sources: Vec<Arc<dyn Source>>) -> AdapterResult<Self> {
        Self::with_config(sources, AdapterConfig::default())
    }

    pub fn with_config(sources: Vec<Arc<dyn Source>>, config: AdapterConfig) -> AdapterResult<Self> {
        let sources: Arc<[Arc<dyn Source>]> = sources.into();
        let graph = DependencyGraph::build(&sources)?;
        info!(
            sources = sources.len(),
            groups = graph.groups().len(),
            "element adapter ready"
        );
        Ok(Self {
            inner: Arc::new(AdapterInner {
                pager: Pager::new(Arc::clone(&sources)),
                factory: ElementFactory::new(Arc::clone(&sources)),
                sources,
                graph,
                config,
                initialized: AtomicBool::new(false),
            }),
        })
    }

    pub fn sources(&self) -> &[Arc<dyn Source>] {
        &self.inner.sources
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.inner.graph
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.inner.config
    }

    pub fn pager(&self) -> &Pager {
        &self.inner.pager
    }

    /// True once a page load or a restoration has happened.
    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::SeqCst)
    }

    pub fn page(&self, number: usize) -> Option<Page> {
        self.inner.pager.page(number)
    }

    pub fn current_page(&self) -> Option<Page> {
        self.inner.pager.current_page()
    }

    pub fn element_count(&self) -> usize {
        self.inner.pager.element_count()
    }

    pub fn element_at(&self, position: usize) -> Option<Element> {
        self.inner.pager.element_at(position)
    }

    /// Register a listener for every future change event.
    ///
    /// Listeners run while the pager lock is held. Calling back into the
    /// adapter or its pages from `on_change` (`element_count`,
    /// `element_at`, ...) deadlocks; forward the event instead, for
    /// example through an `UnboundedSender`.
    pub fn subscribe(&self, listener: Arc<dyn ChangeListener>) {
        self.inner.pager.subscribe(listener);
    }

    /// Wrap an item as an element of `source_id`, tagged by that source.
    pub fn create_element(&self, source_id: SourceId, data: Item) -> AdapterResult<Element> {
        self.inner.factory.create(source_id, data)
    }

    /// Render the element at a global position.
    pub fn render_at(&self, position: usize, renderers: &RendererRegistry) -> AdapterResult<String> {
        let (page, element) = self
            .inner
            .pager
            .locate(position)
            .ok_or(AdapterError::NoElementAt(position))?;
        Ok(renderers.render(&page, &element)?)
    }

    /// Load page 0; every later page is cleared once the load settles.
    pub async fn load(&self) -> AdapterResult<()> {
        self.load_page(0, LoadOptions::new().clearing_subsequent())
            .await
    }

    /// Load the page following `page`.
    pub async fn load_next_page(&self, page: &Page) -> AdapterResult<()> {
        self.load_page(page.number() + 1, LoadOptions::new()).await
    }

    /// Run every source for page `number` and merge their results.
    ///
    /// Existing elements of a source are replaced as its new elements
    /// arrive. On failure the configured [`FailurePolicy`] applies and
    /// [`AdapterError::LoadFailed`] lists every failed branch; page-loaded
    /// callbacks fire either way.
    pub async fn load_page(&self, number: usize, options: LoadOptions) -> AdapterResult<()> {
        let inner = &self.inner;
        let page = inner.pager.open_page(number, options.immediately);
        if options.immediately && options.clear_subsequent {
            inner
                .pager
                .clear_pages(number + 1, inner.pager.page_count());
        }
        info!(page = number, generation = page.generation(), "loading page");

        let mut failures = Vec::new();
        for (index, group) in inner.graph.groups().iter().enumerate() {
            debug!(page = number, group = index, sources = group.len(), "running group");
            failures.extend(self.run_group(&page, group).await);
            if !failures.is_empty() {
                warn!(
                    page = number,
                    group = index,
                    failed = failures.len(),
                    "group failed, skipping remaining groups"
                );
                break;
            }
        }

        if !failures.is_empty() && inner.config.failure_policy == FailurePolicy::VoidPage {
            if let Err(e) = page.clear() {
                debug!(page = number, error = %e, "could not void page");
            }
        }
        if options.clear_subsequent && !options.immediately && page.is_current() {
            inner
                .pager
                .clear_pages(number + 1, inner.pager.page_count());
        }

        inner.notify_page_loaded(&page);
        inner.initialized.store(true, Ordering::SeqCst);

        if failures.is_empty() {
            info!(page = number, elements = page.len(), "page loaded");
            Ok(())
        } else {
            Err(AdapterError::LoadFailed {
                page: number,
                failures,
            })
        }
    }

    /// Run every branch of `group` concurrently and wait for all of them.
    async fn run_group(&self, page: &Page, group: &[SourceId]) -> Vec<BranchFailure> {
        let mut branches = JoinSet::new();
        for &id in group {
            let inner = Arc::clone(&self.inner);
            let page = page.clone();
            branches.spawn(async move { (id, inner.run_branch(&page, id).await) });
        }

        let mut settled = BTreeSet::new();
        let mut failures = Vec::new();
        while let Some(joined) = branches.join_next().await {
            match joined {
                Ok((id, outcome)) => {
                    settled.insert(id);
                    if let Err(error) = outcome {
                        warn!(page = page.number(), source = %id, error = %error, "branch failed");
                        failures.push(self.inner.failure(id, error));
                    }
                }
                Err(e) => warn!(page = page.number(), error = %e, "branch task aborted"),
            }
        }
        // a panicked task never reports its id
        for &id in group {
            if !settled.contains(&id) {
                failures.push(self.inner.failure(id, BranchError::Panicked));
            }
        }
        failures.sort_by_key(|failure| failure.source_id);
        failures
    }

    /// Clear every page.
    pub fn clear(&self) {
        self.inner.pager.clear();
    }

    /// Re-tag the elements of every page without reloading.
    pub fn rebind(&self) {
        for number in 0..self.inner.pager.page_count() {
            // pages are never removed, so every number below the count exists
            let _ = self.rebind_page(number);
        }
    }

    /// Re-tag the elements of one page. Count, order and identity are
    /// unchanged; one change event covers the whole page.
    pub fn rebind_page(&self, number: usize) -> AdapterResult<usize> {
        let page = self
            .inner
            .pager
            .page(number)
            .ok_or(AdapterError::PageNotOpened(number))?;
        let tags: HashMap<ElementId, ElementTag> = page
            .elements()
            .iter()
            .map(|element| (element.id(), self.inner.classify(element)))
            .collect();
        let count = page.reclassify(|element| {
            tags.get(&element.id()).copied().unwrap_or(element.tag())
        });
        debug!(page = number, elements = count, "rebound page");
        Ok(count)
    }

    /// Snapshot the page layout and every source's items.
    ///
    /// Sources without a codec save nothing and restore empty.
    pub fn save_state(&self) -> AdapterResult<AdapterState> {
        let inner = &self.inner;
        let initialized = self.is_initialized();
        let mut state = AdapterState {
            initialized,
            ..Default::default()
        };
        if !initialized {
            return Ok(state);
        }

        state.page_count = inner.pager.page_count();
        state.current_page = inner.pager.current_page().map(|page| page.number());
        let pages: Vec<Page> = (0..state.page_count)
            .filter_map(|number| inner.pager.page(number))
            .collect();

        for (index, source) in inner.sources.iter().enumerate() {
            let id = SourceId(index);
            let mut source_state = SourceState::default();
            if let Some(codec) = source.codec() {
                for page in &pages {
                    let items = page.data_by_source(id);
                    source_state
                        .pages
                        .insert(page.number(), codec.save(page.number(), &items)?);
                }
            }
            state
                .sources
                .insert(source_key(source.name(), id), source_state);
        }
        debug!(pages = state.page_count, "saved adapter state");
        Ok(state)
    }

    /// Rebuild pages from a snapshot without running any find.
    ///
    /// Every source must have an entry in the snapshot and every saved
    /// blob must decode; both checks happen before any page is touched.
    /// Pages past the snapshot's page count are cleared. Sources are
    /// merged in dependency order, then page-loaded fires for the page.
    pub fn restore_state(&self, state: &AdapterState) -> AdapterResult<()> {
        let inner = &self.inner;
        if !state.initialized {
            debug!("snapshot was never initialized, nothing to restore");
            return Ok(());
        }

        let mut saved: Vec<(SourceId, &SourceState)> = Vec::with_capacity(inner.sources.len());
        for &id in inner.graph.order() {
            let key = source_key(inner.sources[id.index()].name(), id);
            let source_state = state
                .source(&key)
                .ok_or(StateError::MissingSourceState { key })?;
            saved.push((id, source_state));
        }

        // decoded[page][n] holds the items of the n-th source in graph order
        let mut decoded: Vec<Vec<(SourceId, Vec<Item>)>> = Vec::with_capacity(state.page_count);
        for number in 0..state.page_count {
            let mut page_items = Vec::with_capacity(saved.len());
            for &(id, source_state) in &saved {
                let items = match (
                    inner.sources[id.index()].codec(),
                    source_state.pages.get(&number),
                ) {
                    (Some(codec), Some(blob)) => codec.restore(number, blob)?,
                    _ => Vec::new(),
                };
                page_items.push((id, items));
            }
            decoded.push(page_items);
        }

        let pages = inner
            .pager
            .restore_layout(state.page_count, state.current_page);
        for (page, page_items) in pages.iter().zip(decoded) {
            for (id, mut items) in page_items {
                inner.sources[id.index()].on_page_state_restored(page, &mut items);
                let elements = inner.factory.create_all(id, items)?;
                inner.merge(page, id, elements)?;
            }
            inner.notify_page_loaded(page);
        }

        inner.initialized.store(true, Ordering::SeqCst);
        info!(
            pages = state.page_count,
            elements = self.element_count(),
            "restored adapter state"
        );
        Ok(())
    }
}

impl AdapterInner {
    async fn run_branch(&self, page: &Page, id: SourceId) -> Result<(), BranchError> {
        let source = &self.sources[id.index()];
        let dependency_elements = page.elements_by_sources(self.graph.dependencies(id));
        source.on_prepare_find(page, &dependency_elements);

        let found = source.find(page).await;
        let mut result = source.on_after_find(page, found).await;
        for &dependent in self.graph.reverse_dependencies(id) {
            result = self.sources[dependent.index()]
                .on_dependency_after_find(page, source.as_ref(), result)
                .await;
        }

        let items = match result {
            Ok(items) => items,
            Err(error) => match source.on_find_error(page, &error).await {
                Some(items) => {
                    debug!(page = page.number(), source = %id, error = %error, "substituted failed find");
                    items
                }
                None => return Err(BranchError::Find(error)),
            },
        };

        let elements = self
            .factory
            .create_all(id, items)
            .map_err(|e| BranchError::Internal(e.to_string()))?;
        self.merge(page, id, elements)?;
        Ok(())
    }

    fn merge(&self, page: &Page, id: SourceId, elements: Vec<Element>) -> Result<(), PageError> {
        let context = MergeContext {
            source: self.sources[id.index()].as_ref(),
            dependencies: self.graph.dependencies(id),
            underflow: self.config.underflow_policy,
        };
        match page.merge_for_source(id, elements, &context)? {
            MergeOutcome::Merged {
                removed,
                inserted,
                dropped,
            } => debug!(
                page = page.number(),
                source = %id,
                removed,
                inserted,
                dropped,
                "merged"
            ),
            MergeOutcome::Discarded => {
                debug!(page = page.number(), source = %id, "merge discarded")
            }
        }
        Ok(())
    }

    fn classify(&self, element: &Element) -> ElementTag {
        self.sources
            .get(element.source_id().index())
            .map(|source| source.classify(element.data()))
            .unwrap_or(element.tag())
    }

    fn notify_page_loaded(&self, page: &Page) {
        let elements = page.elements();
        for source in self.sources.iter() {
            source.on_page_loaded(page, &elements);
        }
    }

    fn failure(&self, id: SourceId, error: BranchError) -> BranchFailure {
        BranchFailure {
            source_id: id,
            source_name: self.sources[id.index()].name().to_string(),
            error,
        }
    }
}

impl fmt::Debug for ElementAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementAdapter")
            .field("sources", &self.inner.sources.len())
            .field("pager", &self.inner.pager)
            .field("config", &self.inner.config)
            .finish()
    }
}
