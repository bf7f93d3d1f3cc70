//! Pager: ordered pages sharing one global address space
//!
//! Every page knows how many elements precede it (`elements_before`).
//! Those offsets and the cached total count are updated under the same
//! lock as the mutation they reflect, and change events are emitted in
//! global coordinates before the lock is released.

use super::element::{Element, ElementId};
use super::events::{ChangeEvent, ChangeListener};
use crate::source::{ElementTag, Item, Source, SourceId};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::debug;

/// Errors from page mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageError {
    #[error("position {position} out of bounds for page {page} with {len} elements")]
    OutOfBounds {
        page: usize,
        position: usize,
        len: usize,
    },

    #[error("element {element} not found on page {page}")]
    ElementNotFound { page: usize, element: ElementId },

    #[error("page {page} was cleared since this handle was opened (generation {handle}, now {current})")]
    StaleGeneration {
        page: usize,
        handle: u64,
        current: u64,
    },

    #[error("source {source_id} placed {placed} of {total} items on page {page}")]
    OrderingUnderflow {
        page: usize,
        source_id: SourceId,
        placed: usize,
        total: usize,
    },
}

/// Result type for page operations
pub type PageResult<T> = Result<T, PageError>;

struct PageSlot {
    elements_before: usize,
    /// Bumped every time the pager clears this page.
    generation: u64,
    elements: Vec<Element>,
}

impl PageSlot {
    fn new(elements_before: usize) -> Self {
        Self {
            elements_before,
            generation: 0,
            elements: Vec::new(),
        }
    }
}

pub(super) struct PagerState {
    slots: Vec<PageSlot>,
    current: Option<usize>,
    /// `None` means invalid; recomputed lazily.
    count_cache: Option<usize>,
    listeners: Vec<Arc<dyn ChangeListener>>,
}

impl PagerState {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            current: None,
            count_cache: Some(0),
            listeners: Vec::new(),
        }
    }

    fn element_count(&mut self) -> usize {
        if let Some(count) = self.count_cache {
            return count;
        }
        let count = self.slots.iter().map(|slot| slot.elements.len()).sum();
        self.count_cache = Some(count);
        count
    }

    /// Propagate a size change of page `number` to the count cache and to
    /// the offsets of every later page.
    fn apply_delta(&mut self, number: usize, delta: isize) {
        match self.count_cache {
            Some(count) => self.count_cache = Some(count.saturating_add_signed(delta)),
            None => {
                self.element_count();
            }
        }
        for slot in self.slots.iter_mut().skip(number + 1) {
            slot.elements_before = slot.elements_before.saturating_add_signed(delta);
        }
    }

    fn notify(&mut self, number: usize, event: ChangeEvent) {
        let delta = event.delta();
        if delta != 0 {
            self.apply_delta(number, delta);
        }
        for listener in &self.listeners {
            listener.on_change(event);
        }
    }

    pub(super) fn is_stale(&self, page: &Page) -> bool {
        self.slots[page.number].generation != page.generation
    }

    fn check(&self, page: &Page) -> PageResult<()> {
        let current = self.slots[page.number].generation;
        if current != page.generation {
            return Err(PageError::StaleGeneration {
                page: page.number,
                handle: page.generation,
                current,
            });
        }
        Ok(())
    }

    pub(super) fn len(&self, number: usize) -> usize {
        self.slots[number].elements.len()
    }

    fn bounds(&self, number: usize, position: usize, limit: usize) -> PageResult<()> {
        let len = self.len(number);
        if position > limit {
            return Err(PageError::OutOfBounds {
                page: number,
                position,
                len,
            });
        }
        Ok(())
    }

    pub(super) fn position_of(&self, number: usize, element: ElementId) -> Option<usize> {
        self.slots[number]
            .elements
            .iter()
            .position(|candidate| candidate.id() == element)
    }

    /// Insert `elements` at a local position and emit one event.
    /// Returns the number of inserted elements.
    pub(super) fn insert_at(&mut self, number: usize, position: usize, elements: Vec<Element>) -> usize {
        let count = elements.len();
        if count == 0 {
            return 0;
        }
        let slot = &mut self.slots[number];
        slot.elements.splice(position..position, elements);
        let start = slot.elements_before + position;
        self.notify(number, ChangeEvent::inserted(start, count));
        count
    }

    fn remove_at(&mut self, number: usize, position: usize, count: usize) -> Vec<Element> {
        let slot = &mut self.slots[number];
        let removed: Vec<Element> = slot.elements.drain(position..position + count).collect();
        let start = slot.elements_before + position;
        if !removed.is_empty() {
            self.notify(number, ChangeEvent::removed(start, removed.len()));
        }
        removed
    }

    fn replace_at(&mut self, number: usize, position: usize, elements: Vec<Element>) {
        let count = elements.len();
        if count == 0 {
            return;
        }
        let slot = &mut self.slots[number];
        for (offset, element) in elements.into_iter().enumerate() {
            slot.elements[position + offset] = element;
        }
        let start = slot.elements_before + position;
        self.notify(number, ChangeEvent::changed(start, count));
    }

    /// Remove every element of `source_id`, one event per element.
    pub(super) fn remove_source(&mut self, number: usize, source_id: SourceId) -> usize {
        let mut removed = 0;
        let mut position = 0;
        while position < self.len(number) {
            if self.slots[number].elements[position].source_id() == source_id {
                self.remove_at(number, position, 1);
                removed += 1;
            } else {
                position += 1;
            }
        }
        removed
    }

    fn clear_slot(&mut self, number: usize) {
        let len = self.len(number);
        self.remove_at(number, 0, len);
        self.slots[number].generation += 1;
    }
}

pub(crate) struct PagerShared {
    state: Mutex<PagerState>,
    sources: Arc<[Arc<dyn Source>]>,
}

impl PagerShared {
    fn lock(&self) -> MutexGuard<'_, PagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owns the pages of an adapter.
///
/// Pages are appended lazily when opened and never removed, only cleared
/// in place, so global positions of earlier pages stay stable.
#[derive(Clone)]
pub struct Pager {
    shared: Arc<PagerShared>,
}

impl Pager {
    /// Create an empty pager. `sources` resolves element owners for
    /// [`Page::source_for`].
    pub fn new(sources: Arc<[Arc<dyn Source>]>) -> Self {
        Self {
            shared: Arc::new(PagerShared {
                state: Mutex::new(PagerState::new()),
                sources,
            }),
        }
    }

    fn handle(&self, number: usize, generation: u64) -> Page {
        Page {
            number,
            generation,
            shared: Arc::clone(&self.shared),
        }
    }

    /// Open page `number`, creating it (and any missing page before it)
    /// if needed. With `clear`, an existing page is emptied and its
    /// generation bumped so handles opened earlier become stale.
    ///
    /// The opened page becomes the current page.
    pub fn open_page(&self, number: usize, clear: bool) -> Page {
        let mut state = self.shared.lock();
        if number >= state.slots.len() {
            while state.slots.len() <= number {
                let before = state.element_count();
                state.slots.push(PageSlot::new(before));
            }
        } else if clear {
            state.clear_slot(number);
        }
        state.current = Some(number);
        let generation = state.slots[number].generation;
        debug!(page = number, clear, generation, "opened page");
        self.handle(number, generation)
    }

    /// Handle to an already opened page.
    pub fn page(&self, number: usize) -> Option<Page> {
        let state = self.shared.lock();
        let generation = state.slots.get(number)?.generation;
        Some(self.handle(number, generation))
    }

    /// The last page that was opened.
    pub fn current_page(&self) -> Option<Page> {
        let state = self.shared.lock();
        let number = state.current?;
        Some(self.handle(number, state.slots[number].generation))
    }

    pub fn page_count(&self) -> usize {
        self.shared.lock().slots.len()
    }

    /// Total number of elements across all pages.
    pub fn element_count(&self) -> usize {
        self.shared.lock().element_count()
    }

    /// The page containing a global position and the element there.
    pub fn locate(&self, position: usize) -> Option<(Page, Element)> {
        let state = self.shared.lock();
        let number = state
            .slots
            .partition_point(|slot| slot.elements_before + slot.elements.len() <= position);
        let slot = state.slots.get(number)?;
        let element = slot
            .elements
            .get(position.checked_sub(slot.elements_before)?)?
            .clone();
        Some((self.handle(number, slot.generation), element))
    }

    pub fn element_at(&self, position: usize) -> Option<Element> {
        self.locate(position).map(|(_, element)| element)
    }

    pub fn page_for_position(&self, position: usize) -> Option<Page> {
        self.locate(position).map(|(page, _)| page)
    }

    /// Empty page `number` and invalidate its open handles.
    pub fn clear_page(&self, number: usize) {
        let mut state = self.shared.lock();
        if number < state.slots.len() {
            state.clear_slot(number);
        }
    }

    /// Clear pages in `from..to`.
    pub fn clear_pages(&self, from: usize, to: usize) {
        let mut state = self.shared.lock();
        let to = to.min(state.slots.len());
        for number in from..to {
            state.clear_slot(number);
        }
    }

    /// Clear every page.
    pub fn clear(&self) {
        let count = self.page_count();
        self.clear_pages(0, count);
    }

    /// Register a listener for every future change event.
    pub fn subscribe(&self, listener: Arc<dyn ChangeListener>) {
        self.shared.lock().listeners.push(listener);
    }

    /// Reopen `page_count` pages, all cleared, clear any page past them
    /// and restore the current page pointer.
    pub(crate) fn restore_layout(&self, page_count: usize, current: Option<usize>) -> Vec<Page> {
        let pages: Vec<Page> = (0..page_count)
            .map(|number| self.open_page(number, true))
            .collect();
        self.clear_pages(page_count, self.page_count());
        if let Some(current) = current.filter(|&number| number < page_count) {
            self.shared.lock().current = Some(current);
        }
        pages
    }
}

impl fmt::Debug for Pager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("Pager")
            .field("pages", &state.slots.len())
            .field("current", &state.current)
            .finish()
    }
}

/// Handle to one page of a [`Pager`].
///
/// Handles are cheap to clone. A handle remembers the generation of the
/// page when it was opened; once the pager clears that page, mutations
/// through the old handle fail with [`PageError::StaleGeneration`].
/// Reads always see the page's current contents.
#[derive(Clone)]
pub struct Page {
    number: usize,
    generation: u64,
    shared: Arc<PagerShared>,
}

impl Page {
    pub fn number(&self) -> usize {
        self.number
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(super) fn lock_state(&self) -> MutexGuard<'_, PagerState> {
        self.shared.lock()
    }

    /// True if this is the last page that was opened.
    pub fn is_current(&self) -> bool {
        self.shared.lock().current == Some(self.number)
    }

    /// True if the page was cleared since this handle was opened.
    pub fn is_stale(&self) -> bool {
        self.shared.lock().is_stale(self)
    }

    pub fn len(&self) -> usize {
        self.shared.lock().len(self.number)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of elements in all earlier pages.
    pub fn elements_before(&self) -> usize {
        self.shared.lock().slots[self.number].elements_before
    }

    pub fn elements(&self) -> Vec<Element> {
        self.shared.lock().slots[self.number].elements.clone()
    }

    pub fn element(&self, position: usize) -> Option<Element> {
        self.shared.lock().slots[self.number]
            .elements
            .get(position)
            .cloned()
    }

    /// Elements of one source, in page order.
    pub fn elements_of(&self, source_id: SourceId) -> Vec<Element> {
        self.filtered(|element| element.source_id() == source_id)
    }

    /// Elements of any of `source_ids`, in page order.
    pub fn elements_by_sources(&self, source_ids: &BTreeSet<SourceId>) -> Vec<Element> {
        self.filtered(|element| source_ids.contains(&element.source_id()))
    }

    /// Item data of one source, in page order.
    pub fn data_by_source(&self, source_id: SourceId) -> Vec<Item> {
        self.elements_of(source_id)
            .into_iter()
            .map(|element| element.data().clone())
            .collect()
    }

    fn filtered(&self, keep: impl Fn(&Element) -> bool) -> Vec<Element> {
        self.shared.lock().slots[self.number]
            .elements
            .iter()
            .filter(|element| keep(element))
            .cloned()
            .collect()
    }

    /// The source that created `element`.
    pub fn source_for(&self, element: &Element) -> Option<Arc<dyn Source>> {
        self.shared.sources.get(element.source_id().index()).cloned()
    }

    pub fn insert(&self, position: usize, element: Element) -> PageResult<()> {
        self.insert_range(position, vec![element])
    }

    /// Insert elements starting at a local position, as one ranged event.
    pub fn insert_range(&self, position: usize, elements: Vec<Element>) -> PageResult<()> {
        let mut state = self.shared.lock();
        state.check(self)?;
        let len = state.len(self.number);
        state.bounds(self.number, position, len)?;
        state.insert_at(self.number, position, elements);
        Ok(())
    }

    pub fn remove(&self, position: usize) -> PageResult<Element> {
        let mut state = self.shared.lock();
        state.check(self)?;
        let len = state.len(self.number);
        if position >= len {
            return Err(PageError::OutOfBounds {
                page: self.number,
                position,
                len,
            });
        }
        state
            .remove_at(self.number, position, 1)
            .pop()
            .ok_or(PageError::OutOfBounds {
                page: self.number,
                position,
                len,
            })
    }

    /// Remove a specific element, wherever it currently is.
    pub fn remove_element(&self, element: &Element) -> PageResult<()> {
        let mut state = self.shared.lock();
        state.check(self)?;
        let position = state
            .position_of(self.number, element.id())
            .ok_or(PageError::ElementNotFound {
                page: self.number,
                element: element.id(),
            })?;
        state.remove_at(self.number, position, 1);
        Ok(())
    }

    /// Remove `count` elements starting at a local position, as one
    /// ranged event.
    pub fn remove_range(&self, position: usize, count: usize) -> PageResult<Vec<Element>> {
        let mut state = self.shared.lock();
        state.check(self)?;
        let len = state.len(self.number);
        let end = position.checked_add(count).ok_or(PageError::OutOfBounds {
            page: self.number,
            position,
            len,
        })?;
        state.bounds(self.number, end, len)?;
        Ok(state.remove_at(self.number, position, count))
    }

    /// Swap `old` for `new` in place.
    pub fn replace(&self, old: &Element, new: Element) -> PageResult<()> {
        let mut state = self.shared.lock();
        state.check(self)?;
        let position = state
            .position_of(self.number, old.id())
            .ok_or(PageError::ElementNotFound {
                page: self.number,
                element: old.id(),
            })?;
        state.replace_at(self.number, position, vec![new]);
        Ok(())
    }

    /// Overwrite the elements in `position..position + elements.len()`.
    pub fn replace_range(&self, position: usize, elements: Vec<Element>) -> PageResult<()> {
        let mut state = self.shared.lock();
        state.check(self)?;
        let len = state.len(self.number);
        let end = position
            .checked_add(elements.len())
            .ok_or(PageError::OutOfBounds {
                page: self.number,
                position,
                len,
            })?;
        state.bounds(self.number, end, len)?;
        state.replace_at(self.number, position, elements);
        Ok(())
    }

    /// Remove every element of this page as one ranged event.
    ///
    /// Unlike [`Pager::clear_page`], this does not invalidate handles.
    pub fn clear(&self) -> PageResult<usize> {
        let mut state = self.shared.lock();
        state.check(self)?;
        let len = state.len(self.number);
        state.remove_at(self.number, 0, len);
        Ok(len)
    }

    /// Recompute every element's tag and emit one change event over the
    /// whole page. Count, order and identities are unchanged.
    pub(crate) fn reclassify(&self, classify: impl Fn(&Element) -> ElementTag) -> usize {
        let mut state = self.shared.lock();
        let retagged: Vec<Element> = state.slots[self.number]
            .elements
            .iter()
            .map(|element| element.retagged(classify(element)))
            .collect();
        let count = retagged.len();
        state.replace_at(self.number, 0, retagged);
        count
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("number", &self.number)
            .field("generation", &self.generation)
            .finish()
    }
}
