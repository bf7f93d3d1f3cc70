//! Element factory: wraps items into elements tagged by their source

use super::element_adapter::{AdapterError, AdapterResult};
use crate::page::Element;
use crate::source::{Item, Source, SourceId};
use std::sync::Arc;

/// Builds elements for the sources of one adapter.
///
/// The tag of every element is its source's classification of the data,
/// computed once at creation.
#[derive(Clone)]
pub struct ElementFactory {
    sources: Arc<[Arc<dyn Source>]>,
}

impl ElementFactory {
    pub fn new(sources: Arc<[Arc<dyn Source>]>) -> Self {
        Self { sources }
    }

    fn source(&self, source_id: SourceId) -> AdapterResult<&Arc<dyn Source>> {
        self.sources
            .get(source_id.index())
            .ok_or(AdapterError::UnknownSource(source_id))
    }

    /// Wrap one item of `source_id`.
    pub fn create(&self, source_id: SourceId, data: Item) -> AdapterResult<Element> {
        let source = self.source(source_id)?;
        Ok(Element::new(source_id, source.classify(&data), data))
    }

    /// Wrap a source's items, keeping their order.
    pub fn create_all(&self, source_id: SourceId, items: Vec<Item>) -> AdapterResult<Vec<Element>> {
        let source = self.source(source_id)?;
        Ok(items
            .into_iter()
            .map(|data| Element::new(source_id, source.classify(&data), data))
            .collect())
    }
}
