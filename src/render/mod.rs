//! Renderers: presentation of elements, selected by tag
//!
//! A registry holds renderers in registration order. The first renderer
//! claiming a tag wins; the choice is cached per tag.

use crate::page::{Element, Page};
use crate::source::ElementTag;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors from rendering
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("no renderer registered for tag {0}")]
    NoRenderer(ElementTag),
}

/// Result type for rendering
pub type RenderResult<T> = Result<T, RenderError>;

/// Presents elements of the tags it claims.
pub trait Renderer: Send + Sync {
    /// Tags this renderer handles.
    fn element_tags(&self) -> Vec<ElementTag> {
        vec![ElementTag::DEFAULT]
    }

    fn render(&self, page: &Page, element: &Element) -> String;
}

/// Tag → renderer dispatch.
pub struct RendererRegistry {
    renderers: Vec<Arc<dyn Renderer>>,
    by_tag: DashMap<ElementTag, usize>,
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self {
            renderers: Vec::new(),
            by_tag: DashMap::new(),
        }
    }

    /// Register a renderer. Clears the tag cache.
    pub fn register(&mut self, renderer: Arc<dyn Renderer>) {
        self.renderers.push(renderer);
        self.by_tag.clear();
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.register(renderer);
        self
    }

    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }

    /// The renderer for `tag`.
    pub fn resolve(&self, tag: ElementTag) -> RenderResult<Arc<dyn Renderer>> {
        if let Some(index) = self.by_tag.get(&tag) {
            return Ok(Arc::clone(&self.renderers[*index]));
        }
        let index = self
            .renderers
            .iter()
            .position(|renderer| renderer.element_tags().contains(&tag))
            .ok_or(RenderError::NoRenderer(tag))?;
        self.by_tag.insert(tag, index);
        Ok(Arc::clone(&self.renderers[index]))
    }

    /// Render `element` with the renderer for its tag.
    pub fn render(&self, page: &Page, element: &Element) -> RenderResult<String> {
        Ok(self.resolve(element.tag())?.render(page, element))
    }
}

impl Default for RendererRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Pager;
    use crate::source::{FindResult, Item, Source, SourceId};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Text;

    impl Renderer for Text {
        fn render(&self, _page: &Page, element: &Element) -> String {
            element.data_as::<String>().cloned().unwrap_or_default()
        }
    }

    #[derive(Default)]
    struct Header {
        asked: AtomicUsize,
    }

    impl Renderer for Header {
        fn element_tags(&self) -> Vec<ElementTag> {
            self.asked.fetch_add(1, Ordering::SeqCst);
            vec![ElementTag::HEADER]
        }

        fn render(&self, _page: &Page, element: &Element) -> String {
            format!("== {} ==", element.data_as::<String>().cloned().unwrap_or_default())
        }
    }

    struct Nothing;

    #[async_trait]
    impl Source for Nothing {
        fn name(&self) -> &str {
            "nothing"
        }

        async fn find(&self, _page: &Page) -> FindResult {
            Ok(Vec::new())
        }
    }

    fn page() -> Page {
        let sources: Vec<Arc<dyn Source>> = vec![Arc::new(Nothing)];
        Pager::new(sources.into()).open_page(0, false)
    }

    #[test]
    fn dispatches_by_tag() {
        let registry = RendererRegistry::new()
            .with_renderer(Arc::new(Text))
            .with_renderer(Arc::new(Header::default()));
        let page = page();
        let word = Element::new(SourceId(0), ElementTag::DEFAULT, Item::from("apple"));
        let header = Element::new(SourceId(0), ElementTag::HEADER, Item::from("A"));

        assert_eq!(registry.render(&page, &word).unwrap(), "apple");
        assert_eq!(registry.render(&page, &header).unwrap(), "== A ==");
    }

    #[test]
    fn resolution_is_cached() {
        let header = Arc::new(Header::default());
        let registry = RendererRegistry::new().with_renderer(header.clone());

        registry.resolve(ElementTag::HEADER).unwrap();
        registry.resolve(ElementTag::HEADER).unwrap();

        assert_eq!(header.asked.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unclaimed_tag_is_an_error() {
        let registry = RendererRegistry::new().with_renderer(Arc::new(Text));
        assert_eq!(
            registry.resolve(ElementTag::ERROR).err(),
            Some(RenderError::NoRenderer(ElementTag::ERROR))
        );
    }
}
