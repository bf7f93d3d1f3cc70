//! Placeholder items: pagination, empty and error markers
//!
//! [`WithPlaceholders`] wraps a source so that an empty result counts as a
//! failure and failures on the first page are replaced by a single marker
//! item the consumer can render.

use super::traits::Source;
use super::types::{ElementTag, FindError, FindResult, Item};
use crate::page::{Element, Page, PageResult};
use crate::state::{ItemCodec, StateError, StateResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Marker items with reserved tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placeholder {
    /// "More pages available"; appended by the source itself.
    Pagination,
    /// The first page came back empty.
    Empty,
    /// The first page failed.
    Error,
}

impl Placeholder {
    pub fn tag(self) -> ElementTag {
        match self {
            Self::Pagination => ElementTag::PAGINATION,
            Self::Empty => ElementTag::EMPTY,
            Self::Error => ElementTag::ERROR,
        }
    }

    pub fn item(self) -> Item {
        Item::new(self)
    }

    /// The placeholder held by `item`, if any.
    pub fn of(item: &Item) -> Option<Self> {
        item.downcast_ref::<Self>().copied()
    }
}

/// Append a pagination marker to a find result.
pub fn append_pagination(items: &mut Vec<Item>) {
    items.push(Placeholder::Pagination.item());
}

pub fn is_placeholder(item: &Item) -> bool {
    item.is::<Placeholder>()
}

/// True if the result is an empty failure or the empty marker alone.
pub fn is_empty_result(result: &FindResult) -> bool {
    match result {
        Err(error) => *error == FindError::Empty,
        Ok(items) => is_single(items, Placeholder::Empty),
    }
}

/// True if the result is a non-empty failure or the error marker alone.
pub fn is_error_result(result: &FindResult) -> bool {
    match result {
        Err(error) => *error != FindError::Empty,
        Ok(items) => is_single(items, Placeholder::Error),
    }
}

fn is_single(items: &[Item], placeholder: Placeholder) -> bool {
    matches!(items, [only] if Placeholder::of(only) == Some(placeholder))
}

/// Remove a lone empty or error marker from `page`.
///
/// Returns whether a marker was removed.
pub fn clear_placeholders(page: &Page) -> PageResult<bool> {
    let lone: Option<Element> = match page.elements().as_slice() {
        [only] => Some(only.clone()),
        _ => None,
    };
    match lone {
        Some(element)
            if matches!(
                Placeholder::of(element.data()),
                Some(Placeholder::Empty | Placeholder::Error)
            ) =>
        {
            page.remove_element(&element)?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Source decorator adding placeholder behavior to `S`.
pub struct WithPlaceholders<S> {
    inner: S,
}

impl<S: Source> WithPlaceholders<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: Source> Source for WithPlaceholders<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn depends_on(&self, other: &dyn Source) -> bool {
        self.inner.depends_on(other)
    }

    fn classify(&self, item: &Item) -> ElementTag {
        match Placeholder::of(item) {
            Some(placeholder) => placeholder.tag(),
            None => self.inner.classify(item),
        }
    }

    fn on_prepare_find(&self, page: &Page, dependency_elements: &[Element]) {
        self.inner.on_prepare_find(page, dependency_elements)
    }

    async fn find(&self, page: &Page) -> FindResult {
        self.inner.find(page).await
    }

    async fn on_after_find(&self, page: &Page, result: FindResult) -> FindResult {
        match self.inner.on_after_find(page, result).await {
            Ok(items) if items.is_empty() => Err(FindError::Empty),
            other => other,
        }
    }

    async fn on_dependency_after_find(
        &self,
        page: &Page,
        dependency: &dyn Source,
        result: FindResult,
    ) -> FindResult {
        self.inner
            .on_dependency_after_find(page, dependency, result)
            .await
    }

    async fn on_find_error(&self, page: &Page, error: &FindError) -> Option<Vec<Item>> {
        if let Some(items) = self.inner.on_find_error(page, error).await {
            return Some(items);
        }
        if page.number() != 0 {
            return None;
        }
        let placeholder = match error {
            FindError::Empty => Placeholder::Empty,
            _ => Placeholder::Error,
        };
        Some(vec![placeholder.item()])
    }

    fn on_prepare_order(&self, page: &Page, elements: &[Element], dependency_elements: &[Element]) {
        self.inner
            .on_prepare_order(page, elements, dependency_elements)
    }

    fn order_before(&self, page: &Page, position: usize, dependency_element: &Element) -> usize {
        self.inner.order_before(page, position, dependency_element)
    }

    fn order_after(&self, page: &Page, position: usize, dependency_element: &Element) -> usize {
        self.inner.order_after(page, position, dependency_element)
    }

    fn on_page_loaded(&self, page: &Page, page_elements: &[Element]) {
        self.inner.on_page_loaded(page, page_elements)
    }

    fn codec(&self) -> Option<Arc<dyn ItemCodec>> {
        self.inner
            .codec()
            .map(|inner| Arc::new(PlaceholderCodec { inner }) as Arc<dyn ItemCodec>)
    }

    fn on_page_state_restored(&self, page: &Page, items: &mut Vec<Item>) {
        self.inner.on_page_state_restored(page, items)
    }
}

#[derive(Deserialize)]
struct PlaceholderBlob {
    items: Value,
    #[serde(default)]
    placeholders: Vec<(usize, Placeholder)>,
}

/// Keeps markers out of the wrapped codec and puts them back on restore.
struct PlaceholderCodec {
    inner: Arc<dyn ItemCodec>,
}

impl ItemCodec for PlaceholderCodec {
    fn save(&self, page: usize, items: &[Item]) -> StateResult<Value> {
        let mut placeholders = Vec::new();
        let mut content = Vec::with_capacity(items.len());
        for (position, item) in items.iter().enumerate() {
            match Placeholder::of(item) {
                Some(placeholder) => placeholders.push((position, placeholder)),
                None => content.push(item.clone()),
            }
        }
        Ok(json!({
            "items": self.inner.save(page, &content)?,
            "placeholders": placeholders,
        }))
    }

    fn restore(&self, page: usize, blob: &Value) -> StateResult<Vec<Item>> {
        let blob: PlaceholderBlob = serde_json::from_value(blob.clone())?;
        let mut items = self.inner.restore(page, &blob.items)?;
        for (position, placeholder) in blob.placeholders {
            if position > items.len() {
                return Err(StateError::Codec(format!(
                    "{:?} marker at {} is past the {} restored items of page {}",
                    placeholder,
                    position,
                    items.len(),
                    page
                )));
            }
            items.insert(position, placeholder.item());
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Pager;
    use crate::state::JsonCodec;

    struct Words {
        words: Vec<&'static str>,
    }

    #[async_trait]
    impl Source for Words {
        fn name(&self) -> &str {
            "words"
        }

        async fn find(&self, _page: &Page) -> FindResult {
            Ok(self.words.iter().map(|w| Item::from(*w)).collect())
        }

        fn codec(&self) -> Option<Arc<dyn ItemCodec>> {
            Some(Arc::new(JsonCodec::<String>::new()))
        }
    }

    fn wrapped(words: &[&'static str]) -> WithPlaceholders<Words> {
        WithPlaceholders::new(Words {
            words: words.to_vec(),
        })
    }

    fn pager() -> Pager {
        let sources: Vec<Arc<dyn Source>> = vec![Arc::new(wrapped(&[]))];
        Pager::new(sources.into())
    }

    #[tokio::test]
    async fn empty_result_becomes_empty_failure() {
        let pager = pager();
        let page = pager.open_page(0, false);
        let source = wrapped(&[]);

        let found = source.find(&page).await;
        let adjusted = source.on_after_find(&page, found).await;

        assert!(matches!(adjusted, Err(FindError::Empty)));
        assert!(is_empty_result(&adjusted));
        assert!(!is_error_result(&adjusted));
    }

    #[tokio::test]
    async fn first_page_failures_are_substituted() {
        let pager = pager();
        let first = pager.open_page(0, false);
        let second = pager.open_page(1, false);
        let source = wrapped(&[]);

        let empty = source.on_find_error(&first, &FindError::Empty).await.unwrap();
        assert_eq!(Placeholder::of(&empty[0]), Some(Placeholder::Empty));
        assert_eq!(source.classify(&empty[0]), ElementTag::EMPTY);

        let failed = source
            .on_find_error(&first, &FindError::failed("offline"))
            .await
            .unwrap();
        assert!(is_error_result(&Ok(failed)));

        assert!(source.on_find_error(&second, &FindError::Empty).await.is_none());
    }

    #[test]
    fn codec_strips_and_reinserts_markers() {
        let source = wrapped(&[]);
        let codec = source.codec().unwrap();
        let mut items = vec![Item::from("a"), Item::from("b")];
        append_pagination(&mut items);

        let blob = codec.save(0, &items).unwrap();
        assert_eq!(blob["items"], json!(["a", "b"]));

        let restored = codec.restore(0, &blob).unwrap();
        assert_eq!(restored.len(), 3);
        assert_eq!(restored[1].downcast_ref::<String>().unwrap(), "b");
        assert_eq!(Placeholder::of(&restored[2]), Some(Placeholder::Pagination));
        assert_eq!(source.classify(&restored[2]), ElementTag::PAGINATION);
    }

    #[test]
    fn marker_past_the_items_is_a_codec_error() {
        let codec = wrapped(&[]).codec().unwrap();
        let blob = json!({ "items": ["a"], "placeholders": [[5, "pagination"]] });

        assert!(matches!(codec.restore(0, &blob), Err(StateError::Codec(_))));
    }

    #[test]
    fn clear_placeholders_removes_only_a_lone_marker() {
        let pager = pager();
        let page = pager.open_page(0, false);
        let marker = Element::new(
            crate::source::SourceId(0),
            ElementTag::EMPTY,
            Placeholder::Empty.item(),
        );
        page.insert(0, marker).unwrap();

        assert!(clear_placeholders(&page).unwrap());
        assert!(page.is_empty());
        assert!(!clear_placeholders(&page).unwrap());
    }
}
