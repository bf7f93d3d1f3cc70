//! Anchored companion sources: headers and footers
//!
//! An [`AnchoredSource`] depends on one source. Before its find, it picks
//! anchors among that source's elements on the page and synthesizes one
//! companion item per anchor; during ordering it places each companion
//! right before (header) or right after (footer) its anchor.

use super::traits::Source;
use super::types::{ElementTag, FindResult, Item};
use crate::page::{Element, ElementId, Page};
use crate::state::ItemCodec;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// Which side of its anchor a companion goes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Before,
    After,
}

/// Decides which dependency elements get a companion and what it holds.
pub trait AnchorPolicy: Send + Sync {
    /// Anchors among the dependency's elements, in page order.
    fn select_anchors(&self, dependency_elements: &[Element]) -> Vec<Element>;

    /// Companion item for one anchor.
    fn companion_for(&self, anchor: &Element) -> Item;

    /// Tag override for a companion item. Defaults to the placement's
    /// reserved tag.
    fn classify(&self, _item: &Item) -> Option<ElementTag> {
        None
    }

    fn codec(&self) -> Option<Arc<dyn ItemCodec>> {
        None
    }
}

/// Header or footer source driven by an [`AnchorPolicy`].
///
/// Anchors and companions are kept per page number and dropped once the
/// page's find (companions) or page-loaded callback (anchors) has passed.
pub struct AnchoredSource<P> {
    name: String,
    dependency: String,
    placement: Placement,
    policy: P,
    anchors: DashMap<usize, Vec<ElementId>>,
    companions: DashMap<usize, Vec<Item>>,
}

impl<P: AnchorPolicy> AnchoredSource<P> {
    pub fn new(
        name: impl Into<String>,
        dependency: impl Into<String>,
        placement: Placement,
        policy: P,
    ) -> Self {
        Self {
            name: name.into(),
            dependency: dependency.into(),
            placement,
            policy,
            anchors: DashMap::new(),
            companions: DashMap::new(),
        }
    }

    /// Companions placed before their anchors.
    pub fn header(name: impl Into<String>, dependency: impl Into<String>, policy: P) -> Self {
        Self::new(name, dependency, Placement::Before, policy)
    }

    /// Companions placed after their anchors.
    pub fn footer(name: impl Into<String>, dependency: impl Into<String>, policy: P) -> Self {
        Self::new(name, dependency, Placement::After, policy)
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    fn select(&self, page: &Page, dependency_elements: &[Element]) -> Vec<Element> {
        let anchors = self.policy.select_anchors(dependency_elements);
        self.anchors
            .insert(page.number(), anchors.iter().map(Element::id).collect());
        anchors
    }

    fn is_anchor(&self, page: &Page, element: &Element) -> bool {
        self.anchors
            .get(&page.number())
            .is_some_and(|anchors| anchors.contains(&element.id()))
    }

    fn count_for(&self, placement: Placement, page: &Page, element: &Element) -> usize {
        usize::from(self.placement == placement && self.is_anchor(page, element))
    }
}

#[async_trait]
impl<P: AnchorPolicy> Source for AnchoredSource<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn depends_on(&self, other: &dyn Source) -> bool {
        other.name() == self.dependency
    }

    fn classify(&self, item: &Item) -> ElementTag {
        self.policy
            .classify(item)
            .unwrap_or(match self.placement {
                Placement::Before => ElementTag::HEADER,
                Placement::After => ElementTag::FOOTER,
            })
    }

    fn on_prepare_find(&self, page: &Page, dependency_elements: &[Element]) {
        let companions: Vec<Item> = self
            .select(page, dependency_elements)
            .iter()
            .map(|anchor| self.policy.companion_for(anchor))
            .collect();
        self.companions.insert(page.number(), companions);
    }

    async fn find(&self, page: &Page) -> FindResult {
        Ok(self
            .companions
            .remove(&page.number())
            .map(|(_, companions)| companions)
            .unwrap_or_default())
    }

    fn on_prepare_order(&self, page: &Page, _elements: &[Element], dependency_elements: &[Element]) {
        // restored pages skip find, so anchors are derived here
        if !self.anchors.contains_key(&page.number()) {
            self.select(page, dependency_elements);
        }
    }

    fn order_before(&self, page: &Page, _position: usize, dependency_element: &Element) -> usize {
        self.count_for(Placement::Before, page, dependency_element)
    }

    fn order_after(&self, page: &Page, _position: usize, dependency_element: &Element) -> usize {
        self.count_for(Placement::After, page, dependency_element)
    }

    fn on_page_loaded(&self, page: &Page, _page_elements: &[Element]) {
        self.anchors.remove(&page.number());
    }

    fn codec(&self) -> Option<Arc<dyn ItemCodec>> {
        self.policy.codec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{MergeContext, Pager, UnderflowPolicy};
    use crate::source::SourceId;
    use std::collections::BTreeSet;

    struct Words;

    #[async_trait]
    impl Source for Words {
        fn name(&self) -> &str {
            "words"
        }

        async fn find(&self, _page: &Page) -> FindResult {
            Ok(Vec::new())
        }
    }

    /// First word of every initial letter.
    struct Initials;

    fn initial(element: &Element) -> Option<char> {
        element.data_as::<String>()?.chars().next()
    }

    impl AnchorPolicy for Initials {
        fn select_anchors(&self, dependency_elements: &[Element]) -> Vec<Element> {
            let mut last = None;
            dependency_elements
                .iter()
                .filter(|element| {
                    let letter = initial(element);
                    let fresh = letter != last;
                    last = letter;
                    fresh
                })
                .cloned()
                .collect()
        }

        fn companion_for(&self, anchor: &Element) -> Item {
            Item::new(initial(anchor).unwrap_or('?').to_uppercase().to_string())
        }
    }

    fn labels(page: &Page) -> Vec<String> {
        page.elements()
            .iter()
            .map(|e| e.data_as::<String>().cloned().unwrap_or_default())
            .collect()
    }

    async fn place(source: &AnchoredSource<Initials>, words: &[&str]) -> (Page, Vec<ElementTag>) {
        let sources: Vec<Arc<dyn Source>> = vec![Arc::new(Words)];
        let pager = Pager::new(sources.into());
        let page = pager.open_page(0, false);
        let dependency: Vec<Element> = words
            .iter()
            .map(|w| Element::new(SourceId(0), ElementTag::DEFAULT, Item::from(*w)))
            .collect();
        page.insert_range(0, dependency.clone()).unwrap();

        source.on_prepare_find(&page, &dependency);
        let items = source.find(&page).await.unwrap();
        let elements: Vec<Element> = items
            .into_iter()
            .map(|item| Element::new(SourceId(1), source.classify(&item), item))
            .collect();
        let tags = elements.iter().map(Element::tag).collect();
        let dependencies: BTreeSet<SourceId> = [SourceId(0)].into();
        let context = MergeContext {
            source,
            dependencies: &dependencies,
            underflow: UnderflowPolicy::Reject,
        };
        page.merge_for_source(SourceId(1), elements, &context).unwrap();
        (page, tags)
    }

    #[tokio::test]
    async fn headers_go_before_the_first_word_of_each_letter() {
        let headers = AnchoredSource::header("headers", "words", Initials);
        let (page, tags) = place(&headers, &["apple", "avocado", "banana"]).await;

        assert_eq!(labels(&page), vec!["A", "apple", "avocado", "B", "banana"]);
        assert!(tags.iter().all(|tag| *tag == ElementTag::HEADER));
    }

    #[tokio::test]
    async fn footers_go_after_their_anchor() {
        let footers = AnchoredSource::footer("footers", "words", Initials);
        let (page, tags) = place(&footers, &["apple", "banana", "blueberry"]).await;

        assert_eq!(labels(&page), vec!["apple", "A", "banana", "B", "blueberry"]);
        assert_eq!(tags, vec![ElementTag::FOOTER, ElementTag::FOOTER]);
    }

    #[tokio::test]
    async fn page_state_is_dropped_after_use() {
        let headers = AnchoredSource::header("headers", "words", Initials);
        let (page, _) = place(&headers, &["apple"]).await;

        assert!(headers.find(&page).await.unwrap().is_empty());
        headers.on_page_loaded(&page, &page.elements());
        assert!(!headers.anchors.contains_key(&0));
    }

    #[test]
    fn depends_only_on_the_named_source() {
        let headers = AnchoredSource::header("headers", "words", Initials);
        assert!(headers.depends_on(&Words));
        assert!(!headers.depends_on(&headers));
    }
}
