//! End-to-end: a paged dictionary with letter headers, driven through the
//! public API and persisted in SQLite.

use async_trait::async_trait;
use elements::source::{AnchorPolicy, AnchoredSource, Placeholder, WithPlaceholders};
use elements::{
    AdapterConfig, AdapterError, ChangeEvent, Element, ElementAdapter, ElementTag, FailurePolicy,
    FindResult, Item, ItemCodec, JsonCodec, LoadOptions, OpenStore, Page, SourceId, Source,
    SqliteStateStore, StateStore,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Fixed pages of words; pages past the end come back empty.
struct Words {
    pages: Vec<Vec<&'static str>>,
    finds: AtomicUsize,
}

impl Words {
    fn new(pages: Vec<Vec<&'static str>>) -> Self {
        Self {
            pages,
            finds: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Source for Words {
    fn name(&self) -> &str {
        "words"
    }

    async fn find(&self, page: &Page) -> FindResult {
        self.finds.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .pages
            .get(page.number())
            .map(|words| words.iter().copied().map(Item::from).collect())
            .unwrap_or_default())
    }

    fn codec(&self) -> Option<Arc<dyn ItemCodec>> {
        Some(Arc::new(JsonCodec::<String>::new()))
    }
}

struct Initials;

fn initial(element: &Element) -> Option<char> {
    element.data_as::<String>()?.chars().next()
}

impl AnchorPolicy for Initials {
    fn select_anchors(&self, dependency_elements: &[Element]) -> Vec<Element> {
        let mut anchors: Vec<Element> = Vec::new();
        for element in dependency_elements {
            let previous = anchors.last().and_then(initial);
            if initial(element).is_some() && initial(element) != previous {
                anchors.push(element.clone());
            }
        }
        anchors
    }

    fn companion_for(&self, anchor: &Element) -> Item {
        Item::new(initial(anchor).map(|c| c.to_uppercase().to_string()).unwrap_or_default())
    }

    fn codec(&self) -> Option<Arc<dyn ItemCodec>> {
        Some(Arc::new(JsonCodec::<String>::new()))
    }
}

fn sources(words: Arc<Words>) -> Vec<Arc<dyn Source>> {
    vec![
        Arc::new(AnchoredSource::header("initials", "words", Initials)),
        words,
    ]
}

fn labels(adapter: &ElementAdapter) -> Vec<String> {
    (0..adapter.element_count())
        .filter_map(|position| adapter.element_at(position))
        .map(|element| element.data_as::<String>().cloned().unwrap_or_default())
        .collect()
}

fn pages() -> Vec<Vec<&'static str>> {
    vec![
        vec!["acorn", "apple", "birch"],
        vec!["cedar", "comet"],
        vec!["delta"],
    ]
}

#[tokio::test]
async fn headers_run_after_words_on_every_page() {
    let words = Arc::new(Words::new(pages()));
    let adapter = ElementAdapter::new(sources(words.clone())).unwrap();

    assert_eq!(
        adapter.graph().order(),
        &[SourceId(1), SourceId(0)],
        "dependency order ignores registration order"
    );

    adapter.load().await.unwrap();
    for number in 1..3 {
        adapter
            .load_page(number, LoadOptions::new())
            .await
            .unwrap();
    }

    assert_eq!(
        labels(&adapter),
        vec!["A", "acorn", "apple", "B", "birch", "C", "cedar", "comet", "D", "delta"]
    );
    assert_eq!(adapter.pager().page_count(), 3);
    assert_eq!(adapter.page(2).unwrap().elements_before(), 8);
    assert_eq!(adapter.element_at(5).unwrap().tag(), ElementTag::HEADER);
    assert_eq!(words.finds.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn change_events_add_up_to_the_list() {
    let adapter = ElementAdapter::new(sources(Arc::new(Words::new(pages())))).unwrap();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ChangeEvent>();
    adapter.subscribe(Arc::new(tx));

    adapter.load().await.unwrap();
    adapter
        .load_next_page(&adapter.page(0).unwrap())
        .await
        .unwrap();
    adapter.load().await.unwrap();

    let mut net = 0isize;
    while let Ok(event) = rx.try_recv() {
        net += event.delta();
    }
    assert_eq!(net, adapter.element_count() as isize);
    assert!(adapter.page(1).unwrap().is_empty());
}

#[tokio::test]
async fn snapshot_round_trips_through_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.db");

    let adapter = ElementAdapter::new(sources(Arc::new(Words::new(pages())))).unwrap();
    adapter.load().await.unwrap();
    adapter
        .load_next_page(&adapter.page(0).unwrap())
        .await
        .unwrap();
    {
        let store = SqliteStateStore::open(&path).unwrap();
        store.save("dictionary", &adapter.save_state().unwrap()).unwrap();
    }

    let store = SqliteStateStore::open(&path).unwrap();
    let snapshot = store.load("dictionary").unwrap().unwrap();
    assert!(store.saved_at("dictionary").unwrap().is_some());

    let words = Arc::new(Words::new(Vec::new()));
    let restored = ElementAdapter::new(sources(words.clone())).unwrap();
    restored.restore_state(&snapshot).unwrap();

    assert_eq!(labels(&restored), labels(&adapter));
    assert_eq!(restored.current_page().unwrap().number(), 1);
    assert!(restored.is_initialized());
    assert_eq!(words.finds.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_dictionary_shows_the_empty_marker() {
    let words: Vec<Arc<dyn Source>> =
        vec![Arc::new(WithPlaceholders::new(Words::new(Vec::new())))];
    let adapter = ElementAdapter::new(words).unwrap();

    adapter.load().await.unwrap();

    let only = adapter.element_at(0).unwrap();
    assert_eq!(adapter.element_count(), 1);
    assert_eq!(only.tag(), ElementTag::EMPTY);
    assert_eq!(Placeholder::of(only.data()), Some(Placeholder::Empty));
}

#[tokio::test]
async fn empty_later_page_fails_and_can_void_itself() {
    let config = AdapterConfig::from_yaml_str("failure_policy: void_page\n").unwrap();
    assert_eq!(config.failure_policy, FailurePolicy::VoidPage);
    let words: Vec<Arc<dyn Source>> = vec![Arc::new(WithPlaceholders::new(Words::new(vec![
        vec!["acorn"],
    ])))];
    let adapter = ElementAdapter::with_config(words, config).unwrap();

    adapter.load().await.unwrap();
    let result = adapter.load_page(1, LoadOptions::new()).await;

    match result {
        Err(AdapterError::LoadFailed { page, failures }) => {
            assert_eq!(page, 1);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].source_id, SourceId(0));
        }
        other => panic!("expected LoadFailed, got {:?}", other),
    }
    assert_eq!(labels(&adapter), vec!["acorn"]);
    assert!(adapter.page(1).unwrap().is_empty());
}
