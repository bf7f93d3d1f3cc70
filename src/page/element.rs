//! Element: an item wrapped with the identity of the source that produced it

use crate::source::{ElementTag, Item, SourceId};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ELEMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one element instance.
///
/// Two elements wrapping equal data are still distinct elements. Pages
/// locate dependency elements by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u64);

impl ElementId {
    fn next() -> Self {
        Self(NEXT_ELEMENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// An item placed in a page, stamped with its source and classification.
///
/// Elements are built by the adapter's element factory so that the tag is
/// always the owning source's classification of the data.
#[derive(Debug, Clone)]
pub struct Element {
    id: ElementId,
    source_id: SourceId,
    tag: ElementTag,
    data: Item,
}

impl Element {
    pub(crate) fn new(source_id: SourceId, tag: ElementTag, data: Item) -> Self {
        Self {
            id: ElementId::next(),
            source_id,
            tag,
            data,
        }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn source_id(&self) -> SourceId {
        self.source_id
    }

    pub fn tag(&self) -> ElementTag {
        self.tag
    }

    pub fn data(&self) -> &Item {
        &self.data
    }

    /// Shorthand for `self.data().downcast_ref::<T>()`.
    pub fn data_as<T: 'static>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }

    /// A new element with the same source and tag but different data.
    pub fn clone_with_data(&self, data: Item) -> Element {
        Element::new(self.source_id, self.tag, data)
    }

    /// Same element (same identity) with a new classification.
    pub(crate) fn retagged(&self, tag: ElementTag) -> Element {
        Element {
            id: self.id,
            source_id: self.source_id,
            tag,
            data: self.data.clone(),
        }
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Element {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elements_have_distinct_identity() {
        let a = Element::new(SourceId(0), ElementTag::DEFAULT, Item::from("x"));
        let b = Element::new(SourceId(0), ElementTag::DEFAULT, Item::from("x"));
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn clone_with_data_keeps_source_and_tag() {
        let a = Element::new(SourceId(3), ElementTag::HEADER, Item::from("A"));
        let b = a.clone_with_data(Item::from("B"));
        assert_eq!(b.source_id(), SourceId(3));
        assert_eq!(b.tag(), ElementTag::HEADER);
        assert_eq!(b.data_as::<String>().map(String::as_str), Some("B"));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn retagged_keeps_identity() {
        let a = Element::new(SourceId(1), ElementTag::DEFAULT, Item::from("x"));
        let b = a.retagged(ElementTag(7));
        assert_eq!(a.id(), b.id());
        assert_eq!(b.tag(), ElementTag(7));
    }
}
