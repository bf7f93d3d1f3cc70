//! Value types shared by sources, pages and the adapter

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Stable identifier of a registered source.
///
/// Assigned at registration time as the index of the source in the list
/// handed to the adapter. Never reassigned for the adapter's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(pub usize);

impl SourceId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Classification tag a source assigns to each of its items.
///
/// Renderers are selected by tag. Negative values are reserved for the
/// built-in placeholder and companion sources.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ElementTag(pub i32);

impl ElementTag {
    pub const DEFAULT: Self = Self(0);
    pub const PAGINATION: Self = Self(-1);
    pub const EMPTY: Self = Self(-2);
    pub const ERROR: Self = Self(-3);
    pub const HEADER: Self = Self(-4);
    pub const FOOTER: Self = Self(-5);
}

impl fmt::Display for ElementTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque item payload produced by a source.
///
/// The framework never inspects the payload; the owning source downcasts
/// it when it needs to. Cloning is cheap (shared pointer).
#[derive(Clone)]
pub struct Item(Arc<dyn Any + Send + Sync>);

impl Item {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Attempt to view the payload as a concrete type.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.0.is::<T>()
    }

    /// True if both items share the same payload allocation.
    pub fn ptr_eq(&self, other: &Item) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.downcast_ref::<String>() {
            Some(text) => write!(f, "Item({:?})", text),
            None => write!(f, "Item(..)"),
        }
    }
}

impl From<String> for Item {
    fn from(value: String) -> Self {
        Item::new(value)
    }
}

impl From<&str> for Item {
    fn from(value: &str) -> Self {
        Item::new(value.to_string())
    }
}

/// Why a find, or the adjustment chain that followed it, produced no items.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FindError {
    #[error("find failed: {0}")]
    Failed(String),
    #[error("find returned no items")]
    Empty,
    #[error("find was cancelled")]
    Cancelled,
}

impl FindError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Outcome of a find and of every step of the adjustment chain.
pub type FindResult = Result<Vec<Item>, FindError>;
