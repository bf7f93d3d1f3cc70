//! Pages: the position-addressable element list
//!
//! A [`Pager`] owns an ordered set of [`Page`]s. Each page holds the
//! elements of every source for that page number; the concatenation of
//! all pages is the flat list a consumer renders.

mod element;
mod events;
mod merge;
mod pager;

pub use element::{Element, ElementId};
pub use events::{ChangeEvent, ChangeListener};
pub use merge::{MergeContext, MergeOutcome, UnderflowPolicy};
pub use pager::{Page, PageError, PageResult, Pager};
