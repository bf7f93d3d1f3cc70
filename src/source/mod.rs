//! Sources: where a page's items come from and where they go
//!
//! The [`Source`] trait is the contract; the rest of this module holds
//! reusable building blocks written against it.

mod anchored;
mod monitor;
mod placeholder;
mod traits;
mod types;

pub use anchored::{AnchorPolicy, AnchoredSource, Placement};
pub use monitor::{MonitorCallback, SourceMonitor};
pub use placeholder::{
    append_pagination, clear_placeholders, is_empty_result, is_error_result, is_placeholder,
    Placeholder, WithPlaceholders,
};
pub use traits::Source;
pub use types::{ElementTag, FindError, FindResult, Item, SourceId};
