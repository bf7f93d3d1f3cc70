//! Elements: dependency-aware page loading for position-addressable lists
//!
//! A list is assembled from several independent data sources. Sources may
//! depend on each other: a dependent source runs after its dependencies
//! and places its items relative to theirs (headers before the first word
//! of each letter, ads after every tenth result, and so on).
//!
//! # Core Concepts
//!
//! - **Sources**: policy objects that find items for a page and order them
//! - **Pages**: contiguous slices of the flat element list, one per page number
//! - **Adapter**: runs the sources of a page in dependency order and merges
//!   their results into the page
//!
//! # Example
//!
//! ```ignore
//! use elements::{ElementAdapter, Source};
//!
//! let sources: Vec<Arc<dyn Source>> = vec![Arc::new(Words), Arc::new(Headers)];
//! let adapter = ElementAdapter::new(sources)?;
//! adapter.load().await?;
//! println!("{} elements", adapter.element_count());
//! ```

pub mod adapter;
pub mod graph;
pub mod page;
pub mod render;
pub mod source;
pub mod state;

pub use adapter::{
    AdapterConfig, AdapterError, AdapterResult, BranchError, BranchFailure, ConfigError,
    ElementAdapter, ElementFactory, FailurePolicy, LoadOptions,
};
pub use graph::{DependencyGraph, GraphError, GraphResult};
pub use page::{
    ChangeEvent, ChangeListener, Element, ElementId, MergeOutcome, Page, PageError, PageResult,
    Pager, UnderflowPolicy,
};
pub use render::{RenderError, RenderResult, Renderer, RendererRegistry};
pub use source::{
    AnchorPolicy, AnchoredSource, ElementTag, FindError, FindResult, Item, Placeholder, Source,
    SourceId, WithPlaceholders,
};
pub use state::{
    AdapterState, ItemCodec, JsonCodec, MemoryStateStore, OpenStore, SqliteStateStore, StateError,
    StateResult, StateStore,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
