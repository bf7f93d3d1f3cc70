//! Adapter: the page-load orchestrator
//!
//! [`ElementAdapter`] owns the sources, their dependency graph and the
//! pager. It runs page loads, saves and restores state and re-tags
//! elements on demand.

mod config;
mod element_adapter;
mod factory;

pub use config::{AdapterConfig, ConfigError, FailurePolicy};
pub use element_adapter::{
    AdapterError, AdapterResult, BranchError, BranchFailure, ElementAdapter, LoadOptions,
};
pub use factory::ElementFactory;
