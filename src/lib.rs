//! Query composition and result handling for a Typesense admin console.
//!
//! This crate turns user-facing search state (free text, facet selections,
//! paging) into well-formed search parameters and normalizes responses for
//! display. It performs no I/O itself: the remote service is reached through
//! the [`SearchService`] trait, implemented over HTTP by `tsdeck-cluster`.

pub mod error;
pub mod query;
pub mod service;
pub mod session;
pub mod types;

pub use error::{ConsoleError, Result};
pub use query::builder::{SearchRequest, SearchRequestBuilder};
pub use query::facets::{compose_filter, filter_facet_values, SelectedFacets};
pub use query::filter::{render_groups, Combinator, FilterCondition, FilterGroup, FilterOperator};
pub use query::pagination::{total_pages, visible_range, PageInfo, SearchResults};
pub use service::SearchService;
pub use session::{Generation, SearchSession};
pub use types::*;
