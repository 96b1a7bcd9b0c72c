pub mod builder;
pub mod facets;
pub mod filter;
pub mod pagination;
