//! HTTP access to a Typesense cluster: node pool, retrying executor and typed
//! resource operations.

pub mod client;
pub mod config;
pub mod executor;
pub mod node;

pub use client::TypesenseClient;
pub use config::{ClientConfig, ConnectionConfig};
pub use executor::{RawResponse, RequestExecutor, API_KEY_HEADER};
pub use node::{Node, NodeCursor, NodePool, Protocol};
