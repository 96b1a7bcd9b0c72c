use crate::error::Result;
use crate::types::{CollectionSchema, SearchParameters, SearchResponse};
use std::future::Future;

/// The slice of the remote service that query composition and the search
/// session depend on.
///
/// `tsdeck_cluster::TypesenseClient` implements this over HTTP with node
/// failover. Tests substitute an in-memory fake.
pub trait SearchService {
    fn list_collections(&self) -> impl Future<Output = Result<Vec<CollectionSchema>>> + Send;

    fn get_collection(&self, name: &str) -> impl Future<Output = Result<CollectionSchema>> + Send;

    fn search(
        &self,
        collection: &str,
        params: &SearchParameters,
    ) -> impl Future<Output = Result<SearchResponse>> + Send;
}
