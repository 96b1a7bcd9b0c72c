use crate::error::{ConsoleError, Result};
use crate::query::builder::{SearchRequest, SearchRequestBuilder};
use crate::query::facets::SelectedFacets;
use crate::query::pagination::{SearchResults, DEFAULT_PER_PAGE};
use crate::service::SearchService;
use crate::types::{SearchParameters, SearchResponse};

/// Identifies one issued search. Only the newest generation may update state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Generation(u64);

/// Client-side state of one search screen: the chosen collection, its fields,
/// the current parameters and facet selection, and the last good result.
///
/// Errors are recorded separately from results so that a failure leaves the
/// previously loaded collections and hits in place.
#[derive(Debug, Default)]
pub struct SearchSession {
    collections: Vec<String>,
    selected_collection: Option<String>,
    collection_fields: Vec<String>,
    params: SearchParameters,
    selected_facets: SelectedFacets,
    results: Option<SearchResults>,
    last_error: Option<String>,
    latest: u64,
}

/// Parameters a freshly selected collection starts from.
pub fn initial_params() -> SearchParameters {
    SearchParameters {
        page: Some(1),
        per_page: Some(DEFAULT_PER_PAGE),
        ..SearchParameters::new("", "")
    }
}

impl SearchSession {
    pub fn new() -> Self {
        SearchSession {
            params: initial_params(),
            ..Default::default()
        }
    }

    pub fn collections(&self) -> &[String] {
        &self.collections
    }

    pub fn selected_collection(&self) -> Option<&str> {
        self.selected_collection.as_deref()
    }

    pub fn collection_fields(&self) -> &[String] {
        &self.collection_fields
    }

    pub fn params(&self) -> &SearchParameters {
        &self.params
    }

    pub fn selected_facets(&self) -> &SelectedFacets {
        &self.selected_facets
    }

    pub fn results(&self) -> Option<&SearchResults> {
        self.results.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Fetch collection names and select the first one.
    pub async fn load_collections<S: SearchService>(&mut self, service: &S) -> Result<()> {
        match service.list_collections().await {
            Ok(schemas) => {
                self.collections = schemas.into_iter().map(|s| s.name).collect();
                self.last_error = None;
                if let Some(first) = self.collections.first().cloned() {
                    self.select_collection(&first);
                    self.load_collection_fields(service).await?;
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!("failed to load collections: {}", e);
                self.last_error = Some(format!(
                    "Failed to load collections. Please check your connection. ({})",
                    e
                ));
                Err(e)
            }
        }
    }

    /// Switch collection. Parameters, facet selection and the previous result
    /// all belong to the old collection and are reset.
    pub fn select_collection(&mut self, name: &str) {
        if self.selected_collection.as_deref() == Some(name) {
            return;
        }
        self.selected_collection = Some(name.to_string());
        self.collection_fields.clear();
        self.params = initial_params();
        self.selected_facets.clear();
        self.results = None;
    }

    pub async fn load_collection_fields<S: SearchService>(&mut self, service: &S) -> Result<()> {
        let Some(name) = self.selected_collection.clone() else {
            return Err(self.precondition(crate::query::builder::NO_COLLECTION_MESSAGE));
        };
        match service.get_collection(&name).await {
            Ok(schema) => {
                self.collection_fields = schema.field_names();
                self.last_error = None;
                Ok(())
            }
            Err(e) => {
                tracing::warn!("failed to load fields for collection {}: {}", name, e);
                self.last_error = Some(format!(
                    "Failed to load fields for collection {}. ({})",
                    name, e
                ));
                Err(e)
            }
        }
    }

    pub fn set_params(&mut self, params: SearchParameters) {
        self.params = params;
    }

    pub fn set_page(&mut self, page: u32) {
        self.params.page = Some(page.max(1));
    }

    /// Changing the page size always returns to page 1.
    pub fn set_per_page(&mut self, per_page: u32) {
        self.params.per_page = Some(per_page);
        self.params.page = Some(1);
    }

    pub fn toggle_facet(&mut self, field: &str, value: &str, selected: bool) -> bool {
        self.selected_facets.toggle(field, value, selected)
    }

    /// Compose the next request from current state and claim a generation for it.
    ///
    /// Precondition failures are recorded and returned without issuing anything.
    pub fn begin_search(&mut self) -> Result<(Generation, SearchRequest)> {
        let previous_facets = self.results.as_ref().and_then(|r| r.reported_facets());
        let built = SearchRequestBuilder::new(&self.params)
            .collection(self.selected_collection.as_deref())
            .selected_facets(&self.selected_facets)
            .previous_facets(previous_facets)
            .build();

        match built {
            Ok(request) => {
                self.latest += 1;
                self.last_error = None;
                Ok((Generation(self.latest), request))
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Apply the outcome of a search issued with `generation`.
    ///
    /// Returns false (and changes nothing) when a newer search has been issued
    /// since, so a slow response cannot overwrite a fresher one.
    pub fn complete_search(
        &mut self,
        generation: Generation,
        outcome: Result<SearchResponse>,
    ) -> bool {
        if generation.0 != self.latest {
            tracing::debug!(
                "discarding stale search result (generation {}, latest {})",
                generation.0,
                self.latest
            );
            return false;
        }
        match outcome {
            Ok(resp) => {
                self.results = Some(resp.into());
                self.last_error = None;
            }
            Err(e) => {
                tracing::warn!("search failed: {}", e);
                self.last_error = Some(format!(
                    "Search failed. Please check your query and try again. ({})",
                    e
                ));
            }
        }
        true
    }

    /// Run a search with the current state and apply its result.
    pub async fn search<S: SearchService>(&mut self, service: &S) -> Result<()> {
        let (generation, request) = self.begin_search()?;
        let outcome = request.send(service).await;
        let failure = outcome.as_ref().err().cloned();
        self.complete_search(generation, outcome);
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn precondition(&mut self, message: &str) -> ConsoleError {
        self.last_error = Some(message.to_string());
        ConsoleError::Precondition(message.to_string())
    }
}
