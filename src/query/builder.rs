use super::facets::{compose_filter, SelectedFacets};
use crate::error::{ConsoleError, Result};
use crate::service::SearchService;
use crate::types::{FacetCount, SearchParameters, SearchResponse};

pub const NO_COLLECTION_MESSAGE: &str = "Please select a collection first.";
pub const NO_QUERY_MESSAGE: &str =
    "Please enter a search query or select at least one search field.";

/// A fully composed search, ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub collection: String,
    pub params: SearchParameters,
}

impl SearchRequest {
    pub async fn send<S: SearchService>(&self, service: &S) -> Result<SearchResponse> {
        tracing::debug!(
            "[SEARCH {}] q={:?} filter_by={:?} page={:?}",
            self.collection,
            self.params.q,
            self.params.filter_by,
            self.params.page
        );
        service.search(&self.collection, &self.params).await
    }
}

/// Turns UI state (parameters, selected facets, the last response's facet
/// counts) into one [`SearchRequest`].
///
/// Validation happens locally in [`build`](Self::build); a rejected request
/// never reaches the network.
pub struct SearchRequestBuilder<'a> {
    params: &'a SearchParameters,
    collection: Option<&'a str>,
    selected: Option<&'a SelectedFacets>,
    previous_facets: Option<&'a [FacetCount]>,
}

impl<'a> SearchRequestBuilder<'a> {
    pub fn new(params: &'a SearchParameters) -> Self {
        SearchRequestBuilder {
            params,
            collection: None,
            selected: None,
            previous_facets: None,
        }
    }

    pub fn collection(mut self, collection: Option<&'a str>) -> Self {
        self.collection = collection;
        self
    }

    pub fn selected_facets(mut self, selected: &'a SelectedFacets) -> Self {
        self.selected = Some(selected);
        self
    }

    /// Facet counts of the most recent response. `None` (no prior response,
    /// or one without faceting) lets every selected field through.
    pub fn previous_facets(mut self, facets: Option<&'a [FacetCount]>) -> Self {
        self.previous_facets = facets;
        self
    }

    pub fn build(self) -> Result<SearchRequest> {
        let collection = self
            .collection
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ConsoleError::Precondition(NO_COLLECTION_MESSAGE.to_string()))?;

        if self.params.q.is_empty() && self.params.query_by_fields().is_empty() {
            return Err(ConsoleError::Precondition(NO_QUERY_MESSAGE.to_string()));
        }

        let empty = SelectedFacets::new();
        let selected = self.selected.unwrap_or(&empty);
        let filter_by = compose_filter(
            self.params.filter_by.as_deref(),
            selected,
            self.previous_facets,
        );

        let mut params = self.params.clone();
        params.filter_by = if filter_by.is_empty() {
            None
        } else {
            Some(filter_by)
        };

        Ok(SearchRequest {
            collection: collection.to_string(),
            params,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FacetCountValue;

    fn params(q: &str, query_by: &str) -> SearchParameters {
        SearchParameters {
            page: Some(1),
            per_page: Some(10),
            ..SearchParameters::new(q, query_by)
        }
    }

    #[test]
    fn missing_collection_is_rejected() {
        let p = params("shoe", "name");
        let err = SearchRequestBuilder::new(&p).build().unwrap_err();
        assert_eq!(err, ConsoleError::Precondition(NO_COLLECTION_MESSAGE.into()));

        let err = SearchRequestBuilder::new(&p)
            .collection(Some(""))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConsoleError::Precondition(_)));
    }

    #[test]
    fn empty_query_and_fields_is_rejected() {
        let p = params("", "");
        let err = SearchRequestBuilder::new(&p)
            .collection(Some("products"))
            .build()
            .unwrap_err();
        assert_eq!(err, ConsoleError::Precondition(NO_QUERY_MESSAGE.into()));

        let p = params("", " , ");
        assert!(SearchRequestBuilder::new(&p)
            .collection(Some("products"))
            .build()
            .is_err());
    }

    #[test]
    fn query_alone_or_fields_alone_is_enough() {
        let p = params("shoe", "");
        assert!(SearchRequestBuilder::new(&p)
            .collection(Some("products"))
            .build()
            .is_ok());
        let p = params("", "name");
        assert!(SearchRequestBuilder::new(&p)
            .collection(Some("products"))
            .build()
            .is_ok());
    }

    #[test]
    fn empty_filter_is_omitted() {
        let p = SearchParameters {
            filter_by: Some(String::new()),
            ..params("shoe", "name")
        };
        let req = SearchRequestBuilder::new(&p)
            .collection(Some("products"))
            .build()
            .unwrap();
        assert_eq!(req.params.filter_by, None);
        assert!(!req.params.to_query_string().contains("filter_by"));
    }

    #[test]
    fn facets_merge_into_base_filter() {
        let p = SearchParameters {
            filter_by: Some("price:>10".into()),
            sort_by: Some("price:asc".into()),
            facet_by: Some("brand".into()),
            ..params("shoe", "name")
        };
        let mut selected = SelectedFacets::new();
        selected.toggle("brand", "Acme", true);
        selected.toggle("brand", "Globex", true);

        let req = SearchRequestBuilder::new(&p)
            .collection(Some("products"))
            .selected_facets(&selected)
            .build()
            .unwrap();

        assert_eq!(req.collection, "products");
        assert_eq!(
            req.params.filter_by.as_deref(),
            Some("price:>10 && (brand:=\"Acme\" || brand:=\"Globex\")")
        );
        assert_eq!(req.params.sort_by.as_deref(), Some("price:asc"));
        assert_eq!(req.params.facet_by.as_deref(), Some("brand"));
        assert_eq!(req.params.page, Some(1));
        assert_eq!(req.params.q, "shoe");
    }

    #[test]
    fn selections_on_unfaceted_fields_are_dropped() {
        let p = params("shoe", "name");
        let mut selected = SelectedFacets::new();
        selected.toggle("color", "red", true);
        let previous = vec![FacetCount {
            field_name: "brand".into(),
            counts: vec![FacetCountValue {
                count: 2,
                highlighted: "Acme".into(),
                value: "Acme".into(),
            }],
            stats: None,
        }];

        let req = SearchRequestBuilder::new(&p)
            .collection(Some("products"))
            .selected_facets(&selected)
            .previous_facets(Some(previous.as_slice()))
            .build()
            .unwrap();
        assert_eq!(req.params.filter_by, None);
    }

    #[test]
    fn caller_params_are_not_mutated() {
        let p = params("shoe", "name");
        let mut selected = SelectedFacets::new();
        selected.toggle("brand", "Acme", true);
        let _ = SearchRequestBuilder::new(&p)
            .collection(Some("products"))
            .selected_facets(&selected)
            .build()
            .unwrap();
        assert_eq!(p.filter_by, None);
    }
}
