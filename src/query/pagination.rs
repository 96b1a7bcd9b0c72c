use crate::types::{FacetCount, Hit, SearchResponse};
use serde::Serialize;

/// Page size assumed when the service's `request_params` omit `per_page`.
pub const DEFAULT_PER_PAGE: u32 = 10;

/// `ceil(found / per_page)`; zero when `per_page` is zero.
pub fn total_pages(found: u64, per_page: u32) -> u64 {
    if per_page == 0 {
        return 0;
    }
    found.div_ceil(u64::from(per_page))
}

/// 1-based inclusive range of results shown on `page`, `(0, 0)` when nothing
/// was found.
///
/// A page past the last one yields `start > end` (`(41, 25)` for 25 results,
/// page 5 of 10); check `start <= end` before rendering a label.
pub fn visible_range(found: u64, page: u32, per_page: u32) -> (u64, u64) {
    if found == 0 {
        return (0, 0);
    }
    let per_page = u64::from(per_page);
    let page = u64::from(page.max(1));
    let start = (page - 1) * per_page + 1;
    let end = (page * per_page).min(found);
    (start, end)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u64,
    pub found: u64,
    pub start: u64,
    pub end: u64,
}

impl PageInfo {
    pub fn new(found: u64, page: u32, per_page: u32) -> Self {
        let (start, end) = visible_range(found, page, per_page);
        PageInfo {
            page,
            per_page,
            total_pages: total_pages(found, per_page),
            found,
            start,
            end,
        }
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.page) < self.total_pages
    }
}

/// A search response normalized for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResults<T = serde_json::Value> {
    pub hits: Vec<Hit<T>>,
    /// Always present; empty when the service did not facet.
    pub facets: Vec<FacetCount>,
    pub found: u64,
    pub out_of: u64,
    pub search_time_ms: u64,
    pub search_cutoff: bool,
    pub paging: PageInfo,
    #[serde(skip)]
    facets_reported: bool,
}

impl<T> SearchResults<T> {
    /// Facet counts as the service reported them, `None` if it sent none.
    ///
    /// This distinction feeds the next request's facet-field check.
    pub fn reported_facets(&self) -> Option<&[FacetCount]> {
        if self.facets_reported {
            Some(&self.facets)
        } else {
            None
        }
    }
}

impl<T> From<SearchResponse<T>> for SearchResults<T> {
    fn from(resp: SearchResponse<T>) -> Self {
        let per_page = resp.request_params.per_page.unwrap_or(DEFAULT_PER_PAGE);
        let facets_reported = resp.facet_counts.is_some();
        SearchResults {
            paging: PageInfo::new(resp.found, resp.page, per_page),
            hits: resp.hits,
            facets: resp.facet_counts.unwrap_or_default(),
            found: resp.found,
            out_of: resp.out_of,
            search_time_ms: resp.search_time_ms,
            search_cutoff: resp.search_cutoff.unwrap_or(false),
            facets_reported,
        }
    }
}
