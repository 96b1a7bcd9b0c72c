use crate::types::{FacetCount, FacetCountValue};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Facet values the user has ticked, keyed by field name.
///
/// Fields keep the order in which they were first touched and values are
/// unique per field. This is transient UI state: it is folded into `filter_by`
/// at search time and never stored on [`SearchParameters`](crate::SearchParameters).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedFacets {
    fields: IndexMap<String, IndexSet<String>>,
}

impl SelectedFacets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select or deselect one value. Returns true if the selection changed.
    ///
    /// A field whose last value is deselected keeps its (empty) entry.
    pub fn toggle(&mut self, field: &str, value: &str, selected: bool) -> bool {
        if selected {
            self.fields
                .entry(field.to_string())
                .or_default()
                .insert(value.to_string())
        } else {
            match self.fields.get_mut(field) {
                Some(values) => values.shift_remove(value),
                None => false,
            }
        }
    }

    pub fn is_selected(&self, field: &str, value: &str) -> bool {
        self.fields
            .get(field)
            .map(|values| values.contains(value))
            .unwrap_or(false)
    }

    pub fn values(&self, field: &str) -> impl Iterator<Item = &str> {
        self.fields
            .get(field)
            .into_iter()
            .flat_map(|values| values.iter().map(String::as_str))
    }

    /// Fields with at least one selected value, in map order.
    pub fn active(&self) -> impl Iterator<Item = (&str, &IndexSet<String>)> {
        self.fields
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(field, values)| (field.as_str(), values))
    }

    pub fn is_empty(&self) -> bool {
        self.active().next().is_none()
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }
}

impl<F, V, I> FromIterator<(F, I)> for SelectedFacets
where
    F: Into<String>,
    V: Into<String>,
    I: IntoIterator<Item = V>,
{
    fn from_iter<T: IntoIterator<Item = (F, I)>>(iter: T) -> Self {
        let mut selected = SelectedFacets::new();
        for (field, values) in iter {
            let entry = selected.fields.entry(field.into()).or_default();
            entry.extend(values.into_iter().map(Into::into));
        }
        selected
    }
}

/// Escape a facet value for use inside a double-quoted filter literal.
///
/// Only `"` is escaped. Parentheses and `&&`/`||` inside a value pass through
/// unchanged, so such values can still yield an ambiguous expression.
pub fn escape_facet_value(value: &str) -> String {
    value.replace('"', "\\\"")
}

/// `(field:="a" || field:="b")` for one field's selected values.
pub fn facet_clause<'a>(field: &str, values: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let terms: Vec<String> = values
        .into_iter()
        .map(|v| format!("{}:=\"{}\"", field, escape_facet_value(v)))
        .collect();
    if terms.is_empty() {
        return None;
    }
    Some(format!("({})", terms.join(" || ")))
}

/// Whether `field` may contribute a clause, judged against the facet counts
/// of the previous response.
///
/// With no previous response (or one without facet counts) every field is
/// allowed, so the first search can establish which fields are facetable.
pub fn facet_field_allowed(field: &str, previous_facets: Option<&[FacetCount]>) -> bool {
    match previous_facets {
        Some(counts) => counts.iter().any(|f| f.field_name == field),
        None => true,
    }
}

/// Fold the caller's base filter and the selected facets into one `filter_by`.
///
/// The base filter comes first, then one OR-clause per active field in map
/// order, all joined with ` && `. Returns an empty string when there is nothing
/// to filter on. The output depends only on the inputs.
pub fn compose_filter(
    base_filter: Option<&str>,
    selected: &SelectedFacets,
    previous_facets: Option<&[FacetCount]>,
) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(base) = base_filter.filter(|b| !b.is_empty()) {
        parts.push(base.to_string());
    }

    for (field, values) in selected.active() {
        if !facet_field_allowed(field, previous_facets) {
            tracing::debug!(
                "skipping facet selection on '{}': not faceted in last response",
                field
            );
            continue;
        }
        if let Some(clause) = facet_clause(field, values.iter().map(String::as_str)) {
            parts.push(clause);
        }
    }

    parts.join(" && ")
}

/// Case-insensitive substring match over one facet's values, as used by the
/// sidebar's per-facet search box. An empty needle returns every value.
pub fn filter_facet_values<'a>(facet: &'a FacetCount, needle: &str) -> Vec<&'a FacetCountValue> {
    if needle.is_empty() {
        return facet.counts.iter().collect();
    }
    let needle = needle.to_lowercase();
    facet
        .counts
        .iter()
        .filter(|c| c.value.to_lowercase().contains(&needle))
        .collect()
}
