use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Collection name, e.g. `"products"`.
pub type CollectionName = String;
/// Document identifier as stored in the `id` field.
pub type DocumentId = String;

/// A collection schema as the service stores and returns it.
///
/// Schemas are round-tripped verbatim; field types are not validated locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionSchema {
    pub name: CollectionName,
    pub fields: Vec<CollectionField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_sorting_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_separators: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbols_to_index: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_nested_fields: Option<bool>,
    /// Populated by the service on reads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_documents: Option<u64>,
    /// Populated by the service on reads (unix seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

impl CollectionSchema {
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionField {
    pub name: String,
    /// Wire type such as `"string"`, `"int32[]"` or `"auto"`.
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facet: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infix: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

/// A parameter that the service accepts either as a boolean or as a
/// comma-separated per-field string (`prefix=true` or `prefix=true,false`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum BoolOrList {
    Bool(bool),
    List(String),
}

impl fmt::Display for BoolOrList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoolOrList::Bool(b) => write!(f, "{}", b),
            BoolOrList::List(s) => f.write_str(s),
        }
    }
}

/// A parameter that is either a single number or a per-field string (`num_typos`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum NumberOrList {
    Number(u32),
    List(String),
}

impl fmt::Display for NumberOrList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumberOrList::Number(n) => write!(f, "{}", n),
            NumberOrList::List(s) => f.write_str(s),
        }
    }
}

/// Outbound search parameters.
///
/// Every optional field left as `None` is omitted from the wire entirely.
/// Empty strings are still sent; only absence removes a key.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchParameters {
    pub q: String,
    pub query_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_by_weights: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<BoolOrList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facet_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_facet_values: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facet_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_typos: Option<NumberOrList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_fields: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_fields: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight_fields: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight_full_fields: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight_affix_num_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight_start_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight_end_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet_threshold: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drop_tokens_threshold: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typo_tokens_threshold: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_hits: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden_hits: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_overrides: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_segmented_query: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_embedding_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_embedding_num_tries: Option<u32>,
}

impl SearchParameters {
    pub fn new(q: impl Into<String>, query_by: impl Into<String>) -> Self {
        SearchParameters {
            q: q.into(),
            query_by: query_by.into(),
            ..Default::default()
        }
    }

    /// Flatten into `(key, value)` pairs in declaration order.
    ///
    /// Absent fields produce no pair; present ones are stringified exactly once.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let value = match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => return Vec::new(),
        };

        value
            .into_iter()
            .filter_map(|(key, val)| json_scalar_to_string(&val).map(|s| (key, s)))
            .collect()
    }

    /// Form-encoded query string (`q=shoe&query_by=name&page=1`).
    pub fn to_query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.to_query_pairs())
            .finish()
    }

    /// The non-empty entries of the comma-joined `query_by` list.
    pub fn query_by_fields(&self) -> Vec<&str> {
        self.query_by
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .collect()
    }
}

fn json_scalar_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// The service's echo of the request that produced a [`SearchResponse`].
///
/// Only `per_page` is used for pagination math; other keys are retained as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RequestParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse<T = serde_json::Value> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facet_counts: Option<Vec<FacetCount>>,
    pub found: u64,
    pub out_of: u64,
    pub page: u32,
    pub request_params: RequestParams,
    pub search_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_cutoff: Option<bool>,
    pub hits: Vec<Hit<T>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Hit<T = serde_json::Value> {
    pub document: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight: Option<HashMap<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlights: Option<Vec<Highlight>>,
    pub text_match: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_match_info: Option<TextMatchInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Highlight {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextMatchInfo {
    pub best_field_score: String,
    pub best_field_weight: u32,
    pub fields_matched: u32,
    pub score: String,
    pub tokens_matched: u32,
}

/// Per-field facet aggregation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FacetCount {
    pub field_name: String,
    pub counts: Vec<FacetCountValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<FacetStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FacetCountValue {
    pub count: u64,
    pub highlighted: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FacetStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sum: Option<f64>,
}

/// Structured error body returned with non-2xx statuses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub message: String,
    #[serde(default)]
    pub http_code: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthStatus {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeletedCollection {
    pub name: CollectionName,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeletedDocument {
    pub id: DocumentId,
}

/// Write mode for bulk import, sent as the `action` query parameter.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImportAction {
    Create,
    Update,
    #[default]
    Upsert,
}

impl ImportAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportAction::Create => "create",
            ImportAction::Update => "update",
            ImportAction::Upsert => "upsert",
        }
    }
}

impl fmt::Display for ImportAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ImportAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "create" => Ok(ImportAction::Create),
            "update" => Ok(ImportAction::Update),
            "upsert" => Ok(ImportAction::Upsert),
            other => Err(format!(
                "unknown import action '{}', expected create, update or upsert",
                other
            )),
        }
    }
}

/// One line of a bulk-import response. Lines are independent: one document
/// may fail while its neighbours succeed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    /// The offending document as the service echoed it back (a JSON string).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<DocumentId>,
}

/// One entry of a multi-search body: `{collection, ...params}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MultiSearchEntry {
    pub collection: CollectionName,
    #[serde(flatten)]
    pub params: SearchParameters,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MultiSearchRequest {
    pub searches: Vec<MultiSearchEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MultiSearchResponse<T = serde_json::Value> {
    pub results: Vec<SearchResponse<T>>,
}
