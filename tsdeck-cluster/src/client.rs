use crate::config::ClientConfig;
use crate::executor::{encode_body, RequestExecutor};
use crate::node::NodePool;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tsdeck::{
    CollectionSchema, ConsoleError, DeletedCollection, DeletedDocument, HealthStatus,
    ImportAction, ImportResult, MultiSearchEntry, MultiSearchRequest, MultiSearchResponse,
    Result, SearchParameters, SearchResponse, SearchService,
};

/// Typed operations on a Typesense cluster.
///
/// Everything except [`import_documents`](Self::import_documents) goes through
/// the [`RequestExecutor`] and so retries across nodes.
#[derive(Debug)]
pub struct TypesenseClient {
    executor: RequestExecutor,
}

fn segment(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

fn documents_path(collection: &str) -> String {
    format!("collections/{}/documents", segment(collection))
}

fn document_path(collection: &str, id: &str) -> String {
    format!("{}/{}", documents_path(collection), segment(id))
}

impl TypesenseClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(TypesenseClient {
            executor: RequestExecutor::new(config)?,
        })
    }

    /// Build a client and check `GET /health` before handing it out.
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let client = Self::new(config)?;
        let health = client.health().await?;
        if !health.ok {
            let node = client.pool().current();
            tracing::warn!("[CONNECT {}] health check reported not ok", node);
            return Err(ConsoleError::Transport {
                url: node.url_for("health"),
                message: "service reported unhealthy".to_string(),
            });
        }
        tracing::info!(
            "[CONNECT {}] connected ({} nodes)",
            client.pool().current(),
            client.pool().len()
        );
        Ok(client)
    }

    pub fn pool(&self) -> &NodePool {
        self.executor.pool()
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        self.executor.execute(Method::GET, "health", None).await
    }

    // ── collections ─────────────────────────────────────────────────────

    pub async fn create_collection(&self, schema: &CollectionSchema) -> Result<CollectionSchema> {
        self.executor
            .execute(Method::POST, "collections", Some(encode_body(schema)?))
            .await
    }

    pub async fn get_collection(&self, name: &str) -> Result<CollectionSchema> {
        let path = format!("collections/{}", segment(name));
        self.executor.execute(Method::GET, &path, None).await
    }

    pub async fn list_collections(&self) -> Result<Vec<CollectionSchema>> {
        self.executor.execute(Method::GET, "collections", None).await
    }

    pub async fn delete_collection(&self, name: &str) -> Result<DeletedCollection> {
        let path = format!("collections/{}", segment(name));
        self.executor.execute(Method::DELETE, &path, None).await
    }

    // ── documents ───────────────────────────────────────────────────────

    /// Create one document. A retried attempt may create it twice if the first
    /// reached the service but its response was lost.
    pub async fn index_document<D>(&self, collection: &str, document: &D) -> Result<D>
    where
        D: Serialize + DeserializeOwned,
    {
        self.executor
            .execute(
                Method::POST,
                &documents_path(collection),
                Some(encode_body(document)?),
            )
            .await
    }

    pub async fn get_document<D: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<D> {
        self.executor
            .execute(Method::GET, &document_path(collection, id), None)
            .await
    }

    /// Partial update: only the fields in `patch` change.
    pub async fn update_document<P: Serialize + ?Sized>(
        &self,
        collection: &str,
        id: &str,
        patch: &P,
    ) -> Result<Value> {
        self.executor
            .execute(
                Method::PATCH,
                &document_path(collection, id),
                Some(encode_body(patch)?),
            )
            .await
    }

    pub async fn delete_document(&self, collection: &str, id: &str) -> Result<DeletedDocument> {
        self.executor
            .execute(Method::DELETE, &document_path(collection, id), None)
            .await
    }

    /// Bulk import as newline-delimited JSON.
    ///
    /// Makes exactly one call to the current node. A transport failure or
    /// non-2xx status is returned at once, without retry or failover. Each
    /// non-blank response line becomes one [`ImportResult`].
    pub async fn import_documents<D: Serialize>(
        &self,
        collection: &str,
        documents: &[D],
        action: ImportAction,
    ) -> Result<Vec<ImportResult>> {
        let mut body = Vec::new();
        for (i, document) in documents.iter().enumerate() {
            if i > 0 {
                body.push(b'\n');
            }
            body.extend(encode_body(document)?);
        }

        let path = format!("{}/import?action={}", documents_path(collection), action);
        let response = self
            .executor
            .send_once(Method::POST, &path, "text/plain", body)
            .await?;

        if !response.status.is_success() {
            tracing::warn!(
                "[IMPORT {}] {} documents rejected with {}",
                collection,
                documents.len(),
                response.status
            );
            return Err(ConsoleError::Import {
                status: response.status.as_u16(),
                reason: response
                    .status
                    .canonical_reason()
                    .unwrap_or("Unknown")
                    .to_string(),
            });
        }

        let results = parse_import_response(&response.body)?;
        let failed = results.iter().filter(|r| !r.success).count();
        if failed > 0 {
            tracing::warn!(
                "[IMPORT {}] {} of {} documents failed",
                collection,
                failed,
                results.len()
            );
        }
        Ok(results)
    }

    // ── search ──────────────────────────────────────────────────────────

    pub async fn search<D: DeserializeOwned>(
        &self,
        collection: &str,
        params: &SearchParameters,
    ) -> Result<SearchResponse<D>> {
        let path = format!(
            "{}/search?{}",
            documents_path(collection),
            params.to_query_string()
        );
        self.executor.execute(Method::GET, &path, None).await
    }

    pub async fn multi_search<D: DeserializeOwned>(
        &self,
        searches: Vec<MultiSearchEntry>,
    ) -> Result<Vec<SearchResponse<D>>> {
        let body = encode_body(&MultiSearchRequest { searches })?;
        let response: MultiSearchResponse<D> = self
            .executor
            .execute(Method::POST, "multi_search", Some(body))
            .await?;
        Ok(response.results)
    }

    // ── operations ──────────────────────────────────────────────────────

    pub async fn stats(&self) -> Result<Value> {
        self.executor.execute(Method::GET, "stats.json", None).await
    }

    /// Raw `/metrics.json` body. Retries and fails over like every call
    /// except [`import_documents`](Self::import_documents).
    pub async fn metrics(&self) -> Result<String> {
        self.executor
            .execute_text(Method::GET, "metrics.json", None)
            .await
    }
}

fn parse_import_response(body: &str) -> Result<Vec<ImportResult>> {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str::<ImportResult>(line).map_err(|e| {
                ConsoleError::Decode(format!("Invalid import result line '{}': {}", line, e))
            })
        })
        .collect()
}

impl SearchService for TypesenseClient {
    async fn list_collections(&self) -> Result<Vec<CollectionSchema>> {
        TypesenseClient::list_collections(self).await
    }

    async fn get_collection(&self, name: &str) -> Result<CollectionSchema> {
        TypesenseClient::get_collection(self, name).await
    }

    async fn search(&self, collection: &str, params: &SearchParameters) -> Result<SearchResponse> {
        TypesenseClient::search::<Value>(self, collection, params).await
    }
}
