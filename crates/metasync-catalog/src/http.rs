//! HTTP catalog client (reqwest-based)
//!
//! Upserts are `PUT` against the collection endpoint, reads and deletes
//! address entities by name. Every call carries a bearer token from the
//! configured `TokenProvider`.

use crate::client::{CatalogClient, CatalogError, CuratedLookup, EntityKind, TokenProvider};
use crate::dto::{DatabaseDto, LineageRequest, SchemaDto, TableDto};
use async_trait::async_trait;
use metasync_core::CatalogEndpoints;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// `CatalogClient` over HTTP.
pub struct HttpCatalog {
    base_url: String,
    endpoints: CatalogEndpoints,
    token: Arc<dyn TokenProvider>,
    http: Client,
}

impl HttpCatalog {
    pub fn new(
        endpoints: CatalogEndpoints,
        token: Arc<dyn TokenProvider>,
    ) -> Result<Self, CatalogError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CatalogError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_http_client(endpoints, token, http))
    }

    /// Build against a pre-configured `reqwest::Client`.
    pub fn with_http_client(
        endpoints: CatalogEndpoints,
        token: Arc<dyn TokenProvider>,
        http: Client,
    ) -> Self {
        let base_url = endpoints.base_url.trim_end_matches('/').to_string();
        Self {
            base_url,
            endpoints,
            token,
            http,
        }
    }

    fn entity_path(&self, kind: EntityKind) -> &str {
        match kind {
            EntityKind::Database => &self.endpoints.database,
            EntityKind::Schema => &self.endpoints.schema,
            EntityKind::Table => &self.endpoints.table,
        }
    }

    fn url(&self, path: &str, suffix: &str) -> String {
        format!("{}{}{}", self.base_url, path, suffix)
    }

    async fn bearer(&self) -> Result<String, CatalogError> {
        self.token.access_token().await
    }

    async fn put_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<(), CatalogError> {
        let token = self.bearer().await?;
        let started = Instant::now();
        let response = self
            .http
            .put(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| CatalogError::Transport(e.to_string()))?;

        let status = response.status();
        debug!(
            %url,
            status = status.as_u16(),
            duration_ms = started.elapsed().as_millis() as u64,
            "catalog PUT"
        );
        Self::ensure_success(response).await
    }

    async fn get_by_name(&self, path: &str, fqn: &str, fields: Option<&str>) -> Result<Response, CatalogError> {
        let token = self.bearer().await?;
        let url = self.url(path, &format!("/name/{fqn}"));
        let mut request = self.http.get(&url).bearer_auth(token);
        if let Some(fields) = fields {
            request = request.query(&[("fields", fields)]);
        }
        let started = Instant::now();
        let response = request
            .send()
            .await
            .map_err(|e| CatalogError::Transport(e.to_string()))?;
        debug!(
            %url,
            status = response.status().as_u16(),
            duration_ms = started.elapsed().as_millis() as u64,
            "catalog GET"
        );
        Ok(response)
    }

    async fn ensure_success(response: Response) -> Result<(), CatalogError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(CatalogError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn json_body(response: Response) -> Result<serde_json::Value, CatalogError> {
        let body = response
            .text()
            .await
            .map_err(|e| CatalogError::Transport(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| CatalogError::InvalidResponse(e.to_string()))
    }

    /// Curated flag from a 2xx response body. An unparseable body or an
    /// absent flag means the entity exists but is not curated.
    fn curated_from_body(fqn: &str, body: &str) -> bool {
        match serde_json::from_str::<serde_json::Value>(body) {
            Ok(value) => match value.get("isProjectEntity") {
                Some(serde_json::Value::Bool(flag)) => *flag,
                Some(serde_json::Value::String(s)) => s.eq_ignore_ascii_case("true"),
                _ => {
                    warn!(%fqn, "curated flag missing from catalog response, treating as not curated");
                    false
                }
            },
            Err(_) => {
                warn!(%fqn, "unparseable catalog response, treating as not curated");
                false
            }
        }
    }
}

#[async_trait]
impl CatalogClient for HttpCatalog {
    async fn upsert_database(&self, dto: &DatabaseDto) -> Result<(), CatalogError> {
        self.put_json(&self.url(&self.endpoints.database, ""), dto)
            .await
    }

    async fn upsert_schema(&self, dto: &SchemaDto) -> Result<(), CatalogError> {
        self.put_json(&self.url(&self.endpoints.schema, ""), dto)
            .await
    }

    async fn upsert_table(&self, dto: &TableDto) -> Result<(), CatalogError> {
        self.put_json(&self.url(&self.endpoints.table, ""), dto)
            .await
    }

    async fn delete_entity(&self, kind: EntityKind, fqn: &str) -> Result<(), CatalogError> {
        let token = self.bearer().await?;
        let url = self.url(self.entity_path(kind), &format!("/name/{fqn}"));
        let started = Instant::now();
        let response = self
            .http
            .delete(&url)
            .bearer_auth(token)
            .query(&[("recursive", "true")])
            .send()
            .await
            .map_err(|e| CatalogError::Transport(e.to_string()))?;

        let status = response.status();
        debug!(
            %url,
            status = status.as_u16(),
            duration_ms = started.elapsed().as_millis() as u64,
            "catalog DELETE"
        );
        // Deleting an absent entity is a no-op, not a failure.
        if status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::ensure_success(response).await
    }

    async fn curated_flag(&self, fqn: &str) -> Result<CuratedLookup, CatalogError> {
        let response = self
            .get_by_name(&self.endpoints.table, fqn, Some("isProjectEntity"))
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(CuratedLookup::NotFound);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Status {
                status: status.as_u16(),
                body,
            });
        }

        // A failed body read is a transport error; only a body that reads
        // fine but does not parse degrades to "not curated".
        let body = response
            .text()
            .await
            .map_err(|e| CatalogError::Transport(e.to_string()))?;
        Ok(CuratedLookup::Flag(Self::curated_from_body(fqn, &body)))
    }

    async fn resolve_table_id(&self, fqn: &str) -> Result<Option<String>, CatalogError> {
        let response = self
            .get_by_name(&self.endpoints.table, fqn, Some("id"))
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let value = Self::json_body(response).await?;
        let id = value
            .get("id")
            .and_then(|id| id.as_str())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        Ok(id)
    }

    async fn push_lineage(&self, request: &LineageRequest) -> Result<(), CatalogError> {
        self.put_json(&self.url(&self.endpoints.lineage, ""), request)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::StaticTokenProvider;

    #[test]
    fn base_url_trailing_slash_is_stripped() {
        let endpoints = CatalogEndpoints {
            base_url: "https://catalog.internal/api/".to_string(),
            ..Default::default()
        };
        let catalog = HttpCatalog::with_http_client(
            endpoints,
            Arc::new(StaticTokenProvider::new("t")),
            Client::new(),
        );
        assert_eq!(
            catalog.url(&catalog.endpoints.table, "/name/a.b.c"),
            "https://catalog.internal/api/v1/tables/name/a.b.c"
        );
    }

    #[test]
    fn curated_flag_read_from_body() {
        let fqn = "svc.db.public.t";
        assert!(HttpCatalog::curated_from_body(
            fqn,
            r#"{"isProjectEntity": true}"#
        ));
        assert!(HttpCatalog::curated_from_body(
            fqn,
            r#"{"isProjectEntity": "True"}"#
        ));
        assert!(!HttpCatalog::curated_from_body(
            fqn,
            r#"{"isProjectEntity": false}"#
        ));
        // Flag absent, or body not JSON at all: not curated.
        assert!(!HttpCatalog::curated_from_body(fqn, r#"{"id": "x"}"#));
        assert!(!HttpCatalog::curated_from_body(fqn, "<html>oops</html>"));
    }
}
