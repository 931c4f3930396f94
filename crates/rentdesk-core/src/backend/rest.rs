//! PostgREST client for the back-office tables.

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, CONTENT_RANGE};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::BackendConfig;
use crate::models::{DateRange, Record, RecordId};
use crate::sync::PollSource;
use crate::util::{normalize_text_option, parse_api_error};
use crate::view::SnapshotSource;
use crate::{Error, Result};

/// Filters, ordering and paging for a row select.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowQuery {
    columns: Option<String>,
    filters: Vec<(String, String)>,
    order: Option<String>,
    limit: Option<usize>,
}

impl RowQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the returned columns. Defaults to `*`.
    #[must_use]
    pub fn columns(mut self, columns: impl Into<String>) -> Self {
        self.columns = Some(columns.into());
        self
    }

    /// Add a raw PostgREST filter such as `("status", "eq.pending")`.
    #[must_use]
    pub fn filter(mut self, column: impl Into<String>, condition: impl Into<String>) -> Self {
        self.filters.push((column.into(), condition.into()));
        self
    }

    #[must_use]
    pub fn id_eq(self, id: RecordId) -> Self {
        self.filter("id", format!("eq.{id}"))
    }

    #[must_use]
    pub fn created_after(self, after: DateTime<Utc>) -> Self {
        self.filter("created_at", format!("gt.{}", format_timestamp(after)))
    }

    #[must_use]
    pub fn in_range(mut self, range: DateRange) -> Self {
        if let Some(from) = range.from {
            self = self.filter("created_at", format!("gte.{}", format_timestamp(from)));
        }
        if let Some(to) = range.to {
            self = self.filter("created_at", format!("lte.{}", format_timestamp(to)));
        }
        self
    }

    #[must_use]
    pub fn unread_only(self) -> Self {
        self.filter("is_read", "eq.false")
    }

    #[must_use]
    pub fn newest_first(mut self) -> Self {
        self.order = Some("created_at.desc".to_string());
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Query-string pairs in the order PostgREST receives them.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![(
            "select".to_string(),
            self.columns.clone().unwrap_or_else(|| "*".to_string()),
        )];
        pairs.extend(self.filters.iter().cloned());
        if let Some(order) = &self.order {
            pairs.push(("order".to_string(), order.clone()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        pairs
    }
}

/// HTTP client for `/rest/v1`.
///
/// Requests carry the anon key as `apikey`; the bearer is the signed-in
/// user's access token when one is set, else the anon key.
#[derive(Clone)]
pub struct SupabaseRestClient {
    rest_url: String,
    anon_key: String,
    access_token: Option<String>,
    client: Client,
}

impl SupabaseRestClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        Ok(Self {
            rest_url: config.rest_url(),
            anon_key: config.supabase_anon_key.clone(),
            access_token: None,
            client: Client::builder().build()?,
        })
    }

    #[must_use]
    pub fn with_access_token(mut self, access_token: Option<String>) -> Self {
        self.access_token = normalize_text_option(access_token);
        self
    }

    pub fn rest_url(&self) -> &str {
        &self.rest_url
    }

    pub async fn select<R: DeserializeOwned>(
        &self,
        table: &str,
        query: &RowQuery,
    ) -> Result<Vec<R>> {
        let request = self.request(Method::GET, table).query(&query.to_pairs());
        let response = send_checked(request).await?;
        Ok(response.json::<Vec<R>>().await?)
    }

    /// Rows created within `range`, newest first.
    pub async fn fetch_all<R: DeserializeOwned>(
        &self,
        table: &str,
        range: DateRange,
    ) -> Result<Vec<R>> {
        let query = RowQuery::new().in_range(range).newest_first();
        self.select(table, &query).await
    }

    /// Rows created strictly after `after`, newest first.
    pub async fn created_after<R: DeserializeOwned>(
        &self,
        table: &str,
        after: DateTime<Utc>,
    ) -> Result<Vec<R>> {
        let query = RowQuery::new().created_after(after).newest_first();
        self.select(table, &query).await
    }

    pub async fn fetch_one<R: DeserializeOwned>(&self, table: &str, id: RecordId) -> Result<R> {
        let query = RowQuery::new().id_eq(id).limit(1);
        self.select::<R>(table, &query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("{table}/{id}")))
    }

    /// Patch one row and return it as stored.
    pub async fn patch<R: DeserializeOwned>(
        &self,
        table: &str,
        id: RecordId,
        changes: &Value,
    ) -> Result<R> {
        let request = self
            .request(Method::PATCH, table)
            .query(&id_filter(id))
            .header("Prefer", "return=representation")
            .json(changes);
        let response = send_checked(request).await?;
        response
            .json::<Vec<R>>()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("{table}/{id}")))
    }

    /// Clear the unread marker of a row.
    pub async fn mark_processed<R: DeserializeOwned>(
        &self,
        table: &str,
        id: RecordId,
    ) -> Result<R> {
        self.patch(table, id, &serde_json::json!({ "is_read": true }))
            .await
    }

    pub async fn update_status<R: DeserializeOwned>(
        &self,
        table: &str,
        id: RecordId,
        status: &str,
    ) -> Result<R> {
        let status = normalize_text_option(Some(status.to_string()))
            .ok_or_else(|| Error::InvalidInput("status must not be empty".to_string()))?;
        self.patch(table, id, &serde_json::json!({ "status": status }))
            .await
    }

    pub async fn delete(&self, table: &str, id: RecordId) -> Result<()> {
        let request = self
            .request(Method::DELETE, table)
            .query(&id_filter(id))
            .header("Prefer", "return=representation");
        let response = send_checked(request).await?;
        let deleted = response.json::<Vec<Value>>().await?;
        if deleted.is_empty() {
            return Err(Error::NotFound(format!("{table}/{id}")));
        }
        tracing::debug!("Deleted {}/{}", table, id);
        Ok(())
    }

    /// Server-side count of rows whose `is_read` is false.
    pub async fn count_unread(&self, table: &str) -> Result<usize> {
        let query = RowQuery::new().columns("id").unread_only().limit(1);
        let request = self
            .request(Method::GET, table)
            .query(&query.to_pairs())
            .header("Prefer", "count=exact");
        let response = send_checked(request).await?;
        parse_total_count(response.headers())
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        self.client
            .request(method, format!("{}/{}", self.rest_url, table))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
            .header("Accept", "application/json")
    }
}

impl std::fmt::Debug for SupabaseRestClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SupabaseRestClient")
            .field("rest_url", &self.rest_url)
            .field("anon_key", &"[REDACTED]")
            .field("authenticated", &self.access_token.is_some())
            .finish_non_exhaustive()
    }
}

impl<R> PollSource<R> for SupabaseRestClient
where
    R: Record + DeserializeOwned,
{
    async fn created_after(&self, collection: &str, after: DateTime<Utc>) -> Result<Vec<R>> {
        Self::created_after(self, collection, after).await
    }
}

impl<R> SnapshotSource<R> for SupabaseRestClient
where
    R: Record + DeserializeOwned,
{
    async fn fetch_all(&self, collection: &str, range: DateRange) -> Result<Vec<R>> {
        Self::fetch_all(self, collection, range).await
    }
}

async fn send_checked(request: RequestBuilder) -> Result<Response> {
    let response = request.send().await?;
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Api(parse_api_error(status, &body)));
    }
    Ok(response)
}

fn id_filter(id: RecordId) -> [(&'static str, String); 1] {
    [("id", format!("eq.{id}"))]
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Total from a `Content-Range` header such as `0-24/3573` or `*/0`.
fn parse_total_count(headers: &HeaderMap) -> Result<usize> {
    let raw = headers
        .get(CONTENT_RANGE)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| Error::Api("count response had no Content-Range header".to_string()))?;
    raw.rsplit_once('/')
        .and_then(|(_, total)| total.trim().parse::<usize>().ok())
        .ok_or_else(|| Error::Api(format!("unexpected Content-Range '{raw}'")))
}
