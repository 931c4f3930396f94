//! Supabase storage bucket for fleet images.

use reqwest::Client;
use uuid::Uuid;

use crate::config::BackendConfig;
use crate::models::RecordId;
use crate::util::parse_api_error;
use crate::{Error, Result};

#[derive(Clone)]
pub struct SupabaseStorage {
    storage_url: String,
    bucket: String,
    anon_key: String,
    access_token: Option<String>,
    client: Client,
}

impl SupabaseStorage {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        Ok(Self {
            storage_url: config.storage_url(),
            bucket: config.storage_bucket.clone(),
            anon_key: config.supabase_anon_key.clone(),
            access_token: None,
            client: Client::builder().build()?,
        })
    }

    /// Uploads need an authenticated operator under the usual bucket policies.
    #[must_use]
    pub fn with_access_token(mut self, access_token: Option<String>) -> Self {
        self.access_token = access_token;
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Upload bytes, replacing any object already at `object_key`.
    pub async fn upload(
        &self,
        object_key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<()> {
        let object_key = normalize_object_key(object_key)?;
        let mut request = self
            .authorized(self.client.post(self.object_url(&object_key)))
            .header("x-upsert", "true")
            .body(bytes);
        if let Some(content_type) = normalize_content_type(content_type) {
            request = request.header(reqwest::header::CONTENT_TYPE, content_type);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = parse_api_error(status, &body);
            return Err(storage_error("upload", &self.bucket, &object_key, &message));
        }
        tracing::debug!("Uploaded {}/{}", self.bucket, object_key);
        Ok(())
    }

    pub async fn remove(&self, object_key: &str) -> Result<()> {
        let object_key = normalize_object_key(object_key)?;
        let request = self
            .authorized(
                self.client
                    .delete(format!("{}/object/{}", self.storage_url, self.bucket)),
            )
            .json(&serde_json::json!({ "prefixes": [object_key] }));

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = parse_api_error(status, &body);
            return Err(storage_error("remove", &self.bucket, &object_key, &message));
        }
        Ok(())
    }

    /// Key for an image attached to a record, unique per upload.
    pub fn build_image_key(
        &self,
        prefix: &str,
        record_id: RecordId,
        file_name: &str,
    ) -> Result<String> {
        let prefix = sanitize_token(prefix);
        if prefix.is_empty() {
            return Err(Error::InvalidInput("image key prefix cannot be empty".to_string()));
        }
        let file_name = sanitize_file_name(file_name);
        let id = Uuid::now_v7();
        Ok(format!("{prefix}/{record_id}/{id}-{file_name}"))
    }

    /// Public URL of an object in a public bucket.
    pub fn public_object_url(&self, object_key: &str) -> Option<String> {
        let key = object_key.trim().trim_matches('/');
        if key.is_empty() {
            return None;
        }
        Some(format!(
            "{}/object/public/{}/{}",
            self.storage_url,
            self.bucket,
            encode_key(key)
        ))
    }

    fn object_url(&self, object_key: &str) -> String {
        format!(
            "{}/object/{}/{}",
            self.storage_url,
            self.bucket,
            encode_key(object_key)
        )
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        request.header("apikey", &self.anon_key).bearer_auth(bearer)
    }
}

impl std::fmt::Debug for SupabaseStorage {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SupabaseStorage")
            .field("storage_url", &self.storage_url)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

/// Percent-encode each path segment, keeping the separators.
fn encode_key(object_key: &str) -> String {
    object_key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn storage_error(operation: &str, bucket: &str, object_key: &str, message: &str) -> Error {
    Error::Storage(format!("{operation} failed for {bucket}/{object_key}: {message}"))
}

fn normalize_object_key(object_key: &str) -> Result<String> {
    let object_key = object_key.trim().trim_matches('/').to_string();
    if object_key.is_empty() {
        return Err(Error::InvalidInput("object key cannot be empty".to_string()));
    }
    Ok(object_key)
}

fn normalize_content_type(content_type: Option<&str>) -> Option<String> {
    content_type
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn sanitize_file_name(file_name: &str) -> String {
    let trimmed = file_name.trim().trim_matches('/');
    let trimmed = trimmed.rsplit('/').next().unwrap_or(trimmed);
    let (stem, ext) = trimmed.rsplit_once('.').unwrap_or((trimmed, ""));

    let stem = sanitize_token(stem);
    let stem = if stem.is_empty() { "image".to_string() } else { stem };
    let ext = sanitize_token(ext);
    if ext.is_empty() {
        stem
    } else {
        format!("{stem}.{ext}")
    }
}

/// Lowercase ASCII alphanumerics; every other run becomes one dash.
fn sanitize_token(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_dash = false;

    for ch in input.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }

    out.trim_matches('-').to_string()
}
