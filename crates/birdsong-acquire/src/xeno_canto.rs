use crate::http;
use crate::source::{FetchedPage, PaginatedSource};
use anyhow::Result;
use async_trait::async_trait;
use birdsong_model::sanitize::safe_filename;
use birdsong_model::{ExtractError, RecordingRef};
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::path::Path;

const DEFAULT_EXTENSION: &str = "mp3";

/// One page of `/api/3/recordings`.
#[derive(Debug, Deserialize)]
pub struct RecordingPage {
    #[serde(default)]
    recordings: Vec<Value>,
    #[serde(rename = "numPages", default, deserialize_with = "count_from_number_or_string")]
    num_pages: u32,
}

/// xeno-canto has reported its counters both as JSON numbers and as strings.
fn count_from_number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(u32),
        Text(String),
    }

    match Count::deserialize(deserializer)? {
        Count::Number(n) => Ok(n),
        Count::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Recordings of one species, queried by scientific name.
pub struct RecordingSource {
    client: Client,
    base_url: String,
    species: String,
    api_key: String,
}

impl RecordingSource {
    pub fn new(client: Client, base_url: &str, species: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            species: species.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl PaginatedSource for RecordingSource {
    type Page = RecordingPage;

    fn name(&self) -> &'static str {
        "xeno-canto"
    }

    async fn fetch_page(&self, page: u32) -> Result<FetchedPage<RecordingPage>> {
        let url = format!("{}/api/3/recordings", self.base_url);
        let query = format!("sp:\"{}\"", self.species);
        let page = page.to_string();
        let response = http::get(
            &self.client,
            &url,
            &[
                ("query", query.as_str()),
                ("key", self.api_key.as_str()),
                ("page", page.as_str()),
            ],
        )
        .await?;

        let status = response.status();
        if !status.is_success() {
            return Ok(FetchedPage::Rejected(status));
        }
        Ok(FetchedPage::Page(http::decode_json(response).await?))
    }

    fn record_count(&self, page: &RecordingPage) -> usize {
        page.recordings.len()
    }

    fn extract_refs(&self, page: &RecordingPage) -> Vec<Result<RecordingRef, ExtractError>> {
        page.recordings.iter().map(recording_ref).collect()
    }

    fn has_more(&self, page: &RecordingPage, page_number: u32) -> bool {
        page_number < page.num_pages
    }

    fn rechecks_before_write(&self) -> bool {
        true
    }

    fn requires_download_success(&self) -> bool {
        true
    }
}

/// Name a recording `XC{id}.{ext}`, taking the extension from the
/// provider's `file-name` when it has one.
fn recording_ref(recording: &Value) -> Result<RecordingRef, ExtractError> {
    let id = match recording.get("id") {
        None | Some(Value::Null) => return Err(ExtractError::MissingField("id")),
        Some(Value::String(id)) if !id.trim().is_empty() => id.trim().to_string(),
        Some(Value::String(_)) => return Err(ExtractError::MissingField("id")),
        Some(Value::Number(id)) => id.to_string(),
        Some(_) => {
            return Err(ExtractError::WrongType {
                field: "id",
                expected: "string or number",
            })
        }
    };

    let url = match recording.get("file") {
        None | Some(Value::Null) => return Err(ExtractError::MissingField("file")),
        Some(Value::String(url)) if url.is_empty() => return Err(ExtractError::MissingField("file")),
        Some(Value::String(url)) => url.clone(),
        Some(_) => {
            return Err(ExtractError::WrongType {
                field: "file",
                expected: "string",
            })
        }
    };

    let extension = recording
        .get("file-name")
        .and_then(Value::as_str)
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .unwrap_or(DEFAULT_EXTENSION);

    Ok(RecordingRef {
        source_url: url,
        suggested_filename: safe_filename(&format!("XC{id}.{extension}")),
    })
}
