use crate::http;
use crate::source::{FetchedPage, PaginatedSource};
use anyhow::Result;
use async_trait::async_trait;
use birdsong_model::sanitize::safe_filename;
use birdsong_model::{ExtractError, RecordingRef, Species};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("no species-rank taxon matches '{0}'")]
    NoMatch(String),

    #[error("taxon {id} for '{query}' has no preferred common name")]
    MissingCommonName { query: String, id: u64 },
}

#[derive(Debug, Deserialize)]
struct TaxaResponse {
    #[serde(default)]
    results: Vec<Taxon>,
}

#[derive(Debug, Deserialize)]
struct Taxon {
    id: u64,
    name: Option<String>,
    preferred_common_name: Option<String>,
}

/// Look up a scientific name and take the first species-rank match.
///
/// There is no disambiguation: the first result wins. An empty result list
/// is an error, as is a match without a common name (the output folder is
/// named after it).
pub async fn resolve_species(client: &Client, base_url: &str, scientific_name: &str) -> Result<Species> {
    let url = format!("{base_url}/v1/taxa");
    tracing::info!(species = %scientific_name, "Resolving species");
    let response = http::get(client, &url, &[("q", scientific_name), ("rank", "species")]).await?;
    let taxa: TaxaResponse = http::decode_json(response).await?;

    let taxon = taxa
        .results
        .into_iter()
        .next()
        .ok_or_else(|| LookupError::NoMatch(scientific_name.to_string()))?;
    let common_name = taxon
        .preferred_common_name
        .ok_or_else(|| LookupError::MissingCommonName {
            query: scientific_name.to_string(),
            id: taxon.id,
        })?;

    let species = Species {
        scientific_name: taxon.name.unwrap_or_else(|| scientific_name.to_string()),
        common_name,
        external_id: taxon.id.to_string(),
    };
    tracing::info!(
        species = %species.scientific_name,
        common_name = %species.common_name,
        taxon_id = %species.external_id,
        "Resolved species"
    );
    Ok(species)
}

/// One page of `/v1/observations`. Records stay as raw JSON so a single
/// malformed observation cannot fail the whole page.
#[derive(Debug, Deserialize)]
pub struct ObservationPage {
    results: Option<Vec<Value>>,
}

impl ObservationPage {
    fn results(&self) -> &[Value] {
        self.results.as_deref().unwrap_or_default()
    }
}

/// Observations of one taxon that carry sound recordings.
pub struct ObservationSource {
    client: Client,
    base_url: String,
    taxon_id: String,
    per_page: u32,
}

impl ObservationSource {
    pub fn new(client: Client, base_url: &str, taxon_id: &str, per_page: u32) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            taxon_id: taxon_id.to_string(),
            per_page,
        }
    }
}

#[async_trait]
impl PaginatedSource for ObservationSource {
    type Page = ObservationPage;

    fn name(&self) -> &'static str {
        "inaturalist"
    }

    async fn fetch_page(&self, page: u32) -> Result<FetchedPage<ObservationPage>> {
        let url = format!("{}/v1/observations", self.base_url);
        let per_page = self.per_page.to_string();
        let page = page.to_string();
        let response = http::get(
            &self.client,
            &url,
            &[
                ("taxon_id", self.taxon_id.as_str()),
                ("has[]", "sounds"),
                ("per_page", per_page.as_str()),
                ("page", page.as_str()),
            ],
        )
        .await?;
        Ok(FetchedPage::Page(http::decode_json(response).await?))
    }

    fn record_count(&self, page: &ObservationPage) -> usize {
        page.results().len()
    }

    fn extract_refs(&self, page: &ObservationPage) -> Vec<Result<RecordingRef, ExtractError>> {
        let mut refs = Vec::new();
        for observation in page.results() {
            match observation.get("sounds") {
                None | Some(Value::Null) => {}
                Some(Value::Array(sounds)) => refs.extend(sounds.iter().map(sound_ref)),
                Some(_) => refs.push(Err(ExtractError::WrongType {
                    field: "sounds",
                    expected: "array",
                })),
            }
        }
        refs
    }

    /// A short page means the last page.
    fn has_more(&self, page: &ObservationPage, _page_number: u32) -> bool {
        page.results().len() >= self.per_page as usize
    }
}

/// Turn one entry of an observation's `sounds` array into a download target,
/// named after the URL's last path segment.
fn sound_ref(sound: &Value) -> Result<RecordingRef, ExtractError> {
    let url = match sound.get("file_url") {
        None | Some(Value::Null) => return Err(ExtractError::MissingField("file_url")),
        Some(Value::String(url)) => url,
        Some(_) => {
            return Err(ExtractError::WrongType {
                field: "file_url",
                expected: "string",
            })
        }
    };

    let basename = url.rsplit('/').next().unwrap_or_default();
    let filename = safe_filename(basename);
    if filename.is_empty() {
        return Err(ExtractError::EmptyFilename(url.clone()));
    }
    Ok(RecordingRef {
        source_url: url.clone(),
        suggested_filename: filename,
    })
}
