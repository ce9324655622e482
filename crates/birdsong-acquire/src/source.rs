use crate::http::{self, DownloadOptions, DownloadOutcome};
use anyhow::Result;
use async_trait::async_trait;
use birdsong_model::{ExtractError, RecordingRef};
use reqwest::{Client, StatusCode};
use std::path::Path;

/// Result of asking a provider for one page.
#[derive(Debug)]
pub enum FetchedPage<P> {
    Page(P),
    /// The provider answered with a non-success status. Ends this provider's run.
    Rejected(StatusCode),
}

/// A provider whose recordings are listed across numbered pages.
///
/// The download loop in [`fetch_and_save`] is written once against this trait;
/// implementations only know how to request, read, and page through their API.
#[async_trait]
pub trait PaginatedSource: Send + Sync {
    type Page: Send;

    /// Short provider name used in log fields.
    fn name(&self) -> &'static str;

    /// Request page `page` (1-based). Network and decode errors propagate.
    async fn fetch_page(&self, page: u32) -> Result<FetchedPage<Self::Page>>;

    /// Number of records the provider returned on this page.
    fn record_count(&self, page: &Self::Page) -> usize;

    /// One entry per file reference found on the page.
    fn extract_refs(&self, page: &Self::Page) -> Vec<Result<RecordingRef, ExtractError>>;

    /// Whether another page should be requested after `page_number`.
    fn has_more(&self, page: &Self::Page, page_number: u32) -> bool;

    /// Open target files with create-new semantics, re-checking existence at write time.
    fn rechecks_before_write(&self) -> bool {
        false
    }

    /// Log and skip recordings whose download answers with a non-success status.
    fn requires_download_success(&self) -> bool {
        false
    }
}

/// Counters for one provider run over one species.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub pages: u32,
    pub downloaded: usize,
    pub skipped_existing: usize,
    pub skipped_invalid: usize,
    pub failed: usize,
}

/// Walk every page of `source`, downloading each recording into `output_dir`
/// unless a file of the same name is already there.
pub async fn fetch_and_save<S: PaginatedSource>(
    source: &S,
    client: &Client,
    output_dir: &Path,
) -> Result<FetchSummary> {
    let provider = source.name();
    let options = DownloadOptions {
        create_new: source.rechecks_before_write(),
        require_success: source.requires_download_success(),
    };
    let mut summary = FetchSummary::default();
    let mut page_number = 1;

    loop {
        let page = match source.fetch_page(page_number).await? {
            FetchedPage::Page(page) => page,
            FetchedPage::Rejected(status) => {
                tracing::error!(provider, page = page_number, %status, "HTTP error fetching page, stopping");
                break;
            }
        };
        summary.pages += 1;

        let count = source.record_count(&page);
        if count == 0 {
            tracing::info!(provider, page = page_number, "No more results found");
            break;
        }
        tracing::debug!(provider, page = page_number, records = count, "Fetched page");

        for extracted in source.extract_refs(&page) {
            let recording = match extracted {
                Ok(recording) => recording,
                Err(e) => {
                    tracing::warn!(provider, page = page_number, error = %e, "Skipping record");
                    summary.skipped_invalid += 1;
                    continue;
                }
            };

            let filename = &recording.suggested_filename;
            let target = output_dir.join(filename);
            if target.exists() {
                tracing::info!(provider, file = %filename, "File already exists, skipping");
                summary.skipped_existing += 1;
                continue;
            }

            tracing::info!(provider, file = %filename, url = %recording.source_url, "Downloading");
            match http::download_to_file(client, &recording.source_url, &target, options).await? {
                DownloadOutcome::Written { bytes } => {
                    tracing::info!(provider, file = %filename, bytes, "Downloaded");
                    summary.downloaded += 1;
                }
                DownloadOutcome::AlreadyExists => {
                    tracing::info!(provider, file = %filename, "File already exists, skipping");
                    summary.skipped_existing += 1;
                }
                DownloadOutcome::Rejected(status) => {
                    tracing::error!(provider, file = %filename, %status, "Failed to download");
                    summary.failed += 1;
                }
            }
        }

        if !source.has_more(&page, page_number) {
            tracing::info!(provider, page = page_number, "Downloaded all available data");
            break;
        }
        page_number += 1;
    }

    tracing::info!(
        provider,
        pages = summary.pages,
        downloaded = summary.downloaded,
        skipped_existing = summary.skipped_existing,
        skipped_invalid = summary.skipped_invalid,
        failed = summary.failed,
        "Provider finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// In-memory source: each page is a list of (url, filename) pairs, with
    /// `None` standing in for a malformed record.
    struct ScriptedSource {
        pages: Vec<Vec<Option<(String, String)>>>,
        requested: Mutex<Vec<u32>>,
    }

    impl ScriptedSource {
        fn new(pages: Vec<Vec<Option<(String, String)>>>) -> Self {
            Self {
                pages,
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PaginatedSource for ScriptedSource {
        type Page = Vec<Option<(String, String)>>;

        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn fetch_page(&self, page: u32) -> Result<FetchedPage<Self::Page>> {
            self.requested.lock().unwrap().push(page);
            let records = self
                .pages
                .get(page as usize - 1)
                .cloned()
                .unwrap_or_default();
            Ok(FetchedPage::Page(records))
        }

        fn record_count(&self, page: &Self::Page) -> usize {
            page.len()
        }

        fn extract_refs(&self, page: &Self::Page) -> Vec<Result<RecordingRef, ExtractError>> {
            page.iter()
                .map(|record| {
                    let (url, name) = record
                        .clone()
                        .ok_or(ExtractError::MissingField("file_url"))?;
                    Ok(RecordingRef {
                        source_url: url,
                        suggested_filename: name,
                    })
                })
                .collect()
        }

        fn has_more(&self, _page: &Self::Page, page_number: u32) -> bool {
            (page_number as usize) < self.pages.len()
        }
    }

    async fn audio_server(names: &[&str]) -> MockServer {
        let server = MockServer::start().await;
        for name in names {
            Mock::given(method("GET"))
                .and(path(format!("/{name}")))
                .respond_with(ResponseTemplate::new(200).set_body_string(format!("audio:{name}")))
                .mount(&server)
                .await;
        }
        server
    }

    fn record(server: &MockServer, name: &str) -> Option<(String, String)> {
        Some((format!("{}/{name}", server.uri()), name.to_string()))
    }

    #[tokio::test]
    async fn test_invalid_records_are_skipped_not_fatal() {
        let server = audio_server(&["a.mp3", "b.mp3"]).await;
        let source = ScriptedSource::new(vec![vec![
            record(&server, "a.mp3"),
            None,
            record(&server, "b.mp3"),
        ]]);
        let dir = tempfile::tempdir().unwrap();
        let client = http::build_client().unwrap();

        let summary = fetch_and_save(&source, &client, dir.path()).await.unwrap();

        assert_eq!(summary.downloaded, 2);
        assert_eq!(summary.skipped_invalid, 1);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("b.mp3")).unwrap(),
            "audio:b.mp3"
        );
    }

    #[tokio::test]
    async fn test_empty_page_stops_before_has_more() {
        let server = audio_server(&["a.mp3"]).await;
        let source = ScriptedSource::new(vec![
            vec![record(&server, "a.mp3")],
            vec![],
            vec![record(&server, "never.mp3")],
        ]);
        let dir = tempfile::tempdir().unwrap();
        let client = http::build_client().unwrap();

        let summary = fetch_and_save(&source, &client, dir.path()).await.unwrap();

        assert_eq!(*source.requested.lock().unwrap(), vec![1, 2]);
        assert_eq!(summary.pages, 2);
        assert_eq!(summary.downloaded, 1);
        assert!(!dir.path().join("never.mp3").exists());
    }

    #[tokio::test]
    async fn test_existing_file_is_not_requested() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/kept.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_string("fresh"))
            .expect(0)
            .mount(&server)
            .await;
        let source = ScriptedSource::new(vec![vec![record(&server, "kept.mp3")]]);
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("kept.mp3"), "original").unwrap();
        let client = http::build_client().unwrap();

        let summary = fetch_and_save(&source, &client, dir.path()).await.unwrap();

        assert_eq!(summary.skipped_existing, 1);
        assert_eq!(summary.downloaded, 0);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("kept.mp3")).unwrap(),
            "original"
        );
    }
}
