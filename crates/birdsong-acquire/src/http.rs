use anyhow::{Context, Result};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::path::Path;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Build the client shared by every request in a run.
///
/// No timeouts are set; reqwest defaults apply.
pub fn build_client() -> Result<Client> {
    let client = Client::builder()
        .user_agent(concat!(
            "birdsong/",
            env!("CARGO_PKG_VERSION"),
            " (bird recording fetcher)"
        ))
        .build()?;
    Ok(client)
}

/// Issue a GET with query parameters. Transport failures are errors, HTTP
/// status is left to the caller.
pub async fn get(client: &Client, url: &str, query: &[(&str, &str)]) -> Result<Response> {
    client
        .get(url)
        .query(query)
        .send()
        .await
        .with_context(|| format!("Failed to fetch {url}"))
}

/// Read a response body and decode it as JSON.
pub async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let url = response.url().to_string();
    let body = response
        .text()
        .await
        .context("Failed to read response body")?;
    serde_json::from_str(&body).with_context(|| format!("Invalid JSON from {url}"))
}

/// How a single recording download should treat the target file and status.
#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadOptions {
    /// Open the target with create-new semantics so an existing file is never truncated.
    pub create_new: bool,
    /// Refuse to write the body of a non-2xx response.
    pub require_success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Written { bytes: u64 },
    /// The file appeared between the existence check and the create.
    AlreadyExists,
    Rejected(StatusCode),
}

/// Stream `url` into `path`, chunk by chunk.
///
/// If the body fails mid-stream the partial file is removed before the error
/// is returned, so the next run does not mistake it for a finished download.
pub async fn download_to_file(
    client: &Client,
    url: &str,
    path: &Path,
    options: DownloadOptions,
) -> Result<DownloadOutcome> {
    let mut response = get(client, url, &[]).await?;

    let status = response.status();
    if options.require_success && !status.is_success() {
        return Ok(DownloadOutcome::Rejected(status));
    }

    let mut open = OpenOptions::new();
    open.write(true);
    if options.create_new {
        open.create_new(true);
    } else {
        open.create(true).truncate(true);
    }
    let mut file = match open.open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            return Ok(DownloadOutcome::AlreadyExists);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to create {}", path.display()));
        }
    };

    let mut bytes = 0u64;
    let streamed = async {
        while let Some(chunk) = response.chunk().await.context("Failed to read download")? {
            file.write_all(&chunk).await?;
            bytes += chunk.len() as u64;
        }
        file.flush().await?;
        Ok::<(), anyhow::Error>(())
    }
    .await;

    if let Err(e) = streamed {
        drop(file);
        if let Err(remove_err) = fs::remove_file(path).await {
            tracing::warn!(path = %path.display(), error = %remove_err, "Could not remove partial download");
        }
        return Err(e);
    }

    Ok(DownloadOutcome::Written { bytes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn serve(path_str: &str, template: ResponseTemplate) -> (MockServer, String) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(path_str))
            .respond_with(template)
            .mount(&server)
            .await;
        let url = format!("{}{}", server.uri(), path_str);
        (server, url)
    }

    #[tokio::test]
    async fn test_download_writes_body_verbatim() {
        let (_server, url) = serve(
            "/sounds/1.mp3",
            ResponseTemplate::new(200).set_body_bytes(b"ID3audio".to_vec()),
        )
        .await;
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("1.mp3");

        let client = build_client().unwrap();
        let outcome = download_to_file(&client, &url, &target, DownloadOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome, DownloadOutcome::Written { bytes: 8 });
        assert_eq!(std::fs::read(&target).unwrap(), b"ID3audio");
    }

    #[tokio::test]
    async fn test_download_rejects_error_status_when_required() {
        let (_server, url) = serve("/missing.mp3", ResponseTemplate::new(404)).await;
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing.mp3");

        let client = build_client().unwrap();
        let options = DownloadOptions {
            require_success: true,
            ..Default::default()
        };
        let outcome = download_to_file(&client, &url, &target, options).await.unwrap();

        assert_eq!(outcome, DownloadOutcome::Rejected(StatusCode::NOT_FOUND));
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_download_create_new_leaves_existing_file() {
        let (_server, url) = serve(
            "/2.mp3",
            ResponseTemplate::new(200).set_body_bytes(b"new".to_vec()),
        )
        .await;
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("2.mp3");
        std::fs::write(&target, b"old").unwrap();

        let client = build_client().unwrap();
        let options = DownloadOptions {
            create_new: true,
            ..Default::default()
        };
        let outcome = download_to_file(&client, &url, &target, options).await.unwrap();

        assert_eq!(outcome, DownloadOutcome::AlreadyExists);
        assert_eq!(std::fs::read(&target).unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_decode_json_reports_invalid_body() {
        let (_server, url) = serve(
            "/v1/taxa",
            ResponseTemplate::new(200).set_body_string("<html>oops</html>"),
        )
        .await;
        let client = build_client().unwrap();
        let response = get(&client, &url, &[]).await.unwrap();
        let result: Result<serde_json::Value> = decode_json(response).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_truncated_body_removes_partial_file() {
        use tokio::io::AsyncReadExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            // Promise 100 bytes, send 5, then hang up.
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nhello")
                .await
                .unwrap();
        });

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("cut.mp3");
        let client = build_client().unwrap();
        let result = download_to_file(
            &client,
            &format!("http://{addr}/cut.mp3"),
            &target,
            DownloadOptions::default(),
        )
        .await;

        assert!(result.is_err());
        assert!(!target.exists());
    }
}
