use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

/// GCE metadata server endpoint exposing the instance's machine type.
const METADATA_SERVER_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/machine-type";

const METADATA_FLAVOR_HEADER: &str = "Metadata-Flavor";
const METADATA_FLAVOR: &str = "Google";

/// Machine families whose instances carry GPUs/TPUs. Workloads on these run
/// large training/serving jobs where cold attribute caches hurt most, so
/// prefetch defaults to on for them.
const ACCELERATED_FAMILIES: [&str; 6] = ["a3", "a4", "ct5l", "ct5lp", "ct5p", "ct6e"];

#[derive(Debug, Error)]
pub(crate) enum FetchError {
    #[error("metadata request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status code: {0}")]
    Status(StatusCode),
}

/// Source of the instance's machine type.
///
/// The daemon never retries a fetch and treats any failure as "unknown
/// machine", so implementations should fail fast rather than block startup.
#[async_trait]
pub(crate) trait MachineTypeFetcher {
    async fn fetch(&self) -> Result<String, FetchError>;
}

/// Queries the local GCE metadata server.
pub(crate) struct MetadataServer {
    client: reqwest::Client,
    url: String,
}

impl MetadataServer {
    pub(crate) fn new() -> Self {
        Self::with_url(METADATA_SERVER_URL)
    }

    /// Points the fetcher at a non-default endpoint, for tests.
    pub(crate) fn with_url(url: impl Into<String>) -> Self {
        MetadataServer {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl MachineTypeFetcher for MetadataServer {
    async fn fetch(&self) -> Result<String, FetchError> {
        let response = self
            .client
            .get(&self.url)
            .header(METADATA_FLAVOR_HEADER, METADATA_FLAVOR)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(FetchError::Status(response.status()));
        }

        Ok(response.text().await?)
    }
}

/// Whether a raw machine type of the form
/// `projects/<num>/machineTypes/<family>-<shape>` belongs to one of the
/// [`ACCELERATED_FAMILIES`].
///
/// Empty or unparsable input is simply not accelerated, never an error.
pub(crate) fn is_accelerated_family(machine_type: &str) -> bool {
    let Some(rest) = machine_type.strip_prefix("projects/") else {
        return false;
    };
    let Some((project, machine)) = rest.split_once("/machineTypes/") else {
        return false;
    };
    if project.is_empty() || !project.bytes().all(|byte| byte.is_ascii_digit()) {
        return false;
    }

    match machine.split_once('-') {
        Some((family, _)) => ACCELERATED_FAMILIES.contains(&family),
        None => false,
    }
}

#[cfg(test)]
mod test {
    use rstest::rstest;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    use super::*;

    #[rstest]
    #[case::a3_gpu("projects/123/machineTypes/a3-highgpu-8g", true)]
    #[case::a4_gpu("projects/123/machineTypes/a4-highgpu-8g", true)]
    #[case::ct5lp_tpu("projects/1/machineTypes/ct5lp-hightpu-4t", true)]
    #[case::ct5l_tpu("projects/1/machineTypes/ct5l-hightpu-1t", true)]
    #[case::ct6e_tpu("projects/9/machineTypes/ct6e-standard-4t", true)]
    #[case::general_purpose("projects/123/machineTypes/n2-standard-4", false)]
    #[case::empty("", false)]
    #[case::family_without_shape("projects/123/machineTypes/a3", false)]
    #[case::family_prefix_only("projects/123/machineTypes/a3x-foo", false)]
    #[case::non_numeric_project("projects/abc/machineTypes/a3-highgpu-8g", false)]
    #[case::missing_prefix("a3-highgpu-8g", false)]
    fn accelerated_family_classification(#[case] machine_type: &str, #[case] expected: bool) {
        assert_eq!(is_accelerated_family(machine_type), expected);
    }

    /// One-shot HTTP server speaking just enough of the protocol for the
    /// metadata fetcher.
    async fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind test listener");
        let addr = listener.local_addr().expect("failed to read local addr");

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept failed");
            let mut request = vec![0; 1024];
            let _ = stream.read(&mut request).await;
            stream
                .write_all(response.as_bytes())
                .await
                .expect("write failed");
        });

        format!("http://{addr}")
    }

    #[tokio::test]
    async fn fetches_machine_type_body() {
        let url = serve_once(
            "HTTP/1.1 200 OK\r\ncontent-length: 39\r\n\r\nprojects/123/machineTypes/a3-highgpu-8g",
        )
        .await;

        let machine_type = MetadataServer::with_url(url)
            .fetch()
            .await
            .expect("fetch should succeed");
        assert_eq!(machine_type, "projects/123/machineTypes/a3-highgpu-8g");
    }

    #[tokio::test]
    async fn non_ok_status_is_an_error() {
        let url = serve_once("HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\n\r\n").await;

        let error = MetadataServer::with_url(url)
            .fetch()
            .await
            .expect_err("fetch should fail");
        assert!(
            matches!(&error, FetchError::Status(status) if *status == StatusCode::NOT_FOUND)
        );
    }

    #[tokio::test]
    async fn unreachable_server_is_an_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind test listener");
        let addr = listener.local_addr().expect("failed to read local addr");
        drop(listener);

        let error = MetadataServer::with_url(format!("http://{addr}"))
            .fetch()
            .await
            .expect_err("fetch should fail");
        assert!(matches!(error, FetchError::Transport(_)));
    }
}
