use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::{Client, ClientBuilder, Response};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::MirrorOptions;
use crate::error::{FetchError, MirrorError, ResourceError};
use crate::file_manager::FileManager;
use crate::html_parser::ResourceRef;
use crate::progress::{NoProgress, ProgressReporter};

/// The HTTP side of mirroring: plain GETs, text for the page and raw bytes
/// for everything it references. Non-2xx answers are errors.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn fetch_text(&self, url: &Url) -> Result<String, FetchError>;
    async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>, FetchError>;
}

/// [`HttpFetcher`] backed by a shared reqwest client.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new(options: &MirrorOptions) -> reqwest::Result<Self> {
        let client = ClientBuilder::new()
            .use_rustls_tls()
            .user_agent(options.user_agent.as_str())
            .timeout(Duration::from_secs(options.timeout_secs))
            .build()?;

        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    async fn get(&self, url: &Url) -> Result<Response, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::transport(url, e))?;

        let status = response.status();
        debug!(%url, %status, "response received");
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.clone(),
                status,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn fetch_text(&self, url: &Url) -> Result<String, FetchError> {
        self.get(url)
            .await?
            .text()
            .await
            .map_err(|e| FetchError::transport(url, e))
    }

    async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let bytes = self
            .get(url)
            .await?
            .bytes()
            .await
            .map_err(|e| FetchError::transport(url, e))?;
        Ok(bytes.to_vec())
    }
}

/// How one resource download ended. `result` carries the number of bytes
/// written on success.
#[derive(Debug)]
pub struct DownloadOutcome {
    pub resource: ResourceRef,
    pub result: Result<usize, ResourceError>,
}

impl DownloadOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Downloads a page's resources concurrently into its resources directory.
///
/// At most `max_concurrent` requests are in flight at once. A failed download
/// never stops its siblings; every resource gets an outcome.
pub struct ResourceDownloader<'a> {
    fetcher: &'a dyn HttpFetcher,
    file_manager: FileManager,
    semaphore: Semaphore,
    max_concurrent: usize,
    progress: &'a dyn ProgressReporter,
}

impl<'a> ResourceDownloader<'a> {
    pub fn new(fetcher: &'a dyn HttpFetcher, file_manager: FileManager, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            fetcher,
            file_manager,
            semaphore: Semaphore::new(max_concurrent),
            max_concurrent,
            progress: &NoProgress,
        }
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// Creates the resources directory, then downloads every distinct URL in
    /// `resources` and waits for all of them to settle. Outcomes come back in
    /// the order the resources were given.
    pub async fn run(&self, resources: &[ResourceRef]) -> Result<Vec<DownloadOutcome>, MirrorError> {
        self.file_manager
            .create_base_dir()
            .await
            .map_err(|source| MirrorError::Write {
                path: self.file_manager.base_dir().to_path_buf(),
                source,
            })?;

        let mut seen = HashSet::new();
        let unique: Vec<&ResourceRef> = resources
            .iter()
            .filter(|resource| seen.insert(resource.url.clone()))
            .collect();

        info!(
            resources = unique.len(),
            max_concurrent = self.max_concurrent,
            dir = %self.file_manager.base_dir().display(),
            "downloading resources"
        );
        self.progress.start(unique.len());

        let outcomes = join_all(unique.into_iter().map(|resource| self.download_one(resource))).await;

        self.progress.finish();
        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        info!(total = outcomes.len(), failed, "resource downloads settled");

        Ok(outcomes)
    }

    async fn download_one(&self, resource: &ResourceRef) -> DownloadOutcome {
        let _permit = self.semaphore.acquire().await;
        self.progress.resource_started(&resource.url);

        let result = self.fetch_and_save(resource).await;
        match &result {
            Ok(bytes) => debug!(url = %resource.url, file = %resource.local_file_name, bytes, "resource saved"),
            Err(e) => warn!(url = %resource.url, error = %e, "resource download failed"),
        }

        let outcome = DownloadOutcome {
            resource: resource.clone(),
            result,
        };
        self.progress.resource_finished(&outcome);
        outcome
    }

    async fn fetch_and_save(&self, resource: &ResourceRef) -> Result<usize, ResourceError> {
        let content = self.fetcher.fetch_bytes(&resource.url).await?;

        self.file_manager
            .save_file(&resource.local_file_name, &content)
            .await
            .map_err(|source| ResourceError::Write {
                path: self.file_manager.path_for(&resource.local_file_name),
                source,
            })?;

        Ok(content.len())
    }
}
