//! Fetches one page, mirrors its same-origin resources and writes the
//! rewritten page next to them.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::{FailurePolicy, MirrorOptions};
use crate::downloader::{DownloadOutcome, HttpFetcher, ReqwestFetcher, ResourceDownloader};
use crate::error::{MirrorError, ResourceError, Result};
use crate::file_manager::{self, FileManager};
use crate::html_parser::{HtmlPage, HtmlParser, ResourceType};
use crate::naming;
use crate::progress::{NoProgress, ProgressReporter};

/// Where a mirroring run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MirrorStage {
    Start,
    MainFetched,
    ResourcesPrepared,
    ResourcesDownloaded,
    Written,
    Done,
    Failed,
}

impl fmt::Display for MirrorStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::MainFetched => "main-fetched",
            Self::ResourcesPrepared => "resources-prepared",
            Self::ResourcesDownloaded => "resources-downloaded",
            Self::Written => "written",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Per-resource line of a [`MirrorReport`].
#[derive(Debug, Clone, Serialize)]
pub struct ResourceSummary {
    pub url: Url,
    pub file: String,
    pub resource_type: ResourceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&DownloadOutcome> for ResourceSummary {
    fn from(outcome: &DownloadOutcome) -> Self {
        let (bytes, error) = match &outcome.result {
            Ok(bytes) => (Some(*bytes), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            url: outcome.resource.url.clone(),
            file: outcome.resource.local_path.clone(),
            resource_type: outcome.resource.resource_type,
            bytes,
            error,
        }
    }
}

/// What a finished run produced.
#[derive(Debug, Clone, Serialize)]
pub struct MirrorReport {
    pub page_url: Url,
    pub html_path: PathBuf,
    pub resources_dir: PathBuf,
    pub resources: Vec<ResourceSummary>,
}

impl MirrorReport {
    pub fn failed(&self) -> usize {
        self.resources.iter().filter(|r| r.error.is_some()).count()
    }
}

/// Mirrors single pages with a given HTTP fetcher and options.
pub struct PageMirror<F = ReqwestFetcher> {
    fetcher: F,
    options: MirrorOptions,
    progress: Box<dyn ProgressReporter>,
}

impl PageMirror<ReqwestFetcher> {
    pub fn new(options: MirrorOptions) -> Result<Self> {
        let fetcher = ReqwestFetcher::new(&options)?;
        Ok(Self::with_fetcher(fetcher, options))
    }
}

impl<F: HttpFetcher> PageMirror<F> {
    pub fn with_fetcher(fetcher: F, options: MirrorOptions) -> Self {
        Self {
            fetcher,
            options,
            progress: Box::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, progress: impl ProgressReporter + 'static) -> Self {
        self.progress = Box::new(progress);
        self
    }

    pub fn options(&self) -> &MirrorOptions {
        &self.options
    }

    /// Mirrors `page_url` into `output_dir` and returns the absolute path of
    /// the written HTML file.
    pub async fn mirror(&self, page_url: &str, output_dir: impl AsRef<Path>) -> Result<PathBuf> {
        self.mirror_with_report(page_url, output_dir)
            .await
            .map(|report| report.html_path)
    }

    /// Same as [`mirror`](Self::mirror), also returning every resource outcome.
    pub async fn mirror_with_report(
        &self,
        page_url: &str,
        output_dir: impl AsRef<Path>,
    ) -> Result<MirrorReport> {
        let mut stage = MirrorStage::Start;
        let result = self.run(page_url, output_dir.as_ref(), &mut stage).await;
        if let Err(e) = &result {
            fail(&mut stage, page_url, e);
        }
        result
    }

    #[instrument(name = "mirror", skip_all, fields(url = page_url))]
    async fn run(&self, page_url: &str, output_dir: &Path, stage: &mut MirrorStage) -> Result<MirrorReport> {
        let output_dir = file_manager::ensure_output_dir(output_dir).await?;
        let page_url = parse_page_url(page_url)?;

        info!(output = %output_dir.display(), "fetching page");
        let html = self
            .fetcher
            .fetch_text(&page_url)
            .await
            .map_err(|source| MirrorError::MainFetch {
                url: page_url.clone(),
                source,
            })?;
        advance(stage, MirrorStage::MainFetched);

        let names = naming::derive_main_name(&page_url);
        let html_path = output_dir.join(&names.html_file_name);
        let resources_dir = output_dir.join(&names.resources_dir_name);

        // The tree is dropped before the first await below; its attributes are
        // final once extraction returns.
        let (resources, rendered) = {
            let mut page = HtmlPage::parse(&html);
            let parser = HtmlParser::new(page_url.clone(), names.resources_dir_name.as_str())
                .with_links(self.options.include_links);
            let resources = parser.extract_resources(&mut page);
            let rendered = page
                .to_html()
                .map_err(|source| MirrorError::Serialize { source })?;
            (resources, rendered)
        };
        advance(stage, MirrorStage::ResourcesPrepared);

        let downloader = ResourceDownloader::new(
            &self.fetcher,
            FileManager::new(&resources_dir),
            self.options.concurrency_limit(),
        )
        .with_progress(self.progress.as_ref());
        let outcomes = downloader.run(&resources).await?;
        advance(stage, MirrorStage::ResourcesDownloaded);

        let outcomes = check_writes(outcomes)?;
        let summaries: Vec<ResourceSummary> = outcomes.iter().map(ResourceSummary::from).collect();
        if self.options.failure_policy == FailurePolicy::Strict {
            check_strict(outcomes)?;
        }

        tokio::fs::write(&html_path, rendered)
            .await
            .map_err(|source| MirrorError::Write {
                path: html_path.clone(),
                source,
            })?;
        advance(stage, MirrorStage::Written);

        info!(path = %html_path.display(), resources = summaries.len(), "page saved");
        advance(stage, MirrorStage::Done);

        Ok(MirrorReport {
            page_url,
            html_path,
            resources_dir,
            resources: summaries,
        })
    }
}

/// Mirrors `page_url` into `output_dir` with default options.
pub async fn mirror(page_url: &str, output_dir: impl AsRef<Path>) -> Result<PathBuf> {
    PageMirror::new(MirrorOptions::default())?
        .mirror(page_url, output_dir)
        .await
}

fn advance(stage: &mut MirrorStage, next: MirrorStage) {
    debug!(from = %stage, to = %next, "stage");
    *stage = next;
}

fn fail(stage: &mut MirrorStage, page_url: &str, error: &MirrorError) {
    warn!(url = page_url, %stage, %error, "mirroring failed");
    advance(stage, MirrorStage::Failed);
}

fn parse_page_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| MirrorError::InvalidPageUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(MirrorError::InvalidPageUrl {
            url: raw.to_string(),
            reason: "only http and https URLs with a host can be mirrored".to_string(),
        });
    }

    Ok(url)
}

/// Local write failures are never tolerated, whatever the failure policy.
fn check_writes(outcomes: Vec<DownloadOutcome>) -> Result<Vec<DownloadOutcome>> {
    let mut kept = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        match outcome.result {
            Err(ResourceError::Write { path, source }) => {
                return Err(MirrorError::Write { path, source })
            }
            result => kept.push(DownloadOutcome {
                resource: outcome.resource,
                result,
            }),
        }
    }
    Ok(kept)
}

fn check_strict(outcomes: Vec<DownloadOutcome>) -> Result<()> {
    let total = outcomes.len();
    let mut errors = outcomes.into_iter().filter_map(|o| o.result.err());

    match errors.next() {
        None => Ok(()),
        Some(first) => Err(MirrorError::ResourcesFailed {
            failed: 1 + errors.count(),
            total,
            first,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::MockHttpFetcher;
    use crate::error::FetchError;
    use reqwest::StatusCode;
    use tempfile::tempdir;

    fn fetcher_serving(html: &'static str) -> MockHttpFetcher {
        let mut fetcher = MockHttpFetcher::new();
        fetcher
            .expect_fetch_text()
            .times(1)
            .returning(move |_| Ok(html.to_string()));
        fetcher
    }

    #[tokio::test]
    async fn test_missing_output_dir_makes_no_requests() {
        let mut fetcher = MockHttpFetcher::new();
        fetcher.expect_fetch_text().never();
        fetcher.expect_fetch_bytes().never();

        let mirror = PageMirror::with_fetcher(fetcher, MirrorOptions::default());
        let err = mirror
            .mirror("https://example.test/page", "/path/does/not/exist")
            .await
            .unwrap_err();

        assert!(matches!(err, MirrorError::OutputDirMissing { .. }));
    }

    #[tokio::test]
    async fn test_invalid_page_url_makes_no_requests() {
        let temp_dir = tempdir().unwrap();
        let mut fetcher = MockHttpFetcher::new();
        fetcher.expect_fetch_text().never();

        let mirror = PageMirror::with_fetcher(fetcher, MirrorOptions::default());
        for raw in ["not a url", "ftp://example.test/file", "file:///etc/hosts"] {
            let err = mirror.mirror(raw, temp_dir.path()).await.unwrap_err();
            assert!(matches!(err, MirrorError::InvalidPageUrl { .. }), "{raw}");
        }
    }

    #[tokio::test]
    async fn test_main_page_404_writes_nothing() {
        let temp_dir = tempdir().unwrap();
        let mut fetcher = MockHttpFetcher::new();
        fetcher.expect_fetch_text().returning(|url| {
            Err(FetchError::Status {
                url: url.clone(),
                status: StatusCode::NOT_FOUND,
            })
        });
        fetcher.expect_fetch_bytes().never();

        let mirror = PageMirror::with_fetcher(fetcher, MirrorOptions::default());
        let err = mirror
            .mirror("https://example.test/page", temp_dir.path())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("HTTP 404"), "{err}");
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_round_trip() {
        let temp_dir = tempdir().unwrap();
        let mut fetcher = fetcher_serving(r#"<html><body><img src="/a.png"></body></html>"#);
        fetcher
            .expect_fetch_bytes()
            .withf(|url| url.as_str() == "https://example.test/a.png")
            .times(1)
            .returning(|_| Ok(vec![1, 2, 3]));

        let mirror = PageMirror::with_fetcher(fetcher, MirrorOptions::default());
        let html_path = mirror
            .mirror("https://example.test/page", temp_dir.path())
            .await
            .unwrap();

        assert!(html_path.is_absolute());
        assert_eq!(html_path.file_name().unwrap(), "example-test-page.html");

        let html = std::fs::read_to_string(&html_path).unwrap();
        assert!(
            html.contains(r#"<img src="example-test-page_files/example-test-a.png">"#),
            "{html}"
        );

        let saved = temp_dir
            .path()
            .join("example-test-page_files")
            .join("example-test-a.png");
        assert_eq!(std::fs::read(saved).unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_page_without_resources_creates_empty_dir() {
        let temp_dir = tempdir().unwrap();
        let mut fetcher = fetcher_serving("<html><body><p>plain</p></body></html>");
        fetcher.expect_fetch_bytes().never();

        let mirror = PageMirror::with_fetcher(fetcher, MirrorOptions::default());
        let report = mirror
            .mirror_with_report("https://example.test/", temp_dir.path())
            .await
            .unwrap();

        assert!(report.resources.is_empty());
        assert!(report.resources_dir.is_dir());
        assert!(report.html_path.ends_with("example-test.html"));
    }

    #[tokio::test]
    async fn test_lenient_policy_keeps_partial_mirror() {
        let temp_dir = tempdir().unwrap();
        let mut fetcher = fetcher_serving(
            r#"<img src="/ok.png"><script src="/gone.js"></script>"#,
        );
        fetcher.expect_fetch_bytes().times(2).returning(|url| {
            if url.path() == "/gone.js" {
                Err(FetchError::Status {
                    url: url.clone(),
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                })
            } else {
                Ok(vec![9])
            }
        });

        let mirror = PageMirror::with_fetcher(fetcher, MirrorOptions::default());
        let report = mirror
            .mirror_with_report("https://example.test/page", temp_dir.path())
            .await
            .unwrap();

        assert_eq!(report.failed(), 1);
        let html = std::fs::read_to_string(&report.html_path).unwrap();
        assert!(html.contains(r#"src="example-test-page_files/example-test-gone.js""#));
        assert!(!report.resources_dir.join("example-test-gone.js").exists());
        assert!(report.resources_dir.join("example-test-ok.png").exists());
    }

    #[tokio::test]
    async fn test_strict_policy_fails_after_batch() {
        let temp_dir = tempdir().unwrap();
        let mut fetcher = fetcher_serving(
            r#"<img src="/ok.png"><img src="/bad.png"><img src="/also-bad.png">"#,
        );
        fetcher.expect_fetch_bytes().times(3).returning(|url| {
            if url.path().contains("bad") {
                Err(FetchError::Status {
                    url: url.clone(),
                    status: StatusCode::SERVICE_UNAVAILABLE,
                })
            } else {
                Ok(vec![1])
            }
        });

        let options = MirrorOptions {
            failure_policy: FailurePolicy::Strict,
            ..MirrorOptions::default()
        };
        let mirror = PageMirror::with_fetcher(fetcher, options);
        let err = mirror
            .mirror("https://example.test/page", temp_dir.path())
            .await
            .unwrap_err();

        match err {
            MirrorError::ResourcesFailed { failed, total, .. } => {
                assert_eq!(failed, 2);
                assert_eq!(total, 3);
            }
            other => panic!("unexpected error: {other}"),
        }

        let files_dir = temp_dir.path().join("example-test-page_files");
        assert!(files_dir.join("example-test-ok.png").exists());
        assert!(!temp_dir.path().join("example-test-page.html").exists());
    }

    #[tokio::test]
    async fn test_resource_write_failure_fails_lenient_run() {
        let temp_dir = tempdir().unwrap();
        let blocked = temp_dir
            .path()
            .join("example-test-page_files")
            .join("example-test-a.png");
        std::fs::create_dir_all(&blocked).unwrap();

        let mut fetcher = fetcher_serving(r#"<html><body><img src="/a.png"></body></html>"#);
        fetcher.expect_fetch_bytes().times(1).returning(|_| Ok(vec![1, 2, 3]));

        let mirror = PageMirror::with_fetcher(fetcher, MirrorOptions::default());
        let err = mirror
            .mirror("https://example.test/page", temp_dir.path())
            .await
            .unwrap_err();

        match err {
            MirrorError::Write { path, .. } => assert!(path.ends_with("example-test-a.png")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!temp_dir.path().join("example-test-page.html").exists());
    }

    #[test]
    fn test_failure_moves_to_failed_stage() {
        let mut stage = MirrorStage::ResourcesPrepared;
        let err = MirrorError::OutputDirMissing {
            path: PathBuf::from("/nowhere"),
        };

        fail(&mut stage, "https://example.test/", &err);

        assert_eq!(stage, MirrorStage::Failed);
        assert_eq!(stage.to_string(), "failed");
    }

    #[test]
    fn test_report_serializes_outcomes() {
        let report = MirrorReport {
            page_url: Url::parse("https://example.test/").unwrap(),
            html_path: PathBuf::from("/out/example-test.html"),
            resources_dir: PathBuf::from("/out/example-test_files"),
            resources: vec![ResourceSummary {
                url: Url::parse("https://example.test/a.png").unwrap(),
                file: "example-test_files/example-test-a.png".to_string(),
                resource_type: ResourceType::Image,
                bytes: Some(3),
                error: None,
            }],
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["resources"][0]["bytes"], 3);
        assert_eq!(json["resources"][0]["resource_type"], "Image");
        assert!(json["resources"][0].get("error").is_none());
    }
}
