use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

/// Failure reported by an [`HttpFetcher`](crate::downloader::HttpFetcher).
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { url: Url, status: StatusCode },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: Url,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl FetchError {
    pub fn transport(url: &Url, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Transport {
            url: url.clone(),
            source: source.into(),
        }
    }

    pub fn url(&self) -> &Url {
        match self {
            Self::Status { url, .. } | Self::Transport { url, .. } => url,
        }
    }
}

/// Why a single resource did not end up on disk.
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors surfaced by [`PageMirror::mirror`](crate::mirror::PageMirror::mirror).
#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("output directory does not exist: {path:?}")]
    OutputDirMissing { path: PathBuf },

    #[error("output path is not a directory: {path:?}")]
    OutputNotDirectory { path: PathBuf },

    #[error("cannot read output directory {path:?}: {source}")]
    OutputDirUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid page URL {url:?}: {reason}")]
    InvalidPageUrl { url: String, reason: String },

    #[error("failed to download page {url}: {source}")]
    MainFetch {
        url: Url,
        #[source]
        source: FetchError,
    },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("{failed} of {total} resources failed to download, first: {first}")]
    ResourcesFailed {
        failed: usize,
        total: usize,
        #[source]
        first: ResourceError,
    },

    #[error("failed to serialize page: {source}")]
    Serialize {
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T, E = MirrorError> = std::result::Result<T, E>;
