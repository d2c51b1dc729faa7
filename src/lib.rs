pub mod cli;
pub mod config;
pub mod downloader;
pub mod error;
pub mod file_manager;
pub mod html_parser;
pub mod mirror;
pub mod naming;
pub mod origin;
pub mod progress;

// Re-export main types for convenience
pub use cli::MirrorCommand;
pub use config::{FailurePolicy, MirrorOptions};
pub use downloader::{DownloadOutcome, HttpFetcher, ReqwestFetcher, ResourceDownloader};
pub use error::{FetchError, MirrorError, ResourceError};
pub use file_manager::FileManager;
pub use html_parser::{HtmlPage, HtmlParser, ResourceRef, ResourceType};
pub use mirror::{mirror, MirrorReport, MirrorStage, PageMirror, ResourceSummary};
pub use naming::{derive_main_name, derive_resource_name, DerivedNames};
pub use origin::is_local;
pub use progress::{NoProgress, ProgressBarReporter, ProgressReporter};
