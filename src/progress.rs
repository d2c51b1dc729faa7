//! Optional progress reporting for the download phase.

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use url::Url;

use crate::downloader::DownloadOutcome;

/// Receives download progress. Calls may arrive from concurrent downloads.
pub trait ProgressReporter: Send + Sync {
    fn start(&self, _total: usize) {}
    fn resource_started(&self, _url: &Url) {}
    fn resource_finished(&self, _outcome: &DownloadOutcome) {}
    fn finish(&self) {}
}

/// Reports nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {}

/// Terminal progress bar, one tick per settled resource.
pub struct ProgressBarReporter {
    bar: ProgressBar,
}

impl ProgressBarReporter {
    pub fn new() -> Self {
        let bar = ProgressBar::hidden();
        let style = ProgressStyle::default_bar()
            .template("{spinner} [{bar:30}] {pos}/{len} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        Self { bar }
    }
}

impl Default for ProgressBarReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for ProgressBarReporter {
    fn start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
    }

    fn resource_started(&self, url: &Url) {
        self.bar.set_message(format!("Downloading {url}"));
    }

    fn resource_finished(&self, outcome: &DownloadOutcome) {
        if let Err(e) = &outcome.result {
            self.bar
                .println(format!("{} {}: {}", "✗".red(), outcome.resource.url, e));
        }
        self.bar.inc(1);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
