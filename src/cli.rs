use clap::Parser;
use std::path::PathBuf;

use crate::config::{self, FailurePolicy, MirrorOptions};

#[derive(Parser, Debug)]
#[command(
    name = "page-mirror",
    about = "Save a web page with its images, stylesheets and scripts for offline viewing",
    version,
    long_about = "Downloads a single page and the same-origin images, stylesheets and scripts it references. The page is written as <name>.html and the resources into a sibling <name>_files directory, with the page's references rewritten to the local copies."
)]
pub struct MirrorCommand {
    /// The URL of the page to mirror
    #[arg(required = true)]
    pub url: String,

    /// Existing directory to write the page and its resources into
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Maximum concurrent resource downloads
    #[arg(short = 'c', long, default_value_t = config::DEFAULT_MAX_CONCURRENT, value_parser = parse_max_concurrent)]
    pub max_concurrent: usize,

    /// Fail the whole run if any resource cannot be downloaded
    #[arg(long)]
    pub strict: bool,

    /// Also mirror same-origin pages linked with <a href>
    #[arg(long)]
    pub include_links: bool,

    /// Timeout for each request in seconds
    #[arg(long, default_value_t = config::DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// User agent string to use for requests
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Print a JSON report of every resource instead of the file path
    #[arg(long)]
    pub json: bool,

    /// Do not draw a progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Silence logging and the progress bar
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl MirrorCommand {
    pub fn options(&self) -> MirrorOptions {
        MirrorOptions {
            max_concurrent: self.max_concurrent,
            failure_policy: if self.strict {
                FailurePolicy::Strict
            } else {
                FailurePolicy::Lenient
            },
            include_links: self.include_links,
            timeout_secs: self.timeout,
            user_agent: self
                .user_agent
                .clone()
                .unwrap_or_else(config::default_user_agent),
        }
    }

    pub fn show_progress(&self) -> bool {
        !(self.no_progress || self.json || self.quiet)
    }

    /// Default log filter for the crate, used when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "off";
        }
        match self.verbose {
            0 => "error",
            1 => "info",
            _ => "debug",
        }
    }
}

fn parse_max_concurrent(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}
