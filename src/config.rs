use serde::{Deserialize, Serialize};

/// Default cap on in-flight resource downloads.
pub const DEFAULT_MAX_CONCURRENT: usize = 10;

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// What a failed resource download does to the whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Keep going; the page points at a local file that was never written.
    #[default]
    Lenient,
    /// Let every download settle, then fail the run if any of them failed.
    Strict,
}

/// Knobs for a mirroring run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorOptions {
    pub max_concurrent: usize,
    pub failure_policy: FailurePolicy,
    /// Also mirror same-origin `<a href>` targets.
    pub include_links: bool,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for MirrorOptions {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            failure_policy: FailurePolicy::default(),
            include_links: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: default_user_agent(),
        }
    }
}

impl MirrorOptions {
    /// Concurrency limit actually applied; never below one.
    pub fn concurrency_limit(&self) -> usize {
        self.max_concurrent.max(1)
    }
}

pub fn default_user_agent() -> String {
    format!("page-mirror/{}", env!("CARGO_PKG_VERSION"))
}
