use serde::{Deserialize, Serialize};

/// Terminal condition that stopped a page-range fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HaltReason {
    /// Every requested page was fetched
    #[serde(rename = "none")]
    Completed,
    /// A page came back empty: no more results upstream
    Exhausted,
    /// Transport or parse failure on a page
    Error,
    /// The per-request budget ran out
    Timeout,
}

impl HaltReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "none",
            Self::Exhausted => "exhausted",
            Self::Error => "error",
            Self::Timeout => "timeout",
        }
    }

    /// Halts that mean the upstream could not be scraped, as opposed to a
    /// normal end of results.
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::Error | Self::Timeout)
    }
}

impl std::fmt::Display for HaltReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
