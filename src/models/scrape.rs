use serde::{Deserialize, Serialize};

/// Body of a `POST /scrape` request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScrapeRequest {
    #[serde(default)]
    pub url: Option<String>,
}

impl ScrapeRequest {
    /// The requested URL, if present and non-empty
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.trim().is_empty())
    }
}

/// Result of a scrape, returned to API callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResult {
    pub data: Option<String>,
    pub url: String,
}

impl FetchResult {
    pub fn new(url: impl Into<String>, data: Option<String>) -> Self {
        Self {
            data,
            url: url.into(),
        }
    }

    /// Size of the body in kilobytes, for log lines
    pub fn size_kb(&self) -> f64 {
        self.data.as_ref().map(|d| d.len() as f64 / 1024.0).unwrap_or(0.0)
    }
}

/// Classification of a single fetch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The fetcher gave up and returned nothing
    Failed,
    /// The target answered with a block page
    Blocked,
    /// A usable body
    Success(String),
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Failed => "failed",
            AttemptOutcome::Blocked => "blocked",
            AttemptOutcome::Success(_) => "success",
        }
    }
}
