//! Block page detection

use crate::models::AttemptOutcome;

/// Marker that identifies a block page, compared case-insensitively
const BLOCK_MARKER: &str = "403 forbidden";

/// True if the body looks like the target refused to serve us
pub fn is_blocked(body: &str) -> bool {
    body.to_ascii_lowercase().contains(BLOCK_MARKER)
}

/// Classify the result of one fetch attempt
pub fn classify(body: Option<String>) -> AttemptOutcome {
    match body {
        None => AttemptOutcome::Failed,
        Some(body) if is_blocked(&body) => AttemptOutcome::Blocked,
        Some(body) => AttemptOutcome::Success(body),
    }
}
