//! Relevance scoring for memory location.
//!
//! A located item's score blends three independent signals, each computed by
//! a pure function: keyword overlap (Jaccard similarity between the query and
//! the stored content), a recency boost that decays linearly over a week of
//! access inactivity, and an access-frequency boost capped at 2.0.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Hours after which the recency boost reaches its floor.
const RECENCY_WINDOW_HOURS: f64 = 168.0;

/// Floor applied to the recency boost so stale items stay reachable.
const RECENCY_FLOOR: f64 = 0.1;

/// Ceiling applied to the access-frequency boost.
const ACCESS_CEILING: f64 = 2.0;

/// Jaccard similarity between query keywords and content keywords.
///
/// Returns 0.0 when the content has no keywords at all, so unindexable items
/// never outrank genuine matches.
pub fn jaccard(context_keywords: &HashSet<String>, content_keywords: &HashSet<String>) -> f64 {
    if content_keywords.is_empty() {
        return 0.0;
    }
    let intersection = context_keywords.intersection(content_keywords).count();
    let union = context_keywords.union(content_keywords).count();
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

/// Linear decay from 1.0 toward [`RECENCY_FLOOR`] over a week since last access.
///
/// Items that were never accessed get the full 1.0 so fresh memories are not
/// penalized before anyone has had a chance to read them.
pub fn recency_boost(last_accessed_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    match last_accessed_at {
        None => 1.0,
        Some(accessed) => {
            let hours = (now - accessed).num_seconds() as f64 / 3600.0;
            (1.0 - hours / RECENCY_WINDOW_HOURS).max(RECENCY_FLOOR)
        }
    }
}

/// Access-frequency boost: `1 + 0.1 * access_count`, capped at 2.0.
pub fn access_boost(access_count: u64) -> f64 {
    (1.0 + access_count as f64 * 0.1).min(ACCESS_CEILING)
}

/// Combined relevance score for one candidate item.
pub fn relevance_score(
    context_keywords: &HashSet<String>,
    content_keywords: &HashSet<String>,
    last_accessed_at: Option<DateTime<Utc>>,
    access_count: u64,
    now: DateTime<Utc>,
) -> f64 {
    jaccard(context_keywords, content_keywords) * recency_boost(last_accessed_at, now) * access_boost(access_count)
}
