//! Memory item records and summary projections for the path-addressed store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Classification tag for a stored memory item.
///
/// The four categories follow the usual agent-memory taxonomy: episodic for
/// conversation-like history, semantic for facts and knowledge, procedural
/// for records of executed processes, and working for transient scratch data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    /// Conversation history and interaction records.
    Episodic,
    /// Facts and long-lived knowledge.
    Semantic,
    /// Skills, workflows, and execution records.
    Procedural,
    /// Temporary context that does not outlive the session.
    Working,
}

impl MemoryType {
    /// Stable lowercase label used in summaries and located projections.
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Episodic => "episodic",
            MemoryType::Semantic => "semantic",
            MemoryType::Procedural => "procedural",
            MemoryType::Working => "working",
        }
    }
}

/// A single item held by the memory store.
///
/// Items are owned exclusively by the store; callers receive clones. The
/// `path` is a logical key (not a filesystem path) addressing the current
/// item a caller expects under that name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryItem {
    /// Opaque unique identifier, newly allocated on every store call.
    pub id: String,
    /// Logical key the item is addressed by.
    pub path: String,
    /// Arbitrary structured content.
    pub content: Value,
    /// Classification tag.
    pub memory_type: MemoryType,
    /// Creation time of this item.
    pub created_at: DateTime<Utc>,
    /// Last time the content was written (store or update).
    pub updated_at: DateTime<Utc>,
    /// Number of times the item has been retrieved or located.
    pub access_count: u64,
    /// Last time the item was retrieved or located, if ever.
    pub last_accessed_at: Option<DateTime<Utc>>,
    /// Free-form metadata supplied at store time.
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
}

/// Projection of a located item embedded in step results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatedMemory {
    /// Logical key of the located item.
    pub path: String,
    /// Item content at location time.
    pub content: Value,
    /// Lowercase memory type label.
    pub r#type: String,
}

/// Entry in the recently-touched section of a [`MemoryMap`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentMemory {
    /// Logical key of the item.
    pub path: String,
    /// Last write time.
    pub timestamp: DateTime<Utc>,
    /// Lowercase memory type label.
    pub r#type: String,
}

/// Entry in the frequently-accessed section of a [`MemoryMap`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequentMemory {
    /// Logical key of the item.
    pub path: String,
    /// Total recorded accesses.
    pub access_count: u64,
    /// Last access time, if the item was ever accessed.
    pub last_accessed_at: Option<DateTime<Utc>>,
}

/// Aggregate summary of the store contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryMap {
    /// Total number of items held.
    pub total_memories: usize,
    /// Item counts keyed by lowercase memory type label.
    pub memory_types: indexmap::IndexMap<String, usize>,
    /// Items written within the last 24 hours, newest first, capped at 10.
    pub recent_memories: Vec<RecentMemory>,
    /// Items ordered by descending access count, capped at 10.
    pub frequent_memories: Vec<FrequentMemory>,
    /// Every path currently addressing an item.
    pub memory_paths: Vec<String>,
}
