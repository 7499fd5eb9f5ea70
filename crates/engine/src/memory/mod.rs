//! Path-addressed memory store with keyword indexing and relevance ranking.
//!
//! The store keeps three structures that always mutate together under one
//! lock: the item table (id to item), the inverted keyword index (keyword to
//! ids), and the path map (logical path to the id currently addressed by that
//! path). A reader calling [`MemoryStore::locate`] therefore never observes an
//! index entry for a removed item, or an item its keywords have not been
//! indexed for yet.
//!
//! Storing to a path that is already mapped evicts the previously addressed
//! item from both the table and the index. Prior ids are never left orphaned
//! but searchable.

pub mod keywords;
pub mod relevance;

use chrono::{Duration, Utc};
use opal_types::{FrequentMemory, MemoryItem, MemoryMap, MemoryType, RecentMemory};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Default result cap applied when a caller does not pass one.
pub const DEFAULT_LOCATE_LIMIT: usize = 5;

/// Types searched when a caller does not restrict them.
pub const DEFAULT_LOCATE_TYPES: &[MemoryType] = &[MemoryType::Semantic, MemoryType::Episodic];

#[derive(Default)]
struct StoreInner {
    /// Item table keyed by id.
    items: HashMap<String, MemoryItem>,
    /// Inverted keyword index.
    index: HashMap<String, HashSet<String>>,
    /// Path map: which id a path currently addresses.
    paths: HashMap<String, String>,
}

/// Thread-safe, in-process memory store shared across concurrent executions.
///
/// All mutation paths (store, update, delete, and the access bookkeeping done
/// by retrieve and locate) serialize on one lock, which is the entire
/// consistency story: per-path atomicity falls out of whole-store atomicity.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<StoreInner>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores content under a logical path and returns the new item's id.
    ///
    /// A fresh id is allocated on every call. If the path already addressed
    /// an item, that item is evicted from the table and the index before the
    /// new one is inserted.
    pub fn store(
        &self,
        path: &str,
        content: Value,
        memory_type: MemoryType,
        metadata: Option<serde_json::Map<String, Value>>,
    ) -> String {
        let mut inner = self.inner.write().expect("memory store lock poisoned");

        if let Some(previous_id) = inner.paths.get(path).cloned() {
            inner.items.remove(&previous_id);
            remove_from_index(&mut inner, &previous_id);
            debug!(path, previous_id, "evicted prior item on path overwrite");
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let item = MemoryItem {
            id: id.clone(),
            path: path.to_string(),
            content,
            memory_type,
            created_at: now,
            updated_at: now,
            access_count: 0,
            last_accessed_at: None,
            metadata: metadata.unwrap_or_default(),
        };

        index_content(&mut inner, &id, &item.content);
        inner.items.insert(id.clone(), item);
        inner.paths.insert(path.to_string(), id.clone());

        info!(path, id, "stored memory");
        id
    }

    /// Exact-path lookup. Records an access on hit.
    pub fn retrieve(&self, path: &str) -> Option<MemoryItem> {
        let mut inner = self.inner.write().expect("memory store lock poisoned");
        let id = inner.paths.get(path).cloned()?;
        record_access(&mut inner, &id);
        inner.items.get(&id).cloned()
    }

    /// Rewrites the content addressed by a path.
    ///
    /// With `merge` set and both old and new content map-shaped, the result
    /// is a shallow key union with new values winning on conflict; any other
    /// combination replaces the content wholesale. Keywords are re-indexed
    /// and the write timestamp refreshed. Returns false for unknown paths.
    pub fn update(&self, path: &str, content: Value, merge: bool) -> bool {
        let mut inner = self.inner.write().expect("memory store lock poisoned");
        let Some(id) = inner.paths.get(path).cloned() else {
            return false;
        };
        let Some(item) = inner.items.get_mut(&id) else {
            return false;
        };

        item.content = match (merge, item.content.take(), content) {
            (true, Value::Object(mut existing), Value::Object(incoming)) => {
                for (key, value) in incoming {
                    existing.insert(key, value);
                }
                Value::Object(existing)
            }
            (_, _, incoming) => incoming,
        };
        item.updated_at = Utc::now();

        let reindexed = item.content.clone();
        remove_from_index(&mut inner, &id);
        index_content(&mut inner, &id, &reindexed);

        info!(path, "updated memory");
        true
    }

    /// Removes the item addressed by a path, with all index references.
    ///
    /// Returns false (and changes nothing) for unknown paths.
    pub fn delete(&self, path: &str) -> bool {
        let mut inner = self.inner.write().expect("memory store lock poisoned");
        let Some(id) = inner.paths.remove(path) else {
            return false;
        };
        inner.items.remove(&id);
        remove_from_index(&mut inner, &id);

        info!(path, "deleted memory");
        true
    }

    /// Ranked retrieval: finds items relevant to a free-text context.
    ///
    /// Candidates are unioned from the keyword index, restricted to
    /// `memory_types` (defaulting to semantic and episodic), scored by
    /// [`relevance::relevance_score`], ordered by strictly descending score,
    /// and truncated to `limit`. Every returned item gets the same access
    /// bookkeeping as [`MemoryStore::retrieve`].
    pub fn locate(&self, context_text: &str, memory_types: Option<&[MemoryType]>, limit: usize) -> Vec<MemoryItem> {
        let allowed = memory_types.unwrap_or(DEFAULT_LOCATE_TYPES);
        let context_keywords = keywords::extract_keywords(context_text);
        let now = Utc::now();

        let mut inner = self.inner.write().expect("memory store lock poisoned");

        let mut candidate_ids: HashSet<String> = HashSet::new();
        for keyword in &context_keywords {
            if let Some(ids) = inner.index.get(keyword) {
                candidate_ids.extend(ids.iter().cloned());
            }
        }

        let mut scored: Vec<(String, f64)> = candidate_ids
            .into_iter()
            .filter_map(|id| {
                let item = inner.items.get(&id)?;
                if !allowed.contains(&item.memory_type) {
                    return None;
                }
                let content_keywords = keywords::content_keywords(&item.content);
                let score = relevance::relevance_score(
                    &context_keywords,
                    &content_keywords,
                    item.last_accessed_at,
                    item.access_count,
                    now,
                );
                Some((id, score))
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(limit);

        scored
            .into_iter()
            .filter_map(|(id, _)| {
                record_access(&mut inner, &id);
                inner.items.get(&id).cloned()
            })
            .collect()
    }

    /// Aggregate summary: totals per type, recently written items, most
    /// accessed items, and every known path.
    pub fn memory_map(&self) -> MemoryMap {
        let inner = self.inner.read().expect("memory store lock poisoned");
        let now = Utc::now();

        let mut memory_types = indexmap::IndexMap::new();
        for memory_type in [
            MemoryType::Episodic,
            MemoryType::Semantic,
            MemoryType::Procedural,
            MemoryType::Working,
        ] {
            let count = inner.items.values().filter(|item| item.memory_type == memory_type).count();
            if count > 0 {
                memory_types.insert(memory_type.as_str().to_string(), count);
            }
        }

        let cutoff = now - Duration::hours(24);
        let mut recent: Vec<RecentMemory> = inner
            .items
            .values()
            .filter(|item| item.updated_at > cutoff)
            .map(|item| RecentMemory {
                path: item.path.clone(),
                timestamp: item.updated_at,
                r#type: item.memory_type.as_str().to_string(),
            })
            .collect();
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recent.truncate(10);

        let mut frequent: Vec<FrequentMemory> = inner
            .items
            .values()
            .map(|item| FrequentMemory {
                path: item.path.clone(),
                access_count: item.access_count,
                last_accessed_at: item.last_accessed_at,
            })
            .collect();
        frequent.sort_by(|a, b| b.access_count.cmp(&a.access_count));
        frequent.truncate(10);

        let mut paths: Vec<String> = inner.paths.keys().cloned().collect();
        paths.sort();

        MemoryMap {
            total_memories: inner.items.len(),
            memory_types,
            recent_memories: recent,
            frequent_memories: frequent,
            memory_paths: paths,
        }
    }

    /// Number of items currently held.
    pub fn len(&self) -> usize {
        self.inner.read().expect("memory store lock poisoned").items.len()
    }

    /// True when no items are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn index_content(inner: &mut StoreInner, id: &str, content: &Value) {
    for keyword in keywords::content_keywords(content) {
        inner.index.entry(keyword).or_default().insert(id.to_string());
    }
}

fn remove_from_index(inner: &mut StoreInner, id: &str) {
    inner.index.retain(|_, ids| {
        ids.remove(id);
        !ids.is_empty()
    });
}

fn record_access(inner: &mut StoreInner, id: &str) {
    if let Some(item) = inner.items.get_mut(id) {
        item.access_count += 1;
        item.last_accessed_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn store_then_retrieve_returns_content_and_records_access() {
        let store = MemoryStore::new();
        store.store("prefs/user", json!({"theme": "dark"}), MemoryType::Semantic, None);

        let item = store.retrieve("prefs/user").expect("item exists");
        assert_eq!(item.content, json!({"theme": "dark"}));
        assert_eq!(item.access_count, 1);
        assert!(item.last_accessed_at.is_some());

        let again = store.retrieve("prefs/user").expect("item exists");
        assert_eq!(again.access_count, 2);
    }

    #[test]
    fn store_allocates_a_new_id_every_call() {
        let store = MemoryStore::new();
        let first = store.store("same/path", json!("one"), MemoryType::Semantic, None);
        let second = store.store("same/path", json!("two"), MemoryType::Semantic, None);
        assert_ne!(first, second);
    }

    #[test]
    fn overwriting_a_path_evicts_the_prior_item() {
        let store = MemoryStore::new();
        store.store("doc", json!("zebra giraffe"), MemoryType::Semantic, None);
        store.store("doc", json!("completely different words"), MemoryType::Semantic, None);

        assert_eq!(store.len(), 1);
        let located = store.locate("zebra giraffe", None, 10);
        assert!(located.is_empty(), "evicted content must not be locatable");
    }

    #[test]
    fn delete_unknown_path_is_a_no_op() {
        let store = MemoryStore::new();
        store.store("keep", json!("kept"), MemoryType::Semantic, None);
        assert!(!store.delete("missing"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn delete_removes_item_path_and_index() {
        let store = MemoryStore::new();
        store.store("notes/one", json!("unique searchable phrase"), MemoryType::Semantic, None);
        assert!(store.delete("notes/one"));
        assert!(store.retrieve("notes/one").is_none());
        assert!(store.locate("unique searchable phrase", None, 10).is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn update_merge_unions_keys_with_new_values_winning() {
        let store = MemoryStore::new();
        store.store("cfg", json!({"theme": "dark", "lang": "en"}), MemoryType::Semantic, None);

        assert!(store.update("cfg", json!({"theme": "light", "beta": true}), true));
        let item = store.retrieve("cfg").unwrap();
        assert_eq!(item.content, json!({"theme": "light", "lang": "en", "beta": true}));
    }

    #[test]
    fn update_without_merge_replaces_wholesale() {
        let store = MemoryStore::new();
        store.store("cfg", json!({"theme": "dark"}), MemoryType::Semantic, None);
        assert!(store.update("cfg", json!(["now", "a", "list"]), false));
        assert_eq!(store.retrieve("cfg").unwrap().content, json!(["now", "a", "list"]));
    }

    #[test]
    fn update_unknown_path_returns_false() {
        let store = MemoryStore::new();
        assert!(!store.update("ghost", json!(1), false));
    }

    #[test]
    fn locate_respects_limit_and_orders_by_descending_score() {
        let store = MemoryStore::new();
        // Perfect overlap vs partial overlap against the query below.
        store.store("exact", json!("rust workflow engine"), MemoryType::Semantic, None);
        store.store("partial", json!("rust compiler internals overview notes"), MemoryType::Semantic, None);
        store.store("other", json!("gardening tips"), MemoryType::Semantic, None);

        let results = store.locate("rust workflow engine", None, 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, "exact");

        let results = store.locate("rust workflow engine", None, 10);
        assert!(results.len() >= 2);
        assert_eq!(results[0].path, "exact");
    }

    #[test]
    fn locate_filters_by_memory_type() {
        let store = MemoryStore::new();
        store.store("fact", json!("orcas hunt seals"), MemoryType::Semantic, None);
        store.store("scratch", json!("orcas hunt seals"), MemoryType::Working, None);

        let default_types = store.locate("orcas hunt seals", None, 10);
        assert_eq!(default_types.len(), 1);
        assert_eq!(default_types[0].path, "fact");

        let working_only = store.locate("orcas hunt seals", Some(&[MemoryType::Working]), 10);
        assert_eq!(working_only.len(), 1);
        assert_eq!(working_only[0].path, "scratch");
    }

    #[test]
    fn locate_records_access_on_returned_items() {
        let store = MemoryStore::new();
        store.store("hit", json!("searchable marker text"), MemoryType::Semantic, None);

        let first = store.locate("searchable marker text", None, 5);
        assert_eq!(first[0].access_count, 1);
        let second = store.locate("searchable marker text", None, 5);
        assert_eq!(second[0].access_count, 2);
    }

    #[test]
    fn memory_map_summarizes_the_store() {
        let store = MemoryStore::new();
        store.store("a", json!("alpha content"), MemoryType::Semantic, None);
        store.store("b", json!("beta content"), MemoryType::Episodic, None);
        store.retrieve("a");

        let map = store.memory_map();
        assert_eq!(map.total_memories, 2);
        assert_eq!(map.memory_types.get("semantic"), Some(&1));
        assert_eq!(map.memory_types.get("episodic"), Some(&1));
        assert_eq!(map.recent_memories.len(), 2);
        assert_eq!(map.frequent_memories[0].path, "a");
        assert_eq!(map.memory_paths, vec!["a".to_string(), "b".to_string()]);
    }
}
