//! Generic LRU+TTL cache keyed by content hash, plus the facade holding the
//! five per-process analysis caches.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::entity::{
    build_entity_graph, extract_entities, parse_structure, EntityGraph, EntityNode,
    StructuralParse,
};
use crate::hash::{hash_content, hash_with_context};
use crate::style::{analyze_style, StyleProfile};

const DEFAULT_CAPACITY: usize = 100;
const DEFAULT_TTL: Duration = Duration::from_secs(300);

struct CacheEntry<T> {
    data: T,
    stored_at: Instant,
    access_count: u64,
    /// Insertion sequence, the deterministic eviction tie-break.
    inserted: u64,
}

struct CacheInner<T> {
    entries: HashMap<String, CacheEntry<T>>,
    next_seq: u64,
}

/// In-process cache for one artifact type.
///
/// Entries expire lazily on access after the TTL; at capacity, the entry
/// with the fewest accesses is evicted (oldest insertion wins ties). Safe
/// to share across threads; entries are immutable once set.
pub struct ContentCache<T> {
    inner: Mutex<CacheInner<T>>,
    capacity: usize,
    ttl: Duration,
}

impl<T: Clone> ContentCache<T> {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_CAPACITY, DEFAULT_TTL)
    }

    pub fn with_limits(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                next_seq: 0,
            }),
            capacity: capacity.max(1),
            ttl,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a key. Expired entries are removed and report as misses; a
    /// hit bumps the entry's access count.
    pub fn get(&self, key: &str) -> Option<T> {
        let mut inner = self.lock();
        let expired = match inner.entries.get(key) {
            Some(entry) => entry.stored_at.elapsed() >= self.ttl,
            None => return None,
        };
        if expired {
            inner.entries.remove(key);
            return None;
        }
        let entry = inner.entries.get_mut(key)?;
        entry.access_count += 1;
        Some(entry.data.clone())
    }

    /// Store a value, evicting the least-accessed entry at capacity.
    pub fn set(&self, key: impl Into<String>, data: T) {
        let key = key.into();
        let mut inner = self.lock();

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.capacity {
            let victim = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| (e.access_count, e.inserted))
                .map(|(k, _)| k.clone());
            if let Some(victim) = victim {
                inner.entries.remove(&victim);
                debug!(key = %victim, "Evicted cache entry");
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(
            key,
            CacheEntry {
                data,
                stored_at: Instant::now(),
                access_count: 0,
                inserted: seq,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }
}

impl<T: Clone> Default for ContentCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The five per-process analysis caches behind one facade.
///
/// Each accessor hashes its input, consults its cache, and recomputes on a
/// miss. No entry is authoritative; identical input always yields identical
/// output whether or not the cache participated.
#[derive(Default)]
pub struct AnalysisCaches {
    paragraphs: ContentCache<Vec<String>>,
    entities: ContentCache<EntityGraph>,
    styles: ContentCache<StyleProfile>,
    structural: ContentCache<StructuralParse>,
    full_entities: ContentCache<Vec<EntityNode>>,
}

impl AnalysisCaches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blank-line-separated paragraphs of a text.
    pub fn paragraphs(&self, text: &str) -> Vec<String> {
        let key = hash_content(text);
        if let Some(hit) = self.paragraphs.get(&key) {
            return hit;
        }
        let computed = parse_structure(text).paragraphs;
        self.paragraphs.set(key, computed.clone());
        computed
    }

    pub fn entity_graph(&self, text: &str) -> EntityGraph {
        let key = hash_content(text);
        if let Some(hit) = self.entities.get(&key) {
            return hit;
        }
        let computed = build_entity_graph(text);
        self.entities.set(key, computed.clone());
        computed
    }

    pub fn style_profile(&self, text: &str) -> StyleProfile {
        let key = hash_content(text);
        if let Some(hit) = self.styles.get(&key) {
            return hit;
        }
        let computed = analyze_style(text);
        self.styles.set(key, computed.clone());
        computed
    }

    pub fn structural_parse(&self, text: &str) -> StructuralParse {
        let key = hash_content(text);
        if let Some(hit) = self.structural.get(&key) {
            return hit;
        }
        let computed = parse_structure(text);
        self.structural.set(key, computed.clone());
        computed
    }

    /// Entity candidates for one chapter. Keyed by text plus chapter id so
    /// the same excerpt pasted into two chapters caches separately.
    pub fn chapter_entities(&self, text: &str, chapter_id: &str) -> Vec<EntityNode> {
        let key = hash_with_context(text, chapter_id);
        if let Some(hit) = self.full_entities.get(&key) {
            return hit;
        }
        let computed = extract_entities(text);
        self.full_entities.set(key, computed.clone());
        computed
    }

    /// Drop every entry in all five caches.
    pub fn clear(&self) {
        self.paragraphs.clear();
        self.entities.clear();
        self.styles.clear();
        self.structural.clear();
        self.full_entities.clear();
    }
}
