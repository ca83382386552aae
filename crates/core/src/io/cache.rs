//! LRU cache of decoded raster chunks (strips or tiles).

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Default number of decoded chunks kept in memory
pub const DEFAULT_CHUNK_CAPACITY: usize = 64;

/// Decoded chunk: samples in row-major order plus the row stride.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub data: Vec<f64>,
    /// Samples per chunk row (may exceed the valid width of an edge tile)
    pub stride: usize,
}

/// LRU cache keyed by chunk index.
pub struct ChunkCache {
    inner: LruCache<u32, Arc<Chunk>>,
    hits: u64,
    misses: u64,
}

impl ChunkCache {
    /// Create a cache holding at most `capacity` chunks (minimum one).
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: LruCache::new(cap),
            hits: 0,
            misses: 0,
        }
    }

    pub fn get(&mut self, index: u32) -> Option<Arc<Chunk>> {
        let found = self.inner.get(&index).cloned();
        if found.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        found
    }

    pub fn insert(&mut self, index: u32, chunk: Chunk) -> Arc<Chunk> {
        let chunk = Arc::new(chunk);
        self.inner.put(index, Arc::clone(&chunk));
        chunk
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.cap().get()
    }

    /// (hits, misses) since creation
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}

impl Default for ChunkCache {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(v: f64) -> Chunk {
        Chunk { data: vec![v; 4], stride: 2 }
    }

    #[test]
    fn test_hit_and_miss_counts() {
        let mut cache = ChunkCache::new(4);
        assert!(cache.get(3).is_none());
        cache.insert(3, chunk(1.0));
        assert_eq!(cache.get(3).unwrap().data[0], 1.0);
        assert_eq!(cache.stats(), (1, 1));
    }

    #[test]
    fn test_least_recently_used_is_evicted() {
        let mut cache = ChunkCache::new(2);
        cache.insert(0, chunk(0.0));
        cache.insert(1, chunk(1.0));
        cache.get(0);
        cache.insert(2, chunk(2.0));

        assert!(cache.get(1).is_none());
        assert!(cache.get(0).is_some());
        assert!(cache.get(2).is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_zero_capacity_clamps_to_one() {
        let cache = ChunkCache::new(0);
        assert_eq!(cache.capacity(), 1);
    }
}
