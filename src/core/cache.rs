use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::core::FlowValue;

struct CacheEntry {
    value: FlowValue,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.stored_at.elapsed() >= self.ttl
    }
}

/// TTL cache for invocation results, shared across concurrent runs.
///
/// Entries past their time-to-live are treated as absent and dropped on read.
#[derive(Default)]
pub struct InvocationCache {
    entries: DashMap<String, CacheEntry>,
}

impl InvocationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache key: descriptor id + a stable hash of the positional argument
    /// list. `None` means the arguments could not be keyed; callers fall back
    /// to direct invocation instead of failing the call.
    pub fn key(id: &str, args: &[FlowValue]) -> Option<String> {
        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        for arg in args {
            serde_json::to_string(arg).ok()?.hash(&mut hasher);
        }
        Some(format!("{}:{:016x}", id, hasher.finish()))
    }

    pub fn get(&self, key: &str) -> Option<FlowValue> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.is_expired() => true,
            Some(entry) => return Some(entry.value.clone()),
            None => return None,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    pub fn put(&self, key: String, value: FlowValue, ttl: Duration) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
