use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Nearly sold out conferences.
pub const RECENT_ANNOUNCEMENTS: &str = "RECENT_ANNOUNCEMENTS";
/// The most recent featured speaker.
pub const SPEAKER_ANNOUNCEMENTS: &str = "SPEAKER_ANNOUNCEMENTS";

/// Single-key value cache without expiry.
pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: String);

    fn delete(&self, key: &str);
}

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // every write is a single insert or remove, so a poisoned map is still consistent
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.entries().insert(key.to_owned(), value);
    }

    fn delete(&self, key: &str) {
        self.entries().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_delete() {
        let cache = MemoryCache::default();
        assert_eq!(cache.get(RECENT_ANNOUNCEMENTS), None);
        cache.set(RECENT_ANNOUNCEMENTS, "first".to_owned());
        cache.set(RECENT_ANNOUNCEMENTS, "second".to_owned());
        assert_eq!(cache.get(RECENT_ANNOUNCEMENTS).as_deref(), Some("second"));
        cache.delete(RECENT_ANNOUNCEMENTS);
        cache.delete(SPEAKER_ANNOUNCEMENTS);
        assert_eq!(cache.get(RECENT_ANNOUNCEMENTS), None);
    }
}
