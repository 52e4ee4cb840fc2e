//! Disk-backed cache of user summaries.
//!
//! The worker fills it from every `getUsers` answer and serves
//! `getAllCachedUsers` and stale-tolerant lookups from it. The file lives next
//! to the rest of the client data.
//!
//! # Cache invalidation
//! The file is ignored (and rewritten on the next save) when:
//! - `CACHE_SCHEMA_VERSION` differs from the stored one
//! - it is missing or corrupt
//! - it is older than `MAX_CACHE_AGE_SECS`

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::constants::USER_CACHE_FILE;
use crate::models::{UserLookup, UserSummary};

/// Bump whenever `UserSummary` changes shape.
pub const CACHE_SCHEMA_VERSION: u32 = 1;

/// Maximum cache age in seconds (7 days).
const MAX_CACHE_AGE_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Serialize, Deserialize)]
struct CacheEnvelope {
    schema_version: u32,
    /// Unix seconds when this cache was written.
    saved_at: u64,
    users: UserLookup,
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("System clock error: {0}")]
    Clock(#[from] std::time::SystemTimeError),
}

/// Returns the path to the cache file inside `data_dir`.
pub fn cache_path(data_dir: &Path) -> PathBuf {
    data_dir.join(USER_CACHE_FILE)
}

#[derive(Debug, Clone, Default)]
pub struct UserCache {
    path: Option<PathBuf>,
    users: UserLookup,
}

impl UserCache {
    /// A cache that never touches the disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open the cache in `data_dir`, starting empty if the file is unusable.
    pub fn open(data_dir: &Path) -> Self {
        let path = cache_path(data_dir);
        let users = load(&path).unwrap_or_default();
        tracing::debug!("user_cache: loaded {} users from {}", users.len(), path.display());
        Self {
            path: Some(path),
            users,
        }
    }

    pub fn get(&self, user_id: &str) -> Option<&UserSummary> {
        self.users.get(user_id)
    }

    pub fn all(&self) -> UserLookup {
        self.users.clone()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Merge `users` in, keeping whichever summary is newer per user.
    /// Returns the number of entries that changed.
    pub fn upsert(&mut self, users: &[UserSummary]) -> usize {
        let mut changed = 0;
        for user in users {
            let is_newer = self
                .users
                .get(&user.user_id)
                .map(|existing| user.updated >= existing.updated && existing != user)
                .unwrap_or(true);
            if is_newer {
                self.users.insert(user.user_id.clone(), user.clone());
                changed += 1;
            }
        }
        changed
    }

    /// Write the cache atomically (temp file then rename). No-op for
    /// in-memory caches.
    pub fn save(&self) -> Result<(), CacheError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };

        let envelope = CacheEnvelope {
            schema_version: CACHE_SCHEMA_VERSION,
            saved_at: SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs(),
            users: self.users.clone(),
        };
        let bytes = bincode::serialize(&envelope)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let temp_file = path.with_extension("bin.tmp");
        std::fs::write(&temp_file, &bytes)?;
        std::fs::rename(&temp_file, path)?;
        Ok(())
    }
}

fn load(path: &Path) -> Option<UserLookup> {
    let bytes = std::fs::read(path).ok()?;
    let envelope: CacheEnvelope = bincode::deserialize(&bytes).ok()?;

    if envelope.schema_version != CACHE_SCHEMA_VERSION {
        tracing::info!(
            "user_cache: schema version mismatch (cached={} current={}), discarding",
            envelope.schema_version,
            CACHE_SCHEMA_VERSION
        );
        return None;
    }

    let now = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs();
    if now.saturating_sub(envelope.saved_at) > MAX_CACHE_AGE_SECS {
        tracing::info!(
            "user_cache: cache too old (age={}s max={}s), discarding",
            now.saturating_sub(envelope.saved_at),
            MAX_CACHE_AGE_SECS
        );
        return None;
    }

    Some(envelope.users)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn user(id: &str, name: &str, updated: u64) -> UserSummary {
        UserSummary {
            user_id: id.to_string(),
            username: Some(name.to_string()),
            seconds_since_last_online: 0,
            updated,
        }
    }

    #[test]
    fn test_save_and_reopen() {
        let dir = tempdir().unwrap();
        let mut cache = UserCache::open(dir.path());
        assert!(cache.is_empty());

        cache.upsert(&[user("u1", "alice", 1), user("u2", "bob", 1)]);
        cache.save().unwrap();

        let reopened = UserCache::open(dir.path());
        assert_eq!(reopened.len(), 2);
        assert_eq!(
            reopened.get("u1").and_then(|u| u.username.as_deref()),
            Some("alice")
        );
    }

    #[test]
    fn test_upsert_keeps_newer_summary() {
        let mut cache = UserCache::in_memory();
        assert_eq!(cache.upsert(&[user("u1", "new", 10)]), 1);
        assert_eq!(cache.upsert(&[user("u1", "old", 5)]), 0);
        assert_eq!(cache.upsert(&[user("u1", "new", 10)]), 0);
        assert_eq!(cache.upsert(&[user("u1", "newer", 11)]), 1);
        assert_eq!(
            cache.get("u1").and_then(|u| u.username.as_deref()),
            Some("newer")
        );
    }

    #[test]
    fn test_corrupt_file_is_ignored() {
        let dir = tempdir().unwrap();
        std::fs::write(cache_path(dir.path()), b"not bincode").unwrap();
        let cache = UserCache::open(dir.path());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_schema_mismatch_is_ignored() {
        let dir = tempdir().unwrap();
        let envelope = CacheEnvelope {
            schema_version: CACHE_SCHEMA_VERSION + 1,
            saved_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_secs(),
            users: UserLookup::from([("u1".to_string(), user("u1", "alice", 1))]),
        };
        std::fs::write(
            cache_path(dir.path()),
            bincode::serialize(&envelope).unwrap(),
        )
        .unwrap();

        assert!(UserCache::open(dir.path()).is_empty());
    }

    #[test]
    fn test_in_memory_save_is_noop() {
        let mut cache = UserCache::in_memory();
        cache.upsert(&[user("u1", "alice", 1)]);
        cache.save().unwrap();
        assert_eq!(cache.len(), 1);
    }
}
