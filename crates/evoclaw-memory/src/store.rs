//! Process-wide conversation store keyed by agent id, with a write-back
//! disk cache.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use evoclaw_core::{fsutil, Result};

use crate::{ConversationMemory, Role};

type Handle = Arc<Mutex<ConversationMemory>>;

pub struct MemoryStore {
    dir: PathBuf,
    max_messages: usize,
    token_limit: usize,
    cache: RwLock<HashMap<String, Handle>>,
}

impl MemoryStore {
    pub fn new(dir: impl Into<PathBuf>, max_messages: usize, token_limit: usize) -> Self {
        Self {
            dir: dir.into(),
            max_messages,
            token_limit,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn path_for(&self, agent_id: &str) -> PathBuf {
        self.dir.join(format!("{agent_id}.json"))
    }

    /// Returns the cached handle for `agent_id`, loading from disk if
    /// present, else creating a fresh memory. Touches `last_accessed`.
    pub fn get(&self, agent_id: &str) -> Handle {
        if let Some(existing) = self.cache.read().expect("memory cache poisoned").get(agent_id) {
            existing.lock().expect("memory record poisoned").last_accessed = chrono::Utc::now();
            return existing.clone();
        }

        let mut memory = self
            .load_from_disk(agent_id)
            .unwrap_or_else(|| ConversationMemory::with_bounds(agent_id, self.max_messages, self.token_limit));
        memory.migrate_limits();
        memory.last_accessed = chrono::Utc::now();

        let handle = Arc::new(Mutex::new(memory));
        let mut cache = self.cache.write().expect("memory cache poisoned");
        // Another writer may have raced us; prefer the existing entry.
        cache.entry(agent_id.to_string()).or_insert(handle).clone()
    }

    fn load_from_disk(&self, agent_id: &str) -> Option<ConversationMemory> {
        let path = self.path_for(agent_id);
        let data = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&data) {
            Ok(mem) => Some(mem),
            Err(e) => {
                tracing::warn!(agent_id, error = %e, "failed to parse conversation memory file, starting fresh");
                None
            }
        }
    }

    pub fn add(&self, agent_id: &str, role: Role, content: impl Into<String>) {
        let handle = self.get(agent_id);
        let mut mem = handle.lock().expect("memory record poisoned");
        mem.add(role, content);
    }

    pub fn get_messages(&self, agent_id: &str) -> Vec<crate::ChatMessage> {
        let handle = self.get(agent_id);
        let mem = handle.lock().expect("memory record poisoned");
        mem.get_messages()
    }

    pub fn get_recent(&self, agent_id: &str, n: usize) -> Vec<crate::ChatMessage> {
        let handle = self.get(agent_id);
        let mem = handle.lock().expect("memory record poisoned");
        mem.get_recent(n)
    }

    pub fn clear(&self, agent_id: &str) {
        let handle = self.get(agent_id);
        let mut mem = handle.lock().expect("memory record poisoned");
        mem.clear();
    }

    /// Serialize one agent's conversation to disk, atomically. Persistence
    /// failures are logged and never propagated to the caller.
    pub fn save(&self, agent_id: &str) {
        let handle = match self.cache.read().expect("memory cache poisoned").get(agent_id) {
            Some(h) => h.clone(),
            None => return,
        };
        let snapshot = {
            let mem = handle.lock().expect("memory record poisoned");
            mem.clone()
        };
        if let Err(e) = self.write_atomic(agent_id, &snapshot) {
            tracing::warn!(agent_id, error = %e, "failed to persist conversation memory");
        }
    }

    pub fn save_all(&self) {
        let ids: Vec<String> = self.cache.read().expect("memory cache poisoned").keys().cloned().collect();
        for id in ids {
            self.save(&id);
        }
    }

    fn write_atomic(&self, agent_id: &str, memory: &ConversationMemory) -> Result<()> {
        let path = self.path_for(agent_id);
        fsutil::atomic_write_json(&path, memory)
    }

    /// Flush-then-evict cached entries idle longer than `max_age`, and
    /// delete on-disk files whose mtime is older.
    pub fn cleanup(&self, max_age: Duration) {
        let now = chrono::Utc::now();
        let stale: Vec<String> = {
            let cache = self.cache.read().expect("memory cache poisoned");
            cache
                .iter()
                .filter_map(|(id, handle)| {
                    let mem = handle.lock().expect("memory record poisoned");
                    let idle = now.signed_duration_since(mem.last_accessed).to_std().unwrap_or_default();
                    (idle > max_age).then(|| id.clone())
                })
                .collect()
        };
        for id in &stale {
            self.save(id);
        }
        {
            let mut cache = self.cache.write().expect("memory cache poisoned");
            for id in &stale {
                cache.remove(id);
            }
        }
        if let Ok(entries) = fs::read_dir(&self.dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                if let Ok(meta) = entry.metadata() {
                    if let Ok(modified) = meta.modified() {
                        if modified.elapsed().map(|e| e > max_age).unwrap_or(false) {
                            let _ = fs::remove_file(&path);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_and_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path(), 100, 32_000);
        store.add("agent-a", Role::User, "hello");
        store.save("agent-a");

        let store2 = MemoryStore::new(dir.path(), 100, 32_000);
        let messages = store2.get_messages("agent-a");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "hello");
    }

    #[test]
    fn missing_file_creates_fresh_memory() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path(), 100, 32_000);
        let messages = store.get_messages("never-seen");
        assert!(messages.is_empty());
    }

    #[test]
    fn corrupt_file_is_logged_and_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad-agent.json"), b"not json").unwrap();
        let store = MemoryStore::new(dir.path(), 100, 32_000);
        let messages = store.get_messages("bad-agent");
        assert!(messages.is_empty());
    }
}
