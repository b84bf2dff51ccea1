//! Per-agent bounded chat history with compaction and disk persistence.

mod store;
mod tokens;

pub use store::MemoryStore;
pub use tokens::estimate_tokens;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default bound on stored messages before compaction triggers.
pub const DEFAULT_MAX_MESSAGES: usize = 100;
/// Conservative default token bound.
pub const DEFAULT_TOKEN_LIMIT: usize = 32_000;
/// Count of leading messages (the system/identity prefix) preserved verbatim
/// across any number of compactions.
pub const DEFAULT_HEAD_KEEP: usize = 2;
/// Floor on the message count a compaction leaves behind.
pub const DEFAULT_MIN_MESSAGES_AFTER_TRIM: usize = 20;

/// Legacy high-water marks from earlier EvoClaw releases; `migrate_limits`
/// clamps conversations loaded from disk with these values down to the
/// current safe defaults.
const LEGACY_TOKEN_LIMIT: usize = 100_000;
const LEGACY_MAX_MESSAGES: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Per-agent conversation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMemory {
    pub agent_id: String,
    pub messages: Vec<ChatMessage>,
    pub max_messages: usize,
    pub token_limit: usize,
    pub total_tokens: usize,
    pub compaction_count: u64,
    pub last_accessed: DateTime<Utc>,
    #[serde(default = "default_head_keep")]
    pub head_keep: usize,
    #[serde(default = "default_min_after_trim")]
    pub min_messages_after_trim: usize,
}

fn default_head_keep() -> usize {
    DEFAULT_HEAD_KEEP
}

fn default_min_after_trim() -> usize {
    DEFAULT_MIN_MESSAGES_AFTER_TRIM
}

impl ConversationMemory {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self::with_bounds(agent_id, DEFAULT_MAX_MESSAGES, DEFAULT_TOKEN_LIMIT)
    }

    pub fn with_bounds(agent_id: impl Into<String>, max_messages: usize, token_limit: usize) -> Self {
        Self {
            agent_id: agent_id.into(),
            messages: Vec::new(),
            max_messages,
            token_limit,
            total_tokens: 0,
            compaction_count: 0,
            last_accessed: Utc::now(),
            head_keep: DEFAULT_HEAD_KEEP,
            min_messages_after_trim: DEFAULT_MIN_MESSAGES_AFTER_TRIM.min(max_messages.max(1)),
        }
    }

    /// Clamp legacy high limits loaded from disk down to current safe
    /// defaults.
    pub fn migrate_limits(&mut self) {
        if self.token_limit >= LEGACY_TOKEN_LIMIT {
            self.token_limit = DEFAULT_TOKEN_LIMIT;
        }
        if self.max_messages >= LEGACY_MAX_MESSAGES {
            self.max_messages = self.max_messages.min(DEFAULT_MAX_MESSAGES);
        }
        if self.min_messages_after_trim > self.max_messages {
            self.min_messages_after_trim = self.max_messages;
        }
    }

    pub fn add(&mut self, role: Role, content: impl Into<String>) {
        let content = content.into();
        self.total_tokens += estimate_tokens(&content);
        self.messages.push(ChatMessage::new(role, content));
        self.last_accessed = Utc::now();
        if self.messages.len() > self.max_messages || self.total_tokens > self.token_limit {
            self.compact();
        }
    }

    /// Returns a copy: callers must not observe internal mutation.
    pub fn get_messages(&self) -> Vec<ChatMessage> {
        self.messages.clone()
    }

    /// Returns a copy of the last `n` messages (all of them when `n >= len`).
    pub fn get_recent(&self, n: usize) -> Vec<ChatMessage> {
        if n >= self.messages.len() {
            self.messages.clone()
        } else {
            self.messages[self.messages.len() - n..].to_vec()
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.total_tokens = 0;
    }

    /// Recompute `total_tokens` from scratch; converges to
    /// `sum(estimate_tokens(content))` regardless of prior manual mutation.
    pub fn recalculate_tokens(&mut self) {
        self.total_tokens = self.messages.iter().map(|m| estimate_tokens(&m.content)).sum();
    }

    /// Preserve the first `head_keep` messages verbatim, discard the middle
    /// down to `min_messages_after_trim`, and insert a synthetic marker at
    /// the seam.
    fn compact(&mut self) {
        self.compaction_count += 1;
        let head_keep = self.head_keep.min(self.messages.len());
        let head: Vec<ChatMessage> = self.messages[..head_keep].to_vec();
        let marker = ChatMessage::new(
            Role::Assistant,
            format!(
                "Compaction marker: {} earlier messages summarized",
                self.messages.len().saturating_sub(head_keep)
            ),
        );
        let target = self.min_messages_after_trim.max(head_keep + 1);
        let tail_budget = target.saturating_sub(head_keep + 1);
        let tail: Vec<ChatMessage> = if tail_budget == 0 {
            Vec::new()
        } else {
            let start = self.messages.len().saturating_sub(tail_budget);
            self.messages[start.max(head_keep)..].to_vec()
        };

        let mut rebuilt = head;
        rebuilt.push(marker);
        rebuilt.extend(tail);
        self.messages = rebuilt;
        self.recalculate_tokens();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// S1: with max_messages=10, add 30 filler messages after two
    /// sentinels. Sentinels survive, len stays bounded, a compaction marker
    /// is present, and compaction_count is positive.
    #[test]
    fn s1_memory_compaction() {
        let mut mem = ConversationMemory::with_bounds("agent-1", 10, DEFAULT_TOKEN_LIMIT);
        mem.add(Role::User, "A");
        mem.add(Role::User, "B");
        for _ in 0..30 {
            mem.add(Role::User, "filler");
        }

        assert!(mem.messages.len() <= 10);
        assert!(mem.compaction_count > 0);
        assert_eq!(mem.messages[0].content, "A");
        assert_eq!(mem.messages[1].content, "B");
        assert!(mem
            .messages
            .iter()
            .any(|m| matches!(m.role, Role::Assistant) && m.content.contains("Compaction")));
    }

    #[test]
    fn recalculate_tokens_converges_after_manual_mutation() {
        let mut mem = ConversationMemory::new("agent-2");
        mem.add(Role::User, "hello world");
        mem.messages.push(ChatMessage::new(Role::Assistant, "manual insert"));
        mem.recalculate_tokens();
        let expected: usize = mem.messages.iter().map(|m| estimate_tokens(&m.content)).sum();
        assert_eq!(mem.total_tokens, expected);
    }

    #[test]
    fn get_recent_returns_copy_and_clamps() {
        let mut mem = ConversationMemory::new("agent-3");
        for i in 0..5 {
            mem.add(Role::User, format!("m{i}"));
        }
        let recent = mem.get_recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].content, "m4");
        let all = mem.get_recent(100);
        assert_eq!(all.len(), 5);
    }

    #[test]
    fn clear_empties_messages_but_keeps_compaction_count() {
        let mut mem = ConversationMemory::with_bounds("agent-4", 3, DEFAULT_TOKEN_LIMIT);
        for i in 0..10 {
            mem.add(Role::User, format!("m{i}"));
        }
        let count_before = mem.compaction_count;
        assert!(count_before > 0);
        mem.clear();
        assert!(mem.messages.is_empty());
        assert_eq!(mem.total_tokens, 0);
        assert_eq!(mem.compaction_count, count_before);
    }

    #[test]
    fn migrate_limits_clamps_legacy_values() {
        let mut mem = ConversationMemory::with_bounds("agent-5", LEGACY_MAX_MESSAGES, LEGACY_TOKEN_LIMIT);
        mem.migrate_limits();
        assert_eq!(mem.token_limit, DEFAULT_TOKEN_LIMIT);
        assert_eq!(mem.max_messages, DEFAULT_MAX_MESSAGES);
    }
}
