use chrono::{DateTime, Utc};
use std::collections::VecDeque;

const DEFAULT_CAPACITY: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub sender: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub is_own: bool,
}

/// Bounded meeting chat history with an unread counter
#[derive(Debug)]
pub struct ChatLog {
    entries: VecDeque<ChatEntry>,
    capacity: usize,
    unread: usize,
    panel_open: bool,
}

impl Default for ChatLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl ChatLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
            unread: 0,
            panel_open: false,
        }
    }

    pub fn push_own(&mut self, sender: &str, message: &str, timestamp: DateTime<Utc>) {
        self.push(ChatEntry {
            sender: sender.to_string(),
            message: message.to_string(),
            timestamp,
            is_own: true,
        });
    }

    pub fn push_remote(&mut self, sender: &str, message: &str, timestamp: DateTime<Utc>) {
        self.push(ChatEntry {
            sender: sender.to_string(),
            message: message.to_string(),
            timestamp,
            is_own: false,
        });
        if !self.panel_open {
            self.unread += 1;
        }
    }

    /// Opening the panel marks everything read
    pub fn set_panel_open(&mut self, open: bool) {
        self.panel_open = open;
        if open {
            self.unread = 0;
        }
    }

    pub fn mark_read(&mut self) {
        self.unread = 0;
    }

    pub fn unread(&self) -> usize {
        self.unread
    }

    /// Badge text, `None` when nothing is unread
    pub fn unread_badge(&self) -> Option<String> {
        match self.unread {
            0 => None,
            n if n > 99 => Some("99+".to_string()),
            n => Some(n.to_string()),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &ChatEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.unread = 0;
    }

    fn push(&mut self, entry: ChatEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unread_counts_only_remote_while_closed() {
        let mut log = ChatLog::default();
        let now = Utc::now();

        log.push_own("Me (You)", "hello", now);
        log.push_remote("Anna", "hi", now);
        log.push_remote("Boaz", "shalom", now);
        assert_eq!(log.unread(), 2);

        log.set_panel_open(true);
        assert_eq!(log.unread(), 0);
        log.push_remote("Anna", "again", now);
        assert_eq!(log.unread(), 0);
        assert_eq!(log.len(), 4);
    }

    #[test]
    fn test_badge_saturates() {
        let mut log = ChatLog::with_capacity(10);
        let now = Utc::now();
        for i in 0..120 {
            log.push_remote("Anna", &i.to_string(), now);
        }
        assert_eq!(log.unread_badge().as_deref(), Some("99+"));
        assert_eq!(log.len(), 10);
        assert_eq!(log.entries().next().unwrap().message, "110");

        log.mark_read();
        assert_eq!(log.unread_badge(), None);
    }
}
