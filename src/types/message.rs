//! Transcript message model.

use chrono::{DateTime, Duration, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One entry of the conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique id within a transcript. Generated, never derived from the clock.
    pub id: String,
    /// Sequence id assigned by the transcript store on save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub streaming: bool,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            seq: None,
            content: text.into(),
            sender: Sender::User,
            timestamp: Utc::now(),
            streaming: false,
        }
    }

    pub fn ai(text: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            seq: None,
            content: text.into(),
            sender: Sender::Ai,
            timestamp: Utc::now(),
            streaming: false,
        }
    }

    /// Empty AI message shown while a reply is still streaming in.
    pub fn placeholder() -> Self {
        Self {
            streaming: true,
            ..Self::ai("")
        }
    }

    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }

    /// Mark a streaming message as complete with its full text.
    pub fn finalize(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self.streaming = false;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

pub fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

/// Ordered conversation history. Insertion order is conversation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Insert a message, replacing any existing entry with the same id in place.
    pub fn upsert(&mut self, message: Message) {
        match self.messages.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => *existing = message,
            None => self.messages.push(message),
        }
    }

    /// Replace the content of the message with `id`. Returns false when absent.
    pub fn set_content(&mut self, id: &str, content: &str, streaming: bool) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(m) => {
                m.content.clear();
                m.content.push_str(content);
                m.streaming = streaming;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Message> {
        let idx = self.messages.iter().position(|m| m.id == id)?;
        Some(self.messages.remove(idx))
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.is_user())
    }

    /// Next sequence id: max existing + 1, or 1 for an empty transcript.
    pub fn next_seq(&self) -> u64 {
        self.messages
            .iter()
            .filter_map(|m| m.seq)
            .max()
            .map(|max| max + 1)
            .unwrap_or(1)
    }
}

/// Short display form of a message timestamp, relative to `now`.
///
/// Same day: `3:07 PM`; previous day: `Yesterday 3:07 PM`; otherwise `Mar 4, 3:07 PM`.
pub fn format_message_time(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let ts = timestamp.with_timezone(&Local);
    let today = now.with_timezone(&Local).date_naive();
    let clock = ts.format("%-I:%M %p");
    if ts.date_naive() == today {
        clock.to_string()
    } else if Some(ts.date_naive()) == today.checked_sub_signed(Duration::days(1)) {
        format!("Yesterday {}", clock)
    } else {
        ts.format("%b %-d, %-I:%M %p").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_even_when_created_back_to_back() {
        let a = Message::user("a");
        let b = Message::user("b");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn upsert_replaces_by_id_and_keeps_position() {
        let mut t = Transcript::new();
        let first = Message::user("one");
        let second = Message::ai("two");
        t.upsert(first.clone());
        t.upsert(second.clone());
        t.upsert(first.clone().finalize("uno"));
        assert_eq!(t.len(), 2);
        assert_eq!(t.messages()[0].content, "uno");
        assert_eq!(t.messages()[1].id, second.id);
    }

    #[test]
    fn set_content_and_remove() {
        let mut t = Transcript::new();
        let p = Message::placeholder();
        let id = p.id.clone();
        t.upsert(p);
        assert!(t.set_content(&id, "Once", true));
        assert_eq!(t.get(&id).map(|m| m.content.as_str()), Some("Once"));
        assert!(t.remove(&id).is_some());
        assert!(t.is_empty());
        assert!(!t.set_content(&id, "x", false));
    }

    #[test]
    fn next_seq_ignores_unsequenced_messages() {
        let mut t = Transcript::new();
        assert_eq!(t.next_seq(), 1);
        let mut m = Message::user("x");
        m.seq = Some(7);
        t.upsert(m);
        t.upsert(Message::user("no seq"));
        assert_eq!(t.next_seq(), 8);
    }

    #[test]
    fn serializes_with_lowercase_sender() {
        let m = Message::ai("hi");
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v["sender"], "ai");
        assert_eq!(v["streaming"], false);
        assert!(v.get("seq").is_none());
    }

    #[test]
    fn time_formatting_today_yesterday_and_older() {
        let now = Utc::now();
        let today = format_message_time(now, now);
        assert!(today.ends_with("AM") || today.ends_with("PM"));
        assert!(!today.starts_with("Yesterday"));

        let yesterday = format_message_time(now - Duration::days(1), now);
        assert!(yesterday.starts_with("Yesterday "));

        let older = format_message_time(now - Duration::days(40), now);
        assert!(older.contains(','));
    }
}
