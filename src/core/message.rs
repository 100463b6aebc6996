use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    pub fn as_str(self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
        }
    }

    pub fn is_user(self) -> bool {
        self == Sender::User
    }
}

/// A message as the client displays it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub sender: Sender,
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn new(id: impl Into<String>, text: impl Into<String>, sender: Sender) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            sender,
            timestamp: Some(Utc::now()),
        }
    }

    /// Build the canonical form of one stored or server-sent message.
    ///
    /// History has been written in two shapes over time: `{sender, text}` and
    /// `{role, content}`. Either is accepted; anything that is not `"user"`
    /// is treated as the assistant. Returns `None` when `raw` is not a JSON
    /// object at all.
    pub fn from_raw(conversation_id: i64, index: usize, raw: &Value) -> Option<Self> {
        let fields = raw.as_object()?;
        let is_user = ["sender", "role"]
            .iter()
            .filter_map(|key| fields.get(*key))
            .filter_map(Value::as_str)
            .any(|who| who == "user");
        let text = ["text", "content"]
            .iter()
            .filter_map(|key| fields.get(*key))
            .filter_map(Value::as_str)
            .find(|text| !text.is_empty())
            .unwrap_or_default();
        let timestamp = fields
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(parse_timestamp);

        Some(Self {
            id: format!("{conversation_id}-{index}"),
            text: text.to_string(),
            sender: if is_user {
                Sender::User
            } else {
                Sender::Assistant
            },
            timestamp,
        })
    }
}

/// Parse a server timestamp. RFC 3339 is preferred; a naive ISO-8601 value
/// (no offset) is read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn both_historical_shapes_normalize_alike() {
        let at = "2024-05-01T10:00:00Z";
        let legacy = json!({"sender": "user", "text": "hello", "timestamp": at});
        let current = json!({"role": "user", "content": "hello", "timestamp": at});

        let a = ChatMessage::from_raw(3, 0, &legacy).unwrap();
        let b = ChatMessage::from_raw(3, 0, &current).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.id, "3-0");
        assert_eq!(a.sender, Sender::User);
    }

    #[test]
    fn unknown_sender_is_the_assistant() {
        let message = ChatMessage::from_raw(1, 4, &json!({"role": "ai", "content": "hi"})).unwrap();
        assert_eq!(message.sender, Sender::Assistant);
        assert_eq!(message.timestamp, None);
        assert!(ChatMessage::from_raw(1, 0, &json!("plain string")).is_none());
    }

    #[test]
    fn timestamps_accept_offsets_and_naive_values() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-05-01T12:00:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T10:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T10:00:00.000000"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }
}
