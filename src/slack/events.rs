//! Slack Events API payloads.

use serde::Deserialize;

use crate::pipeline::types::FileEvent;

/// Outer Events API request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventEnvelope {
    /// Sent once when the request URL is configured.
    UrlVerification { challenge: String },
    /// A subscribed event.
    EventCallback {
        #[serde(default)]
        event_id: Option<String>,
        event: SlackEvent,
    },
    #[serde(other)]
    Unknown,
}

/// Inner event of an `event_callback`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackEvent {
    FileShared(FileSharedEvent),
    AppMention(MessageEvent),
    Message(MessageEvent),
    #[serde(other)]
    Unsupported,
}

impl SlackEvent {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::FileShared(_) => "file_shared",
            Self::AppMention(_) => "app_mention",
            Self::Message(_) => "message",
            Self::Unsupported => "unsupported",
        }
    }
}

/// `file_shared` event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileSharedEvent {
    #[serde(default)]
    pub file_id: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub event_ts: Option<String>,
}

impl From<&FileSharedEvent> for FileEvent {
    fn from(event: &FileSharedEvent) -> Self {
        Self {
            file_id: event.file_id.clone(),
            channel_id: event.channel_id.clone(),
            user_id: event.user_id.clone(),
        }
    }
}

/// `message` and `app_mention` events.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageEvent {
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
}

impl MessageEvent {
    /// Posted by a bot (including this one).
    pub fn is_from_bot(&self) -> bool {
        self.bot_id.is_some() || self.subtype.as_deref() == Some("bot_message")
    }

    /// Timestamp a reply should be threaded under.
    pub fn reply_thread(&self) -> Option<&str> {
        self.thread_ts.as_deref().or(self.ts.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_url_verification() {
        let body = r#"{"token":"x","challenge":"abc123","type":"url_verification"}"#;
        let envelope: EventEnvelope = serde_json::from_str(body).unwrap();
        assert!(matches!(
            envelope,
            EventEnvelope::UrlVerification { challenge } if challenge == "abc123"
        ));
    }

    #[test]
    fn parses_file_shared_callback() {
        let body = serde_json::json!({
            "type": "event_callback",
            "event_id": "Ev1",
            "team_id": "T1",
            "event": {
                "type": "file_shared",
                "file_id": "F1",
                "user_id": "U1",
                "channel_id": "C1",
                "file": { "id": "F1" },
                "event_ts": "1700000000.000200"
            }
        });
        let envelope: EventEnvelope = serde_json::from_value(body).unwrap();
        let EventEnvelope::EventCallback { event_id, event } = envelope else {
            panic!("expected event_callback");
        };
        assert_eq!(event_id.as_deref(), Some("Ev1"));
        let SlackEvent::FileShared(file) = event else {
            panic!("expected file_shared");
        };
        assert_eq!(
            FileEvent::from(&file),
            FileEvent {
                file_id: "F1".into(),
                channel_id: "C1".into(),
                user_id: "U1".into(),
            }
        );
    }

    #[test]
    fn unknown_event_types_are_tolerated() {
        let body = serde_json::json!({
            "type": "event_callback",
            "event": { "type": "reaction_added", "reaction": "tada" }
        });
        let envelope: EventEnvelope = serde_json::from_value(body).unwrap();
        assert!(matches!(
            envelope,
            EventEnvelope::EventCallback { event: SlackEvent::Unsupported, .. }
        ));

        let envelope: EventEnvelope =
            serde_json::from_value(serde_json::json!({ "type": "app_rate_limited" })).unwrap();
        assert!(matches!(envelope, EventEnvelope::Unknown));
    }

    #[test]
    fn bot_messages_are_detected() {
        let by_bot: MessageEvent = serde_json::from_value(serde_json::json!({
            "channel": "C1", "text": "help", "bot_id": "B1", "ts": "1.0"
        }))
        .unwrap();
        assert!(by_bot.is_from_bot());

        let legacy: MessageEvent = serde_json::from_value(serde_json::json!({
            "channel": "C1", "text": "help", "subtype": "bot_message"
        }))
        .unwrap();
        assert!(legacy.is_from_bot());

        let human = MessageEvent {
            channel: "C1".into(),
            text: "help".into(),
            ts: Some("1.0".into()),
            ..Default::default()
        };
        assert!(!human.is_from_bot());
        assert_eq!(human.reply_thread(), Some("1.0"));
    }

    #[test]
    fn reply_thread_prefers_existing_thread() {
        let msg = MessageEvent {
            ts: Some("2.0".into()),
            thread_ts: Some("1.0".into()),
            ..Default::default()
        };
        assert_eq!(msg.reply_thread(), Some("1.0"));
    }
}
