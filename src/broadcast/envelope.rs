//! Event envelopes and their event-stream wire framing.

use std::borrow::Cow;
use std::fmt;

use serde::Serialize;

/// Body of the heartbeat frame.
pub const PING: &str = "PING";

/// Complete heartbeat frame as written to the stream.
pub const PING_FRAME: &str = "data: PING\n\n";

/// Tag identifying what changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NewPost,
    DelPost,
    UpdateLikes,
}

impl EventKind {
    /// The tag as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::NewPost => "newPost",
            EventKind::DelPost => "delPost",
            EventKind::UpdateLikes => "updateLikes",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable published event. The registry never looks inside `payload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventEnvelope {
    kind: EventKind,
    payload: String,
}

impl EventEnvelope {
    pub fn new(kind: EventKind, payload: impl Into<String>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// `newPost` carrying the serialized record.
    pub fn new_post<T: Serialize>(record: &T) -> serde_json::Result<Self> {
        Ok(Self::new(EventKind::NewPost, serde_json::to_string(record)?))
    }

    /// `delPost` carrying the post id.
    pub fn deleted_post(post_id: impl Into<String>) -> Self {
        Self::new(EventKind::DelPost, post_id)
    }

    /// `updateLikes` carrying the post id.
    pub fn likes_updated(post_id: impl Into<String>) -> Self {
        Self::new(EventKind::UpdateLikes, post_id)
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Wire encoding: `kind;payload`.
    pub fn encode(&self) -> String {
        format!("{};{}", self.kind, self.payload)
    }
}

/// Rewrites CRLF and lone CR line breaks as LF.
///
/// The event-stream format ends a line at any of the three, so after this
/// every line break in a message is a `\n`.
pub fn normalize_line_breaks(message: &str) -> Cow<'_, str> {
    if message.contains('\r') {
        Cow::Owned(message.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(message)
    }
}

/// Frames one message as a single event: one `data:` line per message line,
/// then the blank line that ends the event.
pub fn sse_frame(message: &str) -> String {
    let message = normalize_line_breaks(message);
    let mut frame = String::with_capacity(message.len() + 8);
    for line in message.split('\n') {
        frame.push_str("data: ");
        frame.push_str(line);
        frame.push('\n');
    }
    frame.push('\n');
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_uses_kind_prefix() {
        assert_eq!(EventEnvelope::deleted_post("42").encode(), "delPost;42");
        assert_eq!(EventEnvelope::likes_updated("7").encode(), "updateLikes;7");
    }

    #[test]
    fn test_new_post_serializes_record() {
        let envelope = EventEnvelope::new_post(&json!({ "id": "1" })).unwrap();

        assert_eq!(envelope.kind(), EventKind::NewPost);
        assert_eq!(envelope.encode(), r#"newPost;{"id":"1"}"#);
    }

    #[test]
    fn test_payload_is_not_interpreted() {
        let envelope = EventEnvelope::new(EventKind::DelPost, "a;b;c\n");
        assert_eq!(envelope.payload(), "a;b;c\n");
        assert_eq!(envelope.encode(), "delPost;a;b;c\n");
    }

    #[test]
    fn test_sse_frame() {
        assert_eq!(sse_frame("delPost;1"), "data: delPost;1\n\n");
        assert_eq!(sse_frame(PING), PING_FRAME);
    }

    #[test]
    fn test_multi_line_payload_stays_one_event() {
        let message = EventEnvelope::deleted_post("1\n\ndata: updateLikes;forged").encode();
        let frame = sse_frame(&message);

        assert_eq!(frame, "data: delPost;1\ndata: \ndata: data: updateLikes;forged\n\n");
        // Only the terminator is a blank line
        assert_eq!(frame.matches("\n\n").count(), 1);
        assert!(frame.ends_with("\n\n"));
    }

    #[test]
    fn test_carriage_returns_are_line_breaks() {
        assert_eq!(sse_frame("a\r\nb\rc"), "data: a\ndata: b\ndata: c\n\n");
        assert_eq!(normalize_line_breaks("plain"), Cow::Borrowed("plain"));
    }
}
