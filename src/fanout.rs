// src/fanout.rs

use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::comment::CommentResponse;

/// Events pushed to subscribers of the comments topic.
/// Serialized as `{"type": "...", "payload": ...}` on the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum CommentEvent {
    #[serde(rename = "comment:new")]
    New(CommentResponse),
    /// Also emitted for reaction toggles, carrying the refreshed comment.
    #[serde(rename = "comment:update")]
    Update(CommentResponse),
    /// Carries only the deleted comment's id.
    #[serde(rename = "comment:delete")]
    Delete(i64),
}

/// Broadcast hub for the single comments topic.
///
/// Mutation handlers publish here after the store write succeeds; each
/// WebSocket connection holds a receiver. Delivery is best-effort:
/// nobody listening is not an error, and a subscriber that lags simply
/// misses events.
#[derive(Clone)]
pub struct CommentsHub {
    tx: broadcast::Sender<CommentEvent>,
}

impl CommentsHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CommentEvent> {
        self.tx.subscribe()
    }

    /// Publishes an event, returning how many subscribers it reached.
    pub fn broadcast(&self, event: CommentEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::comment::CommentAuthor;

    fn sample_comment(id: i64) -> CommentResponse {
        CommentResponse {
            id,
            text: "hello".to_string(),
            author: CommentAuthor {
                id: 1,
                username: "alice".to_string(),
            },
            parent_comment: None,
            likes: vec![],
            dislikes: vec![],
            like_count: 0,
            dislike_count: 0,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn broadcast_without_subscribers_is_not_an_error() {
        let hub = CommentsHub::new(8);
        assert_eq!(hub.broadcast(CommentEvent::Delete(1)), 0);
    }

    #[tokio::test]
    async fn subscribers_receive_events() {
        let hub = CommentsHub::new(8);
        let mut rx = hub.subscribe();

        assert_eq!(hub.broadcast(CommentEvent::New(sample_comment(7))), 1);

        match rx.recv().await.unwrap() {
            CommentEvent::New(comment) => assert_eq!(comment.id, 7),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn events_serialize_with_type_and_payload() {
        let json = serde_json::to_value(CommentEvent::Delete(42)).unwrap();
        assert_eq!(json["type"], "comment:delete");
        assert_eq!(json["payload"], 42);

        let json = serde_json::to_value(CommentEvent::New(sample_comment(3))).unwrap();
        assert_eq!(json["type"], "comment:new");
        assert_eq!(json["payload"]["id"], 3);
        assert_eq!(json["payload"]["author"]["username"], "alice");
        assert_eq!(json["payload"]["likeCount"], 0);
    }
}
