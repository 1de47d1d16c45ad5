//! 内存消息存储
//!
//! 每个房间保留固定条数的消息，超出时丢弃最旧的一条。

use async_trait::async_trait;
use config::MessageStoreConfig;
use domain::{DomainError, DomainResult, Message, MessageRepository};
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;
use tracing::debug;

const DEFAULT_CAPACITY_PER_ROOM: usize = 100;

/// 内存消息存储
pub struct InMemoryMessageRepository {
    rooms: RwLock<HashMap<String, VecDeque<Message>>>,
    capacity_per_room: usize,
}

impl InMemoryMessageRepository {
    pub fn new(capacity_per_room: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            capacity_per_room: if capacity_per_room == 0 {
                DEFAULT_CAPACITY_PER_ROOM
            } else {
                capacity_per_room
            },
        }
    }

    pub fn from_config(config: &MessageStoreConfig) -> Self {
        Self::new(config.capacity_per_room)
    }
}

impl Default for InMemoryMessageRepository {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY_PER_ROOM)
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn create(&self, message: Message) -> DomainResult<()> {
        if message.room_id.is_empty() {
            return Err(DomainError::invalid_input("room_id", "不能为空"));
        }

        let mut rooms = self.rooms.write().await;
        let messages = rooms.entry(message.room_id.clone()).or_default();
        if messages.len() >= self.capacity_per_room {
            messages.pop_front();
        }
        messages.push_back(message);
        Ok(())
    }

    async fn get_by_room_id(&self, room_id: &str) -> DomainResult<Vec<Message>> {
        let rooms = self.rooms.read().await;
        Ok(rooms
            .get(room_id)
            .map(|messages| messages.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_by_id(&self, room_id: &str, message_id: &str) -> DomainResult<Message> {
        let rooms = self.rooms.read().await;
        rooms
            .get(room_id)
            .and_then(|messages| messages.iter().find(|m| m.id == message_id))
            .cloned()
            .ok_or(DomainError::MessageNotFound)
    }

    async fn delete(&self, message: &Message) -> DomainResult<()> {
        let mut rooms = self.rooms.write().await;
        if let Some(messages) = rooms.get_mut(&message.room_id) {
            if let Some(index) = messages.iter().position(|m| m.id == message.id) {
                messages.remove(index);
            }
        }
        Ok(())
    }

    async fn delete_by_room_id(&self, room_id: &str) -> DomainResult<()> {
        let removed = self.rooms.write().await.remove(room_id);
        if let Some(messages) = removed {
            debug!(room_id = %room_id, count = messages.len(), "已清除房间消息");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{Member, User};

    fn message(room_id: &str, content: &str) -> Message {
        let member = Member::new("alice-token", User::new("alice").unwrap());
        Message::new(&member, content, room_id).unwrap()
    }

    #[tokio::test]
    async fn test_messages_are_returned_oldest_first() {
        let store = InMemoryMessageRepository::default();
        for content in ["one", "two", "three"] {
            store.create(message("room-1", content)).await.unwrap();
        }
        store.create(message("room-2", "other")).await.unwrap();

        let contents: Vec<String> = store
            .get_by_room_id("room-1")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, ["one", "two", "three"]);
        assert!(store.get_by_room_id("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_capacity_drops_oldest() {
        let store = InMemoryMessageRepository::new(2);
        for content in ["one", "two", "three"] {
            store.create(message("room-1", content)).await.unwrap();
        }

        let messages = store.get_by_room_id("room-1").await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "two");
        assert_eq!(messages[1].content, "three");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent_and_keeps_order() {
        let store = InMemoryMessageRepository::default();
        let first = message("room-1", "one");
        let second = message("room-1", "two");
        let third = message("room-1", "three");
        for m in [&first, &second, &third] {
            store.create(m.clone()).await.unwrap();
        }

        store.delete(&second).await.unwrap();
        store.delete(&second).await.unwrap();

        assert_eq!(
            store.get_by_id("room-1", &second.id).await,
            Err(DomainError::MessageNotFound)
        );
        let remaining = store.get_by_room_id("room-1").await.unwrap();
        assert_eq!(remaining, vec![first, third]);
    }

    #[tokio::test]
    async fn test_delete_by_room_id() {
        let store = InMemoryMessageRepository::default();
        let kept = message("room-2", "stay");
        store.create(message("room-1", "gone")).await.unwrap();
        store.create(kept.clone()).await.unwrap();

        store.delete_by_room_id("room-1").await.unwrap();
        store.delete_by_room_id("room-1").await.unwrap();

        assert!(store.get_by_room_id("room-1").await.unwrap().is_empty());
        assert_eq!(store.get_by_id("room-2", &kept.id).await.unwrap(), kept);
    }
}
