//! 房间会话注册表
//!
//! 按房间分片保存在线会话与有界的广播历史。不同房间之间互不争用；
//! 增删会话只由广播中心的事件循环调用。

use crate::error::HubError;
use crate::realtime::envelope::{Envelope, SessionId};
use crate::realtime::session::{SendError, Session};
use dashmap::DashMap;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

struct WsRoom {
    clients: HashMap<SessionId, Arc<Session>>,
    history: VecDeque<Envelope>,
}

impl WsRoom {
    fn new() -> Self {
        Self {
            clients: HashMap::new(),
            history: VecDeque::new(),
        }
    }
}

/// 单个房间的快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomStats {
    pub clients: usize,
    pub history: usize,
}

/// 单次广播的投递结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub dropped: usize,
}

pub struct RoomRegistry {
    rooms: DashMap<String, WsRoom>,
    history_capacity: usize,
}

impl RoomRegistry {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            history_capacity: history_capacity.max(1),
        }
    }

    /// 加入会话，同一会话重复加入不做任何修改，返回是否为新加入
    pub fn add(&self, session: Arc<Session>) -> bool {
        let room_id = session.room_id().to_owned();
        let mut room = self.rooms.entry(room_id.clone()).or_insert_with(|| {
            info!(room_id = %room_id, "创建实时房间");
            WsRoom::new()
        });

        if room.clients.contains_key(&session.id()) {
            return false;
        }
        room.clients.insert(session.id(), session);
        true
    }

    /// 移除会话并关闭它；房间内没有会话时丢弃整个房间及其历史
    pub fn remove(&self, session: &Session) -> bool {
        session.close();

        let removed = match self.rooms.get_mut(session.room_id()) {
            Some(mut room) => room.clients.remove(&session.id()).is_some(),
            None => false,
        };

        if self
            .rooms
            .remove_if(session.room_id(), |_, room| room.clients.is_empty())
            .is_some()
        {
            info!(room_id = %session.room_id(), "实时房间已无会话，已移除");
        }
        removed
    }

    /// 广播到房间内除来源外的每个会话
    ///
    /// 写入是非阻塞的：某个会话队列已满时只丢弃该会话的这条事件。
    pub fn broadcast(&self, envelope: &Envelope) -> Result<Delivery, HubError> {
        let mut room = self
            .rooms
            .get_mut(&envelope.room_id)
            .ok_or_else(|| HubError::RoomNotFound(envelope.room_id.clone()))?;

        if room.history.len() >= self.history_capacity {
            room.history.pop_front();
        }
        room.history.push_back(envelope.clone());

        let mut delivery = Delivery::default();
        for (session_id, session) in &room.clients {
            if envelope.origin == Some(*session_id) {
                continue;
            }
            match session.try_send(envelope.clone()) {
                Ok(()) => delivery.delivered += 1,
                Err(SendError::Full) => {
                    delivery.dropped += 1;
                    warn!(
                        room_id = %envelope.room_id,
                        session_id = %session_id,
                        event = envelope.event.kind(),
                        "会话出站队列已满，丢弃事件"
                    );
                }
                Err(err) => {
                    delivery.dropped += 1;
                    debug!(session_id = %session_id, error = %err, "会话已关闭，跳过");
                }
            }
        }
        Ok(delivery)
    }

    pub fn room_stats(&self, room_id: &str) -> Option<RoomStats> {
        self.rooms.get(room_id).map(|room| RoomStats {
            clients: room.clients.len(),
            history: room.history.len(),
        })
    }

    /// 房间内存中的广播历史，从旧到新
    pub fn history(&self, room_id: &str) -> Vec<Envelope> {
        self.rooms
            .get(room_id)
            .map(|room| room.history.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// 关闭并移除所有会话，返回关闭的会话数
    pub fn disconnect_all(&self) -> usize {
        let mut closed = 0;
        for room in self.rooms.iter() {
            for session in room.clients.values() {
                session.close();
                closed += 1;
            }
        }
        self.rooms.clear();
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::envelope::Event;

    fn session(room_id: &str, name: &str) -> (Arc<Session>, tokio::sync::mpsc::Receiver<Envelope>) {
        Session::new(room_id, format!("{name}-id"), name, 4)
    }

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let registry = RoomRegistry::new(8);
        let (alice, _rx) = session("room-1", "alice");

        assert!(registry.add(alice.clone()));
        assert!(!registry.add(alice.clone()));
        assert_eq!(registry.room_stats("room-1").unwrap().clients, 1);
    }

    #[tokio::test]
    async fn test_broadcast_skips_origin() {
        let registry = RoomRegistry::new(8);
        let (alice, mut alice_rx) = session("room-1", "alice");
        let (bob, mut bob_rx) = session("room-1", "bob");
        registry.add(alice.clone());
        registry.add(bob.clone());

        let envelope =
            Envelope::chat("room-1", alice.user_id(), "alice", "hi").with_origin(alice.id());
        let delivery = registry.broadcast(&envelope).unwrap();

        assert_eq!(delivery, Delivery { delivered: 1, dropped: 0 });
        let received = bob_rx.recv().await.unwrap();
        assert!(matches!(received.event, Event::MessageReceived(ref m) if m.content == "hi"));
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_slow_consumer_does_not_block_others() {
        let registry = RoomRegistry::new(8);
        let (slow, _slow_rx) = session("room-1", "slow");
        let (fast, mut fast_rx) = session("room-1", "fast");
        registry.add(slow.clone());
        registry.add(fast.clone());

        // 填满慢会话的队列
        for i in 0..4 {
            slow.try_send(Envelope::chat("room-1", "x", "x", format!("fill-{i}")))
                .unwrap();
        }

        let delivery = registry
            .broadcast(&Envelope::chat("room-1", "x", "x", "live"))
            .unwrap();

        assert_eq!(delivery, Delivery { delivered: 1, dropped: 1 });
        assert!(fast_rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let registry = RoomRegistry::new(2);
        let (alice, _rx) = session("room-1", "alice");
        registry.add(alice);

        for content in ["one", "two", "three"] {
            registry
                .broadcast(&Envelope::chat("room-1", "x", "x", content))
                .unwrap();
        }

        let history = registry.history("room-1");
        assert_eq!(history.len(), 2);
        assert!(matches!(&history[0].event, Event::MessageReceived(m) if m.content == "two"));
    }

    #[tokio::test]
    async fn test_last_session_tears_down_room() {
        let registry = RoomRegistry::new(8);
        let (alice, _a) = session("room-1", "alice");
        let (bob, _b) = session("room-1", "bob");
        registry.add(alice.clone());
        registry.add(bob.clone());

        assert!(registry.remove(&alice));
        assert!(alice.is_closed());
        assert!(registry.room_stats("room-1").is_some());

        assert!(registry.remove(&bob));
        assert!(!registry.remove(&bob));
        assert!(registry.room_stats("room-1").is_none());
        assert_eq!(
            registry.broadcast(&Envelope::chat("room-1", "x", "x", "late")),
            Err(HubError::RoomNotFound("room-1".into()))
        );
    }

    #[tokio::test]
    async fn test_disconnect_all_closes_sessions() {
        let registry = RoomRegistry::new(8);
        let (alice, _a) = session("room-1", "alice");
        let (bob, _b) = session("room-2", "bob");
        registry.add(alice.clone());
        registry.add(bob.clone());

        assert_eq!(registry.disconnect_all(), 2);
        assert!(alice.is_closed() && bob.is_closed());
        assert_eq!(registry.room_count(), 0);
    }
}
