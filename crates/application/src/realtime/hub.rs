//! 实时广播中心
//!
//! 单一事件循环串行处理注册、注销和广播三个通道，同一房间内的
//! 成员变更与广播因此不会交错。注册后在后台回放已保存的历史消息，
//! 回放不保证先于并发产生的实时广播到达。

use crate::error::HubError;
use crate::realtime::envelope::Envelope;
use crate::realtime::registry::{RoomRegistry, RoomStats};
use crate::realtime::session::Session;
use config::HubConfig;
use domain::MessageRepository;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// 需要确认的会话变更请求
struct Membership {
    session: Arc<Session>,
    applied: oneshot::Sender<()>,
}

/// 广播中心的调用端，可以任意克隆
#[derive(Clone)]
pub struct HubHandle {
    register: mpsc::Sender<Membership>,
    unregister: mpsc::Sender<Membership>,
    broadcast: mpsc::Sender<Envelope>,
    registry: Arc<RoomRegistry>,
}

impl HubHandle {
    /// 注册会话，广播中心应用后返回
    pub async fn register(&self, session: Arc<Session>) -> Result<(), HubError> {
        Self::submit(&self.register, session).await
    }

    /// 注销会话，广播中心应用后返回
    pub async fn unregister(&self, session: Arc<Session>) -> Result<(), HubError> {
        Self::submit(&self.unregister, session).await
    }

    /// 排队广播，房间不存在等错误只在广播中心内记录
    pub async fn broadcast(&self, envelope: Envelope) -> Result<(), HubError> {
        self.broadcast
            .send(envelope)
            .await
            .map_err(|_| HubError::Closed)
    }

    /// 只写的广播通道
    pub fn broadcast_sender(&self) -> mpsc::Sender<Envelope> {
        self.broadcast.clone()
    }

    pub fn room_stats(&self, room_id: &str) -> Option<RoomStats> {
        self.registry.room_stats(room_id)
    }

    async fn submit(
        channel: &mpsc::Sender<Membership>,
        session: Arc<Session>,
    ) -> Result<(), HubError> {
        let (applied, done) = oneshot::channel();
        channel
            .send(Membership { session, applied })
            .await
            .map_err(|_| HubError::Closed)?;
        done.await.map_err(|_| HubError::Closed)
    }
}

pub struct Hub {
    registry: Arc<RoomRegistry>,
    message_repository: Arc<dyn MessageRepository>,
    register: mpsc::Receiver<Membership>,
    unregister: mpsc::Receiver<Membership>,
    broadcast: mpsc::Receiver<Envelope>,
    replay_limit: usize,
    replay_timeout: Duration,
    replays: TaskTracker,
}

impl Hub {
    pub fn new(
        config: &HubConfig,
        message_repository: Arc<dyn MessageRepository>,
    ) -> (Self, HubHandle) {
        let registry = Arc::new(RoomRegistry::new(config.history_capacity));
        let (register_tx, register_rx) = mpsc::channel(1);
        let (unregister_tx, unregister_rx) = mpsc::channel(1);
        let (broadcast_tx, broadcast_rx) = mpsc::channel(config.broadcast_buffer.max(1));

        let hub = Self {
            registry: registry.clone(),
            message_repository,
            register: register_rx,
            unregister: unregister_rx,
            broadcast: broadcast_rx,
            replay_limit: config.history_replay_limit,
            replay_timeout: config.history_replay_timeout(),
            replays: TaskTracker::new(),
        };
        let handle = HubHandle {
            register: register_tx,
            unregister: unregister_tx,
            broadcast: broadcast_tx,
            registry,
        };
        (hub, handle)
    }

    /// 与句柄共享的会话注册表
    pub fn registry(&self) -> Arc<RoomRegistry> {
        self.registry.clone()
    }

    /// 运行事件循环，直到收到取消信号或所有调用端都已释放
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("实时广播中心已启动");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(request) = self.register.recv() => self.on_register(request),
                Some(request) = self.unregister.recv() => self.on_unregister(request),
                Some(envelope) = self.broadcast.recv() => self.on_broadcast(envelope),
                else => break,
            }
        }

        let closed = self.registry.disconnect_all();
        self.replays.close();
        self.replays.wait().await;
        info!(sessions = closed, "实时广播中心已停止");
    }

    fn on_register(&self, request: Membership) {
        let Membership { session, applied } = request;
        let added = self.registry.add(session.clone());
        let _ = applied.send(());

        if !added {
            return;
        }
        info!(
            session_id = %session.id(),
            room_id = %session.room_id(),
            user = %session.display_name(),
            "会话已注册"
        );

        self.replays.spawn(replay_history(
            self.message_repository.clone(),
            session,
            self.replay_limit,
            self.replay_timeout,
        ));
    }

    fn on_unregister(&self, request: Membership) {
        let Membership { session, applied } = request;
        if self.registry.remove(&session) {
            info!(session_id = %session.id(), room_id = %session.room_id(), "会话已注销");
        }
        let _ = applied.send(());
    }

    fn on_broadcast(&self, envelope: Envelope) {
        match self.registry.broadcast(&envelope) {
            Ok(delivery) => debug!(
                room_id = %envelope.room_id,
                event = envelope.event.kind(),
                delivered = delivery.delivered,
                dropped = delivery.dropped,
                "广播完成"
            ),
            Err(err) => warn!(error = %err, event = envelope.event.kind(), "丢弃广播"),
        }
    }
}

/// 把已保存的历史消息按从旧到新写入新会话的出站队列
async fn replay_history(
    repository: Arc<dyn MessageRepository>,
    session: Arc<Session>,
    limit: usize,
    timeout: Duration,
) {
    let messages = match repository.get_by_room_id(session.room_id()).await {
        Ok(messages) => messages,
        Err(err) => {
            warn!(room_id = %session.room_id(), error = %err, "加载历史消息失败，按无历史处理");
            return;
        }
    };

    let skip = messages.len().saturating_sub(limit);
    let mut replayed = 0;
    for message in messages.iter().skip(skip) {
        if let Err(err) = session
            .send_timeout(Envelope::message_received(message), timeout)
            .await
        {
            debug!(session_id = %session.id(), error = %err, "停止回放历史消息");
            break;
        }
        replayed += 1;
    }

    if replayed > 0 {
        debug!(session_id = %session.id(), count = replayed, "历史消息回放完成");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::envelope::Event;
    use domain::{DomainError, Member, Message, MockMessageRepository, User};
    use infrastructure::InMemoryMessageRepository;

    fn start(
        repository: Arc<dyn MessageRepository>,
        config: HubConfig,
    ) -> (HubHandle, CancellationToken) {
        let (hub, handle) = Hub::new(&config, repository);
        let shutdown = CancellationToken::new();
        tokio::spawn(hub.run(shutdown.clone()));
        (handle, shutdown)
    }

    fn content(envelope: &Envelope) -> &str {
        match &envelope.event {
            Event::MessageReceived(payload) => &payload.content,
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_replays_recent_history_oldest_first() {
        let repository = Arc::new(InMemoryMessageRepository::default());
        let member = Member::new("token", User::new("alice").unwrap());
        for text in ["one", "two", "three"] {
            repository
                .create(Message::new(&member, text, "room-1").unwrap())
                .await
                .unwrap();
        }

        let config = HubConfig {
            history_replay_limit: 2,
            ..HubConfig::default()
        };
        let (handle, shutdown) = start(repository, config);

        let (session, mut outbound) = Session::new("room-1", "bob-id", "bob", 8);
        handle.register(session).await.unwrap();

        assert_eq!(content(&outbound.recv().await.unwrap()), "two");
        assert_eq!(content(&outbound.recv().await.unwrap()), "three");
        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_history_failure_does_not_block_registration() {
        let mut repository = MockMessageRepository::new();
        repository
            .expect_get_by_room_id()
            .returning(|_| Err(DomainError::RoomNotFound));
        let (handle, shutdown) = start(Arc::new(repository), HubConfig::default());

        let (alice, _alice_rx) = Session::new("room-1", "alice-id", "alice", 8);
        let (bob, mut bob_rx) = Session::new("room-1", "bob-id", "bob", 8);
        handle.register(alice.clone()).await.unwrap();
        handle.register(bob).await.unwrap();

        handle
            .broadcast(Envelope::chat("room-1", "alice-id", "alice", "hi").with_origin(alice.id()))
            .await
            .unwrap();
        assert_eq!(content(&bob_rx.recv().await.unwrap()), "hi");
        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_unregister_last_session_removes_room() {
        let (handle, shutdown) = start(
            Arc::new(InMemoryMessageRepository::default()),
            HubConfig::default(),
        );
        let (session, _rx) = Session::new("room-1", "alice-id", "alice", 8);

        handle.register(session.clone()).await.unwrap();
        assert_eq!(handle.room_stats("room-1").unwrap().clients, 1);

        handle.unregister(session.clone()).await.unwrap();
        assert!(session.is_closed());
        assert!(handle.room_stats("room-1").is_none());

        // 重复注销不是错误
        handle.unregister(session).await.unwrap();
        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_shutdown_closes_sessions_and_handles() {
        let (hub, handle) = Hub::new(
            &HubConfig::default(),
            Arc::new(InMemoryMessageRepository::default()),
        );
        let registry = hub.registry();
        let shutdown = CancellationToken::new();
        let running = tokio::spawn(hub.run(shutdown.clone()));

        let (session, _rx) = Session::new("room-1", "alice-id", "alice", 8);
        handle.register(session.clone()).await.unwrap();
        assert_eq!(registry.room_count(), 1);

        shutdown.cancel();
        running.await.unwrap();

        assert!(session.is_closed());
        assert_eq!(registry.room_count(), 0);
        assert_eq!(
            handle.broadcast(Envelope::room_deleted("room-1")).await,
            Err(HubError::Closed)
        );
        let (late, _late_rx) = Session::new("room-1", "bob-id", "bob", 8);
        assert_eq!(handle.register(late).await, Err(HubError::Closed));
    }
}
