use std::sync::Arc;

use application::{Hub, HubHandle, RoomService, RoomServiceDependencies};
use config::{AppConfig, HubConfig};
use infrastructure::{purge_evicted_messages, InMemoryMessageRepository, InMemoryRoomRepository};
use tokio::sync::mpsc;

#[derive(Clone)]
pub struct AppState {
    pub room_service: Arc<RoomService>,
    pub hub: HubHandle,
    pub hub_config: Arc<HubConfig>,
}

impl AppState {
    pub fn new(room_service: Arc<RoomService>, hub: HubHandle, hub_config: HubConfig) -> Self {
        Self {
            room_service,
            hub,
            hub_config: Arc::new(hub_config),
        }
    }

    /// 用内存存储装配全部服务，返回状态与尚未运行的广播中心
    ///
    /// 需要在 tokio 运行时内调用：淘汰房间的消息清理任务会在这里启动。
    pub fn in_memory(config: &AppConfig) -> (Self, Hub) {
        let (room_repository, message_repository) = in_memory_stores(config);

        let (hub, handle) = Hub::new(&config.hub, message_repository.clone());
        let room_service = RoomService::new(
            RoomServiceDependencies {
                room_repository,
                message_repository,
                hub: handle.clone(),
            },
            &config.room_store,
        );

        let state = Self::new(Arc::new(room_service), handle, config.hub.clone());
        (state, hub)
    }
}

/// 房间存储淘汰的房间由后台任务从消息存储中清理
fn in_memory_stores(
    config: &AppConfig,
) -> (Arc<InMemoryRoomRepository>, Arc<InMemoryMessageRepository>) {
    let (evictions_tx, evictions_rx) = mpsc::unbounded_channel();
    let room_repository = Arc::new(
        InMemoryRoomRepository::from_config(&config.room_store).with_eviction_sink(evictions_tx),
    );
    let message_repository =
        Arc::new(InMemoryMessageRepository::from_config(&config.message_store));

    tokio::spawn(purge_evicted_messages(evictions_rx, message_repository.clone()));
    (room_repository, message_repository)
}
