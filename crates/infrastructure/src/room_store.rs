//! 内存房间存储
//!
//! 按房间ID和加入码双索引，两个索引与最近访问时间在同一把读写锁下
//! 一起修改，淘汰时不会留下悬空的加入码。每次 `create` 都会顺带执行
//! 空闲淘汰和容量淘汰；读取时发现房间已空闲超时也会立即淘汰。
//!
//! 被淘汰的房间ID会发送到可选的淘汰通道，由消息存储一侧清理对应消息。

use async_trait::async_trait;
use config::RoomStoreConfig;
use domain::{DomainError, DomainResult, Member, Room, RoomRepository};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

const DEFAULT_CAPACITY: usize = 100;
const DEFAULT_IDLE_EXPIRY: Duration = Duration::from_secs(30 * 60);

#[derive(Default)]
struct RoomIndex {
    rooms: HashMap<String, Room>,
    /// 加入码 -> 房间ID
    by_join_code: HashMap<String, String>,
    last_access: HashMap<String, Instant>,
    /// 尚未发布的淘汰房间ID
    evicted: Vec<String>,
}

impl RoomIndex {
    fn touch(&mut self, room_id: &str) {
        self.last_access.insert(room_id.to_owned(), Instant::now());
    }

    fn remove(&mut self, room_id: &str) -> Option<Room> {
        self.last_access.remove(room_id);
        let room = self.rooms.remove(room_id)?;
        self.by_join_code.remove(&room.join_code);
        Some(room)
    }

    fn evict(&mut self, room_id: &str) {
        if self.remove(room_id).is_some() {
            self.evicted.push(room_id.to_owned());
        }
    }

    fn is_idle(&self, room_id: &str, idle_expiry: Duration) -> bool {
        self.last_access
            .get(room_id)
            .is_some_and(|last| last.elapsed() > idle_expiry)
    }

    /// 取出未空闲超时的房间ID；已超时的房间就地淘汰
    fn live_room_id(&mut self, room_id: &str, idle_expiry: Duration) -> DomainResult<()> {
        if !self.rooms.contains_key(room_id) {
            return Err(DomainError::RoomNotFound);
        }
        if self.is_idle(room_id, idle_expiry) {
            self.evict(room_id);
            debug!(room_id = %room_id, "读取时淘汰空闲房间");
            return Err(DomainError::RoomNotFound);
        }
        Ok(())
    }

    fn evict_idle(&mut self, idle_expiry: Duration) -> usize {
        let idle: Vec<String> = self
            .last_access
            .iter()
            .filter(|(_, last)| last.elapsed() > idle_expiry)
            .map(|(id, _)| id.clone())
            .collect();

        for room_id in &idle {
            self.evict(room_id);
        }
        idle.len()
    }

    /// 按最近访问时间从旧到新淘汰，直到能再容纳一个房间
    fn make_room_for_one(&mut self, capacity: usize) -> usize {
        if self.rooms.len() < capacity {
            return 0;
        }

        let mut by_age: Vec<(String, Instant)> = self
            .last_access
            .iter()
            .map(|(id, last)| (id.clone(), *last))
            .collect();
        by_age.sort_by_key(|(_, last)| *last);

        let excess = self.rooms.len() + 1 - capacity;
        for (room_id, _) in by_age.iter().take(excess) {
            self.evict(room_id);
        }
        excess.min(by_age.len())
    }
}

/// 内存房间存储
pub struct InMemoryRoomRepository {
    index: RwLock<RoomIndex>,
    capacity: usize,
    idle_expiry: Duration,
    evictions: Option<mpsc::UnboundedSender<String>>,
}

impl InMemoryRoomRepository {
    /// 创建房间存储，容量或空闲窗口为 0 时使用默认值
    pub fn new(capacity: usize, idle_expiry: Duration) -> Self {
        Self {
            index: RwLock::new(RoomIndex::default()),
            capacity: if capacity == 0 {
                DEFAULT_CAPACITY
            } else {
                capacity
            },
            idle_expiry: if idle_expiry.is_zero() {
                DEFAULT_IDLE_EXPIRY
            } else {
                idle_expiry
            },
            evictions: None,
        }
    }

    /// 把被淘汰的房间ID发送到给定通道
    pub fn with_eviction_sink(mut self, sink: mpsc::UnboundedSender<String>) -> Self {
        self.evictions = Some(sink);
        self
    }

    pub fn from_config(config: &RoomStoreConfig) -> Self {
        Self::new(config.capacity, config.idle_expiry())
    }

    /// 当前存储的房间数
    pub async fn len(&self) -> usize {
        self.index.read().await.rooms.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn publish_evictions(&self, index: &mut RoomIndex) {
        let evicted = std::mem::take(&mut index.evicted);
        let Some(sink) = &self.evictions else {
            return;
        };
        for room_id in evicted {
            if sink.send(room_id).is_err() {
                debug!("淘汰通道已关闭");
                break;
            }
        }
    }

    fn validate(room: &Room) -> DomainResult<()> {
        if room.id.is_empty() {
            return Err(DomainError::invalid_input("room_id", "不能为空"));
        }
        if room.join_code.is_empty() {
            return Err(DomainError::invalid_input("join_code", "不能为空"));
        }
        Ok(())
    }
}

impl Default for InMemoryRoomRepository {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_IDLE_EXPIRY)
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    async fn create(&self, room: Room) -> DomainResult<()> {
        Self::validate(&room)?;

        let mut index = self.index.write().await;

        let idle = index.evict_idle(self.idle_expiry);
        if idle > 0 {
            info!(count = idle, "淘汰空闲房间");
        }

        if index.rooms.contains_key(&room.id) || index.by_join_code.contains_key(&room.join_code) {
            self.publish_evictions(&mut index);
            return Err(DomainError::RoomAlreadyExists);
        }

        let evicted = index.make_room_for_one(self.capacity);
        if evicted > 0 {
            info!(
                count = evicted,
                capacity = self.capacity,
                "房间数超过上限，淘汰最久未访问的房间"
            );
        }
        self.publish_evictions(&mut index);

        let room_id = room.id.clone();
        index.by_join_code.insert(room.join_code.clone(), room_id.clone());
        index.rooms.insert(room_id.clone(), room);
        index.touch(&room_id);

        debug!(room_id = %room_id, "房间已创建");
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> DomainResult<Room> {
        if id.is_empty() {
            return Err(DomainError::invalid_input("room_id", "不能为空"));
        }

        let mut index = self.index.write().await;
        let live = index.live_room_id(id, self.idle_expiry);
        self.publish_evictions(&mut index);
        live?;
        index.touch(id);
        index.rooms.get(id).cloned().ok_or(DomainError::RoomNotFound)
    }

    async fn get_by_join_code(&self, join_code: &str) -> DomainResult<Room> {
        if join_code.is_empty() {
            return Err(DomainError::invalid_input("join_code", "不能为空"));
        }

        let mut index = self.index.write().await;
        let room_id = index
            .by_join_code
            .get(join_code)
            .cloned()
            .ok_or(DomainError::RoomNotFound)?;
        let live = index.live_room_id(&room_id, self.idle_expiry);
        self.publish_evictions(&mut index);
        live?;
        index.touch(&room_id);
        index
            .rooms
            .get(&room_id)
            .cloned()
            .ok_or(DomainError::RoomNotFound)
    }

    async fn update(&self, room: Room) -> DomainResult<()> {
        Self::validate(&room)?;

        let mut index = self.index.write().await;
        let live = index.live_room_id(&room.id, self.idle_expiry);
        self.publish_evictions(&mut index);
        live?;

        let existing_code = index
            .rooms
            .get(&room.id)
            .map(|existing| existing.join_code.clone())
            .ok_or(DomainError::RoomNotFound)?;
        if existing_code != room.join_code {
            return Err(DomainError::invalid_input("join_code", "不允许修改加入码"));
        }

        let room_id = room.id.clone();
        index.rooms.insert(room_id.clone(), room);
        index.touch(&room_id);

        let idle = index.evict_idle(self.idle_expiry);
        if idle > 0 {
            info!(count = idle, "淘汰空闲房间");
        }
        self.publish_evictions(&mut index);
        Ok(())
    }

    async fn delete(&self, room: &Room) -> DomainResult<Room> {
        if room.id.is_empty() {
            return Err(DomainError::invalid_input("room_id", "不能为空"));
        }

        let mut index = self.index.write().await;
        let deleted = index.remove(&room.id).ok_or(DomainError::RoomNotFound)?;

        debug!(room_id = %deleted.id, "房间已删除");
        Ok(deleted)
    }

    async fn add_member(&self, room_id: &str, member: Member) -> DomainResult<Room> {
        let mut index = self.index.write().await;
        let live = index.live_room_id(room_id, self.idle_expiry);
        self.publish_evictions(&mut index);
        live?;
        index.touch(room_id);

        let room = index
            .rooms
            .get_mut(room_id)
            .ok_or(DomainError::RoomNotFound)?;
        room.add_member(member)?;

        Ok(room.clone())
    }

    async fn remove_member(&self, room_id: &str, member_token: &str) -> DomainResult<Member> {
        let mut index = self.index.write().await;
        let live = index.live_room_id(room_id, self.idle_expiry);
        self.publish_evictions(&mut index);
        live?;
        index.touch(room_id);

        let room = index
            .rooms
            .get_mut(room_id)
            .ok_or(DomainError::RoomNotFound)?;
        let member = room
            .find_member_by_token(member_token)
            .cloned()
            .ok_or(DomainError::MemberNotFound)?;
        room.remove_member(&member)?;

        Ok(member)
    }
}
