//! 房间存储接口定义

use crate::entities::{Member, Room};
use crate::errors::DomainResult;
use async_trait::async_trait;

/// 房间存储接口
///
/// 房间按 ID 与加入码双索引；存储独占房间聚合，读取返回副本，
/// 修改必须通过 `update`、`add_member` 或 `remove_member` 写回。
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// 插入新房间，ID 或加入码重复时返回 `RoomAlreadyExists`，不会覆盖
    async fn create(&self, room: Room) -> DomainResult<()>;

    /// 根据ID查找房间
    async fn get_by_id(&self, id: &str) -> DomainResult<Room>;

    /// 根据加入码查找房间
    async fn get_by_join_code(&self, join_code: &str) -> DomainResult<Room>;

    /// 写回房间，拒绝修改ID或加入码
    async fn update(&self, room: Room) -> DomainResult<()>;

    /// 删除房间并返回被删除的房间
    async fn delete(&self, room: &Room) -> DomainResult<Room>;

    /// 在存储锁内向房间添加成员，返回更新后的房间
    ///
    /// 并发加入时不会像“读取-修改-`update`”那样丢失成员。
    async fn add_member(&self, room_id: &str, member: Member) -> DomainResult<Room>;

    /// 按成员令牌移除成员（自动继承房主），返回被移除的成员
    async fn remove_member(&self, room_id: &str, member_token: &str) -> DomainResult<Member>;
}
