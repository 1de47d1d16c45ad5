//! 消息存储接口定义

use crate::entities::Message;
use crate::errors::DomainResult;
use async_trait::async_trait;

/// 消息存储接口
///
/// 只有持久化房间的消息会被写入；实时中心仅在会话注册时读取历史。
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// 保存消息
    async fn create(&self, message: Message) -> DomainResult<()>;

    /// 获取房间的全部消息，按时间从旧到新排列
    async fn get_by_room_id(&self, room_id: &str) -> DomainResult<Vec<Message>>;

    /// 获取房间内的指定消息
    async fn get_by_id(&self, room_id: &str, message_id: &str) -> DomainResult<Message>;

    /// 删除消息（幂等）
    async fn delete(&self, message: &Message) -> DomainResult<()>;

    /// 删除房间的全部消息
    async fn delete_by_room_id(&self, room_id: &str) -> DomainResult<()>;
}
