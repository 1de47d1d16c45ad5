//! 消息实体定义

use crate::entities::member::Member;
use crate::entities::user::User;
use crate::errors::{DomainError, DomainResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 单条消息的最大字符数
pub const MAX_MESSAGE_LENGTH: usize = 2000;

/// 消息实体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// 消息唯一ID
    pub id: String,
    /// 所属房间ID
    pub room_id: String,
    /// 发送者
    pub user: User,
    /// 消息内容（已去除首尾空白）
    pub content: String,
    /// 创建时间
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// 创建新消息
    pub fn new(
        member: &Member,
        raw_content: &str,
        room_id: impl Into<String>,
    ) -> DomainResult<Self> {
        if raw_content.is_empty() {
            return Err(DomainError::invalid_input("content", "不能为空"));
        }
        if raw_content.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(DomainError::invalid_input("content", "不能超过2000个字符"));
        }

        let content = raw_content.trim();
        if content.is_empty() {
            return Err(DomainError::invalid_input("content", "不能只包含空白字符"));
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            room_id: room_id.into(),
            user: member.user.clone(),
            content: content.to_owned(),
            created_at: Utc::now(),
        })
    }
}
