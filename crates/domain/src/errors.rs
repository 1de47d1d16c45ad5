//! 领域模型错误定义
//!
//! 所有领域校验错误都同步返回给直接调用方，不会 panic。

use thiserror::Error;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// 房间成员已达上限
    #[error("房间已满")]
    RoomFull,

    /// 相同令牌的成员已在房间中
    #[error("成员已在房间中")]
    AlreadyInRoom,

    /// 成员不存在
    #[error("成员不存在")]
    MemberNotFound,

    /// 房间不存在
    #[error("房间不存在")]
    RoomNotFound,

    /// 房间 ID 或加入码已被占用
    #[error("房间已存在")]
    RoomAlreadyExists,

    /// 消息不存在
    #[error("消息不存在")]
    MessageNotFound,

    /// 输入校验失败
    #[error("输入无效: {field}: {reason}")]
    InvalidInput { field: String, reason: String },
}

impl DomainError {
    /// 创建输入校验错误
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// 领域模型结果类型
pub type DomainResult<T> = Result<T, DomainError>;
