use domain::DomainError;
use thiserror::Error;

/// 实时广播中心错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    /// 房间没有任何在线会话
    #[error("room {0} has no live sessions")]
    RoomNotFound(String),
    /// 广播中心已停止
    #[error("hub is not running")]
    Closed,
}

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("hub error: {0}")]
    Hub(#[from] HubError),
    #[error("authentication failed: {0}")]
    Unauthorized(String),
    #[error("authorization failed: {0}")]
    Forbidden(String),
    #[error("could not allocate a unique join code")]
    JoinCodeExhausted,
}

impl ApplicationError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }
}

pub type ApplicationResult<T> = Result<T, ApplicationError>;
