//! 房间成员定义

use crate::entities::user::User;
use serde::{Deserialize, Serialize};

/// 房间成员
///
/// `token` 是每个连接的凭证，用于断线重连时重新识别成员；
/// 成员身份比较以 `user.id` 为准。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub token: String,
    pub user: User,
}

impl Member {
    pub fn new(token: impl Into<String>, user: User) -> Self {
        Self {
            token: token.into(),
            user,
        }
    }

    /// 判断是否为同一用户
    pub fn is_same_user(&self, other: &Member) -> bool {
        self.user.id == other.user.id
    }
}
