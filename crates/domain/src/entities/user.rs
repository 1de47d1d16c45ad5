//! 用户实体定义

use crate::errors::{DomainError, DomainResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MIN_NAME_LENGTH: usize = 2;
const MAX_NAME_LENGTH: usize = 32;

/// 用户实体
///
/// 用户只在房间内存在，没有账户体系；`id` 是身份比较的唯一依据。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// 用户唯一ID
    pub id: String,
    /// 显示名称（已转为小写）
    pub name: String,
    /// 创建时间
    pub joined_at: DateTime<Utc>,
}

impl User {
    /// 根据原始用户名创建新用户
    pub fn new(raw_name: &str) -> DomainResult<Self> {
        let name = Self::validate_name(raw_name)?;

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name,
            joined_at: Utc::now(),
        })
    }

    /// 校验并规范化用户名
    ///
    /// 仅允许字母、数字、下划线和连字符，首尾必须是字母或数字。
    fn validate_name(raw_name: &str) -> DomainResult<String> {
        let name = raw_name.trim().to_lowercase();

        if name.is_empty() {
            return Err(DomainError::invalid_input("username", "不能为空"));
        }
        let length = name.chars().count();
        if length < MIN_NAME_LENGTH {
            return Err(DomainError::invalid_input("username", "至少需要2个字符"));
        }
        if length > MAX_NAME_LENGTH {
            return Err(DomainError::invalid_input("username", "不能超过32个字符"));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(DomainError::invalid_input(
                "username",
                "只能包含字母、数字、下划线和连字符",
            ));
        }

        let starts_ok = name.chars().next().is_some_and(|c| c.is_ascii_alphanumeric());
        let ends_ok = name.chars().last().is_some_and(|c| c.is_ascii_alphanumeric());
        if !starts_ok || !ends_ok {
            return Err(DomainError::invalid_input(
                "username",
                "不能以下划线或连字符开头或结尾",
            ));
        }

        Ok(name)
    }
}
