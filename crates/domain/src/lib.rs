//! 聊天室系统核心领域模型
//!
//! 包含用户、成员、房间、消息等核心实体，房间的容量与房主继承规则，
//! 以及房间存储和消息存储的抽象接口。

pub mod entities;
pub mod errors;
pub mod repositories;

// 重新导出常用类型
pub use entities::*;
pub use errors::*;
pub use repositories::*;
