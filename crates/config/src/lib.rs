//! 统一配置中心
//!
//! 提供应用的全局配置管理，包括：
//! - 服务监听地址
//! - 房间存储的容量与空闲淘汰
//! - 消息存储容量
//! - 实时广播中心的队列与历史参数
//! - 日志级别
//!
//! 加载顺序：默认值 -> `APP_CONFIG_FILE` 指定的文件 -> `APP_` 前缀环境变量。

use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// 全局应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    /// 服务配置
    #[serde(default)]
    #[validate(nested)]
    pub server: ServerConfig,
    /// 房间存储配置
    #[serde(default)]
    #[validate(nested)]
    pub room_store: RoomStoreConfig,
    /// 消息存储配置
    #[serde(default)]
    #[validate(nested)]
    pub message_store: MessageStoreConfig,
    /// 实时广播中心配置
    #[serde(default)]
    #[validate(nested)]
    pub hub: HubConfig,
    /// 日志配置
    #[serde(default)]
    #[validate(nested)]
    pub logging: LoggingConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 房间存储配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RoomStoreConfig {
    /// 同时存在的房间上限，超出时淘汰最久未访问的房间
    #[validate(range(min = 1))]
    pub capacity: usize,
    /// 空闲淘汰窗口（秒）
    #[validate(range(min = 1))]
    pub idle_expiry_secs: u64,
    /// 新房间的有效期（秒）
    #[validate(range(min = 1))]
    pub room_expiry_secs: u64,
    /// 加入码冲突时的最大尝试次数
    #[validate(range(min = 1))]
    pub join_code_attempts: u32,
}

impl Default for RoomStoreConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            idle_expiry_secs: 30 * 60,
            room_expiry_secs: 60 * 60,
            join_code_attempts: 5,
        }
    }
}

impl RoomStoreConfig {
    pub fn idle_expiry(&self) -> Duration {
        Duration::from_secs(self.idle_expiry_secs)
    }

    pub fn room_expiry(&self) -> Duration {
        Duration::from_secs(self.room_expiry_secs)
    }
}

/// 消息存储配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MessageStoreConfig {
    /// 每个房间保留的消息数，超出时丢弃最旧的消息
    #[validate(range(min = 1))]
    pub capacity_per_room: usize,
}

impl Default for MessageStoreConfig {
    fn default() -> Self {
        Self {
            capacity_per_room: 100,
        }
    }
}

/// 实时广播中心配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct HubConfig {
    /// 每个会话的出站队列容量
    #[validate(range(min = 1))]
    pub outbound_capacity: usize,
    /// 每个房间内存中保留的广播历史条数
    #[validate(range(min = 1))]
    pub history_capacity: usize,
    /// 广播通道缓冲大小
    #[validate(range(min = 1))]
    pub broadcast_buffer: usize,
    /// 注册时回放的历史消息上限
    #[validate(range(min = 1))]
    pub history_replay_limit: usize,
    /// 回放单条历史消息等待队列空间的超时（秒）
    #[validate(range(min = 1))]
    pub history_replay_timeout_secs: u64,
    /// 心跳间隔（秒）
    #[validate(range(min = 1))]
    pub keepalive_interval_secs: u64,
    /// 单个入站帧的最大字节数
    #[validate(range(min = 1))]
    pub max_frame_bytes: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 64,
            history_capacity: 64,
            broadcast_buffer: 256,
            history_replay_limit: 50,
            history_replay_timeout_secs: 5,
            keepalive_interval_secs: 30,
            max_frame_bytes: 32 * 1024,
        }
    }
}

impl HubConfig {
    pub fn history_replay_timeout(&self) -> Duration {
        Duration::from_secs(self.history_replay_timeout_secs)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoggingConfig {
    /// `RUST_LOG` 未设置时使用的过滤级别
    #[validate(length(min = 1))]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl AppConfig {
    /// 按默认值 -> 可选文件 (APP_CONFIG_FILE) -> 环境变量 (APP_*) 的顺序加载
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var("APP_CONFIG_FILE").ok();
        Self::from_figment(Self::figment(file.as_deref()))
    }

    /// 构建配置来源
    pub fn figment(file: Option<&str>) -> Figment {
        let mut fig = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        if let Some(path) = file {
            if path.ends_with(".yml") || path.ends_with(".yaml") {
                fig = fig.merge(Yaml::file(path));
            } else if path.ends_with(".json") {
                fig = fig.merge(Json::file(path));
            } else {
                fig = fig.merge(Toml::file(path));
            }
        }
        fig.merge(Env::prefixed("APP_").split("__"))
    }

    /// 从给定来源提取并验证配置
    pub fn from_figment(fig: Figment) -> Result<Self, ConfigError> {
        let config: AppConfig = fig.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Extract(#[from] Box<figment::Error>),
    #[error("invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
}
