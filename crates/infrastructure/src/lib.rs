//! 基础设施层
//!
//! 提供房间存储与消息存储的内存实现，以及房间淘汰后的消息清理。

pub mod eviction;
pub mod message_store;
pub mod room_store;

pub use eviction::purge_evicted_messages;
pub use message_store::InMemoryMessageRepository;
pub use room_store::InMemoryRoomRepository;
