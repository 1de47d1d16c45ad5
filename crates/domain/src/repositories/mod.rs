//! Repository接口定义
//!
//! 内层定义接口，外层实现接口。房间存储与消息存储彼此独立，
//! 也不受实时广播中心的控制。

pub mod message_repository;
pub mod room_repository;

pub use message_repository::MessageRepository;
pub use room_repository::RoomRepository;

#[cfg(feature = "testing")]
pub use message_repository::MockMessageRepository;
#[cfg(feature = "testing")]
pub use room_repository::MockRoomRepository;
