//! 应用层实现。
//!
//! 这里提供围绕房间聚合的用例服务，以及实时广播核心：
//! 会话、房间注册表和串行化的广播中心事件循环。

pub mod error;
pub mod realtime;
pub mod services;

pub use error::{ApplicationError, ApplicationResult, HubError};
pub use realtime::{
    read_pump, write_pump, Envelope, Event, Hub, HubHandle, Session, Transport, TransportError,
    WsFrame,
};
pub use services::{JoinOutcome, RoomService, RoomServiceDependencies, RoomView};
