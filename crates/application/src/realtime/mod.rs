//! 实时广播核心：事件信封、会话、房间注册表与广播中心

mod envelope;
mod hub;
mod pump;
mod registry;
mod session;

pub use envelope::{
    Envelope, ErrorPayload, Event, KickedPayload, MemberListPayload, MemberPayload,
    MessageDeletedPayload, MessagePayload, RoomDeletedPayload, SessionId,
};
pub use hub::{Hub, HubHandle};
pub use pump::{read_pump, write_pump, Transport, TransportError, WsFrame};
pub use registry::{Delivery, RoomRegistry, RoomStats};
pub use session::{SendError, Session};
