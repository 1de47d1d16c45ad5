//! 领域实体定义

pub mod member;
pub mod message;
pub mod room;
pub mod user;

pub use member::Member;
pub use message::{Message, MAX_MESSAGE_LENGTH};
pub use room::{Room, JOIN_CODE_ALPHABET, JOIN_CODE_LENGTH, MAX_MEMBERS};
pub use user::User;
