//! Web API 层。
//!
//! 提供 Axum 路由，将 HTTP / WebSocket 请求委托给应用层的房间服务与广播中心。

mod dto;
mod error;
mod routes;
mod state;
mod ws_connection;

pub use error::ApiError;
pub use routes::{router, MEMBER_TOKEN_HEADER};
pub use state::AppState;
