//! 在线会话
//!
//! 每个连接对应一个会话：绑定房间与成员身份，持有有界的出站队列。
//! 注册表只引用会话，传输层由会话的读写泵独占。

use crate::realtime::envelope::{Envelope, SessionId};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::SendTimeoutError, error::TrySendError};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// 出站队列写入失败
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("outbound queue is full")]
    Full,
    #[error("session is closed")]
    Closed,
    #[error("timed out waiting for queue space")]
    Timeout,
}

#[derive(Debug)]
pub struct Session {
    id: SessionId,
    room_id: String,
    user_id: String,
    display_name: String,
    outbound: mpsc::Sender<Envelope>,
    closed: CancellationToken,
}

impl Session {
    /// 创建会话，返回会话与出站队列的接收端（交给写泵）
    pub fn new(
        room_id: impl Into<String>,
        user_id: impl Into<String>,
        display_name: impl Into<String>,
        outbound_capacity: usize,
    ) -> (Arc<Self>, mpsc::Receiver<Envelope>) {
        let (outbound, receiver) = mpsc::channel(outbound_capacity.max(1));
        let session = Self {
            id: Uuid::new_v4(),
            room_id: room_id.into(),
            user_id: user_id.into(),
            display_name: display_name.into(),
            outbound,
            closed: CancellationToken::new(),
        };
        (Arc::new(session), receiver)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// 非阻塞写入出站队列，队列满时立即返回 `Full`
    pub fn try_send(&self, envelope: Envelope) -> Result<(), SendError> {
        if self.closed.is_cancelled() {
            return Err(SendError::Closed);
        }
        self.outbound.try_send(envelope).map_err(|err| match err {
            TrySendError::Full(_) => SendError::Full,
            TrySendError::Closed(_) => SendError::Closed,
        })
    }

    /// 等待队列空间写入，最多等待 `timeout`；会话关闭时立即返回
    pub async fn send_timeout(
        &self,
        envelope: Envelope,
        timeout: Duration,
    ) -> Result<(), SendError> {
        if self.closed.is_cancelled() {
            return Err(SendError::Closed);
        }
        tokio::select! {
            _ = self.closed.cancelled() => Err(SendError::Closed),
            result = self.outbound.send_timeout(envelope, timeout) => {
                result.map_err(|err| match err {
                    SendTimeoutError::Timeout(_) => SendError::Timeout,
                    SendTimeoutError::Closed(_) => SendError::Closed,
                })
            }
        }
    }

    /// 关闭会话，重复调用无副作用
    ///
    /// 关闭后不再接受新的事件；写泵会先发完队列中已有的事件再关闭传输。
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// 等待会话关闭
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }
}
