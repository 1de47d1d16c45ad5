//! 会话读写泵
//!
//! 读泵把入站文本帧包装成聊天事件交给广播中心，结束时注销会话，
//! 这是注销会话的唯一路径。写泵把出站队列中的事件序列化写入传输层，
//! 并定时发送心跳。传输层本身与具体的 WebSocket 实现无关。

use crate::realtime::envelope::Envelope;
use crate::realtime::hub::HubHandle;
use crate::realtime::session::Session;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

/// 与具体 WebSocket 库无关的帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsFrame {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

/// 互斥保护的传输写端
///
/// 底层连接不允许并发写入，所有写操作都经过这把锁。
pub struct Transport<W> {
    sink: Arc<Mutex<W>>,
}

impl<W> Clone for Transport<W> {
    fn clone(&self) -> Self {
        Self {
            sink: self.sink.clone(),
        }
    }
}

impl<W> Transport<W>
where
    W: Sink<WsFrame> + Unpin,
    W::Error: Display,
{
    pub fn new(sink: W) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
        }
    }

    pub async fn send(&self, frame: WsFrame) -> Result<(), W::Error> {
        self.sink.lock().await.send(frame).await
    }

    /// 序列化并写入一个事件
    pub async fn send_envelope(&self, envelope: &Envelope) -> Result<(), TransportError<W::Error>> {
        let text = serde_json::to_string(envelope).map_err(TransportError::Encode)?;
        self.send(WsFrame::Text(text))
            .await
            .map_err(TransportError::Write)
    }

    /// 发送关闭帧并关闭写端，出错只记录日志
    pub async fn close(&self) {
        let mut sink = self.sink.lock().await;
        if let Err(err) = sink.send(WsFrame::Close).await {
            debug!(error = %err, "发送关闭帧失败");
        }
        if let Err(err) = sink.close().await {
            debug!(error = %err, "关闭传输失败");
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError<E> {
    #[error("failed to encode envelope: {0}")]
    Encode(serde_json::Error),
    #[error("failed to write frame: {0}")]
    Write(E),
}

/// 读泵
///
/// 空帧与超过 `max_frame_bytes` 的帧会被跳过。传输出错、收到关闭帧、
/// 流结束或会话被关闭时退出，并注销会话。
pub async fn read_pump<S, E>(
    session: Arc<Session>,
    mut incoming: S,
    hub: HubHandle,
    max_frame_bytes: usize,
) where
    S: Stream<Item = Result<WsFrame, E>> + Unpin,
    E: Display,
{
    loop {
        let frame = tokio::select! {
            _ = session.closed() => break,
            frame = incoming.next() => frame,
        };

        match frame {
            Some(Ok(WsFrame::Text(text))) => {
                if text.trim().is_empty() {
                    continue;
                }
                if text.len() > max_frame_bytes {
                    warn!(
                        session_id = %session.id(),
                        size = text.len(),
                        limit = max_frame_bytes,
                        "入站帧过大，已跳过"
                    );
                    continue;
                }

                let envelope = Envelope::chat(
                    session.room_id(),
                    session.user_id(),
                    session.display_name(),
                    text,
                )
                .with_origin(session.id());
                if hub.broadcast(envelope).await.is_err() {
                    debug!(session_id = %session.id(), "广播中心已停止");
                    break;
                }
            }
            Some(Ok(WsFrame::Close)) | None => break,
            Some(Ok(WsFrame::Binary(_))) => {
                debug!(session_id = %session.id(), "忽略二进制帧");
            }
            Some(Ok(_)) => {}
            Some(Err(err)) => {
                debug!(session_id = %session.id(), error = %err, "读取失败");
                break;
            }
        }
    }

    if let Err(err) = hub.unregister(session.clone()).await {
        debug!(session_id = %session.id(), error = %err, "注销会话失败");
    }
    // 广播中心已停止时也要让写泵退出
    session.close();
    info!(session_id = %session.id(), room_id = %session.room_id(), "读泵结束");
}

/// 写泵
///
/// 会话关闭后先发完队列里剩余的事件，再发送关闭帧并关闭传输。
/// 写入失败时关闭会话，读泵随后完成注销。收到踢出本会话用户的事件后，
/// 写完该事件即断开。
pub async fn write_pump<W>(
    session: Arc<Session>,
    mut outbound: mpsc::Receiver<Envelope>,
    transport: Transport<W>,
    keepalive: Duration,
) where
    W: Sink<WsFrame> + Unpin,
    W::Error: Display,
{
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + keepalive, keepalive);

    loop {
        tokio::select! {
            biased;
            envelope = outbound.recv() => {
                let Some(envelope) = envelope else { break };
                if !deliver(&session, &transport, &envelope).await {
                    break;
                }
            }
            _ = session.closed() => {
                while let Ok(envelope) = outbound.try_recv() {
                    if !deliver(&session, &transport, &envelope).await {
                        break;
                    }
                }
                break;
            }
            _ = ticker.tick() => {
                if let Err(err) = transport.send(WsFrame::Ping(Vec::new())).await {
                    warn!(session_id = %session.id(), error = %err, "发送心跳失败");
                    session.close();
                    break;
                }
            }
        }
    }

    transport.close().await;
    debug!(session_id = %session.id(), "写泵结束");
}

/// 写入单个事件，返回写泵是否应继续
async fn deliver<W>(session: &Session, transport: &Transport<W>, envelope: &Envelope) -> bool
where
    W: Sink<WsFrame> + Unpin,
    W::Error: Display,
{
    if let Err(err) = transport.send_envelope(envelope).await {
        warn!(session_id = %session.id(), error = %err, "写入事件失败");
        session.close();
        return false;
    }

    if envelope.kicks(session.user_id()) {
        info!(
            session_id = %session.id(),
            room_id = %session.room_id(),
            "会话用户已被踢出，断开连接"
        );
        session.close();
        return false;
    }
    true
}
