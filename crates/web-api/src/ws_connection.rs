//! WebSocket 连接处理
//!
//! 把 axum 的 WebSocket 适配成与实现无关的帧流，完成加入校验后
//! 创建会话、登记到广播中心，再由读写泵接管连接直到断开。

use application::{
    read_pump, write_pump, ApplicationError, Envelope, JoinOutcome, RoomService, Session,
    Transport, WsFrame,
};
use axum::extract::ws::{Message as WsMessage, WebSocket};
use domain::DomainError;
use futures_util::{future, Sink, SinkExt, StreamExt};
use std::fmt::Display;
use tracing::{info, warn};

use crate::state::AppState;

/// 升级前从请求中取出的加入参数
#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub room_id: String,
    pub join_code: String,
    pub username: String,
    pub token: Option<String>,
}

fn into_message(frame: WsFrame) -> WsMessage {
    match frame {
        WsFrame::Text(text) => WsMessage::Text(text.into()),
        WsFrame::Binary(data) => WsMessage::Binary(data.into()),
        WsFrame::Ping(data) => WsMessage::Ping(data.into()),
        WsFrame::Pong(data) => WsMessage::Pong(data.into()),
        WsFrame::Close => WsMessage::Close(None),
    }
}

fn from_message(message: WsMessage) -> WsFrame {
    match message {
        WsMessage::Text(text) => WsFrame::Text(text.as_str().to_owned()),
        WsMessage::Binary(data) => WsFrame::Binary(data.to_vec()),
        WsMessage::Ping(data) => WsFrame::Ping(data.to_vec()),
        WsMessage::Pong(data) => WsFrame::Pong(data.to_vec()),
        WsMessage::Close(_) => WsFrame::Close,
    }
}

/// 加入失败时发给客户端的事件
fn join_error(room_id: &str, error: &ApplicationError) -> Envelope {
    match error {
        ApplicationError::Unauthorized(message) => Envelope::auth_error(room_id, message.clone()),
        ApplicationError::Domain(DomainError::RoomNotFound) => {
            Envelope::join_failed(room_id, "Room not found")
        }
        ApplicationError::Domain(DomainError::RoomFull) => {
            Envelope::join_failed(room_id, "Room is full")
        }
        ApplicationError::Domain(DomainError::InvalidInput { field, .. })
            if field == "join_code" =>
        {
            Envelope::join_failed(room_id, "Invalid join code")
        }
        ApplicationError::Domain(DomainError::InvalidInput { field, .. })
            if field == "username" =>
        {
            Envelope::error(room_id, "Invalid username")
        }
        other => Envelope::join_failed(room_id, other.to_string()),
    }
}

/// 写入一个错误事件后关闭连接
async fn reject<W>(transport: &Transport<W>, envelope: Envelope)
where
    W: Sink<WsFrame> + Unpin,
    W::Error: Display,
{
    if let Err(err) = transport.send_envelope(&envelope).await {
        warn!(room_id = %envelope.room_id, error = %err, "发送拒绝事件失败");
    }
    transport.close().await;
}

/// 处理一个已升级的连接，直到读泵结束
pub async fn serve(socket: WebSocket, state: AppState, request: JoinRequest) {
    let (sink, stream) = socket.split();
    let transport = Transport::new(
        sink.with(|frame: WsFrame| future::ready(Ok::<_, axum::Error>(into_message(frame)))),
    );
    let incoming = stream.map(|message| message.map(from_message));

    let Some(token) = request.token else {
        warn!(room_id = %request.room_id, "缺少成员令牌，拒绝连接");
        reject(
            &transport,
            Envelope::auth_error(&request.room_id, "Missing member token"),
        )
        .await;
        return;
    };

    let outcome = state
        .room_service
        .join_room(&request.room_id, &request.join_code, &token, &request.username)
        .await;
    let JoinOutcome {
        room,
        member,
        rejoined,
    } = match outcome {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(room_id = %request.room_id, error = %err, "加入房间失败");
            reject(&transport, join_error(&request.room_id, &err)).await;
            return;
        }
    };

    let hub_config = state.hub_config.clone();
    let (session, outbound) = Session::new(
        room.id.clone(),
        member.user.id.clone(),
        member.user.name.clone(),
        hub_config.outbound_capacity,
    );

    // 成员列表排在历史回放之前
    if let Err(err) = session.try_send(RoomService::member_list(&room)) {
        warn!(session_id = %session.id(), error = %err, "发送成员列表失败");
    }

    let writer = tokio::spawn(write_pump(
        session.clone(),
        outbound,
        transport,
        hub_config.keepalive_interval(),
    ));

    if let Err(err) = state.hub.register(session.clone()).await {
        warn!(session_id = %session.id(), error = %err, "登记会话失败");
        session.close();
        if let Err(err) = writer.await {
            warn!(session_id = %session.id(), error = %err, "写泵任务异常退出");
        }
        return;
    }

    info!(
        session_id = %session.id(),
        room_id = %room.id,
        user = %member.user.name,
        rejoined,
        "WebSocket 会话已建立"
    );

    if !rejoined {
        let joined = Envelope::member_joined(&room.id, &member.user).with_origin(session.id());
        if let Err(err) = state.hub.broadcast(joined).await {
            warn!(room_id = %room.id, error = %err, "广播成员加入失败");
        }
    }

    read_pump(
        session.clone(),
        incoming,
        state.hub.clone(),
        hub_config.max_frame_bytes,
    )
    .await;

    if let Err(err) = writer.await {
        warn!(session_id = %session.id(), error = %err, "写泵任务异常退出");
    }
}
