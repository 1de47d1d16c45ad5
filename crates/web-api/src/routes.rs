use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::{delete, get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::dto::{
    BootMemberPayload, CreateRoomPayload, CreateRoomResponse, JoinQuery, PostMessagePayload,
    PostMessageResponse, RoomDto,
};
use crate::{error::ApiError, state::AppState, ws_connection};

/// 成员令牌请求头
pub const MEMBER_TOKEN_HEADER: &str = "x-member-token";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/rooms", post(create_room))
        .route("/rooms/{room_id}", get(get_room).delete(delete_room))
        .route("/rooms/{room_id}/join", get(join_room))
        .route("/rooms/{room_id}/leave", post(leave_room))
        .route("/rooms/{room_id}/boot", post(boot_member))
        .route("/rooms/{room_id}/messages", post(post_message))
        .route(
            "/rooms/{room_id}/messages/{message_id}",
            delete(delete_message),
        )
}

fn header_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(MEMBER_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
}

fn require_token(headers: &HeaderMap) -> Result<String, ApiError> {
    header_token(headers).ok_or_else(|| ApiError::unauthorized("missing member token"))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn create_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateRoomPayload>,
) -> Result<(StatusCode, Json<CreateRoomResponse>), ApiError> {
    let token = header_token(&headers).unwrap_or_else(|| Uuid::new_v4().to_string());
    let room = state
        .room_service
        .create_room(&token, &payload.username, payload.persistent)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateRoomResponse::new(&room, token)),
    ))
}

async fn get_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(room_id): Path<String>,
) -> Result<Json<RoomDto>, ApiError> {
    let token = require_token(&headers)?;
    let view = state.room_service.get_room(&room_id, &token).await?;
    Ok(Json(RoomDto::from(&view)))
}

async fn delete_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(room_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let token = require_token(&headers)?;
    state.room_service.delete_room(&room_id, &token).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn leave_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(room_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let token = require_token(&headers)?;
    state.room_service.leave_room(&room_id, &token).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn boot_member(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(room_id): Path<String>,
    Json(payload): Json<BootMemberPayload>,
) -> Result<StatusCode, ApiError> {
    let token = require_token(&headers)?;
    state
        .room_service
        .boot_member(&room_id, &token, &payload.member_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn post_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(room_id): Path<String>,
    Json(payload): Json<PostMessagePayload>,
) -> Result<(StatusCode, Json<PostMessageResponse>), ApiError> {
    let token = require_token(&headers)?;
    let message = state
        .room_service
        .post_message(&room_id, &token, &payload.content)
        .await?;
    Ok((StatusCode::CREATED, Json(PostMessageResponse::from(&message))))
}

async fn delete_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((room_id, message_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let token = require_token(&headers)?;
    state
        .room_service
        .delete_message(&room_id, &token, &message_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 升级为 WebSocket 并加入房间
///
/// 缺少加入码或用户名时直接返回 400；其余的加入失败在升级后
/// 通过 `error.join` / `error.auth` 事件告知客户端再关闭连接。
async fn join_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(room_id): Path<String>,
    Query(query): Query<JoinQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let join_code = query
        .join_code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| ApiError::bad_request("joinCode query parameter is required"))?;
    let username = query
        .username
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiError::bad_request("username query parameter is required"))?;
    let token = query
        .token
        .filter(|token| !token.trim().is_empty())
        .or_else(|| header_token(&headers));

    let request = ws_connection::JoinRequest {
        room_id,
        join_code,
        username,
        token,
    };
    Ok(ws.on_upgrade(move |socket| ws_connection::serve(socket, state, request)))
}
