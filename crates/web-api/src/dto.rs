//! HTTP 请求与响应结构

use application::RoomView;
use chrono::{DateTime, Utc};
use domain::{Member, Message, Room, User};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreateRoomPayload {
    pub username: String,
    #[serde(default)]
    pub persistent: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootMemberPayload {
    /// 被移出成员的令牌
    pub member_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PostMessagePayload {
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinQuery {
    pub join_code: Option<String>,
    pub username: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: String,
    pub name: String,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
        }
    }
}

fn members(room: &Room) -> Vec<UserDto> {
    room.members()
        .iter()
        .map(|member: &Member| UserDto::from(&member.user))
        .collect()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomResponse {
    pub room_id: String,
    pub join_code: String,
    pub created_at: DateTime<Utc>,
    pub persistent: bool,
    pub members: Vec<UserDto>,
    pub member_token: String,
}

impl CreateRoomResponse {
    pub fn new(room: &Room, member_token: String) -> Self {
        Self {
            room_id: room.id.clone(),
            join_code: room.join_code.clone(),
            created_at: room.created_at,
            persistent: room.persistent,
            members: members(room),
            member_token,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: String,
    pub user: UserDto,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Message> for MessageDto {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id.clone(),
            user: UserDto::from(&message.user),
            content: message.content.clone(),
            created_at: message.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDto {
    pub id: String,
    pub join_code: String,
    pub owner: Option<UserDto>,
    pub persistent: bool,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<MessageDto>,
    pub members: Vec<UserDto>,
}

impl From<&RoomView> for RoomDto {
    fn from(view: &RoomView) -> Self {
        let room = &view.room;
        Self {
            id: room.id.clone(),
            join_code: room.join_code.clone(),
            owner: room.owner().map(|owner| UserDto::from(&owner.user)),
            persistent: room.persistent,
            created_at: room.created_at,
            messages: view.messages.iter().map(MessageDto::from).collect(),
            members: members(room),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageResponse {
    pub id: String,
    pub room_id: String,
    pub content: String,
}

impl From<&Message> for PostMessageResponse {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id.clone(),
            room_id: message.room_id.clone(),
            content: message.content.clone(),
        }
    }
}
