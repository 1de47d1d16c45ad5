//! 实时事件信封
//!
//! 线上格式固定为 `{"type": "<事件>", "roomId": "<房间ID>", "data": {...}}`，
//! `data` 的结构由 `type` 决定，这里用带标签的枚举表示。

use chrono::{DateTime, SecondsFormat, Utc};
use domain::{Member, Message, User};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

/// 会话ID，每个连接唯一
pub type SessionId = Uuid;

/// 成员信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberPayload {
    pub user_id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberListPayload {
    pub members: Vec<MemberPayload>,
}

/// 聊天消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub id: String,
    pub content: String,
    pub user_id: String,
    pub username: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDeletedPayload {
    pub id: String,
}

/// 错误信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<bool>,
}

/// 被踢出房间
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KickedPayload {
    pub username: String,
    pub reason: String,
    /// 被踢出的用户ID，只在进程内用于断开对应会话，不出现在线上格式中
    #[serde(skip)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomDeletedPayload {
    pub roomid: String,
}

/// 事件类型与负载
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    #[serde(rename = "member.joined")]
    MemberJoined(MemberPayload),
    #[serde(rename = "member.left")]
    MemberLeft(MemberPayload),
    #[serde(rename = "member.list")]
    MemberList(MemberListPayload),
    #[serde(rename = "member.received")]
    MessageReceived(MessagePayload),
    #[serde(rename = "member.deleted")]
    MessageDeleted(MessageDeletedPayload),
    #[serde(rename = "error")]
    Error(ErrorPayload),
    #[serde(rename = "error.auth")]
    AuthError(ErrorPayload),
    #[serde(rename = "error.join")]
    JoinFailed(ErrorPayload),
    #[serde(rename = "error.kicked")]
    Kicked(KickedPayload),
    #[serde(rename = "room.deleted")]
    RoomDeleted(RoomDeletedPayload),
}

impl Event {
    /// 线上格式中的 `type` 字段
    pub fn kind(&self) -> &'static str {
        match self {
            Event::MemberJoined(_) => "member.joined",
            Event::MemberLeft(_) => "member.left",
            Event::MemberList(_) => "member.list",
            Event::MessageReceived(_) => "member.received",
            Event::MessageDeleted(_) => "member.deleted",
            Event::Error(_) => "error",
            Event::AuthError(_) => "error.auth",
            Event::JoinFailed(_) => "error.join",
            Event::Kicked(_) => "error.kicked",
            Event::RoomDeleted(_) => "room.deleted",
        }
    }
}

/// 房间内广播的事件信封
///
/// `origin` 标记产生该事件的会话，广播时不会回送给它；
/// 由 REST 接口产生的事件没有来源，会发给房间内所有会话。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawEnvelope")]
pub struct Envelope {
    pub room_id: String,
    pub event: Event,
    pub origin: Option<SessionId>,
}

impl Serialize for Envelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireEnvelope {
            room_id: &self.room_id,
            event: &self.event,
        }
        .serialize(serializer)
    }
}

/// 线上格式：`Event` 自带 `type`/`data`，这里补上 `roomId`，不带 `origin`
#[derive(Serialize)]
struct WireEnvelope<'a> {
    #[serde(rename = "roomId")]
    room_id: &'a str,
    #[serde(flatten)]
    event: &'a Event,
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "roomId")]
    room_id: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl TryFrom<RawEnvelope> for Envelope {
    type Error = serde_json::Error;

    fn try_from(raw: RawEnvelope) -> Result<Self, Self::Error> {
        let event = serde_json::from_value(serde_json::json!({
            "type": raw.kind,
            "data": raw.data,
        }))?;

        Ok(Self {
            room_id: raw.room_id,
            event,
            origin: None,
        })
    }
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn member_payload(user: &User, joined_at: Option<String>) -> MemberPayload {
    MemberPayload {
        user_id: user.id.clone(),
        username: user.name.clone(),
        joined_at,
    }
}

impl Envelope {
    pub fn new(room_id: impl Into<String>, event: Event) -> Self {
        Self {
            room_id: room_id.into(),
            event,
            origin: None,
        }
    }

    /// 标记事件来源会话
    pub fn with_origin(mut self, origin: SessionId) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn member_joined(room_id: impl Into<String>, user: &User) -> Self {
        Self::new(
            room_id,
            Event::MemberJoined(member_payload(user, Some(rfc3339(Utc::now())))),
        )
    }

    pub fn member_left(room_id: impl Into<String>, user: &User) -> Self {
        Self::new(room_id, Event::MemberLeft(member_payload(user, None)))
    }

    pub fn member_list(room_id: impl Into<String>, members: &[Member]) -> Self {
        let members = members
            .iter()
            .map(|member| member_payload(&member.user, None))
            .collect();
        Self::new(room_id, Event::MemberList(MemberListPayload { members }))
    }

    /// 已保存的消息
    pub fn message_received(message: &Message) -> Self {
        Self::new(
            message.room_id.clone(),
            Event::MessageReceived(MessagePayload {
                id: message.id.clone(),
                content: message.content.clone(),
                user_id: message.user.id.clone(),
                username: message.user.name.clone(),
                timestamp: rfc3339(message.created_at),
            }),
        )
    }

    /// 会话直接发来的文本帧，不经过消息存储
    pub fn chat(
        room_id: impl Into<String>,
        user_id: impl Into<String>,
        username: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::new(
            room_id,
            Event::MessageReceived(MessagePayload {
                id: Uuid::new_v4().to_string(),
                content: content.into(),
                user_id: user_id.into(),
                username: username.into(),
                timestamp: rfc3339(Utc::now()),
            }),
        )
    }

    pub fn message_deleted(room_id: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self::new(
            room_id,
            Event::MessageDeleted(MessageDeletedPayload {
                id: message_id.into(),
            }),
        )
    }

    pub fn error(room_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            room_id,
            Event::Error(ErrorPayload {
                code: None,
                message: message.into(),
                retry: Some(false),
            }),
        )
    }

    pub fn auth_error(room_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            room_id,
            Event::AuthError(ErrorPayload {
                code: Some("AUTH_FAILED".into()),
                message: message.into(),
                retry: Some(true),
            }),
        )
    }

    pub fn join_failed(room_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            room_id,
            Event::JoinFailed(ErrorPayload {
                code: Some("JOIN_FAILED".into()),
                message: message.into(),
                retry: Some(true),
            }),
        )
    }

    pub fn kicked(room_id: impl Into<String>, user: &User, reason: impl Into<String>) -> Self {
        Self::new(
            room_id,
            Event::Kicked(KickedPayload {
                username: user.name.clone(),
                reason: reason.into(),
                user_id: Some(user.id.clone()),
            }),
        )
    }

    pub fn room_deleted(room_id: impl Into<String>) -> Self {
        let room_id = room_id.into();
        Self::new(
            room_id.clone(),
            Event::RoomDeleted(RoomDeletedPayload { roomid: room_id }),
        )
    }

    /// 是否为踢出指定用户的事件
    pub fn kicks(&self, user_id: &str) -> bool {
        matches!(&self.event, Event::Kicked(payload) if payload.user_id.as_deref() == Some(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn alice() -> User {
        User::new("alice").unwrap()
    }

    #[test]
    fn test_wire_format_for_chat_message() {
        let user = alice();
        let member = Member::new("token", user.clone());
        let message = Message::new(&member, "hi", "room-1").unwrap();

        let value = serde_json::to_value(Envelope::message_received(&message)).unwrap();
        assert_eq!(value["type"], "member.received");
        assert_eq!(value["roomId"], "room-1");
        assert_eq!(value["data"]["content"], "hi");
        assert_eq!(value["data"]["userId"], json!(user.id));
        assert_eq!(value["data"]["username"], "alice");
        assert_eq!(value["data"]["id"], json!(message.id));
        assert!(value["data"]["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_origin_is_not_serialized() {
        let envelope = Envelope::chat("room-1", "u1", "alice", "hi").with_origin(Uuid::new_v4());
        let value = serde_json::to_value(&envelope).unwrap();

        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 3);
        assert!(value.get("origin").is_none());
    }

    #[test]
    fn test_error_payloads() {
        let value =
            serde_json::to_value(Envelope::join_failed("room-1", "Room not found")).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "error.join",
                "roomId": "room-1",
                "data": {"code": "JOIN_FAILED", "message": "Room not found", "retry": true}
            })
        );

        let value = serde_json::to_value(Envelope::auth_error("room-1", "missing token")).unwrap();
        assert_eq!(value["type"], "error.auth");
        assert_eq!(value["data"]["code"], "AUTH_FAILED");

        let value = serde_json::to_value(Envelope::error("room-1", "bad")).unwrap();
        assert!(value["data"].get("code").is_none());
        assert_eq!(value["data"]["retry"], false);
    }

    #[test]
    fn test_wire_type_matches_kind() {
        let user = alice();
        let envelopes = [
            Envelope::member_joined("room-1", &user),
            Envelope::member_left("room-1", &user),
            Envelope::member_list("room-1", &[]),
            Envelope::chat("room-1", &user.id, &user.name, "hi"),
            Envelope::message_deleted("room-1", "m1"),
            Envelope::error("room-1", "bad"),
            Envelope::auth_error("room-1", "bad"),
            Envelope::join_failed("room-1", "bad"),
            Envelope::kicked("room-1", &user, "booted"),
            Envelope::room_deleted("room-1"),
        ];

        for envelope in envelopes {
            let value = serde_json::to_value(&envelope).unwrap();
            assert_eq!(value["type"], envelope.event.kind());
            assert_eq!(value["roomId"], "room-1");
            assert!(value["data"].is_object());
        }
    }

    #[test]
    fn test_kicked_and_room_deleted_payloads() {
        let user = alice();
        let kicked = Envelope::kicked("room-1", &user, "booted");
        assert!(kicked.kicks(&user.id));
        assert!(!kicked.kicks("someone-else"));
        assert_eq!(
            serde_json::to_value(&kicked).unwrap()["data"],
            json!({"username": "alice", "reason": "booted"})
        );

        assert_eq!(
            serde_json::to_value(Envelope::room_deleted("room-1")).unwrap(),
            json!({"type": "room.deleted", "roomId": "room-1", "data": {"roomid": "room-1"}})
        );
    }

    #[test]
    fn test_member_list_omits_joined_at() {
        let members = vec![
            Member::new("t1", alice()),
            Member::new("t2", User::new("bob").unwrap()),
        ];
        let value = serde_json::to_value(Envelope::member_list("room-1", &members)).unwrap();

        let listed = value["data"]["members"].as_array().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[1]["username"], "bob");
        assert!(listed[0].get("joinedAt").is_none());
    }

    #[test]
    fn test_parse_from_wire() {
        let parsed: Envelope = serde_json::from_str(
            r#"{"type":"member.joined","roomId":"room-1",
                "data":{"userId":"u1","username":"bob","joinedAt":"2024-01-01T00:00:00Z"}}"#,
        )
        .unwrap();

        assert_eq!(parsed.room_id, "room-1");
        assert_eq!(parsed.origin, None);
        assert_eq!(
            parsed.event,
            Event::MemberJoined(MemberPayload {
                user_id: "u1".into(),
                username: "bob".into(),
                joined_at: Some("2024-01-01T00:00:00Z".into()),
            })
        );

        let unknown = serde_json::from_str::<Envelope>(r#"{"type":"nope","roomId":"r","data":{}}"#);
        assert!(unknown.is_err());
    }
}
