//! 房间用例服务
//!
//! 处理创建、加入、离开、踢人、删除房间以及消息的收发，
//! 状态变更成功后再把对应事件交给实时广播中心。

use std::sync::Arc;
use std::time::Duration;

use config::RoomStoreConfig;
use domain::{DomainError, Member, Message, MessageRepository, Room, RoomRepository, User};
use tracing::{info, warn};

use crate::error::{ApplicationError, ApplicationResult};
use crate::realtime::{Envelope, HubHandle};

pub struct RoomServiceDependencies {
    pub room_repository: Arc<dyn RoomRepository>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub hub: HubHandle,
}

/// 加入房间的结果
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub room: Room,
    pub member: Member,
    /// 同一令牌重新连接，成员列表没有变化
    pub rejoined: bool,
}

/// 房间详情与已保存的消息
#[derive(Debug, Clone)]
pub struct RoomView {
    pub room: Room,
    pub messages: Vec<Message>,
}

pub struct RoomService {
    deps: RoomServiceDependencies,
    room_expiry: Duration,
    join_code_attempts: u32,
}

impl RoomService {
    pub fn new(deps: RoomServiceDependencies, config: &RoomStoreConfig) -> Self {
        Self {
            deps,
            room_expiry: config.room_expiry(),
            join_code_attempts: config.join_code_attempts.max(1),
        }
    }

    fn require_token(token: &str) -> ApplicationResult<()> {
        if token.trim().is_empty() {
            return Err(ApplicationError::unauthorized("缺少成员令牌"));
        }
        Ok(())
    }

    /// 查找房间并确认令牌属于房间成员
    async fn member_of(&self, room_id: &str, token: &str) -> ApplicationResult<(Room, Member)> {
        Self::require_token(token)?;
        let room = self.deps.room_repository.get_by_id(room_id).await?;
        let member = room
            .find_member_by_token(token)
            .cloned()
            .ok_or_else(|| ApplicationError::forbidden("不是房间成员"))?;
        Ok((room, member))
    }

    async fn owner_of(&self, room_id: &str, token: &str) -> ApplicationResult<(Room, Member)> {
        let (room, member) = self.member_of(room_id, token).await?;
        if !room.is_owner(&member) {
            return Err(ApplicationError::forbidden("只有房主可以执行此操作"));
        }
        Ok((room, member))
    }

    /// 状态已经变更，广播失败只记录日志
    async fn notify(&self, envelope: Envelope) {
        let kind = envelope.event.kind();
        if let Err(err) = self.deps.hub.broadcast(envelope).await {
            warn!(event = kind, error = %err, "事件广播失败");
        }
    }

    /// 创建房间，加入码冲突时重新生成并重试
    pub async fn create_room(
        &self,
        token: &str,
        username: &str,
        persistent: bool,
    ) -> ApplicationResult<Room> {
        Self::require_token(token)?;
        let owner = Member::new(token, User::new(username)?);
        let mut room = Room::new(owner, persistent, self.room_expiry)?;

        for attempt in 1..=self.join_code_attempts {
            match self.deps.room_repository.create(room.clone()).await {
                Ok(()) => {
                    info!(room_id = %room.id, persistent, "房间已创建");
                    return Ok(room);
                }
                Err(DomainError::RoomAlreadyExists) => {
                    warn!(attempt, "加入码冲突，重新生成");
                    room.regenerate_join_code();
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(ApplicationError::JoinCodeExhausted)
    }

    /// 校验加入码并加入房间；同一令牌重复加入视为重新连接
    pub async fn join_room(
        &self,
        room_id: &str,
        join_code: &str,
        token: &str,
        username: &str,
    ) -> ApplicationResult<JoinOutcome> {
        Self::require_token(token)?;
        let room = self.deps.room_repository.get_by_id(room_id).await?;
        if room.join_code != join_code {
            return Err(DomainError::invalid_input("join_code", "加入码不正确").into());
        }

        if let Some(member) = room.find_member_by_token(token).cloned() {
            info!(room_id = %room_id, user = %member.user.name, "成员重新连接");
            return Ok(JoinOutcome {
                room,
                member,
                rejoined: true,
            });
        }

        let member = Member::new(token, User::new(username)?);
        let room = match self
            .deps
            .room_repository
            .add_member(room_id, member.clone())
            .await
        {
            Ok(room) => room,
            // 并发的同令牌加入已经先一步完成
            Err(DomainError::AlreadyInRoom) => {
                let room = self.deps.room_repository.get_by_id(room_id).await?;
                let member = room
                    .find_member_by_token(token)
                    .cloned()
                    .ok_or(DomainError::MemberNotFound)?;
                return Ok(JoinOutcome {
                    room,
                    member,
                    rejoined: true,
                });
            }
            Err(err) => return Err(err.into()),
        };

        info!(room_id = %room_id, user = %member.user.name, "成员已加入");
        Ok(JoinOutcome {
            room,
            member,
            rejoined: false,
        })
    }

    pub async fn leave_room(&self, room_id: &str, token: &str) -> ApplicationResult<Member> {
        Self::require_token(token)?;
        let member = self
            .deps
            .room_repository
            .remove_member(room_id, token)
            .await?;

        info!(room_id = %room_id, user = %member.user.name, "成员已离开");
        self.notify(Envelope::member_left(room_id, &member.user)).await;
        Ok(member)
    }

    /// 房主把成员移出房间，被移出的会话收到通知后断开
    pub async fn boot_member(
        &self,
        room_id: &str,
        requester_token: &str,
        target_token: &str,
    ) -> ApplicationResult<Member> {
        self.owner_of(room_id, requester_token).await?;
        if requester_token == target_token {
            return Err(DomainError::invalid_input("memberId", "不能移出自己").into());
        }

        let booted = self
            .deps
            .room_repository
            .remove_member(room_id, target_token)
            .await?;

        info!(room_id = %room_id, user = %booted.user.name, "成员已被移出");
        self.notify(Envelope::kicked(room_id, &booted.user, "booted"))
            .await;
        Ok(booted)
    }

    /// 删除房间及其全部消息
    pub async fn delete_room(&self, room_id: &str, token: &str) -> ApplicationResult<Room> {
        let (room, _) = self.owner_of(room_id, token).await?;

        let deleted = self.deps.room_repository.delete(&room).await?;
        self.deps
            .message_repository
            .delete_by_room_id(&deleted.id)
            .await?;

        info!(room_id = %deleted.id, "房间已删除");
        self.notify(Envelope::room_deleted(deleted.id.clone())).await;
        Ok(deleted)
    }

    /// 发送消息，只有持久化房间才写入消息存储
    pub async fn post_message(
        &self,
        room_id: &str,
        token: &str,
        content: &str,
    ) -> ApplicationResult<Message> {
        let (room, member) = self.member_of(room_id, token).await?;
        let message = Message::new(&member, content, room.id.clone())?;

        if room.persistent {
            if let Err(err) = self.deps.message_repository.create(message.clone()).await {
                warn!(room_id = %room.id, error = %err, "消息保存失败");
            }
        }

        self.notify(Envelope::message_received(&message)).await;
        Ok(message)
    }

    pub async fn delete_message(
        &self,
        room_id: &str,
        token: &str,
        message_id: &str,
    ) -> ApplicationResult<()> {
        let (room, _) = self.member_of(room_id, token).await?;

        let message = self
            .deps
            .message_repository
            .get_by_id(&room.id, message_id)
            .await?;
        self.deps.message_repository.delete(&message).await?;

        self.notify(Envelope::message_deleted(room.id.clone(), message.id))
            .await;
        Ok(())
    }

    pub async fn get_room(&self, room_id: &str, token: &str) -> ApplicationResult<RoomView> {
        let (room, _) = self.member_of(room_id, token).await?;
        let messages = self.deps.message_repository.get_by_room_id(&room.id).await?;
        Ok(RoomView { room, messages })
    }

    /// 发给新注册会话的成员列表
    pub fn member_list(room: &Room) -> Envelope {
        Envelope::member_list(room.id.clone(), room.members())
    }
}
