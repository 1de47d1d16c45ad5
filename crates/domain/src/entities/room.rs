//! 房间聚合定义
//!
//! 房间是临时的多人聊天会话，由 ID 和便于分享的加入码共同标识。
//! 聚合本身负责容量上限与房主自动继承，不做任何 I/O。

use crate::entities::member::Member;
use crate::errors::{DomainError, DomainResult};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::time::Duration;
use uuid::Uuid;

/// 每个房间的最大成员数
pub const MAX_MEMBERS: usize = 10;

/// 加入码长度
pub const JOIN_CODE_LENGTH: usize = 6;

/// 加入码字符表，去掉了容易混淆的 0/O/1/I
pub const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// 房间聚合
#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    /// 房间唯一ID
    pub id: String,
    /// 加入码，在所有活跃房间中唯一
    pub join_code: String,
    /// 是否持久化消息
    pub persistent: bool,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 房间有效期
    pub expiry: Duration,
    owner: Option<Member>,
    members: Vec<Member>,
}

impl Room {
    /// 创建新房间，房主自动成为第一个成员
    pub fn new(owner: Member, persistent: bool, expiry: Duration) -> DomainResult<Self> {
        let mut room = Self {
            id: Uuid::new_v4().to_string(),
            join_code: generate_join_code(),
            persistent,
            created_at: Utc::now(),
            expiry,
            owner: Some(owner.clone()),
            members: Vec::with_capacity(MAX_MEMBERS),
        };

        room.add_member(owner)?;
        Ok(room)
    }

    /// 重新生成加入码（由房间存储的调用方在冲突时重试）
    pub fn regenerate_join_code(&mut self) {
        self.join_code = generate_join_code();
    }

    /// 当前房主，所有成员离开后为 None
    pub fn owner(&self) -> Option<&Member> {
        self.owner.as_ref()
    }

    /// 按加入顺序排列的成员列表
    ///
    /// 成员移除采用 swap-remove，因此移除之后的顺序不再稳定。
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= MAX_MEMBERS
    }

    /// 是否为房主
    pub fn is_owner(&self, member: &Member) -> bool {
        self.owner
            .as_ref()
            .is_some_and(|owner| owner.is_same_user(member))
    }

    /// 添加成员
    ///
    /// 相同令牌重复添加返回 `AlreadyInRoom`，成员列表保持不变。
    pub fn add_member(&mut self, member: Member) -> DomainResult<()> {
        if self.members.iter().any(|m| m.token == member.token) {
            return Err(DomainError::AlreadyInRoom);
        }
        if self.is_full() {
            return Err(DomainError::RoomFull);
        }

        self.members.push(member);
        Ok(())
    }

    /// 用户是否在房间中
    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m.user.id == user_id)
    }

    /// 根据连接令牌查找成员
    pub fn find_member_by_token(&self, token: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.token == token)
    }

    /// 移除成员，房主离开时自动转让
    pub fn remove_member(&mut self, member: &Member) -> DomainResult<()> {
        self.leave_and_auto_promote(member)
    }

    /// 成员离开并自动继承房主
    ///
    /// 继任者按移除前的列表顺序取第一个剩余成员，
    /// 必须在 swap-remove 之前计算，否则末尾成员会被换到首位。
    fn leave_and_auto_promote(&mut self, member: &Member) -> DomainResult<()> {
        let index = self
            .members
            .iter()
            .position(|m| m.is_same_user(member))
            .ok_or(DomainError::MemberNotFound)?;

        let owner_left = self.is_owner(member);
        let successor = if owner_left {
            self.members
                .iter()
                .find(|m| !m.is_same_user(member))
                .cloned()
        } else {
            None
        };

        self.members.swap_remove(index);

        if owner_left {
            // 无人剩余时房间变为无主状态，由调用方决定是否删除
            self.owner = successor;
        }

        Ok(())
    }
}

/// 生成加入码
///
/// `rand::rng()` 是线程本地的密码学安全随机数生成器。
fn generate_join_code() -> String {
    let mut rng = rand::rng();
    (0..JOIN_CODE_LENGTH)
        .map(|_| {
            let index = rng.random_range(0..JOIN_CODE_ALPHABET.len());
            JOIN_CODE_ALPHABET[index] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::user::User;

    fn member(name: &str) -> Member {
        Member::new(Uuid::new_v4().to_string(), User::new(name).unwrap())
    }

    fn room_with_owner() -> (Room, Member) {
        let owner = member("alice");
        let room = Room::new(owner.clone(), false, Duration::from_secs(3600)).unwrap();
        (room, owner)
    }

    #[test]
    fn test_room_creation() {
        let (room, owner) = room_with_owner();

        assert!(!room.id.is_empty());
        assert_eq!(room.join_code.len(), JOIN_CODE_LENGTH);
        assert_eq!(room.member_count(), 1);
        assert!(room.is_owner(&owner));
        assert!(room.is_member(&owner.user.id));
        assert!(!room.persistent);
    }

    #[test]
    fn test_join_code_alphabet() {
        for _ in 0..200 {
            let code = generate_join_code();
            assert_eq!(code.len(), JOIN_CODE_LENGTH);
            assert!(code.bytes().all(|b| JOIN_CODE_ALPHABET.contains(&b)));
            assert!(!code.contains(['0', 'O', '1', 'I']));
        }
    }

    #[test]
    fn test_capacity_limit() {
        let (mut room, _) = room_with_owner();
        for i in 1..MAX_MEMBERS {
            room.add_member(member(&format!("user{i}"))).unwrap();
        }
        assert_eq!(room.member_count(), MAX_MEMBERS);
        assert!(room.is_full());

        // 第11个成员被拒绝，成员数保持不变
        let result = room.add_member(member("late"));
        assert_eq!(result, Err(DomainError::RoomFull));
        assert_eq!(room.member_count(), MAX_MEMBERS);
    }

    #[test]
    fn test_add_member_is_idempotent_by_token() {
        let (mut room, _) = room_with_owner();
        let bob = member("bob");
        room.add_member(bob.clone()).unwrap();

        assert_eq!(room.add_member(bob.clone()), Err(DomainError::AlreadyInRoom));
        assert_eq!(room.member_count(), 2);
        assert_eq!(room.find_member_by_token(&bob.token), Some(&bob));
    }

    #[test]
    fn test_owner_leaving_promotes_first_remaining_member() {
        let (mut room, owner) = room_with_owner();
        let bob = member("bob");
        let carol = member("carol");
        let dave = member("dave");
        room.add_member(bob.clone()).unwrap();
        room.add_member(carol.clone()).unwrap();
        room.add_member(dave.clone()).unwrap();

        room.remove_member(&owner).unwrap();

        // swap-remove 会把 dave 换到首位，但继任者仍然是 bob
        assert_eq!(room.owner(), Some(&bob));
        assert_eq!(room.members()[0], dave);
        assert_eq!(room.member_count(), 3);
        assert!(!room.is_member(&owner.user.id));
    }

    #[test]
    fn test_last_owner_leaving_clears_owner() {
        let (mut room, owner) = room_with_owner();
        room.remove_member(&owner).unwrap();

        assert!(room.owner().is_none());
        assert_eq!(room.member_count(), 0);
    }

    #[test]
    fn test_non_owner_leaving_keeps_owner() {
        let (mut room, owner) = room_with_owner();
        let bob = member("bob");
        room.add_member(bob.clone()).unwrap();

        room.remove_member(&bob).unwrap();
        assert!(room.is_owner(&owner));
        assert_eq!(room.remove_member(&bob), Err(DomainError::MemberNotFound));
    }

    #[test]
    fn test_regenerate_join_code_keeps_format() {
        let (mut room, _) = room_with_owner();
        room.regenerate_join_code();
        assert_eq!(room.join_code.len(), JOIN_CODE_LENGTH);
    }
}
