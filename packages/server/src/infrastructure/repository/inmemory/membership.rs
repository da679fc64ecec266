//! In-memory membership checkers.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{MembershipChecker, RepositoryError, RoomId, UserId};

/// Accepts every join.
///
/// Used when no membership database is configured; the relay then trusts the
/// client's claimed room, like it trusts the claimed identity.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllMembership;

#[async_trait]
impl MembershipChecker for AllowAllMembership {
    async fn is_member(&self, _room_id: &RoomId, _user_id: &UserId) -> Result<bool, RepositoryError> {
        Ok(true)
    }
}

/// Membership table kept in memory
#[derive(Debug, Default)]
pub struct InMemoryMembership {
    members: RwLock<HashSet<(RoomId, UserId)>>,
}

impl InMemoryMembership {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn grant(&self, room_id: RoomId, user_id: UserId) {
        self.members.write().await.insert((room_id, user_id));
    }

    pub async fn revoke(&self, room_id: &RoomId, user_id: &UserId) {
        self.members
            .write()
            .await
            .remove(&(room_id.clone(), user_id.clone()));
    }
}

#[async_trait]
impl MembershipChecker for InMemoryMembership {
    async fn is_member(&self, room_id: &RoomId, user_id: &UserId) -> Result<bool, RepositoryError> {
        let members = self.members.read().await;
        Ok(members.contains(&(room_id.clone(), user_id.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_grant_and_revoke() {
        // テスト項目: 付与したメンバーシップだけが有効で、取り消すと無効になる
        // given (前提条件):
        let membership = InMemoryMembership::new();
        let room = RoomId::new("r1".to_string()).unwrap();
        let user = UserId::new("1".to_string()).unwrap();
        membership.grant(room.clone(), user.clone()).await;

        // when (操作):
        let before = membership.is_member(&room, &user).await.unwrap();
        membership.revoke(&room, &user).await;
        let after = membership.is_member(&room, &user).await.unwrap();

        // then (期待する結果):
        assert!(before);
        assert!(!after);
    }
}
