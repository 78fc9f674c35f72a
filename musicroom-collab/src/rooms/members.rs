use log::info;
use musicroom_core::{RoomId, UserId};

use crate::{BanData, CollabEvent, MemberRole, NewBan, NewRoomMember, RoomMemberData};

use super::{DatabaseFailure, Result, RoomError, RoomService};

impl RoomService {
    pub async fn members(&self, room_id: RoomId) -> Result<Vec<RoomMemberData>> {
        self.room_by_id(room_id).await?;

        self.db()
            .members(room_id)
            .await
            .context("members", room_id)
    }

    /// The membership of `user_id`, failing with [RoomError::NotAMember] if they aren't in the room
    pub async fn member(&self, user_id: UserId, room_id: RoomId) -> Result<RoomMemberData> {
        self.require_member("member", room_id, user_id).await
    }

    /// Makes `user_id` a member of the room. Private rooms require their password.
    pub async fn join_room(
        &self,
        user_id: UserId,
        room_id: RoomId,
        password: Option<&str>,
    ) -> Result<RoomMemberData> {
        let _guard = self.context.locks.lock(room_id).await;
        let room = self.room_by_id(room_id).await?;

        match self.db().member(room_id, user_id).await.context("join_room", room_id) {
            Ok(_) => return Err(RoomError::AlreadyMember),
            Err(RoomError::NotAMember) => {}
            Err(err) => return Err(err),
        }

        match self.db().ban(room_id, user_id).await.context("join_room", room_id) {
            Ok(_) => return Err(RoomError::UserBanned),
            Err(RoomError::NotBanned) => {}
            Err(err) => return Err(err),
        }

        if let Some(hash) = &room.password_hash {
            let password = password.ok_or(RoomError::InvalidRoomPassword)?;
            self.passwords.verify(password, hash)?;
        }

        let count = self
            .db()
            .count_members(room_id)
            .await
            .context("join_room", room_id)?;

        if count >= i64::from(room.max_members) {
            return Err(RoomError::RoomFull);
        }

        let member = self
            .db()
            .add_member(NewRoomMember {
                room_id,
                user_id,
                role: MemberRole::Member,
            })
            .await
            .context("join_room", room_id)?;

        info!("User {} joined room {}", user_id, room_id);
        self.context.emit(CollabEvent::MemberJoined {
            room_id,
            member: member.clone(),
        });

        Ok(member)
    }

    /// Removes `user_id` from the room. The owner has to delete the room instead.
    pub async fn leave_room(&self, user_id: UserId, room_id: RoomId) -> Result<()> {
        let _guard = self.context.locks.lock(room_id).await;
        let member = self.require_member("leave_room", room_id, user_id).await?;

        if member.role == MemberRole::Owner {
            return Err(RoomError::InvalidAction(
                "the owner cannot leave the room, delete it instead",
            ));
        }

        self.remove_member("leave_room", room_id, user_id).await
    }

    /// Removes `target` from the room on behalf of an owner or moderator
    pub async fn kick_member(&self, actor: UserId, room_id: RoomId, target: UserId) -> Result<()> {
        let _guard = self.context.locks.lock(room_id).await;
        let kicker = self.require_member("kick_member", room_id, actor).await?;

        if !kicker.role.can_control() {
            return Err(RoomError::PermissionDenied(
                "only owners and moderators can kick members",
            ));
        }

        if actor == target {
            return Err(RoomError::InvalidAction("you cannot kick yourself"));
        }

        let kicked = self
            .db()
            .member(room_id, target)
            .await
            .context("kick_member", room_id)?;

        match (kicker.role, kicked.role) {
            (_, MemberRole::Owner) => {
                return Err(RoomError::PermissionDenied("the owner cannot be kicked"))
            }
            (MemberRole::Moderator, MemberRole::Moderator) => {
                return Err(RoomError::PermissionDenied(
                    "moderators cannot kick other moderators",
                ))
            }
            _ => {}
        }

        self.remove_member("kick_member", room_id, target).await
    }

    /// Changes the role of `target`. Only the owner may do this, and ownership is never transferred.
    pub async fn update_member_role(
        &self,
        actor: UserId,
        room_id: RoomId,
        target: UserId,
        role: MemberRole,
    ) -> Result<RoomMemberData> {
        let _guard = self.context.locks.lock(room_id).await;
        let room = self.room_by_id(room_id).await?;

        if room.owner_id != actor {
            return Err(RoomError::PermissionDenied(
                "only the owner can change member roles",
            ));
        }

        if role == MemberRole::Owner {
            return Err(RoomError::InvalidAction("ownership cannot be transferred"));
        }

        let member = self
            .db()
            .member(room_id, target)
            .await
            .context("update_member_role", room_id)?;

        if member.role == MemberRole::Owner {
            return Err(RoomError::InvalidAction("the owner's role cannot change"));
        }

        if member.role == role {
            return Err(RoomError::RoleConflict(role));
        }

        let member = self
            .db()
            .update_member_role(room_id, target, role)
            .await
            .context("update_member_role", room_id)?;

        info!("User {} is now {} of room {}", target, role, room_id);
        self.context.emit(CollabEvent::MemberRoleUpdated {
            room_id,
            user_id: target,
            role,
        });

        Ok(member)
    }

    /// Bans in effect for the room, visible to owners and moderators
    pub async fn bans(&self, actor: UserId, room_id: RoomId) -> Result<Vec<BanData>> {
        self.require_moderation("bans", room_id, actor).await?;

        self.db().bans(room_id).await.context("bans", room_id)
    }

    /// Bars `target` from the room, removing them first if they are a member.
    /// The same hierarchy as kicking applies.
    pub async fn ban_member(
        &self,
        actor: UserId,
        room_id: RoomId,
        target: UserId,
        reason: Option<String>,
    ) -> Result<BanData> {
        let _guard = self.context.locks.lock(room_id).await;
        let banner = self.require_moderation("ban_member", room_id, actor).await?;

        if actor == target {
            return Err(RoomError::InvalidAction("you cannot ban yourself"));
        }

        let membership = self
            .db()
            .member(room_id, target)
            .await
            .context("ban_member", room_id);

        let was_member = match membership {
            Ok(banned) => {
                match (banner.role, banned.role) {
                    (_, MemberRole::Owner) => {
                        return Err(RoomError::PermissionDenied("the owner cannot be banned"))
                    }
                    (MemberRole::Moderator, MemberRole::Moderator) => {
                        return Err(RoomError::PermissionDenied(
                            "moderators cannot ban other moderators",
                        ))
                    }
                    _ => {}
                }

                true
            }
            Err(RoomError::NotAMember) => false,
            Err(err) => return Err(err),
        };

        let ban = self
            .db()
            .add_ban(NewBan {
                room_id,
                user_id: target,
                banned_by: actor,
                reason,
            })
            .await
            .context("ban_member", room_id)?;

        if was_member {
            self.context.emit(CollabEvent::MemberLeft {
                room_id,
                user_id: target,
            });
        }

        info!("User {} was banned from room {} by {}", target, room_id, actor);
        self.context.emit(CollabEvent::MemberBanned {
            room_id,
            ban: ban.clone(),
        });

        Ok(ban)
    }

    /// Lifts the ban on `target`. They are not rejoined.
    pub async fn unban_member(&self, actor: UserId, room_id: RoomId, target: UserId) -> Result<()> {
        let _guard = self.context.locks.lock(room_id).await;
        self.require_moderation("unban_member", room_id, actor).await?;

        self.db()
            .remove_ban(room_id, target)
            .await
            .context("unban_member", room_id)?;

        info!("User {} was unbanned from room {}", target, room_id);
        self.context.emit(CollabEvent::MemberUnbanned {
            room_id,
            user_id: target,
        });

        Ok(())
    }

    async fn require_moderation(
        &self,
        operation: &'static str,
        room_id: RoomId,
        user_id: UserId,
    ) -> Result<RoomMemberData> {
        let member = self.require_member(operation, room_id, user_id).await?;

        if !member.role.can_control() {
            return Err(RoomError::PermissionDenied(
                "only owners and moderators can manage bans",
            ));
        }

        Ok(member)
    }

    async fn remove_member(
        &self,
        operation: &'static str,
        room_id: RoomId,
        user_id: UserId,
    ) -> Result<()> {
        self.db()
            .remove_member(room_id, user_id)
            .await
            .context(operation, room_id)?;

        info!("User {} left room {}", user_id, room_id);
        self.context
            .emit(CollabEvent::MemberLeft { room_id, user_id });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        rooms::testing::*, Collab, CollabConfig, CollabEvent, MemberRole, MemoryDatabase,
        NewRoomRequest, RoomError,
    };

    #[tokio::test]
    async fn joining_twice_fails() {
        let fixture = Fixture::new().await;

        assert!(matches!(
            fixture.collab.rooms.join_room(LISTENER, fixture.room_id, None).await,
            Err(RoomError::AlreadyMember)
        ));
    }

    #[tokio::test]
    async fn private_rooms_check_the_password() {
        let collab = Collab::new(Arc::new(MemoryDatabase::new()), CollabConfig::default());
        let room = collab
            .rooms
            .create_room(
                OWNER,
                NewRoomRequest {
                    is_private: true,
                    password: Some("open sesame".to_string()),
                    ..public_room("vault")
                },
            )
            .await
            .unwrap();

        assert!(room.password_hash.is_some());

        for password in [None, Some("wrong")] {
            assert!(matches!(
                collab.rooms.join_room(LISTENER, room.id, password).await,
                Err(RoomError::InvalidRoomPassword)
            ));
        }

        collab
            .rooms
            .join_room(LISTENER, room.id, Some("open sesame"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn full_rooms_reject_members() {
        let collab = Collab::new(Arc::new(MemoryDatabase::new()), CollabConfig::default());
        let room = collab
            .rooms
            .create_room(
                OWNER,
                NewRoomRequest {
                    max_members: Some(2),
                    ..public_room("tiny")
                },
            )
            .await
            .unwrap();

        collab.rooms.join_room(LISTENER, room.id, None).await.unwrap();

        assert!(matches!(
            collab.rooms.join_room(STRANGER, room.id, None).await,
            Err(RoomError::RoomFull)
        ));
    }

    #[tokio::test]
    async fn the_owner_cannot_leave() {
        let fixture = Fixture::new().await;
        let rooms = &fixture.collab.rooms;

        assert!(matches!(
            rooms.leave_room(OWNER, fixture.room_id).await,
            Err(RoomError::InvalidAction(_))
        ));
        assert!(matches!(
            rooms.leave_room(STRANGER, fixture.room_id).await,
            Err(RoomError::NotAMember)
        ));

        rooms.leave_room(LISTENER, fixture.room_id).await.unwrap();
        assert_eq!(rooms.members(fixture.room_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn kicking_respects_the_hierarchy() {
        let fixture = Fixture::new().await;
        let rooms = &fixture.collab.rooms;
        let room_id = fixture.room_id;

        assert!(matches!(
            rooms.kick_member(LISTENER, room_id, MODERATOR).await,
            Err(RoomError::PermissionDenied(_))
        ));
        assert!(matches!(
            rooms.kick_member(MODERATOR, room_id, OWNER).await,
            Err(RoomError::PermissionDenied(_))
        ));
        assert!(matches!(
            rooms.kick_member(MODERATOR, room_id, MODERATOR).await,
            Err(RoomError::InvalidAction(_))
        ));

        rooms.kick_member(MODERATOR, room_id, LISTENER).await.unwrap();
        rooms.kick_member(OWNER, room_id, MODERATOR).await.unwrap();

        assert_eq!(rooms.members(room_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn moderators_cannot_kick_moderators() {
        let fixture = Fixture::new().await;
        let rooms = &fixture.collab.rooms;
        let room_id = fixture.room_id;

        rooms
            .update_member_role(OWNER, room_id, LISTENER, MemberRole::Moderator)
            .await
            .unwrap();

        assert!(matches!(
            rooms.kick_member(MODERATOR, room_id, LISTENER).await,
            Err(RoomError::PermissionDenied(_))
        ));
        assert_eq!(rooms.members(room_id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn banned_users_cannot_rejoin() {
        let fixture = Fixture::new().await;
        let rooms = &fixture.collab.rooms;
        let room_id = fixture.room_id;

        let ban = rooms
            .ban_member(MODERATOR, room_id, LISTENER, Some("spam".to_string()))
            .await
            .unwrap();

        assert_eq!(ban.banned_by, MODERATOR);
        assert_eq!(ban.reason.as_deref(), Some("spam"));
        assert!(matches!(
            rooms.member(LISTENER, room_id).await,
            Err(RoomError::NotAMember)
        ));
        assert!(matches!(
            fixture.drain_events().as_slice(),
            [
                CollabEvent::MemberLeft { user_id: LISTENER, .. },
                CollabEvent::MemberBanned { ban, .. },
            ] if ban.user_id == LISTENER
        ));

        assert!(matches!(
            rooms.join_room(LISTENER, room_id, None).await,
            Err(RoomError::UserBanned)
        ));
        assert!(matches!(
            rooms.ban_member(OWNER, room_id, LISTENER, None).await,
            Err(RoomError::AlreadyBanned)
        ));

        rooms.unban_member(OWNER, room_id, LISTENER).await.unwrap();
        rooms.join_room(LISTENER, room_id, None).await.unwrap();

        assert!(matches!(
            rooms.unban_member(OWNER, room_id, LISTENER).await,
            Err(RoomError::NotBanned)
        ));
    }

    #[tokio::test]
    async fn banning_respects_the_hierarchy() {
        let fixture = Fixture::new().await;
        let rooms = &fixture.collab.rooms;
        let room_id = fixture.room_id;

        assert!(matches!(
            rooms.ban_member(LISTENER, room_id, STRANGER, None).await,
            Err(RoomError::PermissionDenied(_))
        ));
        assert!(matches!(
            rooms.ban_member(MODERATOR, room_id, OWNER, None).await,
            Err(RoomError::PermissionDenied(_))
        ));
        assert!(matches!(
            rooms.ban_member(OWNER, room_id, OWNER, None).await,
            Err(RoomError::InvalidAction(_))
        ));
        assert!(matches!(
            rooms.bans(LISTENER, room_id).await,
            Err(RoomError::PermissionDenied(_))
        ));

        rooms
            .update_member_role(OWNER, room_id, LISTENER, MemberRole::Moderator)
            .await
            .unwrap();

        assert!(matches!(
            rooms.ban_member(MODERATOR, room_id, LISTENER, None).await,
            Err(RoomError::PermissionDenied(_))
        ));

        rooms.ban_member(OWNER, room_id, MODERATOR, None).await.unwrap();
        assert_eq!(rooms.bans(OWNER, room_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn outsiders_can_be_banned_in_advance() {
        let fixture = Fixture::new().await;
        let rooms = &fixture.collab.rooms;
        let room_id = fixture.room_id;

        rooms.ban_member(OWNER, room_id, STRANGER, None).await.unwrap();

        assert!(matches!(
            fixture.drain_events().as_slice(),
            [CollabEvent::MemberBanned { .. }]
        ));
        assert!(matches!(
            rooms.join_room(STRANGER, room_id, None).await,
            Err(RoomError::UserBanned)
        ));
    }

    #[tokio::test]
    async fn roles_change_only_by_the_owner() {
        let fixture = Fixture::new().await;
        let rooms = &fixture.collab.rooms;
        let room_id = fixture.room_id;

        assert!(matches!(
            rooms
                .update_member_role(MODERATOR, room_id, LISTENER, MemberRole::Moderator)
                .await,
            Err(RoomError::PermissionDenied(_))
        ));
        assert!(matches!(
            rooms
                .update_member_role(OWNER, room_id, LISTENER, MemberRole::Owner)
                .await,
            Err(RoomError::InvalidAction(_))
        ));
        assert!(matches!(
            rooms
                .update_member_role(OWNER, room_id, MODERATOR, MemberRole::Moderator)
                .await,
            Err(RoomError::RoleConflict(MemberRole::Moderator))
        ));

        let member = rooms
            .update_member_role(OWNER, room_id, LISTENER, MemberRole::Moderator)
            .await
            .unwrap();

        assert_eq!(member.role, MemberRole::Moderator);
    }
}
