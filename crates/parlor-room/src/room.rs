//! The room entity: membership, bans, approvals, lock state.
//!
//! All mutation methods validate against current state before touching
//! anything, so a refused operation has no effect. Owner-only operations
//! take the acting user and check it themselves rather than trusting the
//! caller.
//!
//! Invariants held by construction:
//! - the owner is always a member;
//! - member count never exceeds capacity;
//! - the member set and the ban set are disjoint.

use std::collections::HashSet;
use std::num::NonZeroUsize;

use parlor_protocol::{ClientId, RoomId, RoomInfo, Visibility};

use crate::RoomError;

/// A capacity-bounded group of users with an owner, ban list, approval
/// list (private admission), and lock state.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    name: String,
    owner: ClientId,
    capacity: NonZeroUsize,
    visibility: Visibility,
    locked: bool,
    members: HashSet<ClientId>,
    banned: HashSet<ClientId>,
    approved: HashSet<ClientId>,
}

impl Room {
    /// Creates a room with a fresh guid. The owner joins immediately.
    pub fn new(
        owner: ClientId,
        name: String,
        capacity: NonZeroUsize,
        visibility: Visibility,
    ) -> Self {
        Self {
            id: RoomId::new(),
            name,
            owner,
            capacity,
            visibility,
            locked: false,
            members: HashSet::from([owner]),
            banned: HashSet::new(),
            approved: HashSet::new(),
        }
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn owner(&self) -> ClientId {
        self.owner
    }

    pub fn is_member(&self, user: ClientId) -> bool {
        self.members.contains(&user)
    }

    /// Snapshot of room metadata for list payloads and confirmations.
    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            id: self.id,
            name: self.name.clone(),
            owner: self.owner,
            capacity: self.capacity.get(),
            visibility: self.visibility,
            locked: self.locked,
            members: self.members.len(),
        }
    }

    /// Adds a user to the room.
    ///
    /// Checked in order: ban, double join, lock, private-room approval,
    /// capacity. Refusal leaves the room untouched.
    pub fn add_member(&mut self, user: ClientId) -> Result<(), RoomError> {
        if self.banned.contains(&user) {
            return Err(RoomError::Banned {
                user,
                room: self.id,
            });
        }
        if self.members.contains(&user) {
            return Err(RoomError::AlreadyMember {
                user,
                room: self.id,
            });
        }
        if self.locked {
            return Err(RoomError::Locked(self.id));
        }
        if self.visibility == Visibility::Private
            && !self.approved.contains(&user)
        {
            return Err(RoomError::NotApproved {
                user,
                room: self.id,
            });
        }
        if self.members.len() >= self.capacity.get() {
            return Err(RoomError::Full(self.id));
        }
        self.members.insert(user);
        Ok(())
    }

    /// Removes a member: the member itself leaving, or the owner kicking.
    /// The owner cannot be removed.
    pub fn remove_member(
        &mut self,
        acting: ClientId,
        target: ClientId,
    ) -> Result<(), RoomError> {
        if target == self.owner {
            return Err(RoomError::OwnerProtected(self.id));
        }
        if acting != target && acting != self.owner {
            return Err(RoomError::OutsideRoom {
                user: acting,
                room: self.id,
            });
        }
        if !self.members.remove(&target) {
            return Err(RoomError::NotMember {
                user: target,
                room: self.id,
            });
        }
        Ok(())
    }

    /// Bans a user (owner only). A banned member loses membership and any
    /// approval in the same step; banning an already-banned user is a
    /// no-op success.
    pub fn ban(
        &mut self,
        acting: ClientId,
        target: ClientId,
    ) -> Result<(), RoomError> {
        self.require_owner(acting)?;
        if target == self.owner {
            return Err(RoomError::OwnerProtected(self.id));
        }
        self.banned.insert(target);
        self.members.remove(&target);
        self.approved.remove(&target);
        Ok(())
    }

    /// Lifts a ban (owner only).
    pub fn unban(
        &mut self,
        acting: ClientId,
        target: ClientId,
    ) -> Result<(), RoomError> {
        self.require_owner(acting)?;
        if !self.banned.remove(&target) {
            return Err(RoomError::NotBanned {
                user: target,
                room: self.id,
            });
        }
        Ok(())
    }

    /// Approves a user for private admission (owner only). Idempotent.
    pub fn approve(
        &mut self,
        acting: ClientId,
        target: ClientId,
    ) -> Result<(), RoomError> {
        self.require_owner(acting)?;
        self.approved.insert(target);
        Ok(())
    }

    /// Revokes an approval (owner only).
    pub fn unapprove(
        &mut self,
        acting: ClientId,
        target: ClientId,
    ) -> Result<(), RoomError> {
        self.require_owner(acting)?;
        if !self.approved.remove(&target) {
            return Err(RoomError::NoApproval {
                user: target,
                room: self.id,
            });
        }
        Ok(())
    }

    /// Locks the room against new joins (owner only). Idempotent.
    pub fn lock(&mut self, acting: ClientId) -> Result<(), RoomError> {
        self.require_owner(acting)?;
        self.locked = true;
        Ok(())
    }

    /// Unlocks the room (owner only). Idempotent.
    pub fn unlock(&mut self, acting: ClientId) -> Result<(), RoomError> {
        self.require_owner(acting)?;
        self.locked = false;
        Ok(())
    }

    /// Confirms `acting` owns this room.
    pub fn require_owner(&self, acting: ClientId) -> Result<(), RoomError> {
        if acting != self.owner {
            return Err(RoomError::NotOwner {
                user: acting,
                room: self.id,
            });
        }
        Ok(())
    }

    /// Member guids, sorted for stable list payloads. A copy — callers
    /// never iterate live state.
    pub fn member_list(&self) -> Vec<ClientId> {
        Self::sorted(&self.members)
    }

    /// Banned guids, sorted copy.
    pub fn ban_list(&self) -> Vec<ClientId> {
        Self::sorted(&self.banned)
    }

    /// Approved guids, sorted copy.
    pub fn approved_list(&self) -> Vec<ClientId> {
        Self::sorted(&self.approved)
    }

    fn sorted(set: &HashSet<ClientId>) -> Vec<ClientId> {
        let mut out: Vec<ClientId> = set.iter().copied().collect();
        out.sort_by_key(|c| c.0);
        out
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cap(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).expect("non-zero capacity")
    }

    fn public_room(owner: ClientId, capacity: usize) -> Room {
        Room::new(owner, "lobby".into(), cap(capacity), Visibility::Public)
    }

    // =====================================================================
    // Creation
    // =====================================================================

    #[test]
    fn test_new_room_owner_is_member() {
        let owner = ClientId::new();
        let room = public_room(owner, 4);
        assert!(room.is_member(owner));
        assert_eq!(room.info().members, 1);
        assert_eq!(room.member_list(), vec![owner]);
    }

    #[test]
    fn test_new_rooms_get_unique_guids() {
        let owner = ClientId::new();
        assert_ne!(public_room(owner, 2).id(), public_room(owner, 2).id());
    }

    // =====================================================================
    // add_member / capacity
    // =====================================================================

    #[test]
    fn test_add_member_capacity_two_third_join_refused() {
        // Owner plus one fills a capacity-2 room; the third join must be
        // refused with the count unchanged.
        let owner = ClientId::new();
        let mut room = public_room(owner, 2);

        room.add_member(ClientId::new()).expect("second member fits");
        let err = room.add_member(ClientId::new());

        assert!(matches!(err, Err(RoomError::Full(_))));
        assert_eq!(room.info().members, 2);
    }

    #[test]
    fn test_add_member_twice_is_refused() {
        let owner = ClientId::new();
        let mut room = public_room(owner, 4);
        let user = ClientId::new();
        room.add_member(user).expect("first join");

        assert!(matches!(
            room.add_member(user),
            Err(RoomError::AlreadyMember { .. })
        ));
    }

    #[test]
    fn test_add_member_locked_room_refused() {
        let owner = ClientId::new();
        let mut room = public_room(owner, 4);
        room.lock(owner).expect("owner locks");

        assert!(matches!(
            room.add_member(ClientId::new()),
            Err(RoomError::Locked(_))
        ));

        room.unlock(owner).expect("owner unlocks");
        room.add_member(ClientId::new()).expect("join after unlock");
    }

    #[test]
    fn test_add_member_private_room_requires_approval() {
        let owner = ClientId::new();
        let mut room = Room::new(
            owner,
            "inner circle".into(),
            cap(4),
            Visibility::Private,
        );
        let guest = ClientId::new();

        assert!(matches!(
            room.add_member(guest),
            Err(RoomError::NotApproved { .. })
        ));

        room.approve(owner, guest).expect("owner approves");
        room.add_member(guest).expect("approved guest joins");
    }

    // =====================================================================
    // Bans
    // =====================================================================

    #[test]
    fn test_ban_blocks_join_and_unban_clears_it() {
        let owner = ClientId::new();
        let mut room = public_room(owner, 4);
        let user = ClientId::new();

        room.ban(owner, user).expect("owner bans");
        assert!(matches!(
            room.add_member(user),
            Err(RoomError::Banned { .. })
        ));

        room.unban(owner, user).expect("owner unbans");
        room.add_member(user).expect("join after unban");
    }

    #[test]
    fn test_ban_existing_member_removes_membership() {
        let owner = ClientId::new();
        let mut room = public_room(owner, 4);
        let user = ClientId::new();
        room.add_member(user).expect("join");

        room.ban(owner, user).expect("owner bans member");

        assert!(!room.is_member(user));
        assert_eq!(room.ban_list(), vec![user]);
        // Member and ban sets stay disjoint.
        assert!(!room.member_list().contains(&user));
    }

    #[test]
    fn test_ban_requires_owner() {
        let owner = ClientId::new();
        let mut room = public_room(owner, 4);
        let member = ClientId::new();
        room.add_member(member).expect("join");

        assert!(matches!(
            room.ban(member, ClientId::new()),
            Err(RoomError::NotOwner { .. })
        ));
    }

    #[test]
    fn test_ban_owner_is_refused() {
        let owner = ClientId::new();
        let mut room = public_room(owner, 4);
        assert!(matches!(
            room.ban(owner, owner),
            Err(RoomError::OwnerProtected(_))
        ));
        assert!(room.is_member(owner));
    }

    #[test]
    fn test_unban_without_ban_is_refused() {
        let owner = ClientId::new();
        let mut room = public_room(owner, 4);
        assert!(matches!(
            room.unban(owner, ClientId::new()),
            Err(RoomError::NotBanned { .. })
        ));
    }

    // =====================================================================
    // remove_member
    // =====================================================================

    #[test]
    fn test_member_can_leave_voluntarily() {
        let owner = ClientId::new();
        let mut room = public_room(owner, 4);
        let user = ClientId::new();
        room.add_member(user).expect("join");

        room.remove_member(user, user).expect("leave");
        assert!(!room.is_member(user));
    }

    #[test]
    fn test_owner_can_kick_member() {
        let owner = ClientId::new();
        let mut room = public_room(owner, 4);
        let user = ClientId::new();
        room.add_member(user).expect("join");

        room.remove_member(owner, user).expect("kick");
        assert!(!room.is_member(user));
    }

    #[test]
    fn test_non_owner_cannot_kick() {
        let owner = ClientId::new();
        let mut room = public_room(owner, 4);
        let a = ClientId::new();
        let b = ClientId::new();
        room.add_member(a).expect("join");
        room.add_member(b).expect("join");

        assert!(matches!(
            room.remove_member(a, b),
            Err(RoomError::OutsideRoom { .. })
        ));
        assert!(room.is_member(b));
    }

    #[test]
    fn test_owner_cannot_be_removed() {
        let owner = ClientId::new();
        let mut room = public_room(owner, 4);
        assert!(matches!(
            room.remove_member(owner, owner),
            Err(RoomError::OwnerProtected(_))
        ));
        assert!(room.is_member(owner));
    }

    #[test]
    fn test_remove_non_member_is_refused() {
        let owner = ClientId::new();
        let mut room = public_room(owner, 4);
        assert!(matches!(
            room.remove_member(owner, ClientId::new()),
            Err(RoomError::NotMember { .. })
        ));
    }

    // =====================================================================
    // Approvals
    // =====================================================================

    #[test]
    fn test_approve_and_unapprove_maintain_list() {
        let owner = ClientId::new();
        let mut room = public_room(owner, 4);
        let user = ClientId::new();

        room.approve(owner, user).expect("approve");
        assert_eq!(room.approved_list(), vec![user]);

        room.unapprove(owner, user).expect("unapprove");
        assert!(room.approved_list().is_empty());
        assert!(matches!(
            room.unapprove(owner, user),
            Err(RoomError::NoApproval { .. })
        ));
    }

    #[test]
    fn test_ban_clears_approval() {
        let owner = ClientId::new();
        let mut room = Room::new(
            owner,
            "inner circle".into(),
            cap(4),
            Visibility::Private,
        );
        let user = ClientId::new();
        room.approve(owner, user).expect("approve");

        room.ban(owner, user).expect("ban");

        assert!(room.approved_list().is_empty());
        // Even after an unban the old approval stays revoked.
        room.unban(owner, user).expect("unban");
        assert!(matches!(
            room.add_member(user),
            Err(RoomError::NotApproved { .. })
        ));
    }

    // =====================================================================
    // Snapshots
    // =====================================================================

    #[test]
    fn test_member_list_is_a_copy() {
        let owner = ClientId::new();
        let mut room = public_room(owner, 4);
        let snapshot = room.member_list();

        room.add_member(ClientId::new()).expect("join");

        // The earlier snapshot does not see the mutation.
        assert_eq!(snapshot.len(), 1);
        assert_eq!(room.member_list().len(), 2);
    }
}
