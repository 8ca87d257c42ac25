//! The room directory: owns every live room.
//!
//! Locking is two-level: the table mutex guards the map of rooms, and each
//! room sits behind its own mutex. Operations clone the room handle out of
//! the table, drop the table lock, then lock just that room — a broadcast
//! into one busy room never blocks joins or bans in another. Every lock
//! section is a short in-memory update; network writes happen in the
//! caller, after the snapshot these methods return.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use parlor_protocol::{ClientId, RoomId, RoomInfo, Visibility};
use tokio::sync::Mutex;

use crate::{Room, RoomError};

/// The set of rooms a disconnecting user left behind, computed in one
/// sweep by [`RoomDirectory::remove_from_all`].
#[derive(Debug, Default)]
pub struct DisconnectCleanup {
    /// Rooms the user was a plain member of: (room, remaining members).
    pub left: Vec<(RoomId, Vec<ClientId>)>,
    /// Rooms the user owned, now destroyed: (room, orphaned members).
    pub destroyed: Vec<(RoomId, Vec<ClientId>)>,
}

/// Creates, looks up, and destroys rooms.
#[derive(Default)]
pub struct RoomDirectory {
    rooms: Mutex<HashMap<RoomId, Arc<Mutex<Room>>>>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a room; the owner auto-joins. Returns the room snapshot
    /// for the creation confirmation.
    pub async fn create_room(
        &self,
        owner: ClientId,
        name: String,
        capacity: NonZeroUsize,
        visibility: Visibility,
    ) -> RoomInfo {
        let room = Room::new(owner, name, capacity, visibility);
        let info = room.info();
        self.rooms
            .lock()
            .await
            .insert(info.id, Arc::new(Mutex::new(room)));
        tracing::info!(room = %info.id, %owner, "room created");
        info
    }

    /// Clones the handle for one room out of the table.
    async fn handle(
        &self,
        room: RoomId,
    ) -> Result<Arc<Mutex<Room>>, RoomError> {
        self.rooms
            .lock()
            .await
            .get(&room)
            .cloned()
            .ok_or(RoomError::NotFound(room))
    }

    /// Adds a user to a room. Returns the post-join snapshot and the
    /// members to notify (the user included).
    pub async fn add_member(
        &self,
        room: RoomId,
        user: ClientId,
    ) -> Result<(RoomInfo, Vec<ClientId>), RoomError> {
        let handle = self.handle(room).await?;
        let mut room = handle.lock().await;
        room.add_member(user)?;
        Ok((room.info(), room.member_list()))
    }

    /// Removes a member (self-leave or owner kick). Returns the remaining
    /// members to notify.
    pub async fn remove_member(
        &self,
        room: RoomId,
        acting: ClientId,
        target: ClientId,
    ) -> Result<Vec<ClientId>, RoomError> {
        let handle = self.handle(room).await?;
        let mut room = handle.lock().await;
        room.remove_member(acting, target)?;
        Ok(room.member_list())
    }

    /// Bans a user (owner only). Returns the remaining members to notify.
    pub async fn ban(
        &self,
        room: RoomId,
        acting: ClientId,
        target: ClientId,
    ) -> Result<Vec<ClientId>, RoomError> {
        let handle = self.handle(room).await?;
        let mut room = handle.lock().await;
        room.ban(acting, target)?;
        Ok(room.member_list())
    }

    /// Lifts a ban (owner only).
    pub async fn unban(
        &self,
        room: RoomId,
        acting: ClientId,
        target: ClientId,
    ) -> Result<(), RoomError> {
        let handle = self.handle(room).await?;
        handle.lock().await.unban(acting, target)
    }

    /// Approves a user for private admission (owner only).
    pub async fn approve(
        &self,
        room: RoomId,
        acting: ClientId,
        target: ClientId,
    ) -> Result<(), RoomError> {
        let handle = self.handle(room).await?;
        handle.lock().await.approve(acting, target)
    }

    /// Revokes an approval (owner only).
    pub async fn unapprove(
        &self,
        room: RoomId,
        acting: ClientId,
        target: ClientId,
    ) -> Result<(), RoomError> {
        let handle = self.handle(room).await?;
        handle.lock().await.unapprove(acting, target)
    }

    /// Locks a room (owner only). Returns the members to notify.
    pub async fn lock(
        &self,
        room: RoomId,
        acting: ClientId,
    ) -> Result<Vec<ClientId>, RoomError> {
        let handle = self.handle(room).await?;
        let mut room = handle.lock().await;
        room.lock(acting)?;
        Ok(room.member_list())
    }

    /// Unlocks a room (owner only). Returns the members to notify.
    pub async fn unlock(
        &self,
        room: RoomId,
        acting: ClientId,
    ) -> Result<Vec<ClientId>, RoomError> {
        let handle = self.handle(room).await?;
        let mut room = handle.lock().await;
        room.unlock(acting)?;
        Ok(room.member_list())
    }

    /// Destroys a room (owner only). Returns the members it had, for the
    /// destruction notice.
    pub async fn destroy(
        &self,
        room: RoomId,
        acting: ClientId,
    ) -> Result<Vec<ClientId>, RoomError> {
        // Validate under the room lock, remove from the table after; the
        // table lock is not held across the room lock.
        let handle = self.handle(room).await?;
        let members = {
            let r = handle.lock().await;
            r.require_owner(acting)?;
            r.member_list()
        };
        self.rooms.lock().await.remove(&room);
        tracing::info!(room = %room, %acting, "room destroyed");
        Ok(members)
    }

    /// Resolves the fan-out targets for a room message. The sender must
    /// be a member.
    pub async fn room_message_targets(
        &self,
        room: RoomId,
        sender: ClientId,
    ) -> Result<Vec<ClientId>, RoomError> {
        let handle = self.handle(room).await?;
        let r = handle.lock().await;
        if !r.is_member(sender) {
            return Err(RoomError::OutsideRoom { user: sender, room });
        }
        Ok(r.member_list())
    }

    /// Disconnect cleanup: removes the user from every room. Rooms the
    /// user owned are destroyed (their guid dies with the session, so the
    /// room could never be administered again).
    pub async fn remove_from_all(
        &self,
        user: ClientId,
    ) -> DisconnectCleanup {
        let mut cleanup = DisconnectCleanup::default();
        let mut table = self.rooms.lock().await;

        let mut doomed = Vec::new();
        for (id, handle) in table.iter() {
            let mut room = handle.lock().await;
            if room.owner() == user {
                let mut members = room.member_list();
                members.retain(|m| *m != user);
                cleanup.destroyed.push((*id, members));
                doomed.push(*id);
            } else if room.is_member(user) {
                // The room outlives the member.
                let _ = room.remove_member(user, user);
                cleanup.left.push((*id, room.member_list()));
            }
        }
        for id in doomed {
            table.remove(&id);
        }

        if !cleanup.left.is_empty() || !cleanup.destroyed.is_empty() {
            tracing::info!(
                %user,
                left = cleanup.left.len(),
                destroyed = cleanup.destroyed.len(),
                "membership cleanup after disconnect"
            );
        }
        cleanup
    }

    /// Snapshot of every room, sorted by guid for stable list payloads.
    pub async fn list_rooms(&self) -> Vec<RoomInfo> {
        let table = self.rooms.lock().await;
        let mut infos = Vec::with_capacity(table.len());
        for handle in table.values() {
            infos.push(handle.lock().await.info());
        }
        infos.sort_by_key(|r| r.id.0);
        infos
    }

    /// Snapshot of one room's metadata.
    pub async fn room_info(
        &self,
        room: RoomId,
    ) -> Result<RoomInfo, RoomError> {
        let handle = self.handle(room).await?;
        let info = handle.lock().await.info();
        Ok(info)
    }

    /// Sorted copy of a room's member guids.
    pub async fn list_members(
        &self,
        room: RoomId,
    ) -> Result<Vec<ClientId>, RoomError> {
        let handle = self.handle(room).await?;
        let list = handle.lock().await.member_list();
        Ok(list)
    }

    /// Sorted copy of a room's ban list.
    pub async fn list_banned(
        &self,
        room: RoomId,
    ) -> Result<Vec<ClientId>, RoomError> {
        let handle = self.handle(room).await?;
        let list = handle.lock().await.ban_list();
        Ok(list)
    }

    /// Sorted copy of a room's approved list.
    pub async fn list_approved(
        &self,
        room: RoomId,
    ) -> Result<Vec<ClientId>, RoomError> {
        let handle = self.handle(room).await?;
        let list = handle.lock().await.approved_list();
        Ok(list)
    }

    /// Number of live rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }
}
