//! Per-connection dispatcher: decode, enforce auth preconditions, route
//! to handlers, and answer errors as `ERROR` frames.
//!
//! Each accepted connection runs one read task (this module) plus one
//! writer task draining the connection's outbound queue. The read task
//! is the connection's state machine: it starts unauthenticated, becomes
//! authenticated on a successful AUTHENTICATE, and closes on disconnect
//! or transport failure. Protocol and operation errors never end the
//! loop — they are reported to the client and reading continues.

use std::sync::Arc;

use parlor_protocol::{
    paginate, ClientCommand, ClientId, CollectionKind, ErrorTag, Frame,
    Origin, Page, ProtocolError, RoomId, ServerMessage, TransferKey,
    UserInfo, SEPARATOR,
};
use parlor_session::{
    AccountValidator, OutboundMessage, OutboundSender, SessionError, User,
};
use parlor_transport::{Connection, WebSocketConnection};
use tokio::sync::{broadcast as tokio_broadcast, mpsc};

use crate::broadcast::{
    enqueue, notify_members, send_to_all_except_sender, send_to_room,
    send_to_user,
};
use crate::server::ServerState;
use crate::{ServerError, ServerEvent};

/// This connection's identity and outbound queue, threaded through every
/// handler.
struct ConnCtx {
    client: ClientId,
    outbound: OutboundSender,
}

/// Handles one connection from accept to close.
pub(crate) async fn handle_connection<V: AccountValidator>(
    conn: WebSocketConnection,
    state: Arc<ServerState<V>>,
    mut shutdown: tokio_broadcast::Receiver<()>,
) {
    let conn = Arc::new(conn);
    let (tx, rx) = mpsc::unbounded_channel();

    let client = state
        .sessions
        .lock()
        .await
        .register(conn.id(), tx.clone());
    state.events.emit(ServerEvent::ClientConnected { client });

    let writer = tokio::spawn(writer_loop(
        Arc::clone(&conn),
        rx,
        Arc::clone(&state),
    ));

    let ctx = ConnCtx {
        client,
        outbound: tx,
    };

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                let _ = conn.close("server shutting down").await;
                break;
            }
            inbound = conn.recv() => match inbound {
                Ok(Some(raw)) => {
                    process_frame(&state, &ctx, &raw).await;
                }
                Ok(None) => {
                    tracing::info!(%client, "connection closed by peer");
                    break;
                }
                Err(e) => {
                    tracing::debug!(%client, error = %e, "recv failed");
                    break;
                }
            },
        }
    }

    disconnect_cleanup(&state, client).await;

    // With the session unregistered and our handle dropped, the queue
    // closes and the writer winds down after its last write.
    drop(ctx);
    let _ = writer.await;
}

/// Drains one connection's outbound queue, one in-flight write at a time.
/// Closes paged-transfer entries when their terminal page has actually
/// been written.
async fn writer_loop<V>(
    conn: Arc<WebSocketConnection>,
    mut rx: mpsc::UnboundedReceiver<OutboundMessage>,
    state: Arc<ServerState<V>>,
) {
    while let Some(out) = rx.recv().await {
        if let Err(e) = conn.send(&out.frame).await {
            tracing::debug!(conn = %conn.id(), error = %e, "write failed");
            break;
        }
        if let Some(key) = out.ends_transfer {
            state.transfers.lock().await.finish(&key);
        }
    }
    // Any transfer keys still open for this client are swept by
    // disconnect cleanup.
}

/// Decodes and dispatches one inbound frame. Every failure is answered
/// with an `ERROR` frame; nothing here ends the read loop.
async fn process_frame<V: AccountValidator>(
    state: &Arc<ServerState<V>>,
    ctx: &ConnCtx,
    raw: &str,
) {
    let frame = match Frame::decode(raw) {
        Ok(frame) => frame,
        Err(e) => {
            let token = raw.split(SEPARATOR).next().unwrap_or("");
            report(ctx, token, &e.into());
            return;
        }
    };
    let kind = frame.kind;

    // Clients do not speak server kinds.
    if kind.origin() == Origin::Server {
        report(
            ctx,
            kind.token(),
            &ProtocolError::UnexpectedKind(kind).into(),
        );
        return;
    }

    // Auth precondition, checked on the kind before field parsing: an
    // unauthenticated connection may only authenticate or probe.
    let user = state
        .sessions
        .lock()
        .await
        .get(ctx.client)
        .and_then(|session| session.user.clone());
    if kind.requires_auth() && user.is_none() {
        report(
            ctx,
            kind.token(),
            &SessionError::NotAuthenticated.into(),
        );
        return;
    }

    let cmd = match ClientCommand::from_frame(frame) {
        Ok(cmd) => cmd,
        Err(e) => {
            report(ctx, kind.token(), &e.into());
            return;
        }
    };

    if let Err(e) = handle_command(state, ctx, user, cmd).await {
        report(ctx, kind.token(), &e);
    }
}

/// Answers an `ERROR` frame naming the offending kind and the taxonomy
/// tag of what went wrong.
fn report(ctx: &ConnCtx, offending: &str, err: &ServerError) {
    let tag = err.tag().unwrap_or(ErrorTag::Protocol);
    tracing::debug!(
        client = %ctx.client,
        offending,
        %tag,
        error = %err,
        "operation refused"
    );
    let msg = ServerMessage::Error {
        offending: offending.to_string(),
        tag,
        detail: err.to_string(),
    };
    if let Err(e) = enqueue(&ctx.outbound, &msg) {
        tracing::warn!(client = %ctx.client, error = %e, "error frame lost");
    }
}

fn require_user(user: Option<User>) -> Result<User, ServerError> {
    user.ok_or_else(|| SessionError::NotAuthenticated.into())
}

/// Routes a typed command to its handler. Exhaustive by construction: a
/// new command variant fails to compile until it is handled here.
async fn handle_command<V: AccountValidator>(
    state: &Arc<ServerState<V>>,
    ctx: &ConnCtx,
    user: Option<User>,
    cmd: ClientCommand,
) -> Result<(), ServerError> {
    use ClientCommand as C;

    match cmd {
        C::Authenticate { username, secret } => {
            authenticate(state, ctx, user, username, secret).await
        }
        C::WhoAmI => {
            enqueue(&ctx.outbound, &ServerMessage::YourId { id: ctx.client })
        }

        C::GetUserList => {
            let users = state.sessions.lock().await.user_list();
            enqueue(&ctx.outbound, &ServerMessage::UserList { users })
        }
        C::GetUserListPaged => {
            let users = state.sessions.lock().await.user_list();
            let items = json_items(&users)?;
            let key =
                TransferKey::new(ctx.client, CollectionKind::UserList);
            send_paged(state, ctx, key, items, |page| {
                ServerMessage::UserListPage { page }
            })
            .await
        }
        C::GetRoomList => {
            let rooms = state.rooms.list_rooms().await;
            enqueue(&ctx.outbound, &ServerMessage::RoomList { rooms })
        }
        C::GetRoomListPaged => {
            let rooms = state.rooms.list_rooms().await;
            let items = json_items(&rooms)?;
            let key =
                TransferKey::new(ctx.client, CollectionKind::RoomList);
            send_paged(state, ctx, key, items, |page| {
                ServerMessage::RoomListPage { page }
            })
            .await
        }

        C::SendToUser { to, message } => {
            let user = require_user(user)?;
            send_to_user(state, &user, &to, message, &ctx.outbound).await
        }
        C::SendToAll { message } => {
            let user = require_user(user)?;
            send_to_all_except_sender(state, &user, message).await
        }
        C::SendToRoom { room, message } => {
            let user = require_user(user)?;
            send_to_room(state, &user, room, message).await
        }

        C::CreateRoom {
            capacity,
            visibility,
            name,
        } => {
            let info = state
                .rooms
                .create_room(ctx.client, name, capacity, visibility)
                .await;
            enqueue(
                &ctx.outbound,
                &ServerMessage::RoomCreated { room: info.clone() },
            )?;
            enqueue(
                &ctx.outbound,
                &ServerMessage::RoomJoined { room: info.clone() },
            )?;
            state.events.emit(ServerEvent::RoomCreated { room: info });
            Ok(())
        }
        C::DestroyRoom { room } => {
            let members = state.rooms.destroy(room, ctx.client).await?;
            notify_members(
                state,
                &members,
                &ServerMessage::RoomDestroyed { room },
            )
            .await?;
            state.events.emit(ServerEvent::RoomDestroyed { room });
            Ok(())
        }
        C::LockRoom { room } => {
            let members = state.rooms.lock(room, ctx.client).await?;
            notify_members(
                state,
                &members,
                &ServerMessage::RoomLocked { room },
            )
            .await?;
            state.events.emit(ServerEvent::RoomLocked { room });
            Ok(())
        }
        C::UnlockRoom { room } => {
            let members = state.rooms.unlock(room, ctx.client).await?;
            notify_members(
                state,
                &members,
                &ServerMessage::RoomUnlocked { room },
            )
            .await?;
            state.events.emit(ServerEvent::RoomUnlocked { room });
            Ok(())
        }

        C::AddUserToRoom { username, room } => {
            add_user_to_room(state, username, room).await
        }
        C::RemoveUserFromRoom { username, room } => {
            remove_user_from_room(state, ctx, username, room).await
        }
        C::BanUserFromRoom { username, room } => {
            ban_user_from_room(state, ctx, username, room).await
        }
        C::UnbanUserFromRoom { username, room } => {
            let (target, target_out) = resolve_user(state, &username).await?;
            state.rooms.unban(room, ctx.client, target).await?;
            let msg = ServerMessage::UserUnbanned {
                room,
                username: username.clone(),
            };
            enqueue(&ctx.outbound, &msg)?;
            enqueue(&target_out, &msg)?;
            state.events.emit(ServerEvent::UserUnbanned {
                room,
                user: UserInfo {
                    id: target,
                    username,
                },
            });
            Ok(())
        }
        C::ApproveUserForRoom { username, room } => {
            let (target, target_out) = resolve_user(state, &username).await?;
            state.rooms.approve(room, ctx.client, target).await?;
            let msg = ServerMessage::UserApproved {
                room,
                username: username.clone(),
            };
            enqueue(&ctx.outbound, &msg)?;
            enqueue(&target_out, &msg)?;
            state.events.emit(ServerEvent::UserApproved {
                room,
                user: UserInfo {
                    id: target,
                    username,
                },
            });
            Ok(())
        }
        C::UnapproveUserForRoom { username, room } => {
            let (target, target_out) = resolve_user(state, &username).await?;
            state.rooms.unapprove(room, ctx.client, target).await?;
            let msg = ServerMessage::UserUnapproved {
                room,
                username: username.clone(),
            };
            enqueue(&ctx.outbound, &msg)?;
            enqueue(&target_out, &msg)?;
            state.events.emit(ServerEvent::UserUnapproved {
                room,
                user: UserInfo {
                    id: target,
                    username,
                },
            });
            Ok(())
        }

        C::ListUsersInRoom { room } => {
            let members = state.rooms.list_members(room).await?;
            let users = resolve_infos(state, &members).await;
            enqueue(
                &ctx.outbound,
                &ServerMessage::RoomUserList { room, users },
            )
        }
        C::ListUsersInRoomPaged { room } => {
            let members = state.rooms.list_members(room).await?;
            let users = resolve_infos(state, &members).await;
            let items = json_items(&users)?;
            let key = TransferKey::for_room(
                ctx.client,
                CollectionKind::RoomMembers,
                room.0,
            );
            send_paged(state, ctx, key, items, move |page| {
                ServerMessage::RoomUserListPage { room, page }
            })
            .await
        }
        C::ListBannedInRoom { room } => {
            let banned = state.rooms.list_banned(room).await?;
            enqueue(
                &ctx.outbound,
                &ServerMessage::RoomBanList { room, banned },
            )
        }
        C::ListBannedInRoomPaged { room } => {
            let banned = state.rooms.list_banned(room).await?;
            let items = json_items(&banned)?;
            let key = TransferKey::for_room(
                ctx.client,
                CollectionKind::RoomBanned,
                room.0,
            );
            send_paged(state, ctx, key, items, move |page| {
                ServerMessage::RoomBanListPage { room, page }
            })
            .await
        }
        C::ListApprovedInRoom { room } => {
            let approved = state.rooms.list_approved(room).await?;
            enqueue(
                &ctx.outbound,
                &ServerMessage::RoomApprovedList { room, approved },
            )
        }
        C::ListApprovedInRoomPaged { room } => {
            let approved = state.rooms.list_approved(room).await?;
            let items = json_items(&approved)?;
            let key = TransferKey::for_room(
                ctx.client,
                CollectionKind::RoomApproved,
                room.0,
            );
            send_paged(state, ctx, key, items, move |page| {
                ServerMessage::RoomApprovedListPage { room, page }
            })
            .await
        }
    }
}

/// AUTHENTICATE: validate against the account backend, then bind.
async fn authenticate<V: AccountValidator>(
    state: &Arc<ServerState<V>>,
    ctx: &ConnCtx,
    current: Option<User>,
    username: String,
    secret: String,
) -> Result<(), ServerError> {
    if let Some(user) = current {
        return Err(
            SessionError::AlreadyAuthenticated(user.username).into()
        );
    }
    if !parlor_protocol::valid_username(&username) {
        return Err(SessionError::AuthFailed(format!(
            "unusable username {username:?}"
        ))
        .into());
    }

    // The backend may be slow; no shared lock is held across this await.
    if !state.validator.validate_account(&username, &secret).await {
        tracing::info!(client = %ctx.client, username, "credentials rejected");
        return Err(SessionError::AuthFailed("bad credentials".into()).into());
    }

    let user = state
        .sessions
        .lock()
        .await
        .bind_user(ctx.client, &username)?;

    enqueue(
        &ctx.outbound,
        &ServerMessage::Auth {
            status: "OK".into(),
        },
    )?;
    state.events.emit(ServerEvent::UserAuthenticated {
        user: user.info(),
    });
    Ok(())
}

/// ADDUSERTOROOM: admit a connected user, tell the room, tell the user.
async fn add_user_to_room<V: AccountValidator>(
    state: &Arc<ServerState<V>>,
    username: String,
    room: RoomId,
) -> Result<(), ServerError> {
    let (target, target_out) = resolve_user(state, &username).await?;
    let (info, members) = state.rooms.add_member(room, target).await?;

    let others: Vec<ClientId> = members
        .iter()
        .copied()
        .filter(|member| *member != target)
        .collect();
    notify_members(
        state,
        &others,
        &ServerMessage::UserJoined {
            room,
            username: username.clone(),
        },
    )
    .await?;
    enqueue(&target_out, &ServerMessage::RoomJoined { room: info })?;

    state.events.emit(ServerEvent::MemberJoined {
        room,
        user: UserInfo {
            id: target,
            username,
        },
    });
    Ok(())
}

/// REMOVEUSERFROMROOM: voluntary leave or owner kick.
async fn remove_user_from_room<V: AccountValidator>(
    state: &Arc<ServerState<V>>,
    ctx: &ConnCtx,
    username: String,
    room: RoomId,
) -> Result<(), ServerError> {
    let (target, target_out) = resolve_user(state, &username).await?;
    let remaining = state
        .rooms
        .remove_member(room, ctx.client, target)
        .await?;

    let msg = ServerMessage::UserLeft {
        room,
        username: username.clone(),
    };
    notify_members(state, &remaining, &msg).await?;
    enqueue(&target_out, &msg)?;

    state.events.emit(ServerEvent::MemberLeft {
        room,
        user: UserInfo {
            id: target,
            username,
        },
    });
    Ok(())
}

/// BANUSERFROMROOM: owner bans; a banned member is removed in the same
/// step.
async fn ban_user_from_room<V: AccountValidator>(
    state: &Arc<ServerState<V>>,
    ctx: &ConnCtx,
    username: String,
    room: RoomId,
) -> Result<(), ServerError> {
    let (target, target_out) = resolve_user(state, &username).await?;
    let remaining = state.rooms.ban(room, ctx.client, target).await?;

    let msg = ServerMessage::UserBanned {
        room,
        username: username.clone(),
    };
    notify_members(state, &remaining, &msg).await?;
    enqueue(&target_out, &msg)?;

    state.events.emit(ServerEvent::UserBanned {
        room,
        user: UserInfo {
            id: target,
            username,
        },
    });
    Ok(())
}

/// Resolves a username to its live session. Membership operations address
/// users by name, so their targets must be connected.
async fn resolve_user<V>(
    state: &ServerState<V>,
    username: &str,
) -> Result<(ClientId, OutboundSender), ServerError> {
    let registry = state.sessions.lock().await;
    match registry.find_by_username(username) {
        Some(session) => Ok((session.id, session.outbound.clone())),
        None => {
            Err(SessionError::UserOffline(username.to_string()).into())
        }
    }
}

/// Resolves member guids to user payloads, skipping any that raced a
/// disconnect.
async fn resolve_infos<V>(
    state: &ServerState<V>,
    members: &[ClientId],
) -> Vec<UserInfo> {
    let registry = state.sessions.lock().await;
    members
        .iter()
        .filter_map(|member| {
            registry
                .get(*member)
                .and_then(|session| session.user.as_ref())
                .map(User::info)
        })
        .collect()
}

/// Serializes each collection item for transport inside page frames.
fn json_items<T: serde::Serialize>(
    items: &[T],
) -> Result<Vec<String>, ServerError> {
    items
        .iter()
        .map(|item| serde_json::to_string(item))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ProtocolError::from(e).into())
}

/// Opens a paged transfer for `key` and queues every page. The terminal
/// page carries the key so the writer task can close the transfer once
/// that page is actually on the wire; until then, a second request for
/// the same key is refused busy.
async fn send_paged<V>(
    state: &ServerState<V>,
    ctx: &ConnCtx,
    key: TransferKey,
    items: Vec<String>,
    wrap: impl Fn(Page) -> ServerMessage,
) -> Result<(), ServerError> {
    state.transfers.lock().await.begin(key)?;

    for page in paginate(&items, state.config.page_size) {
        let is_last = page.is_last;
        let frame = wrap(page).to_frame()?.encode()?;
        let out = OutboundMessage {
            frame,
            ends_transfer: is_last.then_some(key),
        };
        if ctx.outbound.send(out).is_err() {
            // Writer gone mid-transfer; free the key here since the
            // terminal page will never be written.
            state.transfers.lock().await.finish(&key);
            break;
        }
    }
    Ok(())
}

/// Tears down a connection: transfers, session binding, room memberships,
/// and the notifications each of those owes the rest of the server.
async fn disconnect_cleanup<V>(
    state: &Arc<ServerState<V>>,
    client: ClientId,
) {
    state.transfers.lock().await.drop_client(client);

    let user = state.sessions.lock().await.unregister(client);
    let username = user.as_ref().map(|u| u.username.clone());

    if let Some(user) = user {
        let cleanup = state.rooms.remove_from_all(user.id).await;
        for (room, remaining) in &cleanup.left {
            let _ = notify_members(
                state,
                remaining,
                &ServerMessage::UserLeft {
                    room: *room,
                    username: user.username.clone(),
                },
            )
            .await;
            state.events.emit(ServerEvent::MemberLeft {
                room: *room,
                user: user.info(),
            });
        }
        for (room, orphaned) in &cleanup.destroyed {
            let _ = notify_members(
                state,
                orphaned,
                &ServerMessage::RoomDestroyed { room: *room },
            )
            .await;
            state
                .events
                .emit(ServerEvent::RoomDestroyed { room: *room });
        }
    }

    state
        .events
        .emit(ServerEvent::ClientDisconnected { client, username });
}
