//! Broadcast engine: resolves recipients and fans messages out.
//!
//! Fan-out never writes a socket directly. Targets are snapshotted under
//! the registry (or room) lock, the lock is released, and frames are
//! enqueued on each recipient's outbound queue — a stalled connection
//! slows only its own writer task, never the registries. Per-recipient
//! ordering comes from the queues: frames enqueued in order are written
//! in order.

use parlor_protocol::{ClientId, RoomId, ServerMessage};
use parlor_session::{OutboundMessage, OutboundSender, SessionError, User};

use crate::server::ServerState;
use crate::{ServerError, ServerEvent};

/// Encodes a message and queues it on one connection.
///
/// A dropped queue (the connection is tearing down) is not an error:
/// delivery is best-effort to currently-connected recipients.
pub(crate) fn enqueue(
    sender: &OutboundSender,
    msg: &ServerMessage,
) -> Result<(), ServerError> {
    let frame = msg.to_frame()?.encode()?;
    let _ = sender.send(OutboundMessage::frame(frame));
    Ok(())
}

/// Encodes a message once and queues it on every given connection.
pub(crate) fn fan_out(
    senders: &[OutboundSender],
    msg: &ServerMessage,
) -> Result<(), ServerError> {
    let frame = msg.to_frame()?.encode()?;
    for sender in senders {
        let _ = sender.send(OutboundMessage::frame(frame.clone()));
    }
    Ok(())
}

/// Queues a message to each listed member that still has a session.
pub(crate) async fn notify_members<V>(
    state: &ServerState<V>,
    members: &[ClientId],
    msg: &ServerMessage,
) -> Result<(), ServerError> {
    let senders = state.sessions.lock().await.outbound_for(members);
    fan_out(&senders, msg)
}

/// Direct message to one username. The recipient must be connected —
/// there is no queue for offline users. On success the sender gets a
/// delivery acknowledgment.
pub(crate) async fn send_to_user<V>(
    state: &ServerState<V>,
    from: &User,
    to: &str,
    message: String,
    ack: &OutboundSender,
) -> Result<(), ServerError> {
    let target = {
        let registry = state.sessions.lock().await;
        registry.find_by_username(to).and_then(|session| {
            session
                .user
                .as_ref()
                .map(|user| (user.clone(), session.outbound.clone()))
        })
    };
    let Some((to_user, to_out)) = target else {
        return Err(SessionError::UserOffline(to.to_string()).into());
    };

    enqueue(
        &to_out,
        &ServerMessage::ReceiveMessage {
            from: from.username.clone(),
            message: message.clone(),
        },
    )?;
    enqueue(
        ack,
        &ServerMessage::MessageDelivered {
            to: to_user.username.clone(),
        },
    )?;

    state.events.emit(ServerEvent::DirectMessage {
        from: from.info(),
        to: to_user.info(),
        message,
    });
    Ok(())
}

/// Fan-out to every current member of a room. The sender must be a
/// member; whether it receives its own echo is configuration.
pub(crate) async fn send_to_room<V>(
    state: &ServerState<V>,
    from: &User,
    room: RoomId,
    message: String,
) -> Result<(), ServerError> {
    let mut members =
        state.rooms.room_message_targets(room, from.id).await?;
    if !state.config.echo_room_messages {
        members.retain(|member| *member != from.id);
    }

    let senders = state.sessions.lock().await.outbound_for(&members);
    fan_out(
        &senders,
        &ServerMessage::RoomMessage {
            room,
            from: from.username.clone(),
            message: message.clone(),
        },
    )?;

    state.events.emit(ServerEvent::RoomMessage {
        room,
        from: from.info(),
        message,
    });
    Ok(())
}

/// Fan-out to every authenticated session except the sender's.
pub(crate) async fn send_to_all_except_sender<V>(
    state: &ServerState<V>,
    from: &User,
    message: String,
) -> Result<(), ServerError> {
    let senders =
        state.sessions.lock().await.outbound_all_except(from.id);
    fan_out(
        &senders,
        &ServerMessage::BroadcastMessage {
            from: from.username.clone(),
            message: message.clone(),
        },
    )?;

    state.events.emit(ServerEvent::Broadcast {
        from: from.info(),
        message,
    });
    Ok(())
}
