//! The session registry: every live connection and who is behind it.
//!
//! # Concurrency note
//!
//! `SessionRegistry` is NOT thread-safe by itself — plain `HashMap`s, no
//! interior locking. The server wraps it in one mutex; every operation here
//! is a cheap in-memory update or an O(1) lookup, so a single table lock is
//! enough. Anything that might block (credential validation, socket
//! writes) happens outside that lock, on snapshots taken from here.

use std::collections::HashMap;

use parlor_protocol::{valid_username, ClientId, UserInfo};
use parlor_transport::ConnectionId;

use crate::{OutboundSender, Session, SessionError, User};

/// Tracks all live sessions with O(1) lookup by client id, connection id,
/// and username.
#[derive(Default)]
pub struct SessionRegistry {
    /// All sessions, keyed by client id.
    sessions: HashMap<ClientId, Session>,
    /// Transport connection → client id.
    by_connection: HashMap<ConnectionId, ClientId>,
    /// Username → client id. Only authenticated sessions appear here;
    /// kept in sync with `sessions` on bind and unregister.
    by_username: HashMap<String, ClientId>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new connection and assigns its client guid.
    pub fn register(
        &mut self,
        connection: ConnectionId,
        outbound: OutboundSender,
    ) -> ClientId {
        let id = ClientId::new();
        self.sessions.insert(
            id,
            Session {
                id,
                connection,
                user: None,
                outbound,
            },
        );
        self.by_connection.insert(connection, id);
        tracing::info!(client = %id, %connection, "session registered");
        id
    }

    /// Removes a session, unbinding its user if it had one.
    ///
    /// Returns the bound user so the caller can clean up room memberships
    /// and emit the disconnect notification; `None` if the session did not
    /// exist or never authenticated.
    pub fn unregister(&mut self, client: ClientId) -> Option<User> {
        let session = self.sessions.remove(&client)?;
        self.by_connection.remove(&session.connection);
        if let Some(user) = &session.user {
            self.by_username.remove(&user.username);
            tracing::info!(
                client = %client,
                username = %user.username,
                "session unregistered, user unbound"
            );
        } else {
            tracing::info!(client = %client, "session unregistered");
        }
        session.user
    }

    /// Binds a validated username to a session.
    ///
    /// Credential verification has already happened (against the external
    /// account backend, with no lock held); this applies the result.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`] — no such session.
    /// - [`SessionError::AuthFailed`] — the username cannot ride in a
    ///   wire field.
    /// - [`SessionError::AlreadyAuthenticated`] — this session is already
    ///   bound, or the username has a live session elsewhere. The existing
    ///   binding is never displaced.
    pub fn bind_user(
        &mut self,
        client: ClientId,
        username: &str,
    ) -> Result<User, SessionError> {
        if !valid_username(username) {
            return Err(SessionError::AuthFailed(format!(
                "unusable username {username:?}"
            )));
        }
        if let Some(holder) = self.by_username.get(username) {
            tracing::warn!(
                client = %client,
                username,
                holder = %holder,
                "rejected duplicate authentication"
            );
            return Err(SessionError::AlreadyAuthenticated(
                username.to_string(),
            ));
        }

        let session = self
            .sessions
            .get_mut(&client)
            .ok_or(SessionError::NotFound(client))?;
        if let Some(existing) = &session.user {
            return Err(SessionError::AlreadyAuthenticated(
                existing.username.clone(),
            ));
        }

        let user = User {
            id: client,
            username: username.to_string(),
        };
        session.user = Some(user.clone());
        self.by_username.insert(username.to_string(), client);
        tracing::info!(client = %client, username, "user bound");
        Ok(user)
    }

    /// Looks up a session by client id.
    pub fn get(&self, client: ClientId) -> Option<&Session> {
        self.sessions.get(&client)
    }

    /// Looks up the client id behind a transport connection.
    pub fn client_of_connection(
        &self,
        connection: ConnectionId,
    ) -> Option<ClientId> {
        self.by_connection.get(&connection).copied()
    }

    /// Looks up a session by bound username.
    pub fn find_by_username(&self, username: &str) -> Option<&Session> {
        let client = self.by_username.get(username)?;
        self.sessions.get(client)
    }

    /// The outbound queue handle for one client, cloned for use outside
    /// the registry lock.
    pub fn outbound_to(&self, client: ClientId) -> Option<OutboundSender> {
        self.sessions.get(&client).map(|s| s.outbound.clone())
    }

    /// Cloned outbound handles for a set of clients, skipping any that
    /// are gone. Used for room fan-out on a membership snapshot.
    pub fn outbound_for(
        &self,
        clients: &[ClientId],
    ) -> Vec<OutboundSender> {
        clients
            .iter()
            .filter_map(|c| self.outbound_to(*c))
            .collect()
    }

    /// Cloned outbound handles for every authenticated session except
    /// `sender`.
    pub fn outbound_all_except(
        &self,
        sender: ClientId,
    ) -> Vec<OutboundSender> {
        self.sessions
            .values()
            .filter(|s| s.is_authenticated() && s.id != sender)
            .map(|s| s.outbound.clone())
            .collect()
    }

    /// Snapshot of every authenticated user, sorted by username so list
    /// payloads are stable.
    pub fn user_list(&self) -> Vec<UserInfo> {
        let mut users: Vec<UserInfo> = self
            .sessions
            .values()
            .filter_map(|s| s.user.as_ref().map(User::info))
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        users
    }

    /// Resolves a client id to its bound username.
    pub fn username_of(&self, client: ClientId) -> Option<String> {
        self.sessions
            .get(&client)?
            .user
            .as_ref()
            .map(|u| u.username.clone())
    }

    /// Number of live sessions (authenticated or not).
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn sender() -> OutboundSender {
        mpsc::unbounded_channel().0
    }

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    #[test]
    fn test_register_assigns_unique_ids_and_indexes_connection() {
        let mut reg = SessionRegistry::new();
        let a = reg.register(conn(1), sender());
        let b = reg.register(conn(2), sender());

        assert_ne!(a, b);
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.client_of_connection(conn(1)), Some(a));
        assert_eq!(reg.client_of_connection(conn(2)), Some(b));
    }

    #[test]
    fn test_bind_user_succeeds_and_indexes_username() {
        let mut reg = SessionRegistry::new();
        let id = reg.register(conn(1), sender());

        let user = reg.bind_user(id, "alice").expect("bind");

        assert_eq!(user.id, id);
        assert_eq!(user.username, "alice");
        assert!(reg.get(id).expect("session").is_authenticated());
        assert_eq!(
            reg.find_by_username("alice").map(|s| s.id),
            Some(id)
        );
    }

    #[test]
    fn test_bind_user_rejects_username_with_live_session() {
        let mut reg = SessionRegistry::new();
        let first = reg.register(conn(1), sender());
        let second = reg.register(conn(2), sender());
        reg.bind_user(first, "alice").expect("first bind");

        let result = reg.bind_user(second, "alice");

        assert!(matches!(
            result,
            Err(SessionError::AlreadyAuthenticated(name)) if name == "alice"
        ));
        // The original binding is untouched.
        assert_eq!(
            reg.find_by_username("alice").map(|s| s.id),
            Some(first)
        );
        assert!(!reg.get(second).expect("session").is_authenticated());
    }

    #[test]
    fn test_bind_user_rejects_second_bind_on_same_session() {
        let mut reg = SessionRegistry::new();
        let id = reg.register(conn(1), sender());
        reg.bind_user(id, "alice").expect("first bind");

        assert!(matches!(
            reg.bind_user(id, "alice2"),
            Err(SessionError::AlreadyAuthenticated(_))
        ));
    }

    #[test]
    fn test_bind_user_rejects_separator_in_username() {
        let mut reg = SessionRegistry::new();
        let id = reg.register(conn(1), sender());

        assert!(matches!(
            reg.bind_user(id, "ali:ce"),
            Err(SessionError::AuthFailed(_))
        ));
        assert!(matches!(
            reg.bind_user(id, ""),
            Err(SessionError::AuthFailed(_))
        ));
    }

    #[test]
    fn test_bind_user_unknown_session_is_not_found() {
        let mut reg = SessionRegistry::new();
        assert!(matches!(
            reg.bind_user(ClientId::new(), "alice"),
            Err(SessionError::NotFound(_))
        ));
    }

    #[test]
    fn test_unregister_returns_bound_user_and_frees_username() {
        let mut reg = SessionRegistry::new();
        let id = reg.register(conn(1), sender());
        reg.bind_user(id, "alice").expect("bind");

        let user = reg.unregister(id).expect("bound user comes back");
        assert_eq!(user.username, "alice");
        assert!(reg.is_empty());
        assert!(reg.find_by_username("alice").is_none());
        assert_eq!(reg.client_of_connection(conn(1)), None);

        // The name is free for a new session now.
        let next = reg.register(conn(2), sender());
        reg.bind_user(next, "alice").expect("name reusable");
    }

    #[test]
    fn test_unregister_unauthenticated_returns_none() {
        let mut reg = SessionRegistry::new();
        let id = reg.register(conn(1), sender());
        assert!(reg.unregister(id).is_none());
        assert!(reg.unregister(id).is_none(), "second remove is a no-op");
    }

    #[test]
    fn test_user_list_is_sorted_and_skips_unauthenticated() {
        let mut reg = SessionRegistry::new();
        let a = reg.register(conn(1), sender());
        let b = reg.register(conn(2), sender());
        let _silent = reg.register(conn(3), sender());
        reg.bind_user(a, "zoe").expect("bind");
        reg.bind_user(b, "adam").expect("bind");

        let list = reg.user_list();
        let names: Vec<&str> =
            list.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["adam", "zoe"]);
    }

    #[test]
    fn test_outbound_all_except_excludes_sender_and_unauthenticated() {
        let mut reg = SessionRegistry::new();
        let a = reg.register(conn(1), sender());
        let b = reg.register(conn(2), sender());
        let c = reg.register(conn(3), sender());
        let _quiet = reg.register(conn(4), sender());
        reg.bind_user(a, "a").expect("bind");
        reg.bind_user(b, "b").expect("bind");
        reg.bind_user(c, "c").expect("bind");

        assert_eq!(reg.outbound_all_except(a).len(), 2);
    }

    #[test]
    fn test_outbound_for_skips_missing_clients() {
        let mut reg = SessionRegistry::new();
        let a = reg.register(conn(1), sender());
        let ghost = ClientId::new();

        assert_eq!(reg.outbound_for(&[a, ghost]).len(), 1);
    }
}
