//! Account validation hook.
//!
//! Parlor does not store accounts — an external backend (database, LDAP,
//! whatever the deployment has) owns the username/secret check. The server
//! only needs one async question answered: are these credentials good?
//!
//! The validator may be slow or blocking on its side; the dispatcher
//! awaits it with no shared lock held, so a stalled backend can never
//! freeze registry or room operations.
//!
//! # Example
//!
//! ```rust
//! use parlor_session::AccountValidator;
//!
//! /// Accepts any non-empty secret. Development only.
//! struct AnySecret;
//!
//! impl AccountValidator for AnySecret {
//!     async fn validate_account(
//!         &self,
//!         _username: &str,
//!         secret: &str,
//!     ) -> bool {
//!         !secret.is_empty()
//!     }
//! }
//! ```
pub trait AccountValidator: Send + Sync + 'static {
    /// Returns `true` if the username/secret pair is valid.
    fn validate_account(
        &self,
        username: &str,
        secret: &str,
    ) -> impl std::future::Future<Output = bool> + Send;
}
