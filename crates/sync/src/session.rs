//! Session context and identity gate.
//!
//! [`SessionContext`] is the single owner of authentication state for the
//! process. It restores the bearer token and role from durable storage on
//! [`init`](SessionContext::init), and [`login`](SessionContext::login) /
//! [`logout`](SessionContext::logout) update memory and storage together.
//! Other components ask it questions instead of reading the token keys
//! themselves.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use storecart_core::UserRole;
use tracing::{debug, info, warn};

use crate::storage::SharedStorage;

/// Storage key of the bearer token.
pub const TOKEN_KEY: &str = "token";

/// Storage key of the account role.
pub const ROLE_KEY: &str = "userRole";

/// Answers whether remote synchronization may be attempted.
pub trait IdentityGate: Send + Sync {
    /// Whether the current session is authenticated.
    fn is_authenticated(&self) -> bool;
}

/// Authenticated session state.
struct Session {
    token: SecretString,
    role: Option<UserRole>,
    since: DateTime<Utc>,
}

/// Process-wide session context.
pub struct SessionContext {
    storage: SharedStorage,
    session: RwLock<Option<Session>>,
}

impl SessionContext {
    /// Restore the session from durable storage.
    ///
    /// An empty or missing token means signed out.
    #[must_use]
    pub fn init(storage: SharedStorage) -> Arc<Self> {
        let token = match storage.get(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.trim().is_empty()),
            Err(e) => {
                warn!(error = %e, "failed to read stored token, starting signed out");
                None
            }
        };
        let role = storage
            .get(ROLE_KEY)
            .ok()
            .flatten()
            .and_then(|r| r.trim().parse::<i64>().ok())
            .map(UserRole::from);

        let session = token.map(|token| Session {
            token: SecretString::from(token),
            role,
            since: Utc::now(),
        });
        debug!(authenticated = session.is_some(), "session restored");

        Arc::new(Self {
            storage,
            session: RwLock::new(session),
        })
    }

    /// Start an authenticated session and persist its credentials.
    pub fn login(&self, token: impl Into<String>, role: Option<UserRole>) {
        let token = token.into();
        if let Err(e) = self.storage.set(TOKEN_KEY, &token) {
            warn!(error = %e, "failed to persist token");
        }
        let role_result = match role {
            Some(role) => self.storage.set(ROLE_KEY, &i64::from(role).to_string()),
            None => self.storage.remove(ROLE_KEY),
        };
        if let Err(e) = role_result {
            warn!(error = %e, "failed to persist role");
        }

        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(Session {
            token: SecretString::from(token),
            role,
            since: Utc::now(),
        });
        info!(?role, "signed in");
    }

    /// End the session and remove its credentials from storage.
    pub fn logout(&self) {
        let was_authenticated = self
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some();
        for key in [TOKEN_KEY, ROLE_KEY] {
            if let Err(e) = self.storage.remove(key) {
                warn!(error = %e, key, "failed to clear session key");
            }
        }
        if was_authenticated {
            info!("signed out");
        }
    }

    /// Bearer token of the current session.
    #[must_use]
    pub fn bearer_token(&self) -> Option<SecretString> {
        self.read(|s| SecretString::from(s.token.expose_secret().to_string()))
    }

    /// Role of the current session.
    #[must_use]
    pub fn role(&self) -> Option<UserRole> {
        self.read(|s| s.role).flatten()
    }

    /// When the current session started (or was restored).
    #[must_use]
    pub fn authenticated_since(&self) -> Option<DateTime<Utc>> {
        self.read(|s| s.since)
    }

    fn read<T>(&self, f: impl FnOnce(&Session) -> T) -> Option<T> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(f)
    }
}

impl IdentityGate for SessionContext {
    fn is_authenticated(&self) -> bool {
        self.read(|_| ()).is_some()
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("authenticated", &self.is_authenticated())
            .field("role", &self.role())
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::{DurableStorage, MemoryStorage};

    #[test]
    fn test_init_without_token_is_signed_out() {
        let session = SessionContext::init(Arc::new(MemoryStorage::new()));
        assert!(!session.is_authenticated());
        assert!(session.bearer_token().is_none());
    }

    #[test]
    fn test_init_restores_token_and_role() {
        let storage = Arc::new(MemoryStorage::with_entry(TOKEN_KEY, "tok-123"));
        storage.set(ROLE_KEY, "1").unwrap();

        let session = SessionContext::init(storage);
        assert!(session.is_authenticated());
        assert_eq!(session.bearer_token().unwrap().expose_secret(), "tok-123");
        assert_eq!(session.role(), Some(UserRole::Admin));
        assert!(session.authenticated_since().is_some());
    }

    #[test]
    fn test_blank_token_is_signed_out() {
        let storage = Arc::new(MemoryStorage::with_entry(TOKEN_KEY, "  "));
        assert!(!SessionContext::init(storage).is_authenticated());
    }

    #[test]
    fn test_login_logout_persist() {
        let storage = Arc::new(MemoryStorage::new());
        let session = SessionContext::init(storage.clone());

        session.login("abc", Some(UserRole::Customer));
        assert!(session.is_authenticated());
        assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("abc"));
        assert_eq!(storage.get(ROLE_KEY).unwrap().as_deref(), Some("0"));

        session.logout();
        assert!(!session.is_authenticated());
        assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
        assert_eq!(storage.get(ROLE_KEY).unwrap(), None);
    }

    #[test]
    fn test_debug_redacts_token() {
        let session = SessionContext::init(Arc::new(MemoryStorage::new()));
        session.login("super-secret-token", None);
        let debug = format!("{session:?}");
        assert!(!debug.contains("super-secret-token"));
        assert!(debug.contains("REDACTED"));
    }
}
