//! Keychain-backed persistence for Firebase sessions.
//!
//! Tests swap the OS keychain for a process-wide map so they never touch the
//! user's real credentials.

use nudge_core::auth::{AuthResult, FirebaseAuthClient, SessionPersistence};
pub use nudge_core::auth::{AuthError, AuthSession};
use nudge_core::config::FirebaseConfig;

pub type AuthClient = FirebaseAuthClient<SessionStore>;

/// Auth client for the configured project, persisting into the keychain.
pub fn auth_client(config: &FirebaseConfig) -> AuthResult<AuthClient> {
    FirebaseAuthClient::new(config, SessionStore::new(&config.project_id))
}

/// Session slot for one Firebase project.
#[derive(Clone)]
pub struct SessionStore {
    account: String,
}

impl SessionStore {
    pub fn new(project_id: &str) -> Self {
        Self {
            account: format!("firebase_session:{project_id}"),
        }
    }
}

impl SessionPersistence for SessionStore {
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        secret::read(&self.account)?
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(AuthError::from)
    }

    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        secret::write(&self.account, &serde_json::to_string(session)?)
    }

    fn clear_session(&self) -> AuthResult<()> {
        secret::remove(&self.account)
    }
}

fn storage_error(error: impl std::fmt::Display) -> AuthError {
    AuthError::SecureStorage(error.to_string())
}

#[cfg(not(test))]
mod secret {
    use keyring::Entry;
    use nudge_core::auth::AuthResult;

    use super::storage_error;

    const SERVICE: &str = "nudge-cli";

    fn entry(account: &str) -> AuthResult<Entry> {
        Entry::new(SERVICE, account).map_err(storage_error)
    }

    pub fn read(account: &str) -> AuthResult<Option<String>> {
        match entry(account)?.get_password() {
            Ok(raw) => Ok(Some(raw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(storage_error(error)),
        }
    }

    pub fn write(account: &str, raw: &str) -> AuthResult<()> {
        entry(account)?.set_password(raw).map_err(storage_error)
    }

    pub fn remove(account: &str) -> AuthResult<()> {
        match entry(account)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(storage_error(error)),
        }
    }
}


#[cfg(test)]
mod tests {
    use nudge_core::auth::AuthUser;
    use pretty_assertions::assert_eq;

    use super::*;

    fn session() -> AuthSession {
        AuthSession {
            id_token: "secret-id-token".to_string(),
            refresh_token: "secret-refresh-token".to_string(),
            expires_at: 1_700_000_000,
            user: AuthUser {
                id: "user".to_string(),
                email: Some("ada@example.com".to_string()),
            },
        }
    }

    #[test]
    fn sessions_are_scoped_by_project() {
        let first = SessionStore::new("project-a");
        let second = SessionStore::new("project-b");

        first.save_session(&session()).unwrap();
        assert!(first.load_session().unwrap().is_some());
        assert!(second.load_session().unwrap().is_none());

        first.clear_session().unwrap();
        assert!(first.load_session().unwrap().is_none());
    }

    #[test]
    fn stored_session_keeps_tokens_and_email() {
        let store = SessionStore::new("project-roundtrip");
        store.save_session(&session()).unwrap();
        assert_eq!(store.load_session().unwrap(), Some(session()));
    }

    #[test]
    fn clearing_an_empty_slot_is_fine() {
        SessionStore::new("project-empty").clear_session().unwrap();
    }
}
