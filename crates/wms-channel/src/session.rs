//! Session collaborators: where a channel gets its credential from.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Supplies the credential a channel needs before it may connect.
///
/// Read once per connection attempt; a channel never subscribes to changes.
pub trait SessionProvider: Send + Sync + 'static {
    /// Current token, `None` when signed out. Empty tokens count as absent.
    fn token(&self) -> Option<String>;
}

/// A provider with a fixed token.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        StaticToken(Some(token.into()))
    }

    pub fn none() -> Self {
        StaticToken(None)
    }
}

impl SessionProvider for StaticToken {
    fn token(&self) -> Option<String> {
        self.0.clone().filter(|t| !t.is_empty())
    }
}

/// Signed-in user as returned by the login endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Login response: a bearer token and the user it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthGrant {
    pub access_token: String,
    pub user: User,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct StoredSession {
    #[serde(default)]
    token: String,
    #[serde(default)]
    user: Option<User>,
}

/// Authentication state, optionally persisted to a JSON file.
///
/// The file is rewritten on every [`set_auth`](SessionStore::set_auth) and
/// removed on [`logout`](SessionStore::logout), so the session survives a
/// restart until the user signs out.
#[derive(Debug)]
pub struct SessionStore {
    path: Option<PathBuf>,
    state: RwLock<StoredSession>,
}

impl SessionStore {
    /// A store that is never persisted.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: RwLock::new(StoredSession::default()),
        }
    }

    /// Open the store backed by `path`. A missing file is an empty session.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoredSession::default(),
            Err(source) => return Err(Error::Session { path, source }),
        };
        Ok(Self {
            path: Some(path),
            state: RwLock::new(state),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Store a fresh login and persist it.
    pub fn set_auth(&self, grant: AuthGrant) -> Result<(), Error> {
        let next = StoredSession {
            token: grant.access_token,
            user: Some(grant.user),
        };
        self.persist(Some(&next))?;
        *self.write() = next;
        Ok(())
    }

    /// Store a bare token with no user record, e.g. one issued out of band.
    pub fn set_token(&self, token: impl Into<String>) -> Result<(), Error> {
        let next = StoredSession {
            token: token.into(),
            user: None,
        };
        self.persist(Some(&next))?;
        *self.write() = next;
        Ok(())
    }

    /// Forget the session and delete the persisted copy.
    pub fn logout(&self) -> Result<(), Error> {
        *self.write() = StoredSession::default();
        self.persist(None)
    }

    pub fn is_authenticated(&self) -> bool {
        !self.read().token.is_empty()
    }

    pub fn user(&self) -> Option<User> {
        self.read().user.clone()
    }

    /// `"first last"` of the signed-in user, empty when signed out.
    pub fn full_name(&self) -> String {
        self.read()
            .user
            .as_ref()
            .map(|u| format!("{} {}", u.first_name, u.last_name))
            .unwrap_or_default()
    }

    fn persist(&self, session: Option<&StoredSession>) -> Result<(), Error> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let io_err = |source: std::io::Error| Error::Session {
            path: path.clone(),
            source,
        };
        match session {
            Some(session) => {
                if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                    std::fs::create_dir_all(dir).map_err(io_err)?;
                }
                let content = serde_json::to_string_pretty(session)?;
                std::fs::write(path, content).map_err(io_err)
            }
            None => match std::fs::remove_file(path) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(io_err(e)),
                _ => Ok(()),
            },
        }
    }

    // A poisoned lock only means a writer panicked mid-assignment of a plain
    // value; the data is still usable.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoredSession> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoredSession> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionProvider for SessionStore {
    fn token(&self) -> Option<String> {
        let state = self.read();
        (!state.token.is_empty()).then(|| state.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant() -> AuthGrant {
        AuthGrant {
            access_token: "tok-123".to_string(),
            user: User {
                id: 7,
                email: "anna@example.com".to_string(),
                first_name: "Anna".to_string(),
                last_name: "Rossi".to_string(),
                role: "magazziniere".to_string(),
                is_active: true,
            },
        }
    }

    #[test]
    fn static_token() {
        assert_eq!(StaticToken::new("abc").token().as_deref(), Some("abc"));
        assert_eq!(StaticToken::new("").token(), None);
        assert_eq!(StaticToken::none().token(), None);
    }

    #[test]
    fn in_memory_store_starts_signed_out() {
        let store = SessionStore::in_memory();
        assert!(!store.is_authenticated());
        assert_eq!(store.token(), None);
        assert_eq!(store.full_name(), "");
        assert_eq!(store.path(), None);
    }

    #[test]
    fn set_auth_and_logout_in_memory() {
        let store = SessionStore::in_memory();
        store.set_auth(grant()).unwrap();
        assert!(store.is_authenticated());
        assert_eq!(store.token().as_deref(), Some("tok-123"));
        assert_eq!(store.full_name(), "Anna Rossi");
        assert_eq!(store.user().map(|u| u.role), Some("magazziniere".to_string()));

        store.logout().unwrap();
        assert!(!store.is_authenticated());
        assert_eq!(store.user(), None);
    }

    #[test]
    fn missing_file_is_empty_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::load(dir.path().join("session.json")).unwrap();
        assert_eq!(store.token(), None);
    }

    #[test]
    fn session_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        SessionStore::load(&path).unwrap().set_auth(grant()).unwrap();
        assert!(path.exists());

        let reloaded = SessionStore::load(&path).unwrap();
        assert_eq!(reloaded.token().as_deref(), Some("tok-123"));
        assert_eq!(reloaded.user(), Some(grant().user));
    }

    #[test]
    fn bare_token_has_no_user() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        SessionStore::load(&path).unwrap().set_token("tok-9").unwrap();

        let reloaded = SessionStore::load(&path).unwrap();
        assert_eq!(reloaded.token().as_deref(), Some("tok-9"));
        assert_eq!(reloaded.user(), None);
        assert_eq!(reloaded.full_name(), "");
    }

    #[test]
    fn logout_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let store = SessionStore::load(&path).unwrap();
        store.set_auth(grant()).unwrap();

        store.logout().unwrap();
        assert!(!path.exists());
        // Second logout with no file is fine.
        store.logout().unwrap();
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(SessionStore::load(&path), Err(Error::Json(_))));
    }

    #[test]
    fn user_without_is_active_defaults_to_active() {
        let user: User = serde_json::from_str(
            r#"{"id":1,"email":"a@b.c","first_name":"A","last_name":"B","role":"admin"}"#,
        )
        .unwrap();
        assert!(user.is_active);
    }
}
