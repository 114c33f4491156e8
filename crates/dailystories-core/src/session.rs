use chrono::{DateTime, Utc};
use dailystories_api::LoginResult;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// Who is logged in, persisted between runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub name: String,
    pub token: String,
    pub logged_in_at: DateTime<Utc>,
}

impl From<LoginResult> for Session {
    fn from(login: LoginResult) -> Self {
        Self {
            user_id: login.user_id,
            name: login.name,
            token: login.token,
            logged_in_at: Utc::now(),
        }
    }
}

/// JSON file holding the current session
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> crate::Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&self.path)?;
        let session = serde_json::from_str(&contents)?;
        Ok(Some(session))
    }

    pub fn save(&self, session: &Session) -> crate::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, contents)?;
        debug!("Session saved for {}", session.user_id);
        Ok(())
    }

    /// Forget the session. Returns false if there wasn't one.
    pub fn clear(&self) -> crate::Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&self.path)?;
        Ok(true)
    }

    /// Token of the logged-in user, or `NotLoggedIn`
    pub fn token(&self) -> crate::Result<String> {
        self.load()?
            .map(|s| s.token)
            .ok_or(crate::Error::NotLoggedIn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn login() -> LoginResult {
        LoginResult {
            user_id: "user-yj5pc_LARC_AgK61".to_string(),
            name: "Arif Faizin".to_string(),
            token: "eyJhbGciOi.payload.sig".to_string(),
        }
    }

    #[test]
    fn test_save_load_clear() {
        let temp_dir = TempDir::new().unwrap();
        let store = SessionStore::new(temp_dir.path().join("data").join("session.json"));

        assert!(store.load().unwrap().is_none());
        assert!(matches!(store.token(), Err(crate::Error::NotLoggedIn)));

        let session = Session::from(login());
        store.save(&session).unwrap();
        assert_eq!(store.load().unwrap(), Some(session));
        assert_eq!(store.token().unwrap(), "eyJhbGciOi.payload.sig");

        assert!(store.clear().unwrap());
        assert!(!store.clear().unwrap());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_session_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = SessionStore::new(path);
        assert!(matches!(
            store.load(),
            Err(crate::Error::SerializationError(_))
        ));
    }
}
