use common::Shared;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    // the password must never reach logs
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Credential context for a submission session.
///
/// Cloned handles share state, so a dialog can store credentials while the
/// retry loop reads them. Authentication failures invalidate the stored
/// credentials; the caller owns the lifetime and re-prompts.
#[derive(Clone, Debug, Default)]
pub struct Session {
    credentials: Shared<Option<Credentials>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn authenticated(credentials: Credentials) -> Self {
        Self {
            credentials: Shared::new(Some(credentials)),
        }
    }

    pub fn store(&self, credentials: Credentials) {
        *self.credentials.lock() = Some(credentials);
    }

    pub fn current(&self) -> Option<Credentials> {
        self.credentials.lock().clone()
    }

    pub fn invalidate(&self) {
        *self.credentials.lock() = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.lock().is_some()
    }
}
