use anyhow::anyhow;
use tracing::debug;

use crate::config::Config;
use crate::event::Event;

const USER_ENV_VAR: &str = "HOIKU_USER";

/// Who is acting, and what they may change.
///
/// Anyone signed in may browse and open events; only the owner may edit
/// or delete one.
pub trait Session {
    fn current_user(&self) -> Option<&str>;

    fn is_authorized(&self, event: &Event) -> bool {
        self.current_user().is_some_and(|user| user == event.user_id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LocalSession {
    user: Option<String>,
}

impl LocalSession {
    pub fn new(user: Option<String>) -> Self {
        let user = user.map(|u| u.trim().to_string()).filter(|u| !u.is_empty());
        Self { user }
    }

    /// `HOIKU_USER` wins over the `user` config key.
    pub fn from_config(cfg: &Config) -> Self {
        let session = Self::new(std::env::var(USER_ENV_VAR).ok().or_else(|| cfg.get("user")));
        debug!(user = ?session.user, "resolved session user");
        session
    }
}

impl Session for LocalSession {
    fn current_user(&self) -> Option<&str> {
        self.user.as_deref()
    }
}

pub fn require_user(session: &dyn Session) -> anyhow::Result<String> {
    session
        .current_user()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("no user configured; set `user` in hoikurc or {USER_ENV_VAR}"))
}

pub fn require_owner(session: &dyn Session, event: &Event) -> anyhow::Result<()> {
    if session.is_authorized(event) {
        Ok(())
    } else {
        Err(anyhow!("event {} belongs to another user", event.short_id()))
    }
}
