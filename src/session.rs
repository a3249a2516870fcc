use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::auth::{Flow as AuthFlow, Session, SessionCookie};
use crate::error::FeedError;
use crate::storage::{self, Account, StoredSession};

/// Owns the signed-in identity and its persisted cookie.
pub struct Manager {
    store: Arc<storage::Store>,
    flow: Arc<AuthFlow>,
    active: RwLock<Option<(i64, Session)>>,
}

impl Manager {
    pub fn new(store: Arc<storage::Store>, flow: Arc<AuthFlow>) -> Self {
        Self {
            store,
            flow,
            active: RwLock::new(None),
        }
    }

    /// Restores the most recently used session that the service still accepts.
    pub fn load_existing(&self) -> Result<Option<Session>> {
        let now = Utc::now();
        for account in self.store.list_accounts()? {
            let Some(stored) = self.store.get_session(account.id)? else {
                continue;
            };
            if stored.expires_at <= now {
                info!(account_id = account.id, "dropping expired session");
                self.store.delete_session(account.id)?;
                continue;
            }
            let cookie = SessionCookie {
                name: stored.cookie_name,
                value: stored.token,
            };
            match self.flow.resume(cookie) {
                Ok(session) => {
                    self.remember(account.id, &session)?;
                    return Ok(Some(session));
                }
                Err(err) => {
                    if FeedError::from_api(&err) == FeedError::Unauthorized
                        || err.downcast_ref::<FeedError>() == Some(&FeedError::Unauthorized)
                    {
                        self.store.delete_session(account.id)?;
                    }
                    warn!(account_id = account.id, error = %format!("{err:#}"), "session resume failed");
                }
            }
        }
        Ok(None)
    }

    pub fn active(&self) -> Option<Session> {
        self.active.read().as_ref().map(|(_, session)| session.clone())
    }

    pub fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let session = self.flow.sign_in(email, password)?;
        let account_id = self
            .store
            .upsert_account(Account::new(&session.user_id, &session.email))?;
        self.remember(account_id, &session)?;
        Ok(session)
    }

    /// Forgets the active session locally. Returns false when nobody was signed in.
    pub fn sign_out(&self) -> Result<bool> {
        let previous = self.active.write().take();
        match previous {
            Some((account_id, session)) => {
                self.store.delete_session(account_id)?;
                info!(user_id = %session.user_id, "signed out");
                Ok(true)
            }
            None => {
                let accounts = self.store.list_accounts()?;
                let mut removed = false;
                for account in accounts {
                    if self.store.get_session(account.id)?.is_some() {
                        self.store.delete_session(account.id)?;
                        removed = true;
                    }
                }
                Ok(removed)
            }
        }
    }

    fn remember(&self, account_id: i64, session: &Session) -> Result<()> {
        self.store.upsert_session(StoredSession {
            account_id,
            cookie_name: session.cookie.name.clone(),
            token: session.cookie.value.clone(),
            expires_at: session.expires_at,
        })?;
        *self.active.write() = Some((account_id, session.clone()));
        Ok(())
    }
}
