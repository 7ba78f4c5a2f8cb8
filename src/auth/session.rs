use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::repository::IdentityDirectory;

use super::{AccessDecision, Identity, decide};

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub identity: Identity,
    pub created_at: DateTime<Utc>,
}

impl Session {
    fn new(identity: Identity) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity,
            created_at: Utc::now(),
        }
    }
}

/// Holds at most one authenticated session for an execution context.
pub struct SessionStore {
    directory: Arc<dyn IdentityDirectory>,
    current: RwLock<Option<Session>>,
}

impl SessionStore {
    pub fn new(directory: Arc<dyn IdentityDirectory>) -> Self {
        Self {
            directory,
            current: RwLock::new(None),
        }
    }

    /// Replaces any existing session on success. A failed lookup leaves the
    /// current session exactly as it was.
    #[instrument(skip_all, fields(email = %email))]
    pub async fn authenticate(&self, email: &str, secret: &str) -> Result<Session, AppError> {
        let identity = match self.directory.find_by_credentials(email, secret).await? {
            Some(identity) => identity,
            None => {
                warn!("Authentication failed");
                return Err(AppError::InvalidCredentials);
            }
        };

        let session = Session::new(identity);

        let mut current = self.current.write().await;
        if let Some(previous) = current.replace(session.clone()) {
            info!(previous_session = %previous.id, "Discarded previous session");
        }

        info!(
            session = %session.id,
            identity_id = session.identity.id,
            role = %session.identity.role,
            "Authenticated"
        );
        Ok(session)
    }

    pub async fn current_session(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    pub async fn current_identity(&self) -> Option<Identity> {
        self.current
            .read()
            .await
            .as_ref()
            .map(|session| session.identity.clone())
    }

    pub async fn logout(&self) {
        if let Some(session) = self.current.write().await.take() {
            info!(session = %session.id, identity_id = session.identity.id, "Logged out");
        }
    }

    /// Reloads the held identity from the directory. A session whose identity
    /// has disappeared is destroyed; a session replaced or logged out while the
    /// lookup ran is left alone.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<Option<Identity>, AppError> {
        let Some((session_id, identity_id)) = self
            .current
            .read()
            .await
            .as_ref()
            .map(|session| (session.id, session.identity.id))
        else {
            return Ok(None);
        };

        let reloaded = self.directory.find_by_id(identity_id).await?;

        let mut current = self.current.write().await;
        let still_current = current
            .as_ref()
            .is_some_and(|session| session.id == session_id);
        if !still_current {
            return Ok(current.as_ref().map(|session| session.identity.clone()));
        }

        match reloaded {
            Some(identity) => {
                if let Some(session) = current.as_mut() {
                    session.identity = identity.clone();
                }
                Ok(Some(identity))
            }
            None => {
                warn!(identity_id, "Identity no longer in directory, dropping session");
                *current = None;
                Ok(None)
            }
        }
    }

    pub async fn decide(&self, requested: &str) -> AccessDecision {
        let current = self.current.read().await;
        decide(current.as_ref(), requested)
    }
}
