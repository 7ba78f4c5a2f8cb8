use std::sync::Arc;

use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, instrument, warn};

use crate::auth::Identity;
use crate::error::AppError;
use crate::repository::{BadgeCatalog, ProgressionRepository};

use super::{
    FIRST_PROFILE_BADGE, IdentityLocks, ONBOARDING_BONUS_POINTS, ProgressionSnapshot,
    ProgressionState, QualifyingAction, StoredProgression, advance_streak, newly_eligible,
};

pub(crate) const MAX_CONFLICT_RETRIES: usize = 5;

pub struct ProgressionEngine {
    repository: Arc<dyn ProgressionRepository>,
    catalog: Arc<dyn BadgeCatalog>,
    locks: IdentityLocks,
}

impl ProgressionEngine {
    pub fn new(repository: Arc<dyn ProgressionRepository>, catalog: Arc<dyn BadgeCatalog>) -> Self {
        Self {
            repository,
            catalog,
            locks: IdentityLocks::default(),
        }
    }

    pub fn catalog(&self) -> &dyn BadgeCatalog {
        self.catalog.as_ref()
    }

    pub async fn snapshot(&self, identity_id: i64) -> Result<ProgressionSnapshot, AppError> {
        let stored = self.repository.load(identity_id).await?;
        Ok(stored.state.snapshot())
    }

    /// Applies one qualifying action. Replaying an action instance that was
    /// already applied returns the current snapshot untouched.
    #[instrument(skip_all, fields(identity_id = identity.id, action_id = %action.id))]
    pub async fn apply_qualifying_action(
        &self,
        identity: &Identity,
        action: &QualifyingAction,
    ) -> Result<ProgressionSnapshot, AppError> {
        let _guard = self.lock_identity(identity.id).await;

        self.mutate(identity.id, &action.id, |state| {
            advance_streak(state, action.date);
            state.record(&action.kind);
        })
        .await
    }

    /// Serialises every mutation of one identity's progression and
    /// onboarding flags.
    pub(crate) async fn lock_identity(&self, identity_id: i64) -> OwnedMutexGuard<()> {
        self.locks.acquire(identity_id).await
    }

    pub(crate) async fn load(&self, identity_id: i64) -> Result<StoredProgression, AppError> {
        self.repository.load(identity_id).await
    }

    pub(crate) async fn has_applied(
        &self,
        identity_id: i64,
        action_id: &str,
    ) -> Result<bool, AppError> {
        self.repository.has_applied(identity_id, action_id).await
    }

    /// `state` with the onboarding bonus folded in: points plus the
    /// first-profile badge, then any badges that newly qualify.
    pub(crate) fn with_onboarding_bonus(&self, state: &ProgressionState) -> ProgressionState {
        self.advance(state, |state| {
            state.points = state.points.saturating_add(ONBOARDING_BONUS_POINTS);
            state.badges_earned.insert(FIRST_PROFILE_BADGE.to_string());
        })
    }

    fn advance<F>(&self, state: &ProgressionState, apply: F) -> ProgressionState
    where
        F: Fn(&mut ProgressionState),
    {
        let mut next = state.clone();
        apply(&mut next);

        let earned = newly_eligible(&next, self.catalog.as_ref());
        if !earned.is_empty() {
            info!(badges = ?earned, "Badges unlocked");
        }
        next.badges_earned.extend(earned);
        next
    }

    async fn mutate<F>(
        &self,
        identity_id: i64,
        action_id: &str,
        apply: F,
    ) -> Result<ProgressionSnapshot, AppError>
    where
        F: Fn(&mut ProgressionState),
    {
        for attempt in 1..=MAX_CONFLICT_RETRIES {
            let stored = self.repository.load(identity_id).await?;

            if self.repository.has_applied(identity_id, action_id).await? {
                debug!(action_id, "Action already applied, ignoring");
                return Ok(stored.state.snapshot());
            }

            let next = self.advance(&stored.state, &apply);

            match self
                .repository
                .save(identity_id, action_id, &next, stored.version)
                .await
            {
                Ok(version) => {
                    info!(
                        version,
                        points = next.points,
                        current_streak = next.current_streak,
                        "Progression updated"
                    );
                    return Ok(next.snapshot());
                }
                Err(AppError::ProgressionConflict(_)) => {
                    warn!(attempt, "Progression changed underneath us, retrying");
                }
                Err(err) => {
                    err.log_and_record("Saving progression");
                    return Err(err);
                }
            }
        }

        let err = conflicts_exhausted(identity_id);
        err.log_and_record("Saving progression");
        Err(err)
    }
}

pub(crate) fn conflicts_exhausted(identity_id: i64) -> AppError {
    AppError::PersistenceFailure(format!(
        "progression for identity {} kept changing after {} attempts",
        identity_id, MAX_CONFLICT_RETRIES
    ))
}
