use std::sync::Arc;

use tracing::info;

use crate::auth::{AccessDecision, SessionStore};
use crate::db::SqliteStore;
use crate::error::AppError;
use crate::models::Profile;
use crate::onboarding::{OnboardingService, OnboardingWizard, WizardState};
use crate::progression::{
    ProgressionEngine, ProgressionSnapshot, QualifyingAction, StaticBadgeCatalog,
};
use crate::repository::ProfileRepository;

/// The session, onboarding and progression core wired over one store.
pub struct Platform {
    pub store: Arc<SqliteStore>,
    pub sessions: SessionStore,
    pub progression: Arc<ProgressionEngine>,
    pub onboarding: OnboardingService,
}

impl Platform {
    pub fn new(store: SqliteStore) -> Self {
        let store = Arc::new(store);
        let progression = Arc::new(ProgressionEngine::new(
            store.clone(),
            Arc::new(StaticBadgeCatalog),
        ));
        let onboarding = OnboardingService::new(store.clone(), store.clone(), progression.clone());

        info!("Platform core initialised");

        Self {
            sessions: SessionStore::new(store.clone()),
            store,
            progression,
            onboarding,
        }
    }

    pub async fn decide(&self, requested: &str) -> AccessDecision {
        self.sessions.decide(requested).await
    }

    /// Wizard for the signed-in identity, if any.
    pub async fn open_wizard(&self) -> Option<OnboardingWizard> {
        self.sessions
            .current_identity()
            .await
            .map(|identity| OnboardingWizard::for_identity(&identity))
    }

    /// Advances the wizard and, once it completes, refreshes the session so
    /// the gate sees the finished onboarding.
    pub async fn advance_wizard(
        &self,
        wizard: &mut OnboardingWizard,
    ) -> Result<WizardState, AppError> {
        let state = wizard.next(&self.onboarding).await?;
        if state == WizardState::Completed {
            self.sessions.refresh().await?;
        }
        Ok(state)
    }

    /// Applies an action on behalf of the signed-in identity.
    pub async fn record_action(
        &self,
        action: &QualifyingAction,
    ) -> Result<ProgressionSnapshot, AppError> {
        let identity = self
            .sessions
            .current_identity()
            .await
            .ok_or(AppError::Unauthenticated)?;

        self.progression
            .apply_qualifying_action(&identity, action)
            .await
    }

    /// Saved onboarding profile of the signed-in identity.
    pub async fn current_profile(&self) -> Result<Option<Profile>, AppError> {
        let identity = self
            .sessions
            .current_identity()
            .await
            .ok_or(AppError::Unauthenticated)?;

        self.store.find(identity.id).await
    }
}
