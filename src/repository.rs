//! Storage contracts the platform core depends on. `db::SqliteStore`
//! implements all of them.

use async_trait::async_trait;

use crate::auth::Identity;
use crate::error::AppError;
use crate::models::Profile;
use crate::progression::{Badge, ProgressionState, StoredProgression};

#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn find_by_credentials(
        &self,
        email: &str,
        secret: &str,
    ) -> Result<Option<Identity>, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Identity>, AppError>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find(&self, identity_id: i64) -> Result<Option<Profile>, AppError>;
}

#[async_trait]
pub trait ProgressionRepository: Send + Sync {
    /// Identities with nothing stored yet load as an empty state at version 0.
    async fn load(&self, identity_id: i64) -> Result<StoredProgression, AppError>;

    async fn has_applied(&self, identity_id: i64, action_id: &str) -> Result<bool, AppError>;

    /// Records `action_id` as applied and writes `state` as one unit.
    /// Compare-and-swap: succeeds only while the stored version still equals
    /// `expected_version`, returning the new version. A version mismatch, or
    /// an action id recorded in the meantime, is
    /// `AppError::ProgressionConflict` and nothing is written.
    async fn save(
        &self,
        identity_id: i64,
        action_id: &str,
        state: &ProgressionState,
        expected_version: i64,
    ) -> Result<i64, AppError>;
}

#[async_trait]
pub trait OnboardingRepository: Send + Sync {
    /// Commits the profile, the bonus progression write (same contract as
    /// `ProgressionRepository::save`) and the `onboarding_complete` flag in
    /// one transaction. Any failure leaves all three untouched. A flag that
    /// is already set is `AppError::InvalidTransition`.
    async fn complete_onboarding(
        &self,
        identity_id: i64,
        profile: &Profile,
        action_id: &str,
        state: &ProgressionState,
        expected_version: i64,
    ) -> Result<i64, AppError>;
}

pub trait BadgeCatalog: Send + Sync {
    fn all(&self) -> &[Badge];
}
