use async_trait::async_trait;
use sqlx::{Executor, Pool, Sqlite, SqliteConnection};
use tracing::{info, instrument, warn};

use crate::{
    auth::{DbIdentity, Identity, NewIdentity, normalize_email},
    error::AppError,
    models::{DbProfile, Profile},
    progression::{DbProgression, ProgressionState, StoredProgression},
    repository::{
        IdentityDirectory, OnboardingRepository, ProfileRepository, ProgressionRepository,
    },
};

const IDENTITY_COLUMNS: &str = "id, email, display_name, role, school_id, class_id, \
                                onboarding_required, onboarding_complete";

#[instrument]
pub async fn get_identity(pool: &Pool<Sqlite>, id: i64) -> Result<Option<Identity>, AppError> {
    info!("Fetching identity by ID");
    let row = sqlx::query_as::<_, DbIdentity>(&format!(
        "SELECT {} FROM identities WHERE id = ?",
        IDENTITY_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(Identity::try_from).transpose()
}

#[instrument]
pub async fn find_identity_by_email(
    pool: &Pool<Sqlite>,
    email: &str,
) -> Result<Option<Identity>, AppError> {
    info!("Fetching identity by email");
    let row = sqlx::query_as::<_, DbIdentity>(&format!(
        "SELECT {} FROM identities WHERE email = ?",
        IDENTITY_COLUMNS
    ))
    .bind(normalize_email(email))
    .fetch_optional(pool)
    .await?;

    row.map(Identity::try_from).transpose()
}

#[instrument(skip_all, fields(email))]
pub async fn authenticate_identity(
    pool: &Pool<Sqlite>,
    email: &str,
    secret: &str,
) -> Result<Option<Identity>, AppError> {
    info!("Authenticating identity");
    let credentials = sqlx::query_as::<_, (i64, String)>(
        "SELECT id, secret_hash FROM identities WHERE email = ?",
    )
    .bind(normalize_email(email))
    .fetch_optional(pool)
    .await?;

    let Some((id, secret_hash)) = credentials else {
        return Ok(None);
    };

    // Verify the secret using bcrypt
    match bcrypt::verify(secret, &secret_hash) {
        Ok(true) => get_identity(pool, id).await,
        Ok(false) => Ok(None),
        Err(e) => {
            warn!(identity_id = id, error = %e, "Stored secret hash is unreadable");
            Ok(None)
        }
    }
}

#[instrument(skip_all, fields(email = %identity.email, role = %identity.role))]
pub async fn create_identity(
    pool: &Pool<Sqlite>,
    identity: &NewIdentity,
    hash_cost: u32,
) -> Result<i64, AppError> {
    info!("Provisioning new identity");

    let email = normalize_email(&identity.email);
    if email.is_empty() {
        return Err(AppError::Validation("Email must not be empty".to_string()));
    }

    let existing = sqlx::query_as::<_, (i64,)>("SELECT id FROM identities WHERE email = ?")
        .bind(&email)
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Err(AppError::Validation(format!(
            "Email '{}' is already registered",
            email
        )));
    }

    let secret_hash = bcrypt::hash(&identity.secret, hash_cost)?;

    let res = sqlx::query(
        "INSERT INTO identities
         (email, secret_hash, role, display_name, school_id, class_id, onboarding_required)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&email)
    .bind(secret_hash)
    .bind(identity.role.as_str())
    .bind(&identity.display_name)
    .bind(&identity.school_id)
    .bind(&identity.class_id)
    .bind(identity.role.requires_onboarding())
    .execute(pool)
    .await
    .map_err(AppError::persistence)?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(executor))]
pub async fn set_onboarding_complete<'e, E>(executor: E, id: i64) -> Result<bool, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    info!("Marking onboarding complete");
    let res = sqlx::query(
        "UPDATE identities SET onboarding_complete = TRUE
         WHERE id = ? AND onboarding_complete = FALSE",
    )
    .bind(id)
    .execute(executor)
    .await
    .map_err(AppError::persistence)?;

    Ok(res.rows_affected() == 1)
}

#[instrument(skip(executor, profile))]
pub async fn save_profile<'e, E>(
    executor: E,
    identity_id: i64,
    profile: &Profile,
) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    info!("Saving profile");
    let data = serde_json::to_string(profile)?;

    sqlx::query(
        "INSERT INTO profiles (identity_id, data, parent_consent) VALUES (?, ?, ?)
         ON CONFLICT (identity_id) DO UPDATE
         SET data = excluded.data,
             parent_consent = excluded.parent_consent,
             updated_at = CURRENT_TIMESTAMP",
    )
    .bind(identity_id)
    .bind(data)
    .bind(profile.parent_consent)
    .execute(executor)
    .await
    .map_err(AppError::persistence)?;

    Ok(())
}

#[instrument]
pub async fn get_profile(
    pool: &Pool<Sqlite>,
    identity_id: i64,
) -> Result<Option<Profile>, AppError> {
    info!("Fetching profile");
    let row = sqlx::query_as::<_, DbProfile>(
        "SELECT identity_id, data, updated_at FROM profiles WHERE identity_id = ?",
    )
    .bind(identity_id)
    .fetch_optional(pool)
    .await?;

    row.map(Profile::try_from).transpose()
}

#[instrument]
pub async fn load_progression(
    pool: &Pool<Sqlite>,
    identity_id: i64,
) -> Result<StoredProgression, AppError> {
    let row = sqlx::query_as::<_, DbProgression>(
        "SELECT identity_id, version, state, updated_at FROM progression WHERE identity_id = ?",
    )
    .bind(identity_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => StoredProgression::try_from(row),
        _ => Ok(StoredProgression::default()),
    }
}

/// Bare compare-and-swap write of the progression row. Callers that apply an
/// action go through `commit_progression` so the action id is recorded too.
#[instrument(skip(executor, state))]
pub async fn save_progression<'e, E>(
    executor: E,
    identity_id: i64,
    state: &ProgressionState,
    expected_version: i64,
) -> Result<i64, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let data = serde_json::to_string(state)?;
    let next_version = expected_version + 1;

    let res = if expected_version == 0 {
        sqlx::query(
            "INSERT INTO progression
             (identity_id, version, points, current_streak, longest_streak, state)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (identity_id) DO NOTHING",
        )
        .bind(identity_id)
        .bind(next_version)
        .bind(i64::from(state.points))
        .bind(i64::from(state.current_streak))
        .bind(i64::from(state.longest_streak))
        .bind(data)
        .execute(executor)
        .await
    } else {
        sqlx::query(
            "UPDATE progression
             SET version = ?, points = ?, current_streak = ?, longest_streak = ?, state = ?,
                 updated_at = CURRENT_TIMESTAMP
             WHERE identity_id = ? AND version = ?",
        )
        .bind(next_version)
        .bind(i64::from(state.points))
        .bind(i64::from(state.current_streak))
        .bind(i64::from(state.longest_streak))
        .bind(data)
        .bind(identity_id)
        .bind(expected_version)
        .execute(executor)
        .await
    }
    .map_err(AppError::persistence)?;

    if res.rows_affected() == 0 {
        return Err(AppError::ProgressionConflict(identity_id));
    }

    Ok(next_version)
}

#[instrument(skip(executor))]
pub async fn is_action_applied<'e, E>(
    executor: E,
    identity_id: i64,
    action_id: &str,
) -> Result<bool, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, (i64,)>(
        "SELECT 1 FROM applied_actions WHERE identity_id = ? AND action_id = ?",
    )
    .bind(identity_id)
    .bind(action_id)
    .fetch_optional(executor)
    .await?;

    Ok(row.is_some())
}

/// Returns false when the action id was already recorded.
#[instrument(skip(executor))]
pub async fn record_applied_action<'e, E>(
    executor: E,
    identity_id: i64,
    action_id: &str,
) -> Result<bool, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let res = sqlx::query(
        "INSERT INTO applied_actions (identity_id, action_id) VALUES (?, ?)
         ON CONFLICT (identity_id, action_id) DO NOTHING",
    )
    .bind(identity_id)
    .bind(action_id)
    .execute(executor)
    .await
    .map_err(AppError::persistence)?;

    Ok(res.rows_affected() == 1)
}

async fn apply_progression_write(
    conn: &mut SqliteConnection,
    identity_id: i64,
    action_id: &str,
    state: &ProgressionState,
    expected_version: i64,
) -> Result<i64, AppError> {
    if !record_applied_action(&mut *conn, identity_id, action_id).await? {
        return Err(AppError::ProgressionConflict(identity_id));
    }

    save_progression(&mut *conn, identity_id, state, expected_version).await
}

/// Records the action and writes the progression row in one transaction.
#[instrument(skip(pool, state))]
pub async fn commit_progression(
    pool: &Pool<Sqlite>,
    identity_id: i64,
    action_id: &str,
    state: &ProgressionState,
    expected_version: i64,
) -> Result<i64, AppError> {
    let mut tx = pool.begin().await.map_err(AppError::persistence)?;

    let version =
        apply_progression_write(&mut tx, identity_id, action_id, state, expected_version).await?;

    tx.commit().await.map_err(AppError::persistence)?;
    Ok(version)
}

/// Profile upsert, bonus progression write and onboarding flag, committed
/// together or not at all.
#[instrument(skip(pool, profile, state))]
pub async fn commit_onboarding(
    pool: &Pool<Sqlite>,
    identity_id: i64,
    profile: &Profile,
    action_id: &str,
    state: &ProgressionState,
    expected_version: i64,
) -> Result<i64, AppError> {
    let mut tx = pool.begin().await.map_err(AppError::persistence)?;

    save_profile(&mut *tx, identity_id, profile).await?;
    let version =
        apply_progression_write(&mut tx, identity_id, action_id, state, expected_version).await?;

    if !set_onboarding_complete(&mut *tx, identity_id).await? {
        return Err(AppError::InvalidTransition(
            "onboarding is already completed".to_string(),
        ));
    }

    tx.commit().await.map_err(AppError::persistence)?;
    info!(version, "Onboarding committed");
    Ok(version)
}

/// SQLite-backed directory, profile and progression storage.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    hash_cost: u32,
}

impl SqliteStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self {
            pool,
            hash_cost: bcrypt::DEFAULT_COST,
        }
    }

    pub fn with_hash_cost(mut self, hash_cost: u32) -> Self {
        self.hash_cost = hash_cost;
        self
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn provision(&self, identity: &NewIdentity) -> Result<i64, AppError> {
        create_identity(&self.pool, identity, self.hash_cost).await
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, AppError> {
        find_identity_by_email(&self.pool, email).await
    }
}

#[async_trait]
impl IdentityDirectory for SqliteStore {
    async fn find_by_credentials(
        &self,
        email: &str,
        secret: &str,
    ) -> Result<Option<Identity>, AppError> {
        authenticate_identity(&self.pool, email, secret).await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Identity>, AppError> {
        get_identity(&self.pool, id).await
    }
}

#[async_trait]
impl ProfileRepository for SqliteStore {
    async fn find(&self, identity_id: i64) -> Result<Option<Profile>, AppError> {
        get_profile(&self.pool, identity_id).await
    }
}

#[async_trait]
impl ProgressionRepository for SqliteStore {
    async fn load(&self, identity_id: i64) -> Result<StoredProgression, AppError> {
        load_progression(&self.pool, identity_id).await
    }

    async fn has_applied(&self, identity_id: i64, action_id: &str) -> Result<bool, AppError> {
        is_action_applied(&self.pool, identity_id, action_id).await
    }

    async fn save(
        &self,
        identity_id: i64,
        action_id: &str,
        state: &ProgressionState,
        expected_version: i64,
    ) -> Result<i64, AppError> {
        commit_progression(&self.pool, identity_id, action_id, state, expected_version).await
    }
}

#[async_trait]
impl OnboardingRepository for SqliteStore {
    async fn complete_onboarding(
        &self,
        identity_id: i64,
        profile: &Profile,
        action_id: &str,
        state: &ProgressionState,
        expected_version: i64,
    ) -> Result<i64, AppError> {
        commit_onboarding(
            &self.pool,
            identity_id,
            profile,
            action_id,
            state,
            expected_version,
        )
        .await
    }
}
