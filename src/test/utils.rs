#[cfg(test)]
pub mod test_db {
    use crate::auth::{NewIdentity, Role};
    use crate::database::apply_schema;
    use crate::db::SqliteStore;
    use crate::error::AppError;
    use crate::models::{ActivityLevel, ExerciseFrequency, Gender, Profile};
    use crate::onboarding::ProfileDraft;
    use crate::platform::Platform;
    use crate::progression::{ProgressionState, StoredProgression};
    use crate::repository::ProgressionRepository;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use sqlx::{Pool, Sqlite, sqlite::SqlitePoolOptions};
    use std::collections::HashMap;
    use std::sync::Once;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing::log::LevelFilter;

    static INIT: Once = Once::new();
    pub static STANDARD_SECRET: &str = "password123";
    const TEST_HASH_COST: u32 = 4;

    pub fn init_logging() {
        INIT.call_once(|| {
            let _ = env_logger::builder()
                .filter_level(LevelFilter::Debug)
                .is_test(true)
                .try_init();
        });
    }

    pub async fn memory_pool() -> Result<Pool<Sqlite>, AppError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        apply_schema(&pool).await?;
        Ok(pool)
    }

    pub fn day(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, month, day).expect("valid test date")
    }

    pub fn sample_profile() -> Profile {
        Profile {
            age: 11,
            gender: Gender::Female,
            height_cm: 145,
            weight_kg: 38,
            allergies: vec!["Peanuts".to_string()],
            chronic_conditions: Vec::new(),
            dietary_restrictions: vec!["Vegetarian".to_string()],
            activity_level: ActivityLevel::Moderate,
            exercise_frequency: ExerciseFrequency::OneToTwoWeekly,
            parent_consent: true,
            parent_contact: "guardian@example.com".to_string(),
        }
    }

    /// Fills every step of a draft with valid answers.
    pub fn fill_draft(draft: &mut ProfileDraft) {
        draft.personal.age = Some(11);
        draft.personal.gender = Some(Gender::Female);
        draft.personal.height_cm = Some(145);
        draft.personal.weight_kg = Some(38);
        draft.health.allergies = vec!["Peanuts".to_string()];
        draft.nutrition.dietary_restrictions = vec!["Vegetarian".to_string()];
        draft.activity.activity_level = Some(ActivityLevel::Moderate);
        draft.activity.exercise_frequency = Some(ExerciseFrequency::OneToTwoWeekly);
        draft.consent.parent_contact = "guardian@example.com".to_string();
        draft.consent.parent_consent = true;
    }

    pub struct TestIdentity {
        pub email: String,
        pub display_name: String,
        pub role: Role,
        pub secret: String,
        pub onboarded: bool,
    }

    #[derive(Default)]
    pub struct TestDbBuilder {
        identities: Vec<TestIdentity>,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        fn push(mut self, email: &str, role: Role, onboarded: bool) -> Self {
            self.identities.push(TestIdentity {
                email: email.to_string(),
                display_name: email.split('@').next().unwrap_or(email).to_string(),
                role,
                secret: STANDARD_SECRET.to_string(),
                onboarded,
            });
            self
        }

        pub fn admin(self, email: &str) -> Self {
            self.push(email, Role::Admin, false)
        }

        pub fn school(self, email: &str) -> Self {
            self.push(email, Role::School, false)
        }

        pub fn teacher(self, email: &str) -> Self {
            self.push(email, Role::Teacher, false)
        }

        pub fn parent(self, email: &str) -> Self {
            self.push(email, Role::Parent, false)
        }

        /// A student who still has to go through onboarding.
        pub fn student(self, email: &str) -> Self {
            self.push(email, Role::Student, false)
        }

        pub fn onboarded_student(self, email: &str) -> Self {
            self.push(email, Role::Student, true)
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            init_logging();

            let pool = memory_pool().await?;
            let store = SqliteStore::new(pool.clone()).with_hash_cost(TEST_HASH_COST);
            let platform = Platform::new(store);

            let mut identity_id_map: HashMap<String, i64> = HashMap::new();

            for identity in &self.identities {
                let id = platform
                    .store
                    .provision(&NewIdentity::new(
                        &identity.email,
                        &identity.secret,
                        identity.role,
                        &identity.display_name,
                    ))
                    .await?;

                if identity.onboarded {
                    platform.onboarding.complete(id, sample_profile()).await?;
                }

                identity_id_map.insert(identity.email.clone(), id);
            }

            Ok(TestDb {
                pool,
                platform,
                identity_id_map,
            })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub platform: Platform,
        pub identity_id_map: HashMap<String, i64>,
    }

    impl TestDb {
        pub fn identity_id(&self, email: &str) -> Option<i64> {
            self.identity_id_map.get(email).copied()
        }

        pub async fn login(&self, email: &str) -> Result<(), AppError> {
            self.platform
                .sessions
                .authenticate(email, STANDARD_SECRET)
                .await
                .map(|_| ())
        }
    }

    /// Reports a conflict on the first `conflicts` saves, then delegates.
    pub struct FlakyProgression {
        pub inner: SqliteStore,
        pub conflicts: usize,
        pub attempts: AtomicUsize,
    }

    impl FlakyProgression {
        pub fn new(inner: SqliteStore, conflicts: usize) -> Self {
            Self {
                inner,
                conflicts,
                attempts: AtomicUsize::new(0),
            }
        }

        pub fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProgressionRepository for FlakyProgression {
        async fn load(&self, identity_id: i64) -> Result<StoredProgression, AppError> {
            ProgressionRepository::load(&self.inner, identity_id).await
        }

        async fn has_applied(&self, identity_id: i64, action_id: &str) -> Result<bool, AppError> {
            self.inner.has_applied(identity_id, action_id).await
        }

        async fn save(
            &self,
            identity_id: i64,
            action_id: &str,
            state: &ProgressionState,
            expected_version: i64,
        ) -> Result<i64, AppError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.conflicts {
                return Err(AppError::ProgressionConflict(identity_id));
            }
            ProgressionRepository::save(
                &self.inner,
                identity_id,
                action_id,
                state,
                expected_version,
            )
            .await
        }
    }

    /// Every save fails as if the storage backend were down.
    pub struct BrokenProgression {
        pub inner: SqliteStore,
    }

    #[async_trait]
    impl ProgressionRepository for BrokenProgression {
        async fn load(&self, identity_id: i64) -> Result<StoredProgression, AppError> {
            ProgressionRepository::load(&self.inner, identity_id).await
        }

        async fn has_applied(&self, identity_id: i64, action_id: &str) -> Result<bool, AppError> {
            self.inner.has_applied(identity_id, action_id).await
        }

        async fn save(
            &self,
            _identity_id: i64,
            _action_id: &str,
            _state: &ProgressionState,
            _expected_version: i64,
        ) -> Result<i64, AppError> {
            Err(AppError::PersistenceFailure("disk unavailable".to_string()))
        }
    }
}
