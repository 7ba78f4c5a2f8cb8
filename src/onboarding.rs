use std::borrow::Cow;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use validator::{Validate, ValidationError};

use crate::auth::{Identity, Role};
use crate::error::AppError;
use crate::models::{ActivityLevel, ExerciseFrequency, Gender, Profile};
use crate::progression::engine::{MAX_CONFLICT_RETRIES, conflicts_exhausted};
use crate::progression::{ONBOARDING_BONUS_ACTION_ID, ProgressionEngine, ProgressionSnapshot};
use crate::repository::{IdentityDirectory, OnboardingRepository};
use crate::validation::{FieldErrors, validate_form, with_error};

pub const TOTAL_STEPS: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Personal,
    Health,
    Nutrition,
    Activity,
    Consent,
}

impl WizardStep {
    pub const ALL: [WizardStep; 5] = [
        WizardStep::Personal,
        WizardStep::Health,
        WizardStep::Nutrition,
        WizardStep::Activity,
        WizardStep::Consent,
    ];

    /// 1-based position in the wizard.
    pub fn number(&self) -> u8 {
        match self {
            WizardStep::Personal => 1,
            WizardStep::Health => 2,
            WizardStep::Nutrition => 3,
            WizardStep::Activity => 4,
            WizardStep::Consent => 5,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            WizardStep::Personal => "Personal Info",
            WizardStep::Health => "Health Info",
            WizardStep::Nutrition => "Nutrition Preferences",
            WizardStep::Activity => "Activity Level",
            WizardStep::Consent => "Parent Consent",
        }
    }

    pub fn next(&self) -> Option<WizardStep> {
        match self {
            WizardStep::Personal => Some(WizardStep::Health),
            WizardStep::Health => Some(WizardStep::Nutrition),
            WizardStep::Nutrition => Some(WizardStep::Activity),
            WizardStep::Activity => Some(WizardStep::Consent),
            WizardStep::Consent => None,
        }
    }

    pub fn previous(&self) -> Option<WizardStep> {
        match self {
            WizardStep::Personal => None,
            WizardStep::Health => Some(WizardStep::Personal),
            WizardStep::Nutrition => Some(WizardStep::Health),
            WizardStep::Activity => Some(WizardStep::Nutrition),
            WizardStep::Consent => Some(WizardStep::Activity),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "step", rename_all = "snake_case")]
pub enum WizardState {
    Step(WizardStep),
    Completed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct PersonalInfo {
    #[validate(
        required(message = "Age is required"),
        range(min = 4, max = 19, message = "Age must be between 4 and 19")
    )]
    pub age: Option<u8>,

    #[validate(required(message = "Gender is required"))]
    pub gender: Option<Gender>,

    #[validate(
        required(message = "Height is required"),
        range(min = 50, max = 250, message = "Height must be between 50 and 250 cm")
    )]
    pub height_cm: Option<u16>,

    #[validate(
        required(message = "Weight is required"),
        range(min = 10, max = 250, message = "Weight must be between 10 and 250 kg")
    )]
    pub weight_kg: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct HealthInfo {
    pub allergies: Vec<String>,
    pub chronic_conditions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct NutritionPreferences {
    pub dietary_restrictions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ActivityInfo {
    #[validate(required(message = "Activity level is required"))]
    pub activity_level: Option<ActivityLevel>,

    #[validate(required(message = "Exercise frequency is required"))]
    pub exercise_frequency: Option<ExerciseFrequency>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ConsentInfo {
    #[validate(email(message = "A valid parent or guardian email is required"))]
    pub parent_contact: String,

    #[validate(custom(function = "require_consent"))]
    pub parent_consent: bool,
}

fn require_consent(consent: &bool) -> Result<(), ValidationError> {
    if *consent {
        Ok(())
    } else {
        Err(ValidationError::new("consent_required")
            .with_message(Cow::from("Parental consent is required to continue")))
    }
}

/// Everything entered so far, one form per step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDraft {
    pub personal: PersonalInfo,
    pub health: HealthInfo,
    pub nutrition: NutritionPreferences,
    pub activity: ActivityInfo,
    pub consent: ConsentInfo,
}

impl ProfileDraft {
    pub fn validate_step(&self, step: WizardStep) -> Result<(), AppError> {
        match step {
            WizardStep::Personal => validate_form(&self.personal),
            WizardStep::Health => validate_form(&self.health),
            WizardStep::Nutrition => validate_form(&self.nutrition),
            WizardStep::Activity => validate_form(&self.activity),
            WizardStep::Consent => validate_form(&self.consent),
        }
    }

    fn step_fields(&self, step: WizardStep) -> Result<serde_json::Value, AppError> {
        let fields = match step {
            WizardStep::Personal => serde_json::to_value(&self.personal)?,
            WizardStep::Health => serde_json::to_value(&self.health)?,
            WizardStep::Nutrition => serde_json::to_value(&self.nutrition)?,
            WizardStep::Activity => serde_json::to_value(&self.activity)?,
            WizardStep::Consent => serde_json::to_value(&self.consent)?,
        };
        Ok(fields)
    }

    /// Validates every step and assembles the final profile.
    pub fn to_profile(&self) -> Result<Profile, AppError> {
        for step in WizardStep::ALL {
            self.validate_step(step)?;
        }

        let missing = |field: &str| AppError::IncompleteStep(with_error(field, "Required"));

        Ok(Profile {
            age: self.personal.age.ok_or_else(|| missing("age"))?,
            gender: self.personal.gender.ok_or_else(|| missing("gender"))?,
            height_cm: self.personal.height_cm.ok_or_else(|| missing("height_cm"))?,
            weight_kg: self.personal.weight_kg.ok_or_else(|| missing("weight_kg"))?,
            allergies: clean_list(&self.health.allergies),
            chronic_conditions: clean_list(&self.health.chronic_conditions),
            dietary_restrictions: clean_list(&self.nutrition.dietary_restrictions),
            activity_level: self
                .activity
                .activity_level
                .ok_or_else(|| missing("activity_level"))?,
            exercise_frequency: self
                .activity
                .exercise_frequency
                .ok_or_else(|| missing("exercise_frequency"))?,
            parent_consent: self.consent.parent_consent,
            parent_contact: self.consent.parent_contact.trim().to_string(),
        })
    }
}

fn clean_list(items: &[String]) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(items.len());
    for item in items.iter().map(|item| item.trim()).filter(|item| !item.is_empty()) {
        if !cleaned.iter().any(|existing| existing == item) {
            cleaned.push(item.to_string());
        }
    }
    cleaned
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardView {
    pub current_step: Option<u8>,
    pub title: Option<&'static str>,
    pub total_steps: u8,
    pub progress_percent: u8,
    pub completed: bool,
    pub fields: serde_json::Value,
    pub can_go_back: bool,
    pub can_go_forward: bool,
    pub validation_errors: FieldErrors,
}

/// Five-step onboarding flow for one identity. `Completed` is terminal.
#[derive(Debug, Clone)]
pub struct OnboardingWizard {
    identity_id: i64,
    state: WizardState,
    draft: ProfileDraft,
    validation_errors: FieldErrors,
}

impl OnboardingWizard {
    /// Opens the wizard at step 1, or straight in `Completed` when the
    /// identity has nothing left to onboard.
    pub fn for_identity(identity: &Identity) -> Self {
        let state = if identity.needs_onboarding() {
            WizardState::Step(WizardStep::Personal)
        } else {
            WizardState::Completed
        };

        Self {
            identity_id: identity.id,
            state,
            draft: ProfileDraft::default(),
            validation_errors: FieldErrors::new(),
        }
    }

    pub fn identity_id(&self) -> i64 {
        self.identity_id
    }

    pub fn state(&self) -> WizardState {
        self.state
    }

    pub fn is_completed(&self) -> bool {
        self.state == WizardState::Completed
    }

    pub fn draft(&self) -> &ProfileDraft {
        &self.draft
    }

    /// Editable draft; `None` once the wizard is completed.
    pub fn draft_mut(&mut self) -> Option<&mut ProfileDraft> {
        match self.state {
            WizardState::Step(_) => Some(&mut self.draft),
            WizardState::Completed => None,
        }
    }

    pub fn can_go_back(&self) -> bool {
        matches!(self.state, WizardState::Step(step) if step.previous().is_some())
    }

    pub fn can_go_forward(&self) -> bool {
        match self.state {
            WizardState::Step(step) => self.draft.validate_step(step).is_ok(),
            WizardState::Completed => false,
        }
    }

    pub fn back(&mut self) -> Result<WizardStep, AppError> {
        let WizardState::Step(step) = self.state else {
            return Err(AppError::InvalidTransition(
                "onboarding is already completed".to_string(),
            ));
        };

        let previous = step.previous().ok_or_else(|| {
            AppError::InvalidTransition("cannot go back from the first step".to_string())
        })?;

        self.state = WizardState::Step(previous);
        self.validation_errors.clear();
        Ok(previous)
    }

    /// Advances one step. From the consent step this runs the completion
    /// action and moves to `Completed` only once it has been committed.
    pub async fn next(&mut self, service: &OnboardingService) -> Result<WizardState, AppError> {
        let WizardState::Step(step) = self.state else {
            return Err(AppError::InvalidTransition(
                "onboarding is already completed".to_string(),
            ));
        };

        if let Err(err) = self.draft.validate_step(step) {
            self.remember_errors(&err);
            return Err(err);
        }

        match step.next() {
            Some(next) => {
                self.state = WizardState::Step(next);
            }
            None => {
                let profile = match self.draft.to_profile() {
                    Ok(profile) => profile,
                    Err(err) => {
                        self.remember_errors(&err);
                        return Err(err);
                    }
                };

                service.complete(self.identity_id, profile).await?;
                self.state = WizardState::Completed;
            }
        }

        self.validation_errors.clear();
        Ok(self.state)
    }

    fn remember_errors(&mut self, err: &AppError) {
        if let Some(fields) = err.field_errors() {
            self.validation_errors = fields.clone();
        }
    }

    pub fn view(&self) -> WizardView {
        match self.state {
            WizardState::Step(step) => WizardView {
                current_step: Some(step.number()),
                title: Some(step.title()),
                total_steps: TOTAL_STEPS,
                progress_percent: step.number() * 100 / TOTAL_STEPS,
                completed: false,
                fields: self
                    .draft
                    .step_fields(step)
                    .unwrap_or(serde_json::Value::Null),
                can_go_back: self.can_go_back(),
                can_go_forward: self.can_go_forward(),
                validation_errors: self.validation_errors.clone(),
            },
            WizardState::Completed => WizardView {
                current_step: None,
                title: None,
                total_steps: TOTAL_STEPS,
                progress_percent: 100,
                completed: true,
                fields: serde_json::Value::Null,
                can_go_back: false,
                can_go_forward: false,
                validation_errors: FieldErrors::new(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Completed(ProgressionSnapshot),
    AlreadyCompleted(ProgressionSnapshot),
}

impl Completion {
    pub fn snapshot(&self) -> &ProgressionSnapshot {
        match self {
            Completion::Completed(snapshot) | Completion::AlreadyCompleted(snapshot) => snapshot,
        }
    }

    pub fn newly_completed(&self) -> bool {
        matches!(self, Completion::Completed(_))
    }
}

/// Runs the one-time onboarding completion action.
pub struct OnboardingService {
    directory: Arc<dyn IdentityDirectory>,
    store: Arc<dyn OnboardingRepository>,
    progression: Arc<ProgressionEngine>,
}

impl OnboardingService {
    pub fn new(
        directory: Arc<dyn IdentityDirectory>,
        store: Arc<dyn OnboardingRepository>,
        progression: Arc<ProgressionEngine>,
    ) -> Self {
        Self {
            directory,
            store,
            progression,
        }
    }

    /// Persists the profile, awards the one-time bonus and sets
    /// `onboarding_complete` in a single transaction, under the identity's
    /// mutation lock. Once the flag is set, further calls change nothing.
    #[instrument(skip(self, profile))]
    pub async fn complete(
        &self,
        identity_id: i64,
        profile: Profile,
    ) -> Result<Completion, AppError> {
        let _guard = self.progression.lock_identity(identity_id).await;

        let identity = self
            .directory
            .find_by_id(identity_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("identity {}", identity_id)))?;

        if identity.onboarding_complete {
            info!("Onboarding already completed, nothing to do");
            let snapshot = self.progression.snapshot(identity_id).await?;
            return Ok(Completion::AlreadyCompleted(snapshot));
        }

        if !identity.onboarding_required {
            return Err(AppError::InvalidTransition(format!(
                "onboarding is not required for role {}",
                identity.role
            )));
        }

        if identity.role == Role::Student && !profile.parent_consent {
            warn!("Completion attempted without parental consent");
            return Err(AppError::IncompleteStep(with_error(
                "parent_consent",
                "Parental consent is required to continue",
            )));
        }

        if self
            .progression
            .has_applied(identity_id, ONBOARDING_BONUS_ACTION_ID)
            .await?
        {
            let err = AppError::Internal(format!(
                "identity {} holds the onboarding bonus without a completed onboarding",
                identity_id
            ));
            err.log_and_record("Completing onboarding");
            return Err(err);
        }

        for attempt in 1..=MAX_CONFLICT_RETRIES {
            let stored = self.progression.load(identity_id).await?;
            let next = self.progression.with_onboarding_bonus(&stored.state);

            match self
                .store
                .complete_onboarding(
                    identity_id,
                    &profile,
                    ONBOARDING_BONUS_ACTION_ID,
                    &next,
                    stored.version,
                )
                .await
            {
                Ok(_) => {
                    info!(points = next.points, "Onboarding completed");
                    return Ok(Completion::Completed(next.snapshot()));
                }
                Err(AppError::ProgressionConflict(_)) => {
                    warn!(attempt, "Progression changed underneath us, retrying");
                }
                Err(err) => {
                    err.log_and_record("Completing onboarding");
                    return Err(err);
                }
            }
        }

        let err = conflicts_exhausted(identity_id);
        err.log_and_record("Completing onboarding");
        Err(err)
    }
}
