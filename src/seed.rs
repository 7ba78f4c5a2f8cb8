use tracing::{info, instrument};

use crate::auth::{NewIdentity, Role};
use crate::error::AppError;
use crate::models::{ActivityLevel, ExerciseFrequency, Gender, Profile};
use crate::platform::Platform;

const GREENWOOD: &str = "school-1";

fn demo_identities() -> Vec<(NewIdentity, Option<Profile>)> {
    vec![
        (
            NewIdentity::new(
                "admin@nutriplatform.com",
                "admin123",
                Role::Admin,
                "System Administrator",
            ),
            None,
        ),
        (
            NewIdentity::new(
                "principal@greenwood.edu",
                "school123",
                Role::School,
                "Greenwood Elementary",
            )
            .in_school(GREENWOOD),
            None,
        ),
        (
            NewIdentity::new(
                "sarah.johnson@greenwood.edu",
                "teacher123",
                Role::Teacher,
                "Sarah Johnson",
            )
            .in_school(GREENWOOD)
            .in_class("class-5a"),
            None,
        ),
        (
            NewIdentity::new(
                "mike.davis@greenwood.edu",
                "teacher456",
                Role::Teacher,
                "Mike Davis",
            )
            .in_school(GREENWOOD)
            .in_class("class-6b"),
            None,
        ),
        (
            NewIdentity::new(
                "john.doe@student.greenwood.edu",
                "student123",
                Role::Student,
                "John Doe",
            )
            .in_school(GREENWOOD)
            .in_class("class-5a"),
            Some(Profile {
                age: 10,
                gender: Gender::Male,
                height_cm: 140,
                weight_kg: 34,
                allergies: vec!["Nuts".to_string()],
                chronic_conditions: Vec::new(),
                dietary_restrictions: Vec::new(),
                activity_level: ActivityLevel::Active,
                exercise_frequency: ExerciseFrequency::ThreeToFourWeekly,
                parent_consent: true,
                parent_contact: "mary.doe@parent.greenwood.edu".to_string(),
            }),
        ),
        (
            NewIdentity::new(
                "emma.wilson@student.greenwood.edu",
                "student456",
                Role::Student,
                "Emma Wilson",
            )
            .in_school(GREENWOOD)
            .in_class("class-5a"),
            None,
        ),
        (
            NewIdentity::new(
                "mary.doe@parent.greenwood.edu",
                "parent123",
                Role::Parent,
                "Mary Doe",
            )
            .in_school(GREENWOOD),
            None,
        ),
    ]
}

/// Provisions the demo cast, skipping anyone already registered. Students
/// seeded with a profile go through the real onboarding completion, so they
/// end up with the bonus and badge like anyone else.
#[instrument(skip(platform))]
pub async fn provision_demo_directory(platform: &Platform) -> Result<Vec<i64>, AppError> {
    let mut provisioned = Vec::new();

    for (identity, profile) in demo_identities() {
        if platform.store.find_by_email(&identity.email).await?.is_some() {
            info!(email = %identity.email, "Demo identity already present, skipping");
            continue;
        }

        let id = platform.store.provision(&identity).await?;

        if let Some(profile) = profile {
            platform.onboarding.complete(id, profile).await?;
        }

        provisioned.push(id);
    }

    info!(count = provisioned.len(), "Demo directory provisioned");
    Ok(provisioned)
}
