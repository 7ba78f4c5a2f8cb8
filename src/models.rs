use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Low,
    Moderate,
    Active,
    VeryActive,
}

impl ActivityLevel {
    pub fn label(&self) -> &'static str {
        match self {
            ActivityLevel::Low => "Low (mostly sitting)",
            ActivityLevel::Moderate => "Moderate (some walking)",
            ActivityLevel::Active => "Active (regular movement)",
            ActivityLevel::VeryActive => "Very Active (lots of sports)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseFrequency {
    Never,
    OneToTwoWeekly,
    ThreeToFourWeekly,
    FivePlusWeekly,
}

impl ExerciseFrequency {
    pub fn label(&self) -> &'static str {
        match self {
            ExerciseFrequency::Never => "Never",
            ExerciseFrequency::OneToTwoWeekly => "1-2 times per week",
            ExerciseFrequency::ThreeToFourWeekly => "3-4 times per week",
            ExerciseFrequency::FivePlusWeekly => "5+ times per week",
        }
    }
}

/// Demographic, health and dietary profile collected by onboarding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub age: u8,
    pub gender: Gender,
    pub height_cm: u16,
    pub weight_kg: u16,
    pub allergies: Vec<String>,
    pub chronic_conditions: Vec<String>,
    pub dietary_restrictions: Vec<String>,
    pub activity_level: ActivityLevel,
    pub exercise_frequency: ExerciseFrequency,
    pub parent_consent: bool,
    pub parent_contact: String,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbProfile {
    pub identity_id: Option<i64>,
    pub data: Option<String>,
    pub updated_at: Option<NaiveDateTime>,
}

impl TryFrom<DbProfile> for Profile {
    type Error = AppError;

    fn try_from(row: DbProfile) -> Result<Self, Self::Error> {
        let data = row.data.ok_or_else(|| {
            AppError::Internal(format!(
                "Profile for identity {} has no data",
                row.identity_id.unwrap_or_default()
            ))
        })?;

        Ok(serde_json::from_str(&data)?)
    }
}
