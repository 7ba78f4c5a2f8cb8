use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::repository::BadgeCatalog;

use super::Badge;

pub const ATTENDANCE_COMPLETED_POINTS: u32 = 10;
pub const ATTENDANCE_PARTIAL_POINTS: u32 = 5;
pub const ONBOARDING_BONUS_POINTS: u32 = 50;

/// Action-instance id under which the onboarding bonus is recorded.
pub const ONBOARDING_BONUS_ACTION_ID: &str = "system:onboarding-bonus";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Article,
    Video,
    Quiz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionKind {
    AttendanceCompleted { vegetarian: bool },
    AttendancePartial,
    ContentCompleted { content: ContentKind, points: u32 },
}

impl ActionKind {
    pub fn points(&self) -> u32 {
        match self {
            ActionKind::AttendanceCompleted { .. } => ATTENDANCE_COMPLETED_POINTS,
            ActionKind::AttendancePartial => ATTENDANCE_PARTIAL_POINTS,
            ActionKind::ContentCompleted { points, .. } => *points,
        }
    }
}

/// One qualifying event. `id` identifies the action instance and is what
/// deduplication keys on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualifyingAction {
    pub id: String,
    pub kind: ActionKind,
    pub date: NaiveDate,
}

impl QualifyingAction {
    pub fn lunch_completed(id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            kind: ActionKind::AttendanceCompleted { vegetarian: false },
            date,
        }
    }

    pub fn vegetarian_lunch_completed(id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            kind: ActionKind::AttendanceCompleted { vegetarian: true },
            date,
        }
    }

    pub fn lunch_partial(id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            kind: ActionKind::AttendancePartial,
            date,
        }
    }

    pub fn content_completed(
        id: impl Into<String>,
        date: NaiveDate,
        content: ContentKind,
        points: u32,
    ) -> Self {
        Self {
            id: id.into(),
            kind: ActionKind::ContentCompleted { content, points },
            date,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionState {
    pub points: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub badges_earned: BTreeSet<String>,
    pub last_qualifying_date: Option<NaiveDate>,

    pub lunches_completed: u32,
    pub vegetarian_choices: u32,
    pub articles_read: u32,
    pub videos_watched: u32,
    pub quizzes_completed: u32,
}

impl ProgressionState {
    /// Points and the counters behind achievement badges. Streak handling
    /// lives in `advance_streak`.
    pub fn record(&mut self, kind: &ActionKind) {
        self.points = self.points.saturating_add(kind.points());

        match kind {
            ActionKind::AttendanceCompleted { vegetarian } => {
                self.lunches_completed += 1;
                if *vegetarian {
                    self.vegetarian_choices += 1;
                }
            }
            ActionKind::AttendancePartial => {}
            ActionKind::ContentCompleted { content, .. } => match content {
                ContentKind::Article => self.articles_read += 1,
                ContentKind::Video => self.videos_watched += 1,
                ContentKind::Quiz => self.quizzes_completed += 1,
            },
        }
    }

    pub fn snapshot(&self) -> ProgressionSnapshot {
        ProgressionSnapshot {
            points: self.points,
            current_streak: self.current_streak,
            longest_streak: self.longest_streak,
            badges_earned: self.badges_earned.clone(),
            last_qualifying_date: self.last_qualifying_date,
        }
    }
}

/// A state as loaded from storage, with the version it must still carry for
/// a save to succeed. Version 0 means nothing has been stored yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredProgression {
    pub state: ProgressionState,
    pub version: i64,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbProgression {
    pub identity_id: Option<i64>,
    pub version: Option<i64>,
    pub state: Option<String>,
    pub updated_at: Option<NaiveDateTime>,
}

impl TryFrom<DbProgression> for StoredProgression {
    type Error = AppError;

    fn try_from(row: DbProgression) -> Result<Self, Self::Error> {
        let state = match row.state {
            Some(state) => serde_json::from_str(&state)?,
            None => ProgressionState::default(),
        };

        Ok(Self {
            state,
            version: row.version.unwrap_or_default(),
        })
    }
}

/// Read-only view handed to badge galleries, streak counters and
/// leaderboards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionSnapshot {
    pub points: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub badges_earned: BTreeSet<String>,
    pub last_qualifying_date: Option<NaiveDate>,
}

impl ProgressionSnapshot {
    pub fn has_badge(&self, badge_id: &str) -> bool {
        self.badges_earned.contains(badge_id)
    }

    /// Streak length the counter is working towards: 7, 14, 30, then every
    /// further 10 days.
    pub fn next_streak_milestone(&self) -> u32 {
        match self.current_streak {
            0..=6 => 7,
            7..=13 => 14,
            14..=29 => 30,
            streak => streak + 10,
        }
    }

    /// First catalog badge still to be earned through progress.
    pub fn next_badge<'a>(&self, catalog: &'a dyn BadgeCatalog) -> Option<&'a Badge> {
        catalog
            .all()
            .iter()
            .find(|badge| badge.rule.is_earnable() && !self.badges_earned.contains(badge.id))
    }
}
