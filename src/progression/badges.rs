use std::collections::{BTreeSet, HashMap};

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::repository::BadgeCatalog;

use super::ProgressionState;

pub const FIRST_PROFILE_BADGE: &str = "first-profile";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeCategory {
    Streak,
    Achievement,
    Milestone,
}

/// Eligibility predicate of a badge over the progression state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", content = "threshold", rename_all = "snake_case")]
pub enum BadgeRule {
    /// Never earned through progress; handed out by a specific event.
    Granted,
    StreakAtLeast(u32),
    LunchesCompleted(u32),
    VegetarianChoices(u32),
    ArticlesRead(u32),
    QuizzesCompleted(u32),
}

impl BadgeRule {
    pub fn is_met(&self, state: &ProgressionState) -> bool {
        match *self {
            BadgeRule::Granted => false,
            BadgeRule::StreakAtLeast(days) => state.current_streak >= days,
            BadgeRule::LunchesCompleted(count) => state.lunches_completed >= count,
            BadgeRule::VegetarianChoices(count) => state.vegetarian_choices >= count,
            BadgeRule::ArticlesRead(count) => state.articles_read >= count,
            BadgeRule::QuizzesCompleted(count) => state.quizzes_completed >= count,
        }
    }

    pub fn is_earnable(&self) -> bool {
        !matches!(self, BadgeRule::Granted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: BadgeCategory,
    pub rule: BadgeRule,
}

pub static BADGES: [Badge; 9] = [
    Badge {
        id: FIRST_PROFILE_BADGE,
        name: "Profile Pioneer",
        description: "Completed your nutrition profile",
        category: BadgeCategory::Milestone,
        rule: BadgeRule::Granted,
    },
    Badge {
        id: "lunch-streak-5",
        name: "Lunch Streak 5",
        description: "Completed lunch plan for 5 consecutive days",
        category: BadgeCategory::Streak,
        rule: BadgeRule::StreakAtLeast(5),
    },
    Badge {
        id: "lunch-streak-7",
        name: "Weekly Champion",
        description: "Completed lunch plan for 7 consecutive days",
        category: BadgeCategory::Streak,
        rule: BadgeRule::StreakAtLeast(7),
    },
    Badge {
        id: "lunch-streak-10",
        name: "Nutrition Master",
        description: "Completed lunch plan for 10 consecutive days",
        category: BadgeCategory::Streak,
        rule: BadgeRule::StreakAtLeast(10),
    },
    Badge {
        id: "healthy-eater",
        name: "Healthy Eater",
        description: "Completed 50 lunch plans",
        category: BadgeCategory::Achievement,
        rule: BadgeRule::LunchesCompleted(50),
    },
    Badge {
        id: "quiz-master",
        name: "Quiz Master",
        description: "Completed 10 nutrition quizzes",
        category: BadgeCategory::Achievement,
        rule: BadgeRule::QuizzesCompleted(10),
    },
    Badge {
        id: "veggie-lover",
        name: "Veggie Lover",
        description: "Chose vegetarian options 20 times",
        category: BadgeCategory::Achievement,
        rule: BadgeRule::VegetarianChoices(20),
    },
    Badge {
        id: "content-explorer",
        name: "Content Explorer",
        description: "Read 15 nutrition articles",
        category: BadgeCategory::Achievement,
        rule: BadgeRule::ArticlesRead(15),
    },
    Badge {
        id: "streak-champion",
        name: "Streak Champion",
        description: "Achieved a 20-day lunch streak",
        category: BadgeCategory::Milestone,
        rule: BadgeRule::StreakAtLeast(20),
    },
];

static BADGE_INDEX: Lazy<HashMap<&'static str, &'static Badge>> =
    Lazy::new(|| BADGES.iter().map(|badge| (badge.id, badge)).collect());

pub fn find_badge(id: &str) -> Option<&'static Badge> {
    BADGE_INDEX.get(id).copied()
}

/// The fixed catalog shipped with the platform.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticBadgeCatalog;

impl BadgeCatalog for StaticBadgeCatalog {
    fn all(&self) -> &[Badge] {
        &BADGES
    }
}

/// Badges whose predicate holds for `state` but which are not yet earned.
/// Pure, so the same state always yields the same set.
pub fn newly_eligible(state: &ProgressionState, catalog: &dyn BadgeCatalog) -> BTreeSet<String> {
    catalog
        .all()
        .iter()
        .filter(|badge| !state.badges_earned.contains(badge.id))
        .filter(|badge| badge.rule.is_met(state))
        .map(|badge| badge.id.to_string())
        .collect()
}
