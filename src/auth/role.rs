use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

use super::AppRoute;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    School,
    Teacher,
    Parent,
    Student,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::School,
        Role::Teacher,
        Role::Parent,
        Role::Student,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::School => "school",
            Role::Teacher => "teacher",
            Role::Parent => "parent",
            Role::Student => "student",
        }
    }

    /// Only students go through the onboarding wizard before first use.
    pub fn requires_onboarding(&self) -> bool {
        matches!(self, Role::Student)
    }

    pub fn default_route(&self) -> AppRoute {
        match self {
            Role::Admin => AppRoute::AdminDashboard,
            Role::School => AppRoute::SchoolDashboard,
            Role::Teacher => AppRoute::TeacherDashboard,
            Role::Parent | Role::Student => AppRoute::StudentDashboard,
        }
    }

    pub fn layout(&self) -> Layout {
        match self {
            Role::Admin => Layout::Admin,
            Role::School => Layout::School,
            Role::Teacher => Layout::Teacher,
            Role::Parent | Role::Student => Layout::Student,
        }
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "school" => Ok(Role::School),
            "teacher" => Ok(Role::Teacher),
            "parent" => Ok(Role::Parent),
            "student" => Ok(Role::Student),
            _ => Err(AppError::Validation(format!("Unknown role: {}", s))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    Admin,
    School,
    Teacher,
    Student,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub label: &'static str,
    pub route: AppRoute,
}

const ADMIN_NAVIGATION: &[NavItem] = &[
    NavItem {
        label: "Dashboard",
        route: AppRoute::AdminDashboard,
    },
    NavItem {
        label: "Schools",
        route: AppRoute::AdminSchools,
    },
    NavItem {
        label: "Content",
        route: AppRoute::AdminContent,
    },
    NavItem {
        label: "Settings",
        route: AppRoute::AdminSettings,
    },
];

const SCHOOL_NAVIGATION: &[NavItem] = &[
    NavItem {
        label: "Dashboard",
        route: AppRoute::SchoolDashboard,
    },
    NavItem {
        label: "Students",
        route: AppRoute::SchoolStudents,
    },
    NavItem {
        label: "Teachers",
        route: AppRoute::SchoolTeachers,
    },
    NavItem {
        label: "Attendance",
        route: AppRoute::SchoolAttendance,
    },
];

const TEACHER_NAVIGATION: &[NavItem] = &[
    NavItem {
        label: "Dashboard",
        route: AppRoute::TeacherDashboard,
    },
    NavItem {
        label: "My Class",
        route: AppRoute::TeacherClass,
    },
    NavItem {
        label: "Attendance",
        route: AppRoute::TeacherAttendance,
    },
    NavItem {
        label: "Gamification",
        route: AppRoute::TeacherGamification,
    },
];

const STUDENT_NAVIGATION: &[NavItem] = &[
    NavItem {
        label: "Dashboard",
        route: AppRoute::StudentDashboard,
    },
    NavItem {
        label: "Lunch Plan",
        route: AppRoute::StudentLunch,
    },
    NavItem {
        label: "Achievements",
        route: AppRoute::StudentAchievements,
    },
    NavItem {
        label: "Learn",
        route: AppRoute::StudentLearn,
    },
    NavItem {
        label: "Profile",
        route: AppRoute::StudentProfile,
    },
];

impl Layout {
    /// Sidebar entries shown by this layout, in display order.
    pub fn navigation(&self) -> &'static [NavItem] {
        match self {
            Layout::Admin => ADMIN_NAVIGATION,
            Layout::School => SCHOOL_NAVIGATION,
            Layout::Teacher => TEACHER_NAVIGATION,
            Layout::Student => STUDENT_NAVIGATION,
        }
    }
}
