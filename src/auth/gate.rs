use serde::Serialize;
use tracing::debug;

use super::{Role, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AppRoute {
    Root,
    Login,
    Onboarding,

    AdminDashboard,
    AdminSchools,
    AdminContent,
    AdminSettings,

    SchoolDashboard,
    SchoolStudents,
    SchoolTeachers,
    SchoolAttendance,

    TeacherDashboard,
    TeacherClass,
    TeacherAttendance,
    TeacherGamification,

    StudentDashboard,
    StudentLunch,
    StudentAchievements,
    StudentLearn,
    StudentProfile,
}

const ADMIN_ONLY: &[Role] = &[Role::Admin];
const SCHOOL_ONLY: &[Role] = &[Role::School];
const TEACHER_ONLY: &[Role] = &[Role::Teacher];
const STUDENT_AREA: &[Role] = &[Role::Student, Role::Parent];
const NOBODY: &[Role] = &[];

impl AppRoute {
    pub const ALL: [AppRoute; 20] = [
        AppRoute::Root,
        AppRoute::Login,
        AppRoute::Onboarding,
        AppRoute::AdminDashboard,
        AppRoute::AdminSchools,
        AppRoute::AdminContent,
        AppRoute::AdminSettings,
        AppRoute::SchoolDashboard,
        AppRoute::SchoolStudents,
        AppRoute::SchoolTeachers,
        AppRoute::SchoolAttendance,
        AppRoute::TeacherDashboard,
        AppRoute::TeacherClass,
        AppRoute::TeacherAttendance,
        AppRoute::TeacherGamification,
        AppRoute::StudentDashboard,
        AppRoute::StudentLunch,
        AppRoute::StudentAchievements,
        AppRoute::StudentLearn,
        AppRoute::StudentProfile,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            AppRoute::Root => "/",
            AppRoute::Login => "/login",
            AppRoute::Onboarding => "/onboarding",
            AppRoute::AdminDashboard => "/admin/dashboard",
            AppRoute::AdminSchools => "/admin/schools",
            AppRoute::AdminContent => "/admin/content",
            AppRoute::AdminSettings => "/admin/settings",
            AppRoute::SchoolDashboard => "/school/dashboard",
            AppRoute::SchoolStudents => "/school/students",
            AppRoute::SchoolTeachers => "/school/teachers",
            AppRoute::SchoolAttendance => "/school/attendance",
            AppRoute::TeacherDashboard => "/teacher/dashboard",
            AppRoute::TeacherClass => "/teacher/class",
            AppRoute::TeacherAttendance => "/teacher/attendance",
            AppRoute::TeacherGamification => "/teacher/gamification",
            AppRoute::StudentDashboard => "/student/dashboard",
            AppRoute::StudentLunch => "/student/lunch",
            AppRoute::StudentAchievements => "/student/achievements",
            AppRoute::StudentLearn => "/student/learn",
            AppRoute::StudentProfile => "/student/profile",
        }
    }

    /// Resolves a requested path, ignoring any query string, fragment or
    /// trailing slash.
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };

        AppRoute::ALL.into_iter().find(|route| route.path() == path)
    }

    pub fn allowed_roles(&self) -> &'static [Role] {
        match self {
            AppRoute::Root | AppRoute::Login | AppRoute::Onboarding => NOBODY,
            AppRoute::AdminDashboard
            | AppRoute::AdminSchools
            | AppRoute::AdminContent
            | AppRoute::AdminSettings => ADMIN_ONLY,
            AppRoute::SchoolDashboard
            | AppRoute::SchoolStudents
            | AppRoute::SchoolTeachers
            | AppRoute::SchoolAttendance => SCHOOL_ONLY,
            AppRoute::TeacherDashboard
            | AppRoute::TeacherClass
            | AppRoute::TeacherAttendance
            | AppRoute::TeacherGamification => TEACHER_ONLY,
            AppRoute::StudentDashboard
            | AppRoute::StudentLunch
            | AppRoute::StudentAchievements
            | AppRoute::StudentLearn
            | AppRoute::StudentProfile => STUDENT_AREA,
        }
    }

    pub fn allows(&self, role: Role) -> bool {
        self.allowed_roles().contains(&role)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    RedirectToDefault(AppRoute),
    RedirectToOnboarding,
    RedirectToLogin,
}

/// The `{ allow, redirectTo }` shape handed to navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Navigation {
    pub allow: bool,
    pub redirect_to: Option<&'static str>,
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }

    pub fn redirect_to(&self) -> Option<AppRoute> {
        match self {
            AccessDecision::Allow => None,
            AccessDecision::RedirectToDefault(route) => Some(*route),
            AccessDecision::RedirectToOnboarding => Some(AppRoute::Onboarding),
            AccessDecision::RedirectToLogin => Some(AppRoute::Login),
        }
    }

    pub fn navigation(&self) -> Navigation {
        Navigation {
            allow: self.is_allowed(),
            redirect_to: self.redirect_to().map(|route| route.path()),
        }
    }
}

/// Decides whether the session may see `requested`. Rules apply in order:
/// no session, pending student onboarding, role not allowed, allow.
pub fn decide(session: Option<&Session>, requested: &str) -> AccessDecision {
    let Some(session) = session else {
        debug!(requested = %requested, "No session, redirecting to login");
        return AccessDecision::RedirectToLogin;
    };

    let identity = &session.identity;

    if identity.needs_onboarding() {
        debug!(identity_id = identity.id, requested = %requested, "Onboarding pending");
        return AccessDecision::RedirectToOnboarding;
    }

    match AppRoute::from_path(requested) {
        Some(route) if route.allows(identity.role) => AccessDecision::Allow,
        _ => {
            let fallback = identity.role.default_route();
            debug!(
                identity_id = identity.id,
                role = %identity.role,
                requested = %requested,
                redirect = fallback.path(),
                "Route not available to role"
            );
            AccessDecision::RedirectToDefault(fallback)
        }
    }
}
