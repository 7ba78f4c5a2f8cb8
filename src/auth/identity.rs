use serde::Serialize;

use crate::error::AppError;

use super::Role;

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub school_id: Option<String>,
    pub class_id: Option<String>,
    pub onboarding_required: bool,
    pub onboarding_complete: bool,
}

impl Identity {
    /// True while a student still has to finish the onboarding wizard.
    pub fn needs_onboarding(&self) -> bool {
        self.role == Role::Student && self.onboarding_required && !self.onboarding_complete
    }
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbIdentity {
    pub id: Option<i64>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub role: Option<String>,
    pub school_id: Option<String>,
    pub class_id: Option<String>,
    pub onboarding_required: Option<bool>,
    pub onboarding_complete: Option<bool>,
}

impl TryFrom<DbIdentity> for Identity {
    type Error = AppError;

    fn try_from(row: DbIdentity) -> Result<Self, Self::Error> {
        let role = row.role.unwrap_or_default().parse::<Role>().map_err(|_| {
            AppError::Internal(format!(
                "Identity {} has an unknown role",
                row.id.unwrap_or_default()
            ))
        })?;

        Ok(Self {
            id: row.id.unwrap_or_default(),
            email: row.email.unwrap_or_default(),
            display_name: row.display_name.unwrap_or_default(),
            role,
            school_id: row.school_id,
            class_id: row.class_id,
            onboarding_required: row.onboarding_required.unwrap_or_default(),
            onboarding_complete: row.onboarding_complete.unwrap_or_default(),
        })
    }
}

/// Everything needed to provision an identity in the directory.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub email: String,
    pub secret: String,
    pub role: Role,
    pub display_name: String,
    pub school_id: Option<String>,
    pub class_id: Option<String>,
}

impl NewIdentity {
    pub fn new(email: &str, secret: &str, role: Role, display_name: &str) -> Self {
        Self {
            email: email.to_string(),
            secret: secret.to_string(),
            role,
            display_name: display_name.to_string(),
            school_id: None,
            class_id: None,
        }
    }

    pub fn in_school(mut self, school_id: &str) -> Self {
        self.school_id = Some(school_id.to_string());
        self
    }

    pub fn in_class(mut self, class_id: &str) -> Self {
        self.class_id = Some(class_id.to_string());
        self
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
