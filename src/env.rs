use std::path::Path;
use std::str::FromStr;

use tracing::{info, warn};

use crate::error::AppError;

const DEFAULT_DATABASE_URL: &str = "sqlite://nutriplatform.db?mode=rwc";

/// Outcome of one env file lookup, logged once tracing is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvFile {
    pub path: &'static str,
    pub loaded: bool,
}

impl EnvFile {
    pub fn log(&self) {
        if self.loaded {
            info!("Loaded environment from: {}", self.path);
        } else {
            warn!("Environment file {} not found, skipping", self.path);
        }
    }
}

pub fn load_environment() -> Result<Vec<EnvFile>, AppError> {
    let is_production =
        std::env::var("NUTRI_PROFILE").unwrap_or("development".to_string()) == "production";

    let env_files = if is_production {
        vec!["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        vec!["config/common.env", "config/dev.env", ".secrets.env"]
    };

    env_files
        .into_iter()
        .map(|path| {
            Ok(EnvFile {
                path,
                loaded: load_env_file(path)?,
            })
        })
        .collect()
}

/// Returns false when the file does not exist.
pub(crate) fn load_env_file(path: &str) -> Result<bool, AppError> {
    if !Path::new(path).exists() {
        return Ok(false);
    }

    dotenvy::from_filename_override(path)?;
    Ok(true)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database_url: String,
    pub log_filter: String,
    pub bcrypt_cost: u32,
    pub otlp_endpoint: Option<String>,
    pub honeycomb_api_key: Option<String>,
    pub deployment_environment: String,
    pub seed_demo_data: bool,
}

impl Settings {
    pub fn from_env() -> Result<Self, AppError> {
        let bcrypt_cost = parse_var::<u32>("BCRYPT_COST")?.unwrap_or(bcrypt::DEFAULT_COST);
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(AppError::Configuration(format!(
                "BCRYPT_COST must be between 4 and 31, got {}",
                bcrypt_cost
            )));
        }

        Ok(Self {
            database_url: var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            log_filter: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            bcrypt_cost,
            otlp_endpoint: var("OTEL_EXPORTER_OTLP_ENDPOINT"),
            honeycomb_api_key: var("HONEYCOMB_API_KEY"),
            deployment_environment: var("DEPLOYMENT_ENVIRONMENT")
                .unwrap_or_else(|| "develop".to_string()),
            seed_demo_data: parse_flag("SEED_DEMO_DATA")?,
        })
    }
}

/// Unset and blank variables both read as `None`.
fn var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>, AppError> {
    var(name)
        .map(|value| {
            value.parse::<T>().map_err(|_| {
                AppError::Configuration(format!("{} has an invalid value: {}", name, value))
            })
        })
        .transpose()
}

fn parse_flag(name: &str) -> Result<bool, AppError> {
    match var(name).map(|value| value.to_lowercase()).as_deref() {
        None | Some("0") | Some("false") | Some("no") | Some("off") => Ok(false),
        Some("1") | Some("true") | Some("yes") | Some("on") => Ok(true),
        Some(other) => Err(AppError::Configuration(format!(
            "{} must be a boolean, got {}",
            name, other
        ))),
    }
}
