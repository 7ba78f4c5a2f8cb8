pub mod auth;
pub mod database;
pub mod db;
pub mod env;
pub mod error;
pub mod models;
pub mod onboarding;
pub mod platform;
pub mod progression;
pub mod repository;
pub mod seed;
pub mod telemetry;
pub mod validation;
#[cfg(test)]
mod test;

pub use error::AppError;
pub use platform::Platform;
