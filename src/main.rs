use nutriplatform::{
    Platform, database,
    db::SqliteStore,
    env::{Settings, load_environment},
    seed::provision_demo_directory,
    telemetry::init_tracing,
};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_files = load_environment()?;
    let settings = Settings::from_env()?;
    let _telemetry = init_tracing(&settings)?;

    for env_file in &env_files {
        env_file.log();
    }

    info!("Starting nutriplatform core");

    let pool = database::connect(&settings.database_url).await?;

    info!("Applying database schema...");
    if let Err(e) = database::apply_schema(&pool).await {
        error!("Failed to apply schema: {}", e);
        return Err(e.into());
    }

    let platform = Platform::new(SqliteStore::new(pool).with_hash_cost(settings.bcrypt_cost));

    if settings.seed_demo_data {
        let seeded = provision_demo_directory(&platform).await?;
        info!("Seeded {} demo identities", seeded.len());
    }

    info!("Platform core ready");
    Ok(())
}
