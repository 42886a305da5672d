// Embedded schema migrations, applied at startup unless disabled

pub mod diesel;

pub use self::diesel::{check_migration_status, run_migrations, MigrationStatus};

use tracing::{error, info};

/// Apply pending migrations unless `DISABLE_EMBEDDED_MIGRATIONS` is set
pub async fn run_startup_migrations(
    database_url: &str,
    disabled: bool,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if disabled {
        info!("[MIGRATIONS] Skipping embedded migrations (disabled in config)");
        return Ok(());
    }

    match run_migrations(database_url).await {
        Ok(0) => info!("[MIGRATIONS] Schema up to date"),
        Ok(applied) => info!("[MIGRATIONS] Applied {} migrations", applied),
        Err(e) => {
            error!("[MIGRATIONS] Migration failed: {}", e);
            return Err(e);
        },
    }

    Ok(())
}
