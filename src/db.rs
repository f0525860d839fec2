use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};

use crate::drinks::{DrinkRepository, NewDrink, PgDrinks};

pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("connect to database")?;
    Ok(db)
}

pub async fn migrate(db: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("run migrations")?;
    Ok(())
}

/// Drop every drink and rebuild the schema, leaving a single seed drink.
pub async fn reset(db: &PgPool) -> anyhow::Result<()> {
    warn!("RESET_DB set: dropping all drinks");
    sqlx::query("DROP TABLE IF EXISTS drinks")
        .execute(db)
        .await
        .context("drop drinks")?;
    sqlx::query("DROP TABLE IF EXISTS _sqlx_migrations")
        .execute(db)
        .await
        .context("drop migration history")?;
    migrate(db).await?;
    seed(&PgDrinks::new(db.clone())).await
}

pub async fn seed(drinks: &dyn DrinkRepository) -> anyhow::Result<()> {
    let water = drinks
        .insert(NewDrink::water())
        .await
        .context("seed drinks")?;
    info!(id = water.id, title = %water.title, "seeded drink");
    Ok(())
}
