use std::sync::Arc;

use sqlx::PgPool;
use tracing::info;

use crate::auth::TokenVerifier;
use crate::config::{AppConfig, StorageKind};
use crate::db;
use crate::drinks::{DrinkRepository, MemoryDrinks, PgDrinks};

#[derive(Clone)]
pub struct AppState {
    /// Present when drinks live in PostgreSQL; closed on shutdown.
    pub db: Option<PgPool>,
    pub drinks: Arc<dyn DrinkRepository>,
    pub verifier: Arc<TokenVerifier>,
}

impl AppState {
    pub async fn init(config: &AppConfig) -> anyhow::Result<Self> {
        let verifier = Arc::new(TokenVerifier::from_config(&config.auth)?);

        let (db, drinks) = match config.storage {
            StorageKind::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is not set"))?;
                let pool = db::connect(url).await?;
                if config.reset_db {
                    db::reset(&pool).await?;
                } else {
                    db::migrate(&pool).await?;
                }
                let drinks = Arc::new(PgDrinks::new(pool.clone())) as Arc<dyn DrinkRepository>;
                (Some(pool), drinks)
            }
            StorageKind::Memory => {
                info!("using in-memory drink storage");
                let drinks = Arc::new(MemoryDrinks::new()) as Arc<dyn DrinkRepository>;
                if config.reset_db {
                    db::seed(drinks.as_ref()).await?;
                }
                (None, drinks)
            }
        };

        Ok(Self {
            db,
            drinks,
            verifier,
        })
    }

    /// In-memory drinks and the test signing key set.
    #[cfg(test)]
    pub fn fake() -> Self {
        Self {
            db: None,
            drinks: Arc::new(MemoryDrinks::new()),
            verifier: Arc::new(crate::auth::verifier::testing::verifier()),
        }
    }
}
