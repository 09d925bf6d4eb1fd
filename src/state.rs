use sea_orm::{ConnectOptions, Database, DatabaseConnection};

use crate::config::Config;
use crate::db;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Config,
}

impl AppState {
    /// Connect to the database and make sure the schema exists
    pub async fn new(config: Config) -> Result<Self, AppStateError> {
        let mut opt = ConnectOptions::new(&config.database_url);
        opt.max_connections(config.database_max_connections)
            .min_connections(1)
            .sqlx_logging(true);

        let db = Database::connect(opt)
            .await
            .map_err(|e| AppStateError::Database(e.to_string()))?;

        db::bootstrap(&db)
            .await
            .map_err(|e| AppStateError::Schema(e.to_string()))?;

        Ok(Self { db, config })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppStateError {
    #[error("Database connection error: {0}")]
    Database(String),

    #[error("Schema bootstrap error: {0}")]
    Schema(String),
}
