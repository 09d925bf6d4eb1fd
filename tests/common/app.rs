use axum_test::TestServer;
use tempfile::TempDir;

use caseflow::build_router;
use caseflow::config::Config;
use caseflow::state::AppState;

/// Test configuration pointing at a SQLite file inside `dir`
pub fn test_config(dir: &TempDir) -> Config {
    let path = dir.path().join("caseflow-test.db");

    Config {
        database_url: format!("sqlite://{}?mode=rwc", path.display()),
        // One connection keeps SQLite writers from contending
        database_max_connections: 1,
        jwt_secret: "test-jwt-secret-that-is-at-least-32-characters-long".to_string(),
        jwt_expiration_hours: 24,
        host: "127.0.0.1".to_string(),
        port: 0,
    }
}

/// Test application wrapper
pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    // Dropping the directory removes the database file
    _dir: TempDir,
}

impl TestApp {
    /// Create a new test application backed by a fresh database
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = test_config(&dir);

        let state = AppState::new(config)
            .await
            .expect("Failed to create test app state");

        let router = build_router(state.clone());
        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            state,
            _dir: dir,
        }
    }
}
